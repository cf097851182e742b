use serde::{Deserialize, Serialize};
use std::path::Path;

use reel_core::{Color, FrameRate, ReelError, ReelResult};

use crate::layer::{Layer, LayerId};

/// A scene: z-ordered layers plus duration, frame rate and native size.
///
/// Layers are kept sorted by `placement.z_index` ascending, ties in
/// insertion order. A layer keeps its insertion slot across updates. All
/// mutation goes through the methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SceneDocument", into = "SceneDocument")]
pub struct Scene {
    name: String,
    duration_seconds: f64,
    target_fps: u32,
    native_width: u32,
    native_height: u32,
    background: Color,
    layers: Vec<Layer>,
    /// Insertion sequence of each layer, parallel to `layers`.
    layer_seq: Vec<u64>,
}

/// Persisted form. Loading re-establishes the z-order invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneDocument {
    name: String,
    duration_seconds: f64,
    target_fps: u32,
    native_width: u32,
    native_height: u32,
    #[serde(default = "default_background")]
    background: Color,
    #[serde(default)]
    layers: Vec<Layer>,
    /// Parallel to `layers`. Missing or inconsistent sequences fall back to
    /// array order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    layer_seq: Vec<u64>,
}

fn default_background() -> Color {
    Color::WHITE
}

impl TryFrom<SceneDocument> for Scene {
    type Error = ReelError;

    fn try_from(doc: SceneDocument) -> Result<Self, Self::Error> {
        let unique: std::collections::HashSet<u64> = doc.layer_seq.iter().copied().collect();
        let layer_seq = if doc.layer_seq.len() == doc.layers.len() && unique.len() == doc.layers.len()
        {
            doc.layer_seq
        } else {
            (0..doc.layers.len() as u64).collect()
        };
        let mut scene = Scene {
            name: doc.name,
            duration_seconds: doc.duration_seconds,
            target_fps: doc.target_fps,
            native_width: doc.native_width,
            native_height: doc.native_height,
            background: doc.background,
            layers: doc.layers,
            layer_seq,
        };
        scene.sort_layers();
        Ok(scene)
    }
}

impl From<Scene> for SceneDocument {
    fn from(scene: Scene) -> Self {
        SceneDocument {
            name: scene.name,
            duration_seconds: scene.duration_seconds,
            target_fps: scene.target_fps,
            native_width: scene.native_width,
            native_height: scene.native_height,
            background: scene.background,
            layers: scene.layers,
            layer_seq: scene.layer_seq,
        }
    }
}

impl Scene {
    /// An empty 1920x1080 scene at 30 fps on a white background.
    pub fn new(name: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            name: name.into(),
            duration_seconds,
            target_fps: 30,
            native_width: 1920,
            native_height: 1080,
            background: default_background(),
            layers: Vec::new(),
            layer_seq: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn native_width(&self) -> u32 {
        self.native_width
    }

    pub fn native_height(&self) -> u32 {
        self.native_height
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Layers in compositing order, bottom first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get_layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id().as_str() == id)
    }

    /// Number of frames at the scene's own frame rate.
    pub fn frame_count(&self) -> u64 {
        match FrameRate::new(self.target_fps) {
            Ok(fps) => fps.frame_count(self.duration_seconds),
            Err(_) => 0,
        }
    }

    pub fn add_layer(&mut self, layer: Layer) -> ReelResult<()> {
        if self.get_layer(layer.id().as_str()).is_some() {
            return Err(ReelError::validation(format!(
                "duplicate layer id '{}'",
                layer.id()
            )));
        }
        tracing::debug!(layer = %layer.id(), "add layer");
        let seq = self.layer_seq.iter().max().map_or(0, |m| m + 1);
        self.layers.push(layer);
        self.layer_seq.push(seq);
        self.sort_layers();
        Ok(())
    }

    /// Replace the layer with id `id` by `layer`. The replacement must carry
    /// the same id; a layer's id never changes.
    pub fn update_layer(&mut self, id: &LayerId, layer: Layer) -> ReelResult<()> {
        if layer.id() != id {
            return Err(ReelError::InvalidArgument(format!(
                "layer id is immutable: '{}' cannot become '{}'",
                id,
                layer.id()
            )));
        }
        let slot = self
            .layers
            .iter_mut()
            .find(|l| l.id() == id)
            .ok_or_else(|| ReelError::LayerNotFound(id.to_string()))?;
        *slot = layer;
        tracing::debug!(layer = %id, "update layer");
        self.sort_layers();
        Ok(())
    }

    pub fn remove_layer(&mut self, id: &LayerId) -> ReelResult<Layer> {
        let idx = self
            .layers
            .iter()
            .position(|l| l.id() == id)
            .ok_or_else(|| ReelError::LayerNotFound(id.to_string()))?;
        tracing::debug!(layer = %id, "remove layer");
        self.layer_seq.remove(idx);
        Ok(self.layers.remove(idx))
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_duration(&mut self, seconds: f64) -> ReelResult<()> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ReelError::validation(format!(
                "duration must be positive, got {}",
                seconds
            )));
        }
        self.duration_seconds = seconds;
        Ok(())
    }

    pub fn set_fps(&mut self, fps: u32) -> ReelResult<()> {
        FrameRate::new(fps)?;
        self.target_fps = fps;
        Ok(())
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) -> ReelResult<()> {
        if width == 0 || height == 0 {
            return Err(ReelError::validation(format!(
                "resolution must be non-zero, got {}x{}",
                width, height
            )));
        }
        self.native_width = width;
        self.native_height = height;
        Ok(())
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    fn sort_layers(&mut self) {
        let mut entries: Vec<(Layer, u64)> = std::mem::take(&mut self.layers)
            .into_iter()
            .zip(std::mem::take(&mut self.layer_seq))
            .collect();
        entries.sort_by_key(|(layer, seq)| (layer.placement.z_index, *seq));
        let (layers, layer_seq): (Vec<Layer>, Vec<u64>) = entries.into_iter().unzip();
        self.layers = layers;
        self.layer_seq = layer_seq;
    }

    pub fn to_json(&self) -> ReelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ReelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> ReelResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> ReelResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ReelError::asset(format!("cannot read scene: {}", e), path))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerKind, TextContent};

    fn text(id: &str, z: i32) -> Layer {
        Layer::new(LayerId::new(id), LayerKind::Text(TextContent::new(id)), 5.0).with_z_index(z)
    }

    fn ids(scene: &Scene) -> Vec<&str> {
        scene.layers().iter().map(|l| l.id().as_str()).collect()
    }

    #[test]
    fn test_scene_defaults() {
        let scene = Scene::new("promo", 2.0);
        assert_eq!(scene.native_width(), 1920);
        assert_eq!(scene.native_height(), 1080);
        assert_eq!(scene.target_fps(), 30);
        assert_eq!(scene.frame_count(), 60);
        assert!(scene.layers().is_empty());
    }

    #[test]
    fn test_layers_sorted_with_stable_ties() {
        let mut scene = Scene::new("s", 5.0);
        scene.add_layer(text("a", 1)).unwrap();
        scene.add_layer(text("b", 0)).unwrap();
        scene.add_layer(text("c", 1)).unwrap();
        scene.add_layer(text("d", -1)).unwrap();
        assert_eq!(ids(&scene), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut scene = Scene::new("s", 5.0);
        scene.add_layer(text("a", 0)).unwrap();
        assert!(scene.add_layer(text("a", 3)).is_err());
        assert_eq!(scene.layers().len(), 1);
    }

    #[test]
    fn test_update_layer_resorts() {
        let mut scene = Scene::new("s", 5.0);
        scene.add_layer(text("a", 0)).unwrap();
        scene.add_layer(text("b", 1)).unwrap();
        let moved = scene.get_layer("a").unwrap().clone().with_z_index(5);
        scene.update_layer(&LayerId::new("a"), moved).unwrap();
        assert_eq!(ids(&scene), vec!["b", "a"]);
    }

    #[test]
    fn test_update_keeps_insertion_slot_on_z_round_trip() {
        let mut scene = Scene::new("s", 5.0);
        scene.add_layer(text("a", 0)).unwrap();
        scene.add_layer(text("b", 0)).unwrap();
        let id = LayerId::new("a");
        let raised = scene.get_layer("a").unwrap().clone().with_z_index(1);
        scene.update_layer(&id, raised).unwrap();
        assert_eq!(ids(&scene), vec!["b", "a"]);
        let lowered = scene.get_layer("a").unwrap().clone().with_z_index(0);
        scene.update_layer(&id, lowered).unwrap();
        assert_eq!(ids(&scene), vec!["a", "b"]);

        let mut reloaded = Scene::from_json(&scene.to_json().unwrap()).unwrap();
        assert_eq!(reloaded, scene);
        reloaded.add_layer(text("c", 0)).unwrap();
        assert_eq!(ids(&reloaded), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_then_add_goes_last_among_ties() {
        let mut scene = Scene::new("s", 5.0);
        scene.add_layer(text("a", 0)).unwrap();
        scene.add_layer(text("b", 0)).unwrap();
        scene.remove_layer(&LayerId::new("b")).unwrap();
        scene.add_layer(text("c", 0)).unwrap();
        scene.add_layer(text("b", 0)).unwrap();
        assert_eq!(ids(&scene), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_update_layer_refuses_id_change() {
        let mut scene = Scene::new("s", 5.0);
        scene.add_layer(text("a", 0)).unwrap();
        let err = scene
            .update_layer(&LayerId::new("a"), text("z", 0))
            .unwrap_err();
        assert!(matches!(err, ReelError::InvalidArgument(_)));
        assert!(scene.get_layer("a").is_some());
    }

    #[test]
    fn test_update_and_remove_missing_layer() {
        let mut scene = Scene::new("s", 5.0);
        assert!(matches!(
            scene.update_layer(&LayerId::new("x"), text("x", 0)),
            Err(ReelError::LayerNotFound(_))
        ));
        assert!(matches!(
            scene.remove_layer(&LayerId::new("x")),
            Err(ReelError::LayerNotFound(_))
        ));
    }

    #[test]
    fn test_remove_layer_returns_it() {
        let mut scene = Scene::new("s", 5.0);
        scene.add_layer(text("a", 0)).unwrap();
        let removed = scene.remove_layer(&LayerId::new("a")).unwrap();
        assert_eq!(removed.id().as_str(), "a");
        assert!(scene.layers().is_empty());
    }

    #[test]
    fn test_setters_validate() {
        let mut scene = Scene::new("s", 5.0);
        assert!(scene.set_duration(0.0).is_err());
        assert!(scene.set_duration(f64::INFINITY).is_err());
        assert!(scene.set_fps(0).is_err());
        assert!(scene.set_resolution(0, 720).is_err());
        scene.set_duration(3.5).unwrap();
        scene.set_fps(24).unwrap();
        scene.set_resolution(1280, 720).unwrap();
        assert_eq!(scene.frame_count(), 84);
        assert_eq!(scene.native_width(), 1280);
    }

    #[test]
    fn test_json_load_sorts_layers() {
        let mut scene = Scene::new("s", 5.0);
        scene.add_layer(text("low", 0)).unwrap();
        scene.add_layer(text("high", 9)).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&scene.to_json().unwrap()).unwrap();
        let layers = value["layers"].as_array_mut().unwrap();
        layers.reverse();
        let reloaded = Scene::from_json(&value.to_string()).unwrap();
        assert_eq!(ids(&reloaded), vec!["low", "high"]);
    }
}
