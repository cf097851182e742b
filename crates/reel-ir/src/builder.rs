use std::path::PathBuf;

use reel_core::{Color, ReelResult};

use crate::layer::{
    Edges, ImageContent, ImageFit, Layer, LayerId, LayerKind, Placement, TextContent,
};
use crate::scene::Scene;

/// Builds a [`Scene`] programmatically. Used by tests, benches and the CLI's
/// demo scene.
pub struct SceneBuilder {
    scene: Scene,
    layers: Vec<Layer>,
}

impl SceneBuilder {
    pub fn new(name: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            scene: Scene::new(name, duration_seconds),
            layers: Vec::new(),
        }
    }

    pub fn resolution(&mut self, width: u32, height: u32) -> &mut Self {
        // Checked again when the scene is built.
        let _ = self.scene.set_resolution(width, height);
        self
    }

    pub fn fps(&mut self, fps: u32) -> &mut Self {
        let _ = self.scene.set_fps(fps);
        self
    }

    pub fn background(&mut self, color: Color) -> &mut Self {
        self.scene.set_background(color);
        self
    }

    /// Add a layer. Compositing order follows z-index, then call order.
    pub fn add_layer(&mut self, layer: Layer) -> &mut Self {
        self.layers.push(layer);
        self
    }

    /// Build the scene, failing on duplicate layer ids or invalid settings.
    pub fn build(self) -> ReelResult<Scene> {
        let mut scene = self.scene;
        for layer in self.layers {
            scene.add_layer(layer)?;
        }
        crate::validate::validate_scene(&scene).map_err(|mut errs| errs.remove(0))?;
        Ok(scene)
    }
}

/// Builds a single [`Layer`].
pub struct LayerBuilder {
    layer: Layer,
}

impl LayerBuilder {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            layer: Layer::new(
                LayerId::new(id),
                LayerKind::Text(TextContent::new(text)),
                0.0,
            ),
        }
    }

    pub fn image(id: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            layer: Layer::new(
                LayerId::new(id),
                LayerKind::Image(ImageContent {
                    source: source.into(),
                    fit: ImageFit::Cover,
                }),
                0.0,
            ),
        }
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.layer.name = name.into();
        self
    }

    pub fn position(&mut self, x_percent: f64, y_percent: f64) -> &mut Self {
        self.layer.placement.x_percent = x_percent;
        self.layer.placement.y_percent = y_percent;
        self
    }

    pub fn size(&mut self, width_percent: f64, height_percent: f64) -> &mut Self {
        self.layer.placement.width_percent = Some(width_percent);
        self.layer.placement.height_percent = Some(height_percent);
        self
    }

    pub fn placement(&mut self, placement: Placement) -> &mut Self {
        self.layer.placement = placement;
        self
    }

    pub fn z_index(&mut self, z: i32) -> &mut Self {
        self.layer.placement.z_index = z;
        self
    }

    pub fn visible(&mut self, start: f64, end: f64) -> &mut Self {
        self.layer.visible_interval.start = start;
        self.layer.visible_interval.end = end;
        self
    }

    pub fn animation(&mut self, id: impl Into<String>) -> &mut Self {
        self.layer.animation_id = id.into();
        self
    }

    pub fn opacity(&mut self, opacity: f64) -> &mut Self {
        self.layer.opacity = opacity;
        self
    }

    pub fn font(&mut self, family: impl Into<String>, size: f64) -> &mut Self {
        if let LayerKind::Text(t) = &mut self.layer.kind {
            t.font_family = family.into();
            t.font_size = size;
        }
        self
    }

    pub fn color(&mut self, color: Color) -> &mut Self {
        if let LayerKind::Text(t) = &mut self.layer.kind {
            t.color = color;
        }
        self
    }

    pub fn weight(&mut self, weight: u16) -> &mut Self {
        if let LayerKind::Text(t) = &mut self.layer.kind {
            t.font_weight = weight;
        }
        self
    }

    /// Background box behind text.
    pub fn boxed(&mut self, background: Color, padding: Edges, corner_radius: f64) -> &mut Self {
        if let LayerKind::Text(t) = &mut self.layer.kind {
            t.background = Some(background);
            t.padding = padding;
            t.corner_radius = corner_radius;
        }
        self
    }

    pub fn fit(&mut self, fit: ImageFit) -> &mut Self {
        if let LayerKind::Image(i) = &mut self.layer.kind {
            i.fit = fit;
        }
        self
    }

    pub fn build(self) -> Layer {
        self.layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_scene_with_layers() {
        let mut title = LayerBuilder::text("title", "Summer Sale");
        title
            .position(10.0, 40.0)
            .visible(0.0, 4.0)
            .animation("slideInLeft")
            .font("Inter", 72.0)
            .weight(700)
            .boxed(Color::BLACK, Edges::symmetric(10.0, 20.0), 8.0);

        let mut hero = LayerBuilder::image("hero", "hero.png");
        hero.size(100.0, 100.0).z_index(-1).visible(0.0, 4.0);

        let mut builder = SceneBuilder::new("promo", 4.0);
        builder
            .resolution(1280, 720)
            .fps(25)
            .add_layer(title.build())
            .add_layer(hero.build());
        let scene = builder.build().unwrap();

        assert_eq!(scene.native_width(), 1280);
        assert_eq!(scene.target_fps(), 25);
        assert_eq!(scene.layers()[0].id().as_str(), "hero");
        match &scene.layers()[1].kind {
            LayerKind::Text(t) => {
                assert_eq!(t.font_weight, 700);
                assert_eq!(t.padding.left, 20.0);
                assert_eq!(t.background, Some(Color::BLACK));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_build_rejects_duplicate_ids() {
        let mut builder = SceneBuilder::new("dup", 1.0);
        builder
            .add_layer(LayerBuilder::text("a", "x").build())
            .add_layer(LayerBuilder::text("a", "y").build());
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_build_rejects_invalid_layer() {
        let mut bad = LayerBuilder::text("a", "x");
        bad.visible(2.0, 1.0);
        let mut builder = SceneBuilder::new("bad", 1.0);
        builder.add_layer(bad.build());
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_text_setters_ignored_on_image() {
        let mut b = LayerBuilder::image("img", "a.png");
        b.font("Inter", 10.0).fit(ImageFit::Fill);
        let layer = b.build();
        assert_eq!(
            layer.kind,
            LayerKind::Image(ImageContent {
                source: PathBuf::from("a.png"),
                fit: ImageFit::Fill
            })
        );
    }
}
