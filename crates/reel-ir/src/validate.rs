use std::collections::HashSet;

use reel_core::ReelError;

use crate::animation::find_curve;
use crate::layer::LayerKind;
use crate::scene::Scene;

/// Validate a scene for structural correctness, collecting every problem.
///
/// Layers whose interval extends past the scene duration are accepted; they
/// are simply never visible past the end. Unknown animation ids are logged
/// and render as `none`.
pub fn validate_scene(scene: &Scene) -> Result<(), Vec<ReelError>> {
    let mut errors = Vec::new();

    if scene.native_width() == 0 || scene.native_height() == 0 {
        errors.push(ReelError::validation("scene resolution must be non-zero"));
    }
    if scene.target_fps() == 0 {
        errors.push(ReelError::validation("scene fps must be positive"));
    }
    let duration = scene.duration_seconds();
    if !duration.is_finite() || duration <= 0.0 {
        errors.push(ReelError::validation(format!(
            "scene duration must be positive, got {}",
            duration
        )));
    }

    let mut layer_ids = HashSet::new();
    for layer in scene.layers() {
        let id = layer.id();
        if !layer_ids.insert(id) {
            errors.push(ReelError::validation(format!("duplicate layer id '{}'", id)));
        }
        if !layer.visible_interval.is_well_formed() {
            errors.push(ReelError::validation(format!(
                "layer '{}' has invalid interval [{}, {}]",
                id, layer.visible_interval.start, layer.visible_interval.end
            )));
        }
        if !(0.0..=1.0).contains(&layer.opacity) {
            errors.push(ReelError::validation(format!(
                "layer '{}' opacity {} is outside [0, 1]",
                id, layer.opacity
            )));
        }
        let p = &layer.placement;
        let sizes = [p.width_percent, p.height_percent];
        if !p.x_percent.is_finite()
            || !p.y_percent.is_finite()
            || sizes.iter().flatten().any(|v| !v.is_finite() || *v < 0.0)
        {
            errors.push(ReelError::validation(format!(
                "layer '{}' has an invalid placement",
                id
            )));
        }
        if let LayerKind::Text(text) = &layer.kind {
            if !text.font_size.is_finite() || text.font_size <= 0.0 {
                errors.push(ReelError::validation(format!(
                    "layer '{}' font size must be positive",
                    id
                )));
            }
            let pad = &text.padding;
            if [pad.top, pad.right, pad.bottom, pad.left, text.corner_radius]
                .iter()
                .any(|v| !v.is_finite() || *v < 0.0)
            {
                errors.push(ReelError::validation(format!(
                    "layer '{}' padding and corner radius must be non-negative",
                    id
                )));
            }
        }
        if find_curve(&layer.animation_id).is_none() {
            tracing::warn!(layer = %id, animation_id = %layer.animation_id, "unknown animation id");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Layer, LayerId, TextContent};

    fn scene_with(layer: Layer) -> Scene {
        let json = format!(
            r#"{{"name":"s","duration_seconds":5.0,"target_fps":30,"native_width":1920,"native_height":1080,"layers":[{}]}}"#,
            serde_json::to_string(&layer).unwrap()
        );
        Scene::from_json(&json).unwrap()
    }

    fn text(id: &str) -> Layer {
        Layer::new(LayerId::new(id), LayerKind::Text(TextContent::new("hi")), 2.0)
    }

    #[test]
    fn test_valid_scene() {
        let mut scene = Scene::new("ok", 5.0);
        scene.add_layer(text("a")).unwrap();
        assert!(validate_scene(&scene).is_ok());
    }

    #[test]
    fn test_interval_past_duration_is_allowed() {
        let scene = scene_with(text("late").with_interval(4.0, 60.0));
        assert!(validate_scene(&scene).is_ok());
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let scene = scene_with(text("bad").with_interval(3.0, 1.0));
        let errs = validate_scene(&scene).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].to_string().contains("invalid interval"));
    }

    #[test]
    fn test_opacity_and_font_size_checked() {
        let mut layer = text("a");
        layer.opacity = 1.5;
        if let LayerKind::Text(t) = &mut layer.kind {
            t.font_size = 0.0;
        }
        let errs = validate_scene(&scene_with(layer)).unwrap_err();
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_from_document() {
        let layer = serde_json::to_string(&text("dup")).unwrap();
        let json = format!(
            r#"{{"name":"s","duration_seconds":5.0,"target_fps":30,"native_width":1920,"native_height":1080,"layers":[{0},{0}]}}"#,
            layer
        );
        let scene = Scene::from_json(&json).unwrap();
        let errs = validate_scene(&scene).unwrap_err();
        assert!(errs[0].to_string().contains("duplicate layer id"));
    }

    #[test]
    fn test_bad_scene_fields_collected() {
        let json = r#"{"name":"s","duration_seconds":0.0,"target_fps":0,"native_width":0,"native_height":1080}"#;
        let scene = Scene::from_json(json).unwrap();
        assert_eq!(validate_scene(&scene).unwrap_err().len(), 3);
    }

    #[test]
    fn test_unknown_animation_is_not_an_error() {
        let scene = scene_with(text("a").with_animation("spin"));
        assert!(validate_scene(&scene).is_ok());
    }
}
