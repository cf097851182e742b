//! The animation evaluator.
//!
//! Pure functions of `(layer, time)`. Interactive playback and export both
//! go through [`resolve_layer_style`], so the two can never diverge.

use serde::Serialize;

use crate::animation::{curve_or_none, AnimationCurve, PropertySet};
use crate::layer::Layer;

/// Length of the entry transition that follows a layer's start time.
pub const ENTRY_TRANSITION_SECONDS: f64 = 0.5;

/// Animated property values at one instant. `None` means "not animated":
/// the renderer falls back to the layer's static value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResolvedStyle {
    pub opacity: Option<f64>,
    pub offset_x: Option<f64>,
    pub offset_y: Option<f64>,
    pub scale: Option<f64>,
    pub rotate_z: Option<f64>,
    pub rotate_x: Option<f64>,
    pub rotate_y: Option<f64>,
    pub blur_radius_px: Option<f64>,
}

impl From<PropertySet> for ResolvedStyle {
    fn from(p: PropertySet) -> Self {
        Self {
            opacity: p.opacity,
            offset_x: p.offset_x,
            offset_y: p.offset_y,
            scale: p.scale,
            rotate_z: p.rotate_z,
            rotate_x: p.rotate_x,
            rotate_y: p.rotate_y,
            blur_radius_px: p.blur_radius_px,
        }
    }
}

impl ResolvedStyle {
    pub fn opacity_or(&self, fallback: f64) -> f64 {
        self.opacity.unwrap_or(fallback)
    }

    pub fn scale_or(&self, fallback: f64) -> f64 {
        self.scale.unwrap_or(fallback)
    }

    /// Translation in native pixels; absent axes are zero.
    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x.unwrap_or(0.0), self.offset_y.unwrap_or(0.0))
    }

    /// Rotations `(z, x, y)` in degrees; absent axes are zero.
    pub fn rotation(&self) -> (f64, f64, f64) {
        (
            self.rotate_z.unwrap_or(0.0),
            self.rotate_x.unwrap_or(0.0),
            self.rotate_y.unwrap_or(0.0),
        )
    }

    /// Blur radius when it is positive.
    pub fn effective_blur(&self) -> Option<f64> {
        self.blur_radius_px.filter(|r| *r > 0.0)
    }

    /// True when any 3D rotation is non-zero.
    pub fn has_3d_rotation(&self) -> bool {
        let (_, rx, ry) = self.rotation();
        rx != 0.0 || ry != 0.0
    }
}

fn lerp_both(a: Option<f64>, b: Option<f64>, progress: f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + (b - a) * progress),
        _ => None,
    }
}

/// Evaluate a curve at `progress`.
///
/// At or below 0 the initial set is returned verbatim, at or above 1 the
/// final set. In between, properties present in both sets are linearly
/// interpolated and all others are omitted.
pub fn evaluate(curve: &AnimationCurve, progress: f64) -> ResolvedStyle {
    if progress.is_nan() || progress <= 0.0 {
        return curve.initial.into();
    }
    if progress >= 1.0 {
        return curve.final_.into();
    }
    let a = &curve.initial;
    let b = &curve.final_;
    ResolvedStyle {
        opacity: lerp_both(a.opacity, b.opacity, progress),
        offset_x: lerp_both(a.offset_x, b.offset_x, progress),
        offset_y: lerp_both(a.offset_y, b.offset_y, progress),
        scale: lerp_both(a.scale, b.scale, progress),
        rotate_z: lerp_both(a.rotate_z, b.rotate_z, progress),
        rotate_x: lerp_both(a.rotate_x, b.rotate_x, progress),
        rotate_y: lerp_both(a.rotate_y, b.rotate_y, progress),
        blur_radius_px: lerp_both(a.blur_radius_px, b.blur_radius_px, progress),
    }
}

/// `clamp((t - start) / ENTRY_TRANSITION_SECONDS, 0, 1)`.
pub fn layer_progress(layer: &Layer, time: f64) -> f64 {
    ((time - layer.visible_interval.start) / ENTRY_TRANSITION_SECONDS).clamp(0.0, 1.0)
}

/// Inclusive visibility gate.
pub fn is_visible(layer: &Layer, time: f64) -> bool {
    layer.visible_interval.contains(time)
}

/// Style of `layer` at `time`, or None when the layer is not visible.
pub fn resolve_layer_style(layer: &Layer, time: f64) -> Option<ResolvedStyle> {
    if !is_visible(layer, time) {
        return None;
    }
    let curve = curve_or_none(&layer.animation_id);
    Some(evaluate(curve, layer_progress(layer, time)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::find_curve;
    use crate::layer::{LayerId, LayerKind, TextContent};

    fn text_layer(start: f64, end: f64, animation: &str) -> Layer {
        Layer::new(
            LayerId::new("l"),
            LayerKind::Text(TextContent::new("x")),
            end,
        )
        .with_interval(start, end)
        .with_animation(animation)
    }

    #[test]
    fn test_boundaries_return_sets_verbatim() {
        let curve = find_curve("rotateIn").unwrap();
        assert_eq!(evaluate(curve, 0.0), ResolvedStyle::from(curve.initial));
        assert_eq!(evaluate(curve, -3.0), ResolvedStyle::from(curve.initial));
        assert_eq!(evaluate(curve, 1.0), ResolvedStyle::from(curve.final_));
        assert_eq!(evaluate(curve, 7.5), ResolvedStyle::from(curve.final_));
        assert_eq!(evaluate(curve, f64::NAN), ResolvedStyle::from(curve.initial));
    }

    #[test]
    fn test_fade_midpoint() {
        let curve = find_curve("fadeIn").unwrap();
        let style = evaluate(curve, 0.5);
        assert!((style.opacity.unwrap() - 0.5).abs() < 1e-9);
        assert!(style.scale.is_none());
    }

    #[test]
    fn test_rotation_is_not_wrapped() {
        let curve = find_curve("rotateIn").unwrap();
        let style = evaluate(curve, 0.25);
        assert!((style.rotate_z.unwrap() + 135.0).abs() < 1e-9);
        assert!((style.scale.unwrap() - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_blur_reaching_zero_means_no_blur() {
        let curve = find_curve("blurIn").unwrap();
        assert_eq!(evaluate(curve, 0.5).effective_blur(), Some(5.0));
        assert_eq!(evaluate(curve, 1.0).effective_blur(), None);
        let negative = ResolvedStyle {
            blur_radius_px: Some(-2.0),
            ..Default::default()
        };
        assert_eq!(negative.effective_blur(), None);
    }

    #[test]
    fn test_one_sided_property_only_at_boundaries() {
        let curve = AnimationCurve {
            id: "custom",
            label: "Custom",
            initial: PropertySet {
                scale: Some(2.0),
                opacity: Some(0.0),
                ..PropertySet::EMPTY
            },
            final_: PropertySet {
                opacity: Some(1.0),
                ..PropertySet::EMPTY
            },
        };
        assert_eq!(evaluate(&curve, 0.0).scale, Some(2.0));
        assert_eq!(evaluate(&curve, 0.5).scale, None);
        assert_eq!(evaluate(&curve, 1.0).scale, None);
    }

    #[test]
    fn test_layer_progress_window() {
        let layer = text_layer(2.0, 5.0, "fadeIn");
        assert_eq!(layer_progress(&layer, 1.0), 0.0);
        assert_eq!(layer_progress(&layer, 2.0), 0.0);
        assert!((layer_progress(&layer, 2.25) - 0.5).abs() < 1e-12);
        assert_eq!(layer_progress(&layer, 2.5), 1.0);
        assert_eq!(layer_progress(&layer, 4.0), 1.0);
    }

    #[test]
    fn test_resolve_gates_on_visibility() {
        let layer = text_layer(2.0, 5.0, "fadeIn");
        assert!(resolve_layer_style(&layer, 1.999).is_none());
        assert_eq!(resolve_layer_style(&layer, 2.0).unwrap().opacity, Some(0.0));
        assert_eq!(resolve_layer_style(&layer, 5.0).unwrap().opacity, Some(1.0));
        assert!(resolve_layer_style(&layer, 5.001).is_none());
    }

    #[test]
    fn test_unknown_animation_resolves_to_identity() {
        let layer = text_layer(0.0, 1.0, "doesNotExist");
        let style = resolve_layer_style(&layer, 0.1).unwrap();
        assert_eq!(style, ResolvedStyle::default());
        assert_eq!(style.opacity_or(1.0), 1.0);
        assert_eq!(style.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_flip_has_3d_rotation() {
        let layer = text_layer(0.0, 1.0, "flipInY");
        let style = resolve_layer_style(&layer, 0.1).unwrap();
        assert!(style.has_3d_rotation());
        assert!((style.rotation().2 - 72.0).abs() < 1e-9);
    }
}
