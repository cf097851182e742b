use serde::{Deserialize, Serialize};

/// A sparse set of animatable visual properties.
///
/// Offsets and blur are in layer pixels at the scene's native resolution,
/// rotations in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_radius_px: Option<f64>,
}

impl PropertySet {
    pub const EMPTY: PropertySet = PropertySet {
        opacity: None,
        offset_x: None,
        offset_y: None,
        scale: None,
        rotate_z: None,
        rotate_x: None,
        rotate_y: None,
        blur_radius_px: None,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

/// A named entry transition: linear interpolation from `initial` to `final_`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimationCurve {
    /// Key stored on layers, e.g. `fadeIn`.
    pub id: &'static str,
    /// Human-readable name.
    pub label: &'static str,
    pub initial: PropertySet,
    #[serde(rename = "final")]
    pub final_: PropertySet,
}

/// Identity curve id.
pub const NONE_ID: &str = "none";

const fn fade(mut set: PropertySet, opacity: f64) -> PropertySet {
    set.opacity = Some(opacity);
    set
}

const fn curve(
    id: &'static str,
    label: &'static str,
    initial: PropertySet,
    final_: PropertySet,
) -> AnimationCurve {
    AnimationCurve {
        id,
        label,
        initial: fade(initial, 0.0),
        final_: fade(final_, 1.0),
    }
}

const E: PropertySet = PropertySet::EMPTY;

/// The built-in curve table, in catalog order.
pub static CURVES: &[AnimationCurve] = &[
    AnimationCurve {
        id: NONE_ID,
        label: "None",
        initial: E,
        final_: E,
    },
    curve("fadeIn", "Fade In", E, E),
    curve(
        "slideInLeft",
        "Slide In Left",
        PropertySet { offset_x: Some(-100.0), ..E },
        PropertySet { offset_x: Some(0.0), ..E },
    ),
    curve(
        "slideInRight",
        "Slide In Right",
        PropertySet { offset_x: Some(100.0), ..E },
        PropertySet { offset_x: Some(0.0), ..E },
    ),
    curve(
        "slideInTop",
        "Slide In Top",
        PropertySet { offset_y: Some(-100.0), ..E },
        PropertySet { offset_y: Some(0.0), ..E },
    ),
    curve(
        "slideInBottom",
        "Slide In Bottom",
        PropertySet { offset_y: Some(100.0), ..E },
        PropertySet { offset_y: Some(0.0), ..E },
    ),
    curve(
        "zoomIn",
        "Zoom In",
        PropertySet { scale: Some(0.5), ..E },
        PropertySet { scale: Some(1.0), ..E },
    ),
    curve(
        "zoomOut",
        "Zoom Out",
        PropertySet { scale: Some(1.5), ..E },
        PropertySet { scale: Some(1.0), ..E },
    ),
    curve(
        "bounceIn",
        "Bounce In",
        PropertySet { scale: Some(0.3), ..E },
        PropertySet { scale: Some(1.0), ..E },
    ),
    curve(
        "rotateIn",
        "Rotate In",
        PropertySet { rotate_z: Some(-180.0), scale: Some(0.5), ..E },
        PropertySet { rotate_z: Some(0.0), scale: Some(1.0), ..E },
    ),
    curve(
        "blurIn",
        "Blur In",
        PropertySet { blur_radius_px: Some(10.0), ..E },
        PropertySet { blur_radius_px: Some(0.0), ..E },
    ),
    curve(
        "elasticPop",
        "Elastic Pop",
        PropertySet { scale: Some(0.0), ..E },
        PropertySet { scale: Some(1.0), ..E },
    ),
    curve(
        "slideInDiagonal",
        "Slide In Diagonal",
        PropertySet { offset_x: Some(-100.0), offset_y: Some(-100.0), ..E },
        PropertySet { offset_x: Some(0.0), offset_y: Some(0.0), ..E },
    ),
    curve(
        "flipInX",
        "Flip In X",
        PropertySet { rotate_x: Some(90.0), ..E },
        PropertySet { rotate_x: Some(0.0), ..E },
    ),
    curve(
        "flipInY",
        "Flip In Y",
        PropertySet { rotate_y: Some(90.0), ..E },
        PropertySet { rotate_y: Some(0.0), ..E },
    ),
    curve(
        "swing",
        "Swing",
        PropertySet { rotate_z: Some(15.0), ..E },
        PropertySet { rotate_z: Some(0.0), ..E },
    ),
    curve(
        "heartbeat",
        "Heartbeat",
        PropertySet { scale: Some(0.8), ..E },
        PropertySet { scale: Some(1.0), ..E },
    ),
    curve(
        "wobble",
        "Wobble",
        PropertySet { offset_x: Some(-20.0), rotate_z: Some(-5.0), ..E },
        PropertySet { offset_x: Some(0.0), rotate_z: Some(0.0), ..E },
    ),
];

/// Exact lookup; None for ids not in the table.
pub fn find_curve(id: &str) -> Option<&'static AnimationCurve> {
    CURVES.iter().find(|c| c.id == id)
}

/// Lookup that falls back to the identity curve for unknown ids.
pub fn curve_or_none(id: &str) -> &'static AnimationCurve {
    match find_curve(id) {
        Some(c) => c,
        None => {
            tracing::debug!(animation_id = id, "unknown animation id, using none");
            &CURVES[0]
        }
    }
}
