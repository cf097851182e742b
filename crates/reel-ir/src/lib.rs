//! # reel-ir
//!
//! The scene model and the animation evaluator. A [`Scene`] holds z-ordered
//! text and image layers; each layer names an entry curve from the static
//! [`CURVES`] table, and [`resolve_layer_style`] turns a layer and a time
//! into the property values the renderer applies.

pub mod animation;
pub mod builder;
pub mod evaluate;
pub mod layer;
pub mod scene;
pub mod validate;

pub use animation::{curve_or_none, find_curve, AnimationCurve, PropertySet, CURVES};
pub use builder::{LayerBuilder, SceneBuilder};
pub use evaluate::{
    evaluate, is_visible, layer_progress, resolve_layer_style, ResolvedStyle,
    ENTRY_TRANSITION_SECONDS,
};
pub use layer::{
    Edges, ImageContent, ImageFit, Layer, LayerId, LayerKind, Placement, TextContent, TimeInterval,
};
pub use scene::Scene;
pub use validate::validate_scene;
