use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use reel_core::Color;

use crate::animation::NONE_ID;

/// Unique identifier for a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Box padding in native pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    /// CSS shorthand order: vertical, horizontal.
    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
            left: self.left * factor,
        }
    }
}

/// A single line of styled text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub font_family: String,
    /// Font size in native pixels.
    pub font_size: f64,
    pub color: Color,
    /// CSS weight, 100..=900.
    #[serde(default = "default_font_weight")]
    pub font_weight: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
    #[serde(default)]
    pub padding: Edges,
    #[serde(default)]
    pub corner_radius: f64,
}

fn default_font_weight() -> u16 {
    400
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: "Inter".to_string(),
            font_size: 48.0,
            color: Color::BLACK,
            font_weight: default_font_weight(),
            background: None,
            padding: Edges::default(),
            corner_radius: 0.0,
        }
    }
}

/// How an image fills its placement box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFit {
    /// Scale to cover the box, cropping the overflow.
    #[default]
    Cover,
    /// Scale to fit inside the box, letterboxed with transparency.
    Contain,
    /// Stretch to the box, ignoring aspect ratio.
    Fill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub source: PathBuf,
    #[serde(default)]
    pub fit: ImageFit,
}

/// What a layer draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    Text(TextContent),
    Image(ImageContent),
}

impl LayerKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Text(_) => "text",
            LayerKind::Image(_) => "image",
        }
    }
}

/// Top-left anchored placement in percent of the scene size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x_percent: f64,
    pub y_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_percent: Option<f64>,
    #[serde(default)]
    pub z_index: i32,
}

impl Placement {
    pub fn at(x_percent: f64, y_percent: f64) -> Self {
        Self {
            x_percent,
            y_percent,
            width_percent: None,
            height_percent: None,
            z_index: 0,
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

/// Closed interval `[start, end]` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    pub fn is_well_formed(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.start <= self.end
    }
}

/// A visual element in a scene.
///
/// The id is fixed at construction; scenes replace layers whole and refuse
/// replacements that carry a different id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub placement: Placement,
    pub visible_interval: TimeInterval,
    /// Static opacity in [0, 1], multiplied with any animated opacity.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_animation_id")]
    pub animation_id: String,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_animation_id() -> String {
    NONE_ID.to_string()
}

impl Layer {
    /// A layer visible over `[0, end]` at the top-left, with no animation.
    pub fn new(id: LayerId, kind: LayerKind, end: f64) -> Self {
        let name = match &kind {
            LayerKind::Text(t) => t.text.clone(),
            LayerKind::Image(i) => i
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string()),
        };
        Self {
            id,
            name,
            kind,
            placement: Placement::default(),
            visible_interval: TimeInterval::new(0.0, end),
            opacity: default_opacity(),
            animation_id: default_animation_id(),
        }
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_interval(mut self, start: f64, end: f64) -> Self {
        self.visible_interval = TimeInterval::new(start, end);
        self
    }

    pub fn with_animation(mut self, animation_id: impl Into<String>) -> Self {
        self.animation_id = animation_id.into();
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.placement.z_index = z_index;
        self
    }
}
