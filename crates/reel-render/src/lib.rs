//! # reel-render
//!
//! The Reel scene renderer. Takes a scene and an explicit time and produces
//! an RGBA frame buffer, entirely on the CPU. Preview playback and export
//! both render through [`PlaybackController`].

pub mod blur;
pub mod compositor;
pub mod fonts;
pub mod image_loader;
pub mod playback;
pub mod renderer;
pub mod text;

pub use fonts::FontBook;
pub use playback::{PlayState, PlaybackClock, PlaybackController, TICK_SECONDS};
pub use renderer::{RenderDiagnostic, RenderOutput, SceneRenderer};
