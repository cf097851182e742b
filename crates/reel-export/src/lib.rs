//! # reel-export
//!
//! Turns a scene into an MP4 held in memory. The pipeline steps through
//! frame indices, seeks a [`FrameSource`] to each sample time, waits for it
//! to settle, captures, encodes and muxes. Timestamps come from the frame
//! index alone, so a slow or failing capture never shifts the timeline.

pub mod cancel;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod reorder;
pub mod source;
pub mod state;

pub use cancel::CancelToken;
pub use error::{CaptureError, ExportError};
pub use job::ExportJob;
pub use pipeline::{ContainerBuffer, ExportPipeline, ExportProgress, ProgressCallback};
pub use reorder::ReorderBuffer;
pub use source::{FrameSource, SettlePolicy};
pub use state::ExportState;
