use reel_encode::{EncodeError, MuxError};
use thiserror::Error;

/// Why an export ended without a container.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("encoder unavailable: {0}")]
    Capability(String),

    #[error("invalid export job: {0}")]
    InvalidJob(String),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("mux failed: {0}")]
    Mux(#[from] MuxError),

    #[error("export cancelled")]
    Cancelled,

    #[error("export pipeline already used")]
    AlreadyUsed,
}

/// A single frame could not be captured. The frame is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("capture failed: {0}")]
    Failed(String),

    #[error("captured {got_width}x{got_height}, expected {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
}
