/// Core error types for the Reel engine.
use std::path::PathBuf;

/// A specialized Result type for Reel operations.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error type shared by the scene model, renderer and encoders.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("layer not found: {0}")]
    LayerNotFound(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("asset error: {message} ({path:?})")]
    Asset { message: String, path: PathBuf },

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ReelError {
    /// Create an asset error.
    pub fn asset(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        ReelError::Asset {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ReelError::Validation(message.into())
    }
}
