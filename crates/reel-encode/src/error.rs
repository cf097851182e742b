/// Errors produced while encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("encoder unavailable: {0}")]
    Unavailable(String),

    #[error("invalid encoder settings: {0}")]
    InvalidSettings(String),

    #[error("frame is {got_width}x{got_height}, encoder expects {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("encoder process failed ({status}): {stderr}")]
    Process { status: String, stderr: String },

    #[error("malformed bitstream: {0}")]
    Bitstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while muxing or probing a container.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("no decoder configuration before the first sample")]
    MissingDecoderConfig,

    #[error("decoder configuration changed mid-stream")]
    DecoderConfigChanged,

    #[error("sample pts {got} is not after previous pts {previous}")]
    NonMonotonicPts { previous: i64, got: i64 },

    #[error("no samples to mux")]
    Empty,

    #[error("container exceeds 32-bit offsets")]
    TooLarge,

    #[error("malformed container: {0}")]
    Malformed(String),
}
