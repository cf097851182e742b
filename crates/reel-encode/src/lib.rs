//! # reel-encode
//!
//! Encoding module: turns rendered frames into an MP4 container.
//! H.264 comes from the system FFmpeg (libx264); the container is written
//! in memory so nothing touches disk until the caller decides to.

pub mod annexb;
pub mod backend;
pub mod chunk;
pub mod error;
pub mod ffmpeg;
pub mod mp4;
pub mod probe;

pub use backend::{EncoderBackend, EncoderSettings, Muxer, RawFrame, VideoEncoder};
pub use chunk::{AvcDecoderConfig, EncodedChunk};
pub use error::{EncodeError, MuxError};
pub use ffmpeg::{FfmpegBackend, FfmpegEncoder};
pub use mp4::Mp4Muxer;
pub use probe::{probe, Mp4Info};
