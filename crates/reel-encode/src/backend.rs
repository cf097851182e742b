use async_trait::async_trait;
use reel_core::{FrameBuffer, FrameRate};

use crate::chunk::EncodedChunk;
use crate::error::{EncodeError, MuxError};

/// Output stream parameters shared by encoder and muxer.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: FrameRate,
    /// Target bitrate in bits per second.
    pub bitrate: u64,
    /// Frames between forced keyframes.
    pub keyframe_interval: u32,
}

impl EncoderSettings {
    /// yuv420p needs non-zero, even dimensions.
    pub fn check(&self) -> Result<(), EncodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::InvalidSettings(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(EncodeError::InvalidSettings(format!(
                "dimensions must be even for yuv420p, got {}x{}",
                self.width, self.height
            )));
        }
        if self.bitrate == 0 {
            return Err(EncodeError::InvalidSettings("bitrate must be positive".into()));
        }
        if self.keyframe_interval == 0 {
            return Err(EncodeError::InvalidSettings(
                "keyframe interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A frame to encode with its presentation timing.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub frame: FrameBuffer,
    pub pts_us: i64,
    pub duration_us: i64,
    pub force_keyframe: bool,
}

/// A video encoder session. Chunks may come back in any order and in
/// batches; callers order them by `pts_us`.
#[async_trait]
pub trait VideoEncoder: Send {
    async fn encode(&mut self, frame: RawFrame) -> Result<Vec<EncodedChunk>, EncodeError>;

    /// Drain everything still buffered. The session is finished afterwards.
    async fn flush(&mut self) -> Result<Vec<EncodedChunk>, EncodeError>;
}

/// Collects chunks in presentation order and produces a container.
pub trait Muxer: Send {
    fn write_chunk(&mut self, chunk: EncodedChunk) -> Result<(), MuxError>;

    fn sample_count(&self) -> usize;

    /// Consume the muxer and return the finished container bytes.
    fn finalize(self: Box<Self>) -> Result<Vec<u8>, MuxError>;
}

/// Creates encoder and muxer sessions for an export.
#[async_trait]
pub trait EncoderBackend: Send + Sync {
    /// Check that the backend can produce the requested stream.
    async fn probe(&self, settings: &EncoderSettings) -> Result<(), EncodeError>;

    async fn create_encoder(
        &self,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, EncodeError>;

    fn create_muxer(&self, settings: &EncoderSettings) -> Result<Box<dyn Muxer>, MuxError>;
}
