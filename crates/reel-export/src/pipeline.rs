//! The export loop.
//!
//! ```text
//! Idle -> Configuring -> Running(i) -> Flushing -> Finalized
//!              \              \            \
//!               +--------------+------------+--> Failed(reason)
//! ```

use std::sync::Arc;
use std::time::Instant;

use reel_encode::{EncodedChunk, EncodeError, EncoderBackend, Muxer, RawFrame, VideoEncoder};

use crate::cancel::CancelToken;
use crate::error::{CaptureError, ExportError};
use crate::job::ExportJob;
use crate::reorder::ReorderBuffer;
use crate::source::{FrameSource, SettlePolicy};
use crate::state::ExportState;

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,
    /// Frame indices processed so far, skipped ones included.
    pub frames_done: u64,
    pub total_frames: u64,
    pub frames_skipped: u64,
}

/// A finished container, still in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerBuffer {
    pub bytes: Vec<u8>,
    /// Samples written to the container.
    pub frame_count: u64,
    /// Frame indices whose capture failed.
    pub skipped_frames: Vec<u64>,
}

/// Runs one export. A pipeline is single use.
pub struct ExportPipeline<S: FrameSource> {
    source: S,
    backend: Arc<dyn EncoderBackend>,
    settle: SettlePolicy,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
    state: ExportState,
    used: bool,
}

/// Per-run resources, dropped on every exit path.
struct Session {
    encoder: Box<dyn VideoEncoder>,
    muxer: Box<dyn Muxer>,
    reorder: ReorderBuffer,
}

impl Session {
    fn accept(&mut self, chunks: Vec<EncodedChunk>) -> Result<(), ExportError> {
        for chunk in chunks {
            self.reorder.accept(chunk).map_err(|dup| {
                ExportError::Encode(EncodeError::Bitstream(format!(
                    "encoder returned pts {} twice",
                    dup.pts_us
                )))
            })?;
        }
        for chunk in self.reorder.drain_ready() {
            self.muxer.write_chunk(chunk)?;
        }
        Ok(())
    }
}

impl<S: FrameSource> ExportPipeline<S> {
    pub fn new(source: S, backend: Arc<dyn EncoderBackend>) -> Self {
        Self {
            source,
            backend,
            settle: SettlePolicy::default(),
            cancel: CancelToken::new(),
            progress: None,
            state: ExportState::Idle,
            used: false,
        }
    }

    pub fn with_settle(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// A token that cancels this pipeline.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &ExportState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Render, encode and mux every frame of the job into an MP4 buffer.
    pub async fn export(&mut self, job: ExportJob) -> Result<ContainerBuffer, ExportError> {
        if self.used {
            return Err(ExportError::AlreadyUsed);
        }
        self.used = true;

        let started = Instant::now();
        tracing::info!(
            scene = job.scene.name(),
            width = job.width,
            height = job.height,
            fps = job.fps,
            "Starting export"
        );

        match self.run(&job).await {
            Ok(buffer) => {
                self.state = ExportState::Finalized;
                tracing::info!(
                    frames = buffer.frame_count,
                    skipped = buffer.skipped_frames.len(),
                    bytes = buffer.bytes.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Export finished"
                );
                Ok(buffer)
            }
            Err(err) => {
                tracing::warn!(error = %err, state = %self.state, "Export failed");
                self.state = ExportState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn run(&mut self, job: &ExportJob) -> Result<ContainerBuffer, ExportError> {
        self.state = ExportState::Configuring;
        let settings = job.validate()?;
        self.backend
            .probe(&settings)
            .await
            .map_err(|e| ExportError::Capability(e.to_string()))?;
        let encoder = self
            .backend
            .create_encoder(&settings)
            .await
            .map_err(|e| match e {
                EncodeError::Unavailable(msg) => ExportError::Capability(msg),
                other => ExportError::Encode(other),
            })?;
        let muxer = self.backend.create_muxer(&settings)?;
        self.source
            .prepare(&job.scene)
            .await
            .map_err(|e| ExportError::InvalidJob(format!("frame source rejected scene: {e}")))?;
        let mut session = Session {
            encoder,
            muxer,
            reorder: ReorderBuffer::new(),
        };

        let fps = settings.fps;
        let total = job.total_frames()?;
        let keyint = settings.keyframe_interval as u64;
        let frame_duration = fps.frame_duration_micros();
        let mut skipped = Vec::new();
        tracing::debug!(total, scale = job.scale_factor(), "export configured");

        for index in 0..total {
            if self.cancel.is_cancelled() {
                tracing::info!(frame = index, "Export cancelled");
                return Err(ExportError::Cancelled);
            }
            self.state = ExportState::Running(index);

            let time = fps.sample_time(index);
            self.source.seek(time).await;
            self.settle.settle(&mut self.source).await;

            match self.capture(job).await {
                Ok(frame) => {
                    let pts_us = fps.pts_micros(index);
                    session.reorder.submit(pts_us);
                    let chunks = session
                        .encoder
                        .encode(RawFrame {
                            frame,
                            pts_us,
                            duration_us: frame_duration,
                            force_keyframe: index % keyint == 0,
                        })
                        .await?;
                    session.accept(chunks)?;
                    tracing::debug!(frame = index, time, pts_us, "frame encoded");
                }
                Err(err) => {
                    tracing::warn!(frame = index, time, error = %err, "Skipping frame");
                    skipped.push(index);
                }
            }

            self.report(index + 1, total, skipped.len() as u64);
        }

        self.state = ExportState::Flushing;
        let tail = session.encoder.flush().await?;
        session.accept(tail)?;
        for chunk in session.reorder.drain_all() {
            session.muxer.write_chunk(chunk)?;
        }

        let Session { encoder, muxer, .. } = session;
        drop(encoder);
        let frame_count = muxer.sample_count() as u64;
        let bytes = muxer.finalize()?;
        Ok(ContainerBuffer {
            bytes,
            frame_count,
            skipped_frames: skipped,
        })
    }

    async fn capture(&mut self, job: &ExportJob) -> Result<reel_core::FrameBuffer, CaptureError> {
        let frame = self.source.capture(job.width, job.height).await?;
        if frame.width != job.width || frame.height != job.height {
            return Err(CaptureError::SizeMismatch {
                width: job.width,
                height: job.height,
                got_width: frame.width,
                got_height: frame.height,
            });
        }
        Ok(frame)
    }

    fn report(&self, done: u64, total: u64, skipped: u64) {
        if let Some(cb) = &self.progress {
            cb(ExportProgress {
                progress: done as f64 / total.max(1) as f64,
                frames_done: done,
                total_frames: total,
                frames_skipped: skipped,
            });
        }
    }
}
