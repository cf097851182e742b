//! Where frames come from.

use std::time::Duration;

use async_trait::async_trait;
use reel_core::FrameBuffer;
use reel_ir::Scene;
use reel_render::PlaybackController;

use crate::error::CaptureError;

/// Something that can be positioned on the timeline and captured.
#[async_trait]
pub trait FrameSource: Send {
    /// Load `scene` as the content to capture. Called once before the first
    /// seek. Sources that draw something fixed can ignore it.
    async fn prepare(&mut self, _scene: &Scene) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Move to `time` seconds.
    async fn seek(&mut self, time: f64);

    /// Whether [`FrameSource::wait_ready`] reports real readiness.
    fn has_ready_signal(&self) -> bool {
        false
    }

    /// Wait until the seeked frame is ready, at most `timeout`. Returns false
    /// on timeout. Sources without a signal sleep for the whole timeout.
    async fn wait_ready(&mut self, timeout: Duration) -> bool {
        tokio::time::sleep(timeout).await;
        false
    }

    /// Capture the current frame at `width x height`.
    async fn capture(&mut self, width: u32, height: u32) -> Result<FrameBuffer, CaptureError>;
}

/// How long to wait between seek and capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlePolicy {
    FixedDelay(Duration),
    /// Use the source's ready signal, bounded by `timeout`. Falls back to a
    /// fixed delay of `timeout` when the source has none.
    ReadySignal { timeout: Duration },
}

impl Default for SettlePolicy {
    fn default() -> Self {
        SettlePolicy::FixedDelay(Duration::from_millis(150))
    }
}

impl SettlePolicy {
    pub(crate) async fn settle<S: FrameSource + ?Sized>(&self, source: &mut S) {
        match *self {
            SettlePolicy::FixedDelay(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            SettlePolicy::ReadySignal { timeout } => {
                if source.has_ready_signal() {
                    if !source.wait_ready(timeout).await {
                        tracing::debug!(?timeout, "settle timed out");
                    }
                } else {
                    tokio::time::sleep(timeout).await;
                }
            }
        }
    }
}

/// The built-in renderer draws synchronously, so a frame is ready as soon as
/// the seek returns.
#[async_trait]
impl FrameSource for PlaybackController {
    async fn prepare(&mut self, scene: &Scene) -> Result<(), CaptureError> {
        self.replace_scene(scene.clone());
        PlaybackController::seek(self, 0.0);
        Ok(())
    }

    async fn seek(&mut self, time: f64) {
        PlaybackController::seek(self, time);
    }

    fn has_ready_signal(&self) -> bool {
        true
    }

    async fn wait_ready(&mut self, _timeout: Duration) -> bool {
        true
    }

    async fn capture(&mut self, width: u32, height: u32) -> Result<FrameBuffer, CaptureError> {
        let output = self.render_current(width, height);
        for diagnostic in &output.diagnostics {
            tracing::warn!(time = self.time(), %diagnostic, "render diagnostic");
        }
        Ok(output.frame)
    }
}
