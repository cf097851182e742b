use reel_core::{ExportConfig, FrameRate};
use reel_encode::EncoderSettings;
use reel_ir::{validate_scene, Scene};

use crate::error::ExportError;

/// One export request. The job owns its own copy of the scene, and the
/// pipeline loads that copy into the frame source before the first capture,
/// so edits made to the caller's scene while it runs cannot reach it.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub scene: Scene,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target bitrate in bits per second.
    pub bitrate: u64,
    pub keyframe_interval: u32,
}

impl ExportJob {
    /// 1920x1080 at 30 fps, 8 Mbit/s, a keyframe every 30 frames.
    pub fn new(scene: Scene) -> Self {
        Self::from_config(scene, &ExportConfig::default())
    }

    pub fn from_config(scene: Scene, config: &ExportConfig) -> Self {
        Self {
            scene,
            width: config.width,
            height: config.height,
            fps: config.fps,
            bitrate: config.bitrate,
            keyframe_interval: config.keyframe_interval,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = frames;
        self
    }

    /// Ratio of export width to the scene's authoring width.
    pub fn scale_factor(&self) -> f64 {
        self.width as f64 / self.scene.native_width().max(1) as f64
    }

    pub fn frame_rate(&self) -> Result<FrameRate, ExportError> {
        FrameRate::new(self.fps).map_err(|e| ExportError::InvalidJob(e.to_string()))
    }

    /// Number of frames the export produces, `ceil(duration * fps)`.
    pub fn total_frames(&self) -> Result<u64, ExportError> {
        Ok(self.frame_rate()?.frame_count(self.scene.duration_seconds()))
    }

    /// Check the job and derive the stream settings.
    pub fn validate(&self) -> Result<EncoderSettings, ExportError> {
        let settings = EncoderSettings {
            width: self.width,
            height: self.height,
            fps: self.frame_rate()?,
            bitrate: self.bitrate,
            keyframe_interval: self.keyframe_interval,
        };
        settings
            .check()
            .map_err(|e| ExportError::InvalidJob(e.to_string()))?;

        if let Err(errors) = validate_scene(&self.scene) {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ExportError::InvalidJob(message));
        }
        if self.total_frames()? == 0 {
            return Err(ExportError::InvalidJob("scene has no frames".into()));
        }
        Ok(settings)
    }
}
