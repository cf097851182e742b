//! H.264 encoding through the system FFmpeg.
//!
//! Each keyframe segment is encoded by its own `ffmpeg` process: raw RGBA
//! frames stream into stdin and an Annex-B elementary stream comes back on
//! stdout. B-frames are disabled, so access units come back in input order
//! and map one-to-one onto the timestamps of the frames that went in. A
//! segment is closed when the next forced keyframe arrives, which makes
//! keyframe placement exact.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use reel_core::{EncoderConfig, FrameBuffer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use crate::annexb::parse_access_units;
use crate::backend::{EncoderBackend, EncoderSettings, Muxer, RawFrame, VideoEncoder};
use crate::chunk::EncodedChunk;
use crate::error::{EncodeError, MuxError};
use crate::mp4::Mp4Muxer;

/// Backend that encodes with `ffmpeg`/libx264 and muxes in memory.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_path: PathBuf,
    preset: String,
}

impl FfmpegBackend {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, preset: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            preset: preset.into(),
        }
    }

    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.preset.clone())
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Check if FFmpeg can be started at all.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::from_config(&EncoderConfig::default())
    }
}

#[async_trait]
impl EncoderBackend for FfmpegBackend {
    async fn probe(&self, settings: &EncoderSettings) -> Result<(), EncodeError> {
        settings.check()?;
        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                EncodeError::Unavailable(format!(
                    "cannot run '{}': {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(EncodeError::Unavailable(format!(
                "'{} -encoders' exited with {}",
                self.ffmpeg_path.display(),
                output.status
            )));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        if !listing.contains("libx264") {
            return Err(EncodeError::Unavailable(
                "ffmpeg was built without libx264".into(),
            ));
        }
        tracing::debug!(path = %self.ffmpeg_path.display(), "ffmpeg with libx264 found");
        Ok(())
    }

    async fn create_encoder(
        &self,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, EncodeError> {
        settings.check()?;
        Ok(Box::new(FfmpegEncoder::new(self.clone(), settings.clone())))
    }

    fn create_muxer(&self, settings: &EncoderSettings) -> Result<Box<dyn Muxer>, MuxError> {
        Ok(Box::new(Mp4Muxer::new(settings)))
    }
}

/// Timing of a frame handed to the running segment.
#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    pts_us: i64,
    duration_us: i64,
}

/// One running `ffmpeg` process.
struct Segment {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: JoinHandle<std::io::Result<Vec<u8>>>,
    stderr: JoinHandle<std::io::Result<Vec<u8>>>,
    frames: Vec<PendingFrame>,
}

/// H.264 encoder session backed by one `ffmpeg` process per segment.
pub struct FfmpegEncoder {
    backend: FfmpegBackend,
    settings: EncoderSettings,
    segment: Option<Segment>,
    scratch: Vec<u8>,
    segments_done: usize,
}

impl FfmpegEncoder {
    pub fn new(backend: FfmpegBackend, settings: EncoderSettings) -> Self {
        Self {
            backend,
            settings,
            segment: None,
            scratch: Vec::new(),
            segments_done: 0,
        }
    }

    fn command(&self) -> Command {
        let s = &self.settings;
        let mut cmd = Command::new(&self.backend.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error"]);
        cmd.args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", s.width, s.height),
            "-framerate",
            &s.fps.as_u32().to_string(),
            "-i",
            "pipe:0",
        ]);
        let bitrate = s.bitrate.to_string();
        let keyint = s.keyframe_interval.to_string();
        cmd.args([
            "-an",
            "-c:v",
            "libx264",
            "-preset",
            &self.backend.preset,
            "-pix_fmt",
            "yuv420p",
            "-b:v",
            &bitrate,
            "-maxrate",
            &bitrate,
            "-bufsize",
            &(s.bitrate * 2).to_string(),
            "-bf",
            "0",
            "-g",
            &keyint,
            "-keyint_min",
            &keyint,
            "-sc_threshold",
            "0",
            "-f",
            "h264",
            "pipe:1",
        ]);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn start_segment(&mut self) -> Result<(), EncodeError> {
        let mut child = self.command().spawn().map_err(|e| {
            EncodeError::Unavailable(format!(
                "failed to spawn '{}': {}",
                self.backend.ffmpeg_path.display(),
                e
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncodeError::Unavailable("failed to open ffmpeg stdin".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| EncodeError::Unavailable("failed to open ffmpeg stdout".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EncodeError::Unavailable("failed to open ffmpeg stderr".into()))?;

        // Both pipes are drained concurrently so ffmpeg never blocks on a
        // full output buffer while we write frames.
        let stdout = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await?;
            Ok(buf)
        });
        let stderr = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok(buf)
        });

        tracing::debug!(segment = self.segments_done, "started ffmpeg segment");
        self.segment = Some(Segment {
            child,
            stdin: Some(stdin),
            stdout,
            stderr,
            frames: Vec::new(),
        });
        Ok(())
    }

    async fn finish_segment(&mut self) -> Result<Vec<EncodedChunk>, EncodeError> {
        let Some(mut segment) = self.segment.take() else {
            return Ok(Vec::new());
        };
        drop(segment.stdin.take());

        let status = segment.child.wait().await?;
        let stdout = join_pipe(segment.stdout).await?;
        let stderr = join_pipe(segment.stderr).await?;
        if !status.success() {
            return Err(EncodeError::Process {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let units = parse_access_units(&stdout);
        if units.len() != segment.frames.len() {
            return Err(EncodeError::Bitstream(format!(
                "segment {} produced {} access units for {} frames",
                self.segments_done,
                units.len(),
                segment.frames.len()
            )));
        }
        self.segments_done += 1;

        Ok(units
            .into_iter()
            .zip(segment.frames)
            .map(|(unit, timing)| EncodedChunk {
                data: unit.data,
                pts_us: timing.pts_us,
                duration_us: timing.duration_us,
                is_keyframe: unit.is_keyframe,
                decoder_config: unit.decoder_config,
            })
            .collect())
    }
}

async fn join_pipe(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>, EncodeError> {
    handle
        .await
        .map_err(|e| EncodeError::Process {
            status: "pipe reader panicked".into(),
            stderr: e.to_string(),
        })?
        .map_err(EncodeError::from)
}

/// Composite straight-alpha RGBA over opaque black into `out`.
fn flatten_alpha(frame: &FrameBuffer, out: &mut Vec<u8>) {
    out.clear();
    out.extend_from_slice(&frame.data);
    for px in out.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u32 * a + 127) / 255) as u8;
        }
        px[3] = 255;
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode(&mut self, raw: RawFrame) -> Result<Vec<EncodedChunk>, EncodeError> {
        let s = &self.settings;
        if raw.frame.width != s.width || raw.frame.height != s.height {
            return Err(EncodeError::FrameSize {
                width: s.width,
                height: s.height,
                got_width: raw.frame.width,
                got_height: raw.frame.height,
            });
        }

        let mut ready = Vec::new();
        if raw.force_keyframe && self.segment.is_some() {
            ready = self.finish_segment().await?;
        }
        if self.segment.is_none() {
            self.start_segment()?;
        }

        flatten_alpha(&raw.frame, &mut self.scratch);
        let written = match self.segment.as_mut().and_then(|seg| seg.stdin.as_mut()) {
            Some(stdin) => stdin.write_all(&self.scratch).await,
            None => return Err(EncodeError::Unavailable("ffmpeg stdin closed".into())),
        };
        if let Err(e) = written {
            let stderr = match self.segment.take() {
                Some(mut seg) => {
                    let _ = seg.child.start_kill();
                    join_pipe(seg.stderr).await.unwrap_or_default()
                }
                None => Vec::new(),
            };
            return Err(EncodeError::Process {
                status: format!("write failed: {}", e),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        if let Some(segment) = self.segment.as_mut() {
            segment.frames.push(PendingFrame {
                pts_us: raw.pts_us,
                duration_us: raw.duration_us,
            });
        }
        Ok(ready)
    }

    async fn flush(&mut self) -> Result<Vec<EncodedChunk>, EncodeError> {
        let chunks = self.finish_segment().await?;
        tracing::debug!(segments = self.segments_done, "ffmpeg encoder flushed");
        Ok(chunks)
    }
}
