use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reel_core::hash::hash_bytes;
use reel_core::{Color, FrameBuffer, FrameRate, ReelConfig};
use reel_encode::{
    probe, AvcDecoderConfig, EncodeError, EncodedChunk, EncoderBackend, EncoderSettings,
    Mp4Muxer, MuxError, Muxer, RawFrame, VideoEncoder,
};
use reel_export::{
    CancelToken, CaptureError, ExportError, ExportJob, ExportPipeline, ExportState, FrameSource,
    SettlePolicy,
};
use reel_ir::{LayerBuilder, Scene, SceneBuilder};
use reel_render::{PlaybackController, SceneRenderer};

// ── Mocks ───────────────────────────────────────────────────────────

#[derive(Default)]
struct MockSource {
    seeks: Vec<f64>,
    captures: u64,
    fail_at: Option<u64>,
    cancel_after: Option<(u64, CancelToken)>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn seek(&mut self, time: f64) {
        self.seeks.push(time);
    }

    async fn capture(&mut self, width: u32, height: u32) -> Result<FrameBuffer, CaptureError> {
        let index = self.seeks.len() as u64 - 1;
        if self.fail_at == Some(index) {
            return Err(CaptureError::Failed("surface lost".into()));
        }
        self.captures += 1;
        if let Some((after, token)) = &self.cancel_after {
            if self.captures >= *after {
                token.cancel();
            }
        }
        Ok(FrameBuffer::solid(width, height, &Color::BLACK))
    }
}

fn config() -> AvcDecoderConfig {
    AvcDecoderConfig {
        sps: vec![vec![0x67, 0x42, 0xC0, 0x1E, 0x95]],
        pps: vec![vec![0x68, 0xCE, 0x3C, 0x80]],
    }
}

/// Emits one chunk per frame. With `batch > 1`, frames are held and
/// returned in reverse order once `batch` of them have accumulated.
struct MockEncoder {
    batch: usize,
    held: Vec<RawFrame>,
    first: bool,
}

impl MockEncoder {
    fn to_chunk(&mut self, raw: RawFrame, first: bool) -> EncodedChunk {
        EncodedChunk {
            data: vec![0, 0, 0, 2, if raw.force_keyframe { 0x65 } else { 0x41 }, raw.pts_us as u8],
            pts_us: raw.pts_us,
            duration_us: raw.duration_us,
            is_keyframe: raw.force_keyframe,
            decoder_config: first.then(config),
        }
    }

    fn release(&mut self) -> Vec<EncodedChunk> {
        let held = std::mem::take(&mut self.held);
        let first_pts = held.iter().map(|r| r.pts_us).min();
        let first = self.first;
        self.first = false;
        let mut out: Vec<EncodedChunk> = held
            .into_iter()
            .map(|r| {
                let is_first = first && Some(r.pts_us) == first_pts;
                self.to_chunk(r, is_first)
            })
            .collect();
        out.reverse();
        out
    }
}

#[async_trait]
impl VideoEncoder for MockEncoder {
    async fn encode(&mut self, frame: RawFrame) -> Result<Vec<EncodedChunk>, EncodeError> {
        self.held.push(frame);
        if self.held.len() >= self.batch.max(1) {
            Ok(self.release())
        } else {
            Ok(Vec::new())
        }
    }

    async fn flush(&mut self) -> Result<Vec<EncodedChunk>, EncodeError> {
        Ok(self.release())
    }
}

#[derive(Default)]
struct MockBackend {
    batch: usize,
    unavailable: bool,
    seen: Mutex<Option<EncoderSettings>>,
}

#[async_trait]
impl EncoderBackend for MockBackend {
    async fn probe(&self, settings: &EncoderSettings) -> Result<(), EncodeError> {
        if self.unavailable {
            return Err(EncodeError::Unavailable("no h264 encoder".into()));
        }
        *self.seen.lock().unwrap() = Some(settings.clone());
        Ok(())
    }

    async fn create_encoder(
        &self,
        _settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, EncodeError> {
        Ok(Box::new(MockEncoder {
            batch: self.batch,
            held: Vec::new(),
            first: true,
        }))
    }

    fn create_muxer(&self, settings: &EncoderSettings) -> Result<Box<dyn Muxer>, MuxError> {
        Ok(Box::new(Mp4Muxer::new(settings)))
    }
}

fn job(duration: f64) -> ExportJob {
    ExportJob::new(Scene::new("pipeline", duration)).with_size(64, 36)
}

fn pipeline(source: MockSource, backend: MockBackend) -> ExportPipeline<MockSource> {
    ExportPipeline::new(source, Arc::new(backend)).with_settle(SettlePolicy::FixedDelay(Duration::ZERO))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_two_seconds_at_thirty_fps() {
    let backend = Arc::new(MockBackend::default());
    let mut p = ExportPipeline::new(MockSource::default(), backend.clone())
        .with_settle(SettlePolicy::FixedDelay(Duration::ZERO));
    let buffer = p.export(job(2.0)).await.unwrap();

    assert_eq!(p.state(), &ExportState::Finalized);
    assert_eq!(buffer.frame_count, 60);
    assert!(buffer.skipped_frames.is_empty());

    let info = probe(&buffer.bytes).unwrap();
    assert_eq!(info.sample_count, 60);
    assert_eq!(&info.sample_times_us[..3], &[0, 33_333, 66_667]);
    assert_eq!(info.keyframes, vec![0, 30]);
    assert_eq!((info.width, info.height), (64, 36));
    assert_eq!(info.avg_bitrate, Some(8_000_000));

    let seeks = &p.source().seeks;
    assert_eq!(seeks.len(), 60);
    for (i, t) in seeks.iter().enumerate() {
        assert!((t - i as f64 / 30.0).abs() < 1e-12);
    }

    let seen = backend.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.keyframe_interval, 30);
}

#[tokio::test]
async fn test_capture_failure_skips_one_frame() {
    let source = MockSource {
        fail_at: Some(10),
        ..Default::default()
    };
    let mut p = pipeline(source, MockBackend::default());
    let buffer = p.export(job(2.0)).await.unwrap();

    assert_eq!(buffer.frame_count, 59);
    assert_eq!(buffer.skipped_frames, vec![10]);
    let info = probe(&buffer.bytes).unwrap();
    assert_eq!(info.sample_times_us[9], 300_000);
    assert_eq!(info.sample_times_us[10], 366_667);
    assert_eq!(*info.sample_times_us.last().unwrap(), 1_966_667);

    let fps = FrameRate::new(30).unwrap();
    let expected: Vec<i64> = (0..60u64)
        .filter(|i| *i != 10)
        .map(|i| fps.pts_micros(i))
        .collect();
    assert_eq!(info.sample_times_us, expected);
    assert!(info.sample_times_us.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_cancel_stops_before_next_frame() {
    let token = CancelToken::new();
    let source = MockSource {
        cancel_after: Some((10, token.clone())),
        ..Default::default()
    };
    let mut p = pipeline(source, MockBackend::default()).with_cancel_token(token);
    let result = p.export(job(2.0)).await;

    assert!(matches!(result, Err(ExportError::Cancelled)));
    assert!(matches!(p.state(), ExportState::Failed(_)));
    assert_eq!(p.source().captures, 10);
    assert_eq!(p.source().seeks.len(), 10);
}

#[tokio::test]
async fn test_out_of_order_encoder_output_is_reordered() {
    let mut in_order = pipeline(MockSource::default(), MockBackend::default());
    let expected = in_order.export(job(2.0)).await.unwrap();

    let backend = MockBackend {
        batch: 4,
        ..Default::default()
    };
    let mut shuffled = pipeline(MockSource::default(), backend);
    let buffer = shuffled.export(job(2.0)).await.unwrap();

    assert_eq!(buffer.frame_count, 60);
    assert_eq!(buffer.bytes, expected.bytes);
}

#[tokio::test]
async fn test_pipeline_is_single_use() {
    let mut p = pipeline(MockSource::default(), MockBackend::default());
    p.export(job(0.5)).await.unwrap();
    assert!(matches!(p.export(job(0.5)).await, Err(ExportError::AlreadyUsed)));
    assert_eq!(p.state(), &ExportState::Finalized);
}

#[tokio::test]
async fn test_missing_encoder_fails_before_capture() {
    let backend = MockBackend {
        unavailable: true,
        ..Default::default()
    };
    let mut p = pipeline(MockSource::default(), backend);
    let result = p.export(job(1.0)).await;

    assert!(matches!(result, Err(ExportError::Capability(_))));
    assert!(matches!(p.state(), ExportState::Failed(_)));
    assert!(p.source().seeks.is_empty());
}

#[tokio::test]
async fn test_invalid_job_is_rejected() {
    let mut p = pipeline(MockSource::default(), MockBackend::default());
    let result = p.export(job(1.0).with_size(63, 36)).await;
    assert!(matches!(result, Err(ExportError::InvalidJob(_))));
}

#[tokio::test]
async fn test_progress_is_monotonic_and_complete() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let source = MockSource {
        fail_at: Some(3),
        ..Default::default()
    };
    let mut p = pipeline(source, MockBackend::default())
        .on_progress(Box::new(move |p| sink.lock().unwrap().push(p)));
    p.export(job(1.0)).await.unwrap();

    let reports = seen.lock().unwrap();
    assert_eq!(reports.len(), 30);
    assert!(reports.windows(2).all(|w| w[0].progress < w[1].progress));
    assert!((reports.last().unwrap().progress - 1.0).abs() < 1e-12);
    assert_eq!(reports.last().unwrap().frames_skipped, 1);
}

#[tokio::test]
async fn test_exports_rendered_scene() {
    let mut title = LayerBuilder::text("title", "Hello");
    title.position(10.0, 10.0).font("Inter", 48.0).animation("fadeIn");
    let mut builder = SceneBuilder::new("render", 0.5);
    builder.resolution(640, 360).add_layer(title.build());
    let scene = builder.build().unwrap();
    let job = ExportJob::new(scene.clone()).with_size(64, 36);

    let controller = PlaybackController::new(scene, SceneRenderer::new(&ReelConfig::default()));
    let mut p = ExportPipeline::new(controller, Arc::new(MockBackend::default())).with_settle(
        SettlePolicy::ReadySignal {
            timeout: Duration::from_secs(5),
        },
    );
    let buffer = p.export(job).await.unwrap();

    assert_eq!(buffer.frame_count, 15);
    let info = probe(&buffer.bytes).unwrap();
    assert_eq!(info.sample_times_us[14], 466_667);
    assert!((p.source().time() - 14.0 / 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_export_uses_job_scene_not_controller_scene() {
    let controller = PlaybackController::new(
        Scene::new("stale", 1.0),
        SceneRenderer::new(&ReelConfig::default()),
    );
    let mut p = ExportPipeline::new(controller, Arc::new(MockBackend::default()))
        .with_settle(SettlePolicy::FixedDelay(Duration::ZERO));
    let buffer = p.export(job(2.0)).await.unwrap();

    assert_eq!(buffer.frame_count, 60);
    assert_eq!(p.source().scene().name(), "pipeline");
    assert!((p.source().time() - 59.0 / 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_repeated_export_is_byte_identical() {
    let mut first = pipeline(MockSource::default(), MockBackend::default());
    let a = first.export(job(1.0)).await.unwrap();
    let mut second = pipeline(MockSource::default(), MockBackend::default());
    let b = second.export(job(1.0)).await.unwrap();

    assert_eq!(hash_bytes(&a.bytes), hash_bytes(&b.bytes));
    assert_ne!(hash_bytes(&a.bytes), hash_bytes(&[]));
}
