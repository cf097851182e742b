use reel_core::FrameRate;
use reel_encode::{
    probe, AvcDecoderConfig, EncodedChunk, EncoderSettings, Mp4Muxer, MuxError, Muxer,
};

fn settings(fps: u32) -> EncoderSettings {
    EncoderSettings {
        width: 1920,
        height: 1080,
        fps: FrameRate::new(fps).unwrap(),
        bitrate: 8_000_000,
        keyframe_interval: 30,
    }
}

fn config() -> AvcDecoderConfig {
    AvcDecoderConfig {
        sps: vec![vec![0x67, 0x4D, 0x00, 0x2A, 0x95, 0xA8]],
        pps: vec![vec![0x68, 0xEE, 0x3C, 0x80]],
    }
}

/// Synthetic chunks for the given frame indices at `fps`.
fn chunks(fps: u32, indices: impl IntoIterator<Item = u64>, keyint: u64) -> Vec<EncodedChunk> {
    let rate = FrameRate::new(fps).unwrap();
    let mut first = true;
    indices
        .into_iter()
        .map(|i| {
            let key = first || i % keyint == 0;
            let chunk = EncodedChunk {
                data: vec![0, 0, 0, 3, if key { 0x65 } else { 0x41 }, 0x88, i as u8],
                pts_us: rate.pts_micros(i),
                duration_us: rate.frame_duration_micros(),
                is_keyframe: key,
                decoder_config: first.then(config),
            };
            first = false;
            chunk
        })
        .collect()
}

fn mux(settings: &EncoderSettings, chunks: Vec<EncodedChunk>) -> Result<Vec<u8>, MuxError> {
    let mut muxer: Box<dyn Muxer> = Box::new(Mp4Muxer::new(settings));
    for c in chunks {
        muxer.write_chunk(c)?;
    }
    muxer.finalize()
}

#[test]
fn test_two_seconds_at_thirty_fps() {
    let bytes = mux(&settings(30), chunks(30, 0..60, 30)).unwrap();
    let info = probe(&bytes).unwrap();

    assert_eq!(info.major_brand, "isom");
    assert!(info.moov_before_mdat);
    assert_eq!(info.creation_time, 0);
    assert_eq!(info.codec, "avc1");
    assert_eq!((info.width, info.height), (1920, 1080));
    assert_eq!(info.avg_bitrate, Some(8_000_000));
    assert_eq!(info.sample_count, 60);
    assert_eq!(&info.sample_times_us[..4], &[0, 33_333, 66_667, 100_000]);
    assert_eq!(info.sample_times_us[59], 1_966_667);
    assert_eq!(info.keyframes, vec![0, 30]);
    let fps = info.frame_rate().unwrap();
    assert!((fps - 30.0).abs() < 0.01, "fps = {}", fps);
}

#[test]
fn test_skipped_frame_keeps_timeline() {
    let indices = (0..60).filter(|i| *i != 10);
    let bytes = mux(&settings(30), chunks(30, indices, 30)).unwrap();
    let info = probe(&bytes).unwrap();
    assert_eq!(info.sample_count, 59);
    assert_eq!(info.sample_times_us[9], 300_000);
    assert_eq!(info.sample_times_us[10], 366_667);
    assert_eq!(info.sample_times_us[58], 1_966_667);
}

#[test]
fn test_missing_first_frame_uses_edit_list() {
    let bytes = mux(&settings(30), chunks(30, 1..30, 30)).unwrap();
    let info = probe(&bytes).unwrap();
    assert_eq!(info.sample_times_us[0], 33_333);
    assert_eq!(info.keyframes[0], 0);
}

#[test]
fn test_output_is_byte_identical() {
    let a = mux(&settings(24), chunks(24, 0..48, 24)).unwrap();
    let b = mux(&settings(24), chunks(24, 0..48, 24)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_changed_parameter_sets_are_rejected() {
    let mut input = chunks(30, 0..31, 30);
    let mut other = config();
    other.pps[0].push(0x01);
    input[30].decoder_config = Some(other);
    assert!(matches!(
        mux(&settings(30), input),
        Err(MuxError::DecoderConfigChanged)
    ));
}
