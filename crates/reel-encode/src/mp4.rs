//! In-memory MP4 (ISO BMFF) muxer for a single H.264 video track.
//!
//! Layout is `ftyp`, `moov`, `mdat`, so the file is playable progressively.
//! All samples live in one chunk. Timestamps are stored in microseconds and
//! every creation/modification time is zero, so identical input produces
//! identical bytes.

use crate::backend::{EncoderSettings, Muxer};
use crate::chunk::{AvcDecoderConfig, EncodedChunk};
use crate::error::MuxError;

/// Movie and media timescale: one tick per microsecond.
pub const TIMESCALE: u32 = 1_000_000;

const TRACK_ID: u32 = 1;

const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// ISO-639-2 "und", packed.
const LANGUAGE_UND: u16 = 0x55C4;

#[derive(Debug, Clone, Copy)]
struct Sample {
    size: u32,
    pts_us: i64,
    duration_us: i64,
    is_keyframe: bool,
}

/// Accumulates chunks in presentation order and writes an MP4 file.
pub struct Mp4Muxer {
    width: u32,
    height: u32,
    bitrate: u64,
    config: Option<AvcDecoderConfig>,
    samples: Vec<Sample>,
    mdat: Vec<u8>,
}

impl Mp4Muxer {
    pub fn new(settings: &EncoderSettings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            bitrate: settings.bitrate,
            config: None,
            samples: Vec::new(),
            mdat: Vec::new(),
        }
    }

    /// Durations from the gap to the next sample, so skipped frames extend
    /// the frame before them. The last sample keeps its own duration.
    fn sample_durations(&self) -> Vec<u32> {
        let n = self.samples.len();
        (0..n)
            .map(|i| {
                let d = if i + 1 < n {
                    self.samples[i + 1].pts_us - self.samples[i].pts_us
                } else {
                    self.samples[i].duration_us
                };
                d.clamp(1, u32::MAX as i64) as u32
            })
            .collect()
    }

    fn build(&self) -> Result<Vec<u8>, MuxError> {
        let first = self.samples.first().ok_or(MuxError::Empty)?;
        let avcc = self
            .config
            .as_ref()
            .and_then(|c| c.to_avcc_record())
            .ok_or(MuxError::MissingDecoderConfig)?;
        let durations = self.sample_durations();

        let media_duration: u64 = durations.iter().map(|d| *d as u64).sum();
        let offset = first.pts_us.max(0) as u64;
        let movie_duration = media_duration + offset;
        if movie_duration > u32::MAX as u64 {
            return Err(MuxError::TooLarge);
        }
        let mdat_size = self.mdat.len() as u64 + 8;
        if mdat_size > u32::MAX as u64 {
            return Err(MuxError::TooLarge);
        }

        let ftyp = ftyp();
        let track = TrackLayout {
            width: self.width,
            height: self.height,
            bitrate: self.bitrate,
            avcc: &avcc,
            samples: &self.samples,
            durations: &durations,
            media_duration: media_duration as u32,
            movie_duration: movie_duration as u32,
            offset_us: offset as u32,
        };
        // moov's size does not depend on the chunk offset it records.
        let probe_len = track.moov(0).len();
        let data_offset = (ftyp.len() + probe_len + 8) as u64;
        if data_offset + self.mdat.len() as u64 > u32::MAX as u64 {
            return Err(MuxError::TooLarge);
        }
        let moov = track.moov(data_offset as u32);

        let mut out = Vec::with_capacity(ftyp.len() + moov.len() + mdat_size as usize);
        out.extend_from_slice(&ftyp);
        out.extend_from_slice(&moov);
        out.extend_from_slice(&(mdat_size as u32).to_be_bytes());
        out.extend_from_slice(b"mdat");
        out.extend_from_slice(&self.mdat);
        Ok(out)
    }
}

impl Muxer for Mp4Muxer {
    fn write_chunk(&mut self, chunk: EncodedChunk) -> Result<(), MuxError> {
        if let Some(prev) = self.samples.last() {
            if chunk.pts_us <= prev.pts_us {
                return Err(MuxError::NonMonotonicPts {
                    previous: prev.pts_us,
                    got: chunk.pts_us,
                });
            }
        }
        match (&self.config, chunk.decoder_config) {
            (None, Some(cfg)) => self.config = Some(cfg),
            (None, None) => return Err(MuxError::MissingDecoderConfig),
            (Some(current), Some(cfg)) if *current != cfg => {
                return Err(MuxError::DecoderConfigChanged)
            }
            _ => {}
        }
        let size = u32::try_from(chunk.data.len()).map_err(|_| MuxError::TooLarge)?;
        self.mdat.extend_from_slice(&chunk.data);
        self.samples.push(Sample {
            size,
            pts_us: chunk.pts_us,
            duration_us: chunk.duration_us,
            is_keyframe: chunk.is_keyframe,
        });
        Ok(())
    }

    fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, MuxError> {
        let bytes = self.build()?;
        tracing::debug!(
            samples = self.samples.len(),
            bytes = bytes.len(),
            "mp4 finalized"
        );
        Ok(bytes)
    }
}

struct TrackLayout<'a> {
    width: u32,
    height: u32,
    bitrate: u64,
    avcc: &'a [u8],
    samples: &'a [Sample],
    durations: &'a [u32],
    media_duration: u32,
    movie_duration: u32,
    offset_us: u32,
}

impl TrackLayout<'_> {
    fn moov(&self, data_offset: u32) -> Vec<u8> {
        let mut body = self.mvhd();
        body.extend(self.trak(data_offset));
        mp4_box(b"moov", &body)
    }

    fn mvhd(&self) -> Vec<u8> {
        let mut b = Vec::new();
        put_u32(&mut b, 0); // creation_time
        put_u32(&mut b, 0); // modification_time
        put_u32(&mut b, TIMESCALE);
        put_u32(&mut b, self.movie_duration);
        put_u32(&mut b, 0x0001_0000); // rate 1.0
        put_u16(&mut b, 0x0100); // volume 1.0
        b.extend_from_slice(&[0; 10]);
        for v in UNITY_MATRIX {
            put_u32(&mut b, v);
        }
        b.extend_from_slice(&[0; 24]);
        put_u32(&mut b, TRACK_ID + 1);
        full_box(b"mvhd", 0, 0, &b)
    }

    fn trak(&self, data_offset: u32) -> Vec<u8> {
        let mut body = self.tkhd();
        if self.offset_us > 0 {
            body.extend(self.edts());
        }
        body.extend(self.mdia(data_offset));
        mp4_box(b"trak", &body)
    }

    fn tkhd(&self) -> Vec<u8> {
        let mut b = Vec::new();
        put_u32(&mut b, 0);
        put_u32(&mut b, 0);
        put_u32(&mut b, TRACK_ID);
        put_u32(&mut b, 0);
        put_u32(&mut b, self.movie_duration);
        b.extend_from_slice(&[0; 8]);
        put_u16(&mut b, 0); // layer
        put_u16(&mut b, 0); // alternate_group
        put_u16(&mut b, 0); // volume
        put_u16(&mut b, 0);
        for v in UNITY_MATRIX {
            put_u32(&mut b, v);
        }
        put_u32(&mut b, self.width << 16);
        put_u32(&mut b, self.height << 16);
        // enabled | in_movie
        full_box(b"tkhd", 0, 3, &b)
    }

    /// An empty edit that delays the first sample to its pts.
    fn edts(&self) -> Vec<u8> {
        let mut b = Vec::new();
        put_u32(&mut b, 2);
        put_u32(&mut b, self.offset_us);
        put_u32(&mut b, u32::MAX); // media_time -1: empty edit
        put_u32(&mut b, 0x0001_0000);
        put_u32(&mut b, self.media_duration);
        put_u32(&mut b, 0);
        put_u32(&mut b, 0x0001_0000);
        mp4_box(b"edts", &full_box(b"elst", 0, 0, &b))
    }

    fn mdia(&self, data_offset: u32) -> Vec<u8> {
        let mut mdhd = Vec::new();
        put_u32(&mut mdhd, 0);
        put_u32(&mut mdhd, 0);
        put_u32(&mut mdhd, TIMESCALE);
        put_u32(&mut mdhd, self.media_duration);
        put_u16(&mut mdhd, LANGUAGE_UND);
        put_u16(&mut mdhd, 0);

        let mut hdlr = Vec::new();
        put_u32(&mut hdlr, 0);
        hdlr.extend_from_slice(b"vide");
        hdlr.extend_from_slice(&[0; 12]);
        hdlr.extend_from_slice(b"VideoHandler\0");

        let mut body = full_box(b"mdhd", 0, 0, &mdhd);
        body.extend(full_box(b"hdlr", 0, 0, &hdlr));
        body.extend(self.minf(data_offset));
        mp4_box(b"mdia", &body)
    }

    fn minf(&self, data_offset: u32) -> Vec<u8> {
        let vmhd = full_box(b"vmhd", 0, 1, &[0; 8]);

        let mut dref = Vec::new();
        put_u32(&mut dref, 1);
        dref.extend(full_box(b"url ", 0, 1, &[]));
        let dinf = mp4_box(b"dinf", &full_box(b"dref", 0, 0, &dref));

        let mut body = vmhd;
        body.extend(dinf);
        body.extend(self.stbl(data_offset));
        mp4_box(b"minf", &body)
    }

    fn stbl(&self, data_offset: u32) -> Vec<u8> {
        let mut body = self.stsd();
        body.extend(self.stts());
        body.extend(self.stss());

        let mut stsc = Vec::new();
        put_u32(&mut stsc, 1);
        put_u32(&mut stsc, 1);
        put_u32(&mut stsc, self.samples.len() as u32);
        put_u32(&mut stsc, 1);
        body.extend(full_box(b"stsc", 0, 0, &stsc));

        let mut stsz = Vec::new();
        put_u32(&mut stsz, 0);
        put_u32(&mut stsz, self.samples.len() as u32);
        for s in self.samples {
            put_u32(&mut stsz, s.size);
        }
        body.extend(full_box(b"stsz", 0, 0, &stsz));

        let mut stco = Vec::new();
        put_u32(&mut stco, 1);
        put_u32(&mut stco, data_offset);
        body.extend(full_box(b"stco", 0, 0, &stco));

        mp4_box(b"stbl", &body)
    }

    fn stsd(&self) -> Vec<u8> {
        let mut e = Vec::new();
        e.extend_from_slice(&[0; 6]);
        put_u16(&mut e, 1); // data_reference_index
        e.extend_from_slice(&[0; 16]);
        put_u16(&mut e, self.width as u16);
        put_u16(&mut e, self.height as u16);
        put_u32(&mut e, 0x0048_0000); // 72 dpi
        put_u32(&mut e, 0x0048_0000);
        put_u32(&mut e, 0);
        put_u16(&mut e, 1); // frame_count
        e.extend_from_slice(&[0; 32]); // compressorname
        put_u16(&mut e, 0x0018); // depth
        put_u16(&mut e, 0xFFFF); // pre_defined -1
        e.extend(mp4_box(b"avcC", self.avcc));

        let bitrate = self.bitrate.min(u32::MAX as u64) as u32;
        let mut btrt = Vec::new();
        put_u32(&mut btrt, 0);
        put_u32(&mut btrt, bitrate);
        put_u32(&mut btrt, bitrate);
        e.extend(mp4_box(b"btrt", &btrt));

        let mut stsd = Vec::new();
        put_u32(&mut stsd, 1);
        stsd.extend(mp4_box(b"avc1", &e));
        full_box(b"stsd", 0, 0, &stsd)
    }

    fn stts(&self) -> Vec<u8> {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for &d in self.durations {
            match runs.last_mut() {
                Some((count, delta)) if *delta == d => *count += 1,
                _ => runs.push((1, d)),
            }
        }
        let mut b = Vec::new();
        put_u32(&mut b, runs.len() as u32);
        for (count, delta) in runs {
            put_u32(&mut b, count);
            put_u32(&mut b, delta);
        }
        full_box(b"stts", 0, 0, &b)
    }

    fn stss(&self) -> Vec<u8> {
        let keys: Vec<u32> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_keyframe)
            .map(|(i, _)| i as u32 + 1)
            .collect();
        let mut b = Vec::new();
        put_u32(&mut b, keys.len() as u32);
        for k in keys {
            put_u32(&mut b, k);
        }
        full_box(b"stss", 0, 0, &b)
    }
}

fn ftyp() -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(b"isom");
    put_u32(&mut b, 0x200);
    for brand in [b"isom", b"iso2", b"avc1", b"mp41"] {
        b.extend_from_slice(brand);
    }
    mp4_box(b"ftyp", &b)
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn mp4_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    put_u32(&mut out, (body.len() + 8) as u32);
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn full_box(kind: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut b = Vec::with_capacity(body.len() + 4);
    put_u32(&mut b, ((version as u32) << 24) | (flags & 0x00FF_FFFF));
    b.extend_from_slice(body);
    mp4_box(kind, &b)
}
