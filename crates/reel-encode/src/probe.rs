//! Minimal MP4 reader used to summarize exported files.

use crate::error::MuxError;

/// Summary of the first video track of an MP4 file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mp4Info {
    pub major_brand: String,
    /// `moov` precedes `mdat`.
    pub moov_before_mdat: bool,
    pub creation_time: u64,
    pub width: u32,
    pub height: u32,
    /// Sample entry type, e.g. `avc1`.
    pub codec: String,
    pub timescale: u32,
    /// Presentation time of each sample in microseconds, edit list applied.
    pub sample_times_us: Vec<i64>,
    pub sample_count: u32,
    /// Zero-based indices of sync samples.
    pub keyframes: Vec<u32>,
    pub duration_us: i64,
    pub avg_bitrate: Option<u32>,
}

impl Mp4Info {
    pub fn frame_rate(&self) -> Option<f64> {
        if self.sample_count < 2 || self.duration_us <= 0 {
            return None;
        }
        let span = self.sample_times_us.last()? - self.sample_times_us.first()?;
        if span <= 0 {
            return None;
        }
        Some((self.sample_count - 1) as f64 * 1_000_000.0 / span as f64)
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MuxError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| MuxError::Malformed(format!("truncated at byte {}", self.pos)))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> Result<(), MuxError> {
        self.take(n).map(|_| ())
    }

    fn u16(&mut self) -> Result<u16, MuxError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, MuxError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, MuxError> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Iterate the boxes directly inside `data`, yielding `(type, body)`.
fn boxes(data: &[u8]) -> Result<Vec<([u8; 4], &[u8])>, MuxError> {
    let mut r = Reader::new(data);
    let mut out = Vec::new();
    while r.remaining() >= 8 {
        let start = r.pos;
        let size = r.u32()? as u64;
        let kind: [u8; 4] = r
            .take(4)?
            .try_into()
            .map_err(|_| MuxError::Malformed("box type".into()))?;
        let (header, size) = match size {
            0 => (8, (data.len() - start) as u64),
            1 => (16, r.u64()?),
            s => (8, s),
        };
        if size < header {
            return Err(MuxError::Malformed(format!(
                "box '{}' has size {}",
                String::from_utf8_lossy(&kind),
                size
            )));
        }
        let body_len = (size - header) as usize;
        let body = r.take(body_len)?;
        out.push((kind, body));
    }
    Ok(out)
}

fn child<'a>(parent: &'a [u8], kind: &[u8; 4]) -> Result<Option<&'a [u8]>, MuxError> {
    Ok(boxes(parent)?.into_iter().find(|(k, _)| k == kind).map(|(_, b)| b))
}

fn required<'a>(parent: &'a [u8], kind: &[u8; 4]) -> Result<&'a [u8], MuxError> {
    child(parent, kind)?.ok_or_else(|| {
        MuxError::Malformed(format!("missing '{}' box", String::from_utf8_lossy(kind)))
    })
}

/// Read the header fields and sample tables of an MP4 file.
pub fn probe(bytes: &[u8]) -> Result<Mp4Info, MuxError> {
    let top = boxes(bytes)?;
    let mut info = Mp4Info::default();

    let order: Vec<[u8; 4]> = top.iter().map(|(k, _)| *k).collect();
    let moov_at = order.iter().position(|k| k == b"moov");
    let mdat_at = order.iter().position(|k| k == b"mdat");
    info.moov_before_mdat = matches!((moov_at, mdat_at), (Some(a), Some(b)) if a < b);

    if let Some((_, ftyp)) = top.iter().find(|(k, _)| k == b"ftyp") {
        info.major_brand = String::from_utf8_lossy(ftyp.get(..4).unwrap_or_default()).into_owned();
    }
    let moov = top
        .iter()
        .find(|(k, _)| k == b"moov")
        .map(|(_, b)| *b)
        .ok_or_else(|| MuxError::Malformed("missing 'moov' box".into()))?;

    let mut mvhd = Reader::new(required(moov, b"mvhd")?);
    let version = mvhd.take(4)?[0];
    let movie_timescale;
    if version == 1 {
        info.creation_time = mvhd.u64()?;
        mvhd.skip(8)?;
        movie_timescale = mvhd.u32()?;
    } else {
        info.creation_time = mvhd.u32()? as u64;
        mvhd.skip(4)?;
        movie_timescale = mvhd.u32()?;
    }

    let trak = required(moov, b"trak")?;
    let mut tkhd = Reader::new(required(trak, b"tkhd")?);
    let tkhd_version = tkhd.take(4)?[0];
    tkhd.skip(if tkhd_version == 1 { 32 } else { 20 })?;
    tkhd.skip(8 + 8 + 36)?;
    info.width = tkhd.u32()? >> 16;
    info.height = tkhd.u32()? >> 16;

    let mut edit_offset_us = 0i64;
    if let Some(edts) = child(trak, b"edts")? {
        let mut elst = Reader::new(required(edts, b"elst")?);
        let v = elst.take(4)?[0];
        let count = elst.u32()?;
        for _ in 0..count {
            let (duration, media_time) = if v == 1 {
                (elst.u64()?, elst.u64()? as i64)
            } else {
                (elst.u32()? as u64, elst.u32()? as i32 as i64)
            };
            elst.skip(4)?;
            if media_time == -1 && movie_timescale > 0 {
                edit_offset_us += (duration as i64 * 1_000_000) / movie_timescale as i64;
            }
        }
    }

    let mdia = required(trak, b"mdia")?;
    let mut mdhd = Reader::new(required(mdia, b"mdhd")?);
    let mdhd_version = mdhd.take(4)?[0];
    mdhd.skip(if mdhd_version == 1 { 16 } else { 8 })?;
    info.timescale = mdhd.u32()?;
    if info.timescale == 0 {
        return Err(MuxError::Malformed("media timescale is zero".into()));
    }
    let ts = info.timescale as i64;

    let stbl = required(required(mdia, b"minf")?, b"stbl")?;

    let mut stsd = Reader::new(required(stbl, b"stsd")?);
    stsd.skip(8)?;
    let entries = boxes(&stsd.data[stsd.pos..])?;
    if let Some((kind, entry)) = entries.first() {
        info.codec = String::from_utf8_lossy(kind).into_owned();
        if entry.len() > 78 {
            if let Some(btrt) = child(&entry[78..], b"btrt")? {
                let mut r = Reader::new(btrt);
                r.skip(8)?;
                info.avg_bitrate = Some(r.u32()?);
            }
        }
    }

    let mut stsz = Reader::new(required(stbl, b"stsz")?);
    stsz.skip(8)?;
    info.sample_count = stsz.u32()?;

    let mut stts = Reader::new(required(stbl, b"stts")?);
    stts.skip(4)?;
    let runs = stts.u32()?;
    let mut t = 0i64;
    for _ in 0..runs {
        let count = stts.u32()?;
        let delta = stts.u32()? as i64;
        for _ in 0..count {
            info.sample_times_us.push(edit_offset_us + t * 1_000_000 / ts);
            t += delta;
        }
    }
    info.duration_us = edit_offset_us + t * 1_000_000 / ts;

    info.keyframes = match child(stbl, b"stss")? {
        Some(stss) => {
            let mut r = Reader::new(stss);
            r.skip(4)?;
            let n = r.u32()?;
            (0..n)
                .map(|_| r.u32().map(|k| k.saturating_sub(1)))
                .collect::<Result<_, _>>()?
        }
        None => (0..info.sample_count).collect(),
    };

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        assert!(probe(b"not an mp4 file at all").is_err());
        assert!(probe(&[]).is_err());
    }

    #[test]
    fn test_box_size_zero_runs_to_end() {
        let mut data = vec![0, 0, 0, 0];
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[1, 2, 3]);
        let parsed = boxes(&data).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].1, &[1, 2, 3]);
    }

    #[test]
    fn test_truncated_box_is_malformed() {
        let mut data = vec![0, 0, 0, 20];
        data.extend_from_slice(b"free");
        assert!(matches!(boxes(&data), Err(MuxError::Malformed(_))));
    }
}
