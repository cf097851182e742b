//! H.264 Annex-B parsing.
//!
//! Splits a byte stream on start codes, groups NAL units into access units
//! and repackages each access unit as length-prefixed samples with the
//! parameter sets pulled out into an [`AvcDecoderConfig`].

use crate::chunk::AvcDecoderConfig;

pub const NAL_SLICE: u8 = 1;
pub const NAL_IDR: u8 = 5;
pub const NAL_SEI: u8 = 6;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;
pub const NAL_AUD: u8 = 9;

pub fn nal_type(nal: &[u8]) -> u8 {
    nal.first().map(|b| b & 0x1F).unwrap_or(0)
}

fn is_vcl(kind: u8) -> bool {
    (1..=5).contains(&kind)
}

/// Split an Annex-B stream into NAL units without start codes. Trailing
/// zero bytes before a start code belong to the start code.
pub fn split_nal_units(stream: &[u8]) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= stream.len() {
        if stream[i] == 0 && stream[i + 1] == 0 && stream[i + 2] == 1 {
            starts.push(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut units = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let mut end = match starts.get(n + 1) {
            Some(next) => next - 3,
            None => stream.len(),
        };
        while end > start && stream[end - 1] == 0 {
            end -= 1;
        }
        if end > start {
            units.push(&stream[start..end]);
        }
    }
    units
}

/// One decoded-order access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    /// 4-byte length-prefixed slice and SEI NAL units.
    pub data: Vec<u8>,
    pub is_keyframe: bool,
    /// Parameter sets that preceded this access unit, if any.
    pub decoder_config: Option<AvcDecoderConfig>,
}

#[derive(Default)]
struct Pending {
    nals: Vec<Vec<u8>>,
    sps: Vec<Vec<u8>>,
    pps: Vec<Vec<u8>>,
    has_vcl: bool,
    is_keyframe: bool,
}

impl Pending {
    fn finish(self) -> AccessUnit {
        let mut data = Vec::new();
        for nal in &self.nals {
            data.extend_from_slice(&(nal.len() as u32).to_be_bytes());
            data.extend_from_slice(nal);
        }
        let decoder_config = if self.sps.is_empty() {
            None
        } else {
            Some(AvcDecoderConfig {
                sps: self.sps,
                pps: self.pps,
            })
        };
        AccessUnit {
            data,
            is_keyframe: self.is_keyframe,
            decoder_config,
        }
    }
}

/// Group an Annex-B stream into access units.
///
/// A new access unit starts at an AUD, SEI or parameter set that follows a
/// slice, or at a slice whose `first_mb_in_slice` is zero.
pub fn parse_access_units(stream: &[u8]) -> Vec<AccessUnit> {
    let mut out = Vec::new();
    let mut cur = Pending::default();

    for nal in split_nal_units(stream) {
        let kind = nal_type(nal);
        let starts_picture = is_vcl(kind) && nal.get(1).map(|b| b & 0x80 != 0).unwrap_or(false);
        let starts_prefix = matches!(kind, NAL_AUD | NAL_SEI | NAL_SPS | NAL_PPS);
        if cur.has_vcl && (starts_picture || starts_prefix) {
            out.push(std::mem::take(&mut cur).finish());
        }

        match kind {
            NAL_SPS => cur.sps.push(nal.to_vec()),
            NAL_PPS => cur.pps.push(nal.to_vec()),
            NAL_AUD => {}
            _ => {
                if is_vcl(kind) {
                    cur.has_vcl = true;
                    cur.is_keyframe |= kind == NAL_IDR;
                }
                cur.nals.push(nal.to_vec());
            }
        }
    }
    if cur.has_vcl {
        out.push(cur.finish());
    }
    out
}
