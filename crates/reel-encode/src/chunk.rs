//! Encoded video samples and the H.264 decoder configuration.

/// H.264 sequence and picture parameter sets, without start codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcDecoderConfig {
    pub sps: Vec<Vec<u8>>,
    pub pps: Vec<Vec<u8>>,
}

impl AvcDecoderConfig {
    /// `profile_idc` from the first SPS.
    pub fn profile(&self) -> Option<u8> {
        self.sps.first().and_then(|s| s.get(1)).copied()
    }

    /// `level_idc` from the first SPS.
    pub fn level(&self) -> Option<u8> {
        self.sps.first().and_then(|s| s.get(3)).copied()
    }

    /// `AVCDecoderConfigurationRecord` as stored in an `avcC` box, with
    /// 4-byte NAL length prefixes. Returns None without an SPS.
    pub fn to_avcc_record(&self) -> Option<Vec<u8>> {
        let sps = self.sps.first()?;
        if sps.len() < 4 {
            return None;
        }
        let mut out = vec![1, sps[1], sps[2], sps[3], 0xFC | 3];
        out.push(0xE0 | (self.sps.len() as u8 & 0x1F));
        for s in &self.sps {
            out.extend_from_slice(&(s.len() as u16).to_be_bytes());
            out.extend_from_slice(s);
        }
        out.push(self.pps.len() as u8);
        for p in &self.pps {
            out.extend_from_slice(&(p.len() as u16).to_be_bytes());
            out.extend_from_slice(p);
        }
        // High profiles carry chroma format and bit depth: 4:2:0, 8 bit.
        if matches!(sps[1], 100 | 110 | 122 | 144) {
            out.extend_from_slice(&[0xFC | 1, 0xF8, 0xF8, 0]);
        }
        Some(out)
    }
}

/// One encoded frame. `data` holds 4-byte length-prefixed NAL units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    pub pts_us: i64,
    pub duration_us: i64,
    pub is_keyframe: bool,
    /// Present on the first keyframe of every encoder session.
    pub decoder_config: Option<AvcDecoderConfig>,
}

impl EncodedChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
