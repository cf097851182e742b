//! Content hashing for determinism checks.
//!
//! Rendering the same scene at the same time must produce byte-identical
//! frames, and exporting it twice must produce byte-identical containers.
//! Both are verified by comparing SHA-256 digests.

use sha2::{Digest, Sha256};

use crate::frame::FrameBuffer;

/// A SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Lowercase hex encoding (64 characters).
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn finish(hasher: Sha256) -> ContentHash {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    ContentHash::from_bytes(bytes)
}

/// Hash a frame, including its dimensions.
pub fn hash_frame(frame: &FrameBuffer) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(frame.width.to_le_bytes());
    hasher.update(frame.height.to_le_bytes());
    hasher.update(&frame.data);
    finish(hasher)
}

/// Hash an arbitrary byte slice, such as a finished container.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    finish(hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn test_hash_frame_deterministic() {
        let a = FrameBuffer::solid(10, 10, &Color::RED);
        let b = FrameBuffer::solid(10, 10, &Color::RED);
        assert_eq!(hash_frame(&a), hash_frame(&b));
        assert_ne!(
            hash_frame(&a),
            hash_frame(&FrameBuffer::solid(10, 10, &Color::BLUE))
        );
    }

    #[test]
    fn test_hash_frame_includes_dimensions() {
        let wide = FrameBuffer::solid(4, 1, &Color::RED);
        let tall = FrameBuffer::solid(1, 4, &Color::RED);
        assert_eq!(wide.data, tall.data);
        assert_ne!(hash_frame(&wide), hash_frame(&tall));
    }

    #[test]
    fn test_hash_bytes_known_vector() {
        assert_eq!(
            hash_bytes(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash_bytes(b"abc").short().len(), 12);
    }

    #[test]
    fn test_display_matches_hex() {
        let h = hash_bytes(b"reel");
        assert_eq!(format!("{}", h), h.to_hex());
    }
}
