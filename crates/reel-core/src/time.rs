use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReelError, ReelResult};

/// Microseconds per second, the unit of every presentation timestamp.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Tolerance applied before rounding a frame count up, so that
/// `0.1 * 30.0 = 3.0000000000000004` still yields 3 frames.
const FRAME_COUNT_EPSILON: f64 = 1e-9;

/// An integral frame rate in frames per second.
///
/// All timestamp math derives from the frame index and this rate using
/// integer arithmetic, never from measured elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate(u32);

impl FrameRate {
    /// Create a frame rate. Zero is rejected.
    pub fn new(fps: u32) -> ReelResult<Self> {
        if fps == 0 {
            return Err(ReelError::validation("frame rate must be positive"));
        }
        Ok(Self(fps))
    }

    /// Frames per second.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Frames per second as a float.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    /// Number of frames needed to cover `duration_seconds`: `ceil(duration * fps)`.
    pub fn frame_count(&self, duration_seconds: f64) -> u64 {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return 0;
        }
        let exact = duration_seconds * self.as_f64();
        (exact - FRAME_COUNT_EPSILON).ceil().max(0.0) as u64
    }

    /// Sample time in seconds for a frame index: `index / fps`.
    pub fn sample_time(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.as_f64()
    }

    /// Presentation timestamp of a frame in microseconds,
    /// `round(index * 1_000_000 / fps)`.
    pub fn pts_micros(&self, frame_index: u64) -> i64 {
        let fps = self.0 as i64;
        (frame_index as i64 * MICROS_PER_SECOND + fps / 2) / fps
    }

    /// Nominal duration of one frame in microseconds, `round(1_000_000 / fps)`.
    pub fn frame_duration_micros(&self) -> i64 {
        let fps = self.0 as i64;
        (MICROS_PER_SECOND + fps / 2) / fps
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(30)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}fps", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_rejects_zero() {
        assert!(FrameRate::new(0).is_err());
        assert_eq!(FrameRate::new(30).unwrap().as_u32(), 30);
    }

    #[test]
    fn test_frame_count_is_ceil() {
        let fps = FrameRate::new(30).unwrap();
        assert_eq!(fps.frame_count(2.0), 60);
        assert_eq!(fps.frame_count(2.01), 61);
        assert_eq!(fps.frame_count(0.1), 3);
        assert_eq!(fps.frame_count(0.0), 0);
        assert_eq!(fps.frame_count(-1.0), 0);
    }

    #[test]
    fn test_pts_micros_at_30fps() {
        let fps = FrameRate::new(30).unwrap();
        assert_eq!(fps.pts_micros(0), 0);
        assert_eq!(fps.pts_micros(1), 33_333);
        assert_eq!(fps.pts_micros(2), 66_667);
        assert_eq!(fps.pts_micros(30), 1_000_000);
        assert_eq!(fps.pts_micros(59), 1_966_667);
        assert_eq!(fps.frame_duration_micros(), 33_333);
    }

    #[test]
    fn test_pts_micros_is_strictly_increasing() {
        let fps = FrameRate::new(24).unwrap();
        let mut last = -1;
        for i in 0..500 {
            let pts = fps.pts_micros(i);
            assert!(pts > last);
            last = pts;
        }
    }

    #[test]
    fn test_sample_time() {
        let fps = FrameRate::new(25).unwrap();
        assert!((fps.sample_time(50) - 2.0).abs() < 1e-12);
    }
}
