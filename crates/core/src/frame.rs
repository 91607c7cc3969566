//! Captured frame data model

use crate::error::{Error, Result};
use std::time::Duration;

/// Target frame rate of the capture pipeline
pub const TARGET_FPS: u32 = 30;

/// Fixed time base attached to every frame, as (numerator, denominator)
pub const TIME_BASE: (u32, u32) = (1, TARGET_FPS);

/// One immutable captured frame: tightly packed RGB24 pixels plus the
/// presentation timestamp assigned by the owning video source.
///
/// Frames are produced by the capturer, handed to the transport once, and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    pts: u64,
}

impl Frame {
    /// Create a frame from a packed RGB24 buffer.
    ///
    /// Fails when dimensions are zero or the buffer length does not match
    /// `width * height * 3`.
    pub fn new(width: u32, height: u32, data: Vec<u8>, pts: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::FrameCapture(format!(
                "invalid frame dimensions {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(Error::FrameCapture(format!(
                "pixel buffer length {} does not match {}x{} RGB24 ({} bytes)",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            pts,
        })
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Presentation timestamp in `TIME_BASE` units
    pub fn pts(&self) -> u64 {
        self.pts
    }

    /// Packed RGB24 pixel data, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Wall-clock duration of one frame at the fixed time base
    pub fn duration() -> Duration {
        Duration::from_micros(1_000_000 / TARGET_FPS as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(4, 2, vec![0u8; 4 * 2 * 3], 7).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.pts(), 7);
        assert_eq!(frame.data().len(), 24);
    }

    #[test]
    fn test_frame_rejects_zero_dimensions() {
        assert!(Frame::new(0, 2, vec![], 0).is_err());
        assert!(Frame::new(2, 0, vec![], 0).is_err());
    }

    #[test]
    fn test_frame_rejects_buffer_mismatch() {
        let err = Frame::new(4, 2, vec![0u8; 10], 0).unwrap_err();
        assert!(matches!(err, Error::FrameCapture(_)));
    }

    #[test]
    fn test_frame_duration_matches_time_base() {
        assert_eq!(Frame::duration(), Duration::from_micros(33_333));
        assert_eq!(TIME_BASE, (1, 30));
    }
}
