//! Frame and video track types.
//!
//! Frames are ephemeral: each one is consumed by a single detection call
//! and never stored.

use chrono::{DateTime, Utc};

/// A still RGBA capture from a video track.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, row-major
    pub pixels: Vec<u8>,
    /// When the frame was grabbed
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
            captured_at: Utc::now(),
        }
    }

    /// An all-black frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0; (width * height * 4) as usize])
    }

    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// A live source of video frames.
pub trait VideoTrack: Send + Sync {
    /// Human-readable label of the track (device name, track id).
    fn label(&self) -> &str;

    /// Grab the current frame.
    fn grab_frame(&self) -> Result<Frame, CaptureError>;
}

/// Errors that can occur while grabbing frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The track has ended and will not produce more frames
    TrackEnded,
    /// A single grab failed
    Grab(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::TrackEnded => write!(f, "Video track has ended"),
            CaptureError::Grab(e) => write!(f, "Frame grab failed: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_size() {
        let frame = Frame::blank(4, 3);
        assert_eq!(frame.pixel_count(), 12);
        assert_eq!(frame.pixels.len(), 48);
        assert!(frame.pixels.iter().all(|&p| p == 0));
    }
}
