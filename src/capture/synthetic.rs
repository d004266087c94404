//! Synthetic video track.
//!
//! Serves blank frames of a fixed size. Used by the CLI replay mode and by
//! tests, where the detector decides what is "seen" regardless of pixels.

use crate::capture::types::{CaptureError, Frame, VideoTrack};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A track that never fails until it is ended.
pub struct SyntheticTrack {
    label: String,
    width: u32,
    height: u32,
    ended: AtomicBool,
    frames_served: AtomicU64,
}

impl SyntheticTrack {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            ended: AtomicBool::new(false),
            frames_served: AtomicU64::new(0),
        }
    }

    /// End the track; subsequent grabs fail with [`CaptureError::TrackEnded`].
    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    pub fn frames_served(&self) -> u64 {
        self.frames_served.load(Ordering::Relaxed)
    }
}

impl VideoTrack for SyntheticTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn grab_frame(&self) -> Result<Frame, CaptureError> {
        if self.ended.load(Ordering::SeqCst) {
            return Err(CaptureError::TrackEnded);
        }
        self.frames_served.fetch_add(1, Ordering::Relaxed);
        Ok(Frame::blank(self.width, self.height))
    }
}
