//! Interval-driven frame sampling.
//!
//! The sampler is lazy: nothing is grabbed until [`FrameSampler::next_capture`]
//! is awaited, and a stopped sampler never resolves. That makes it safe to
//! put in a `tokio::select!` next to other branches.

use crate::capture::types::{CaptureError, Frame, VideoTrack};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Pulls one frame per tick from a video track until stopped.
pub struct FrameSampler {
    track: Arc<dyn VideoTrack>,
    period: Duration,
    ticker: Option<Interval>,
    captures: u64,
}

impl FrameSampler {
    /// Create a stopped sampler for `track`.
    pub fn new(track: Arc<dyn VideoTrack>, period: Duration) -> Self {
        Self {
            track,
            period,
            ticker: None,
            captures: 0,
        }
    }

    /// Start (or restart) ticking. The first capture happens one period from now.
    pub fn start(&mut self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        // Inference can be slower than the tick; never burst to catch up.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
    }

    /// Stop ticking. Pending `next_capture` futures never resolve afterwards.
    pub fn stop(&mut self) {
        self.ticker = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Number of successful captures since creation.
    pub fn captures(&self) -> u64 {
        self.captures
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn track_label(&self) -> &str {
        self.track.label()
    }

    /// Wait for the next tick and grab a frame.
    ///
    /// A track that has ended stops the sampler.
    pub async fn next_capture(&mut self) -> Result<Frame, CaptureError> {
        let Some(ticker) = self.ticker.as_mut() else {
            return std::future::pending().await;
        };
        ticker.tick().await;

        match self.track.grab_frame() {
            Ok(frame) => {
                self.captures += 1;
                Ok(frame)
            }
            Err(CaptureError::TrackEnded) => {
                self.stop();
                Err(CaptureError::TrackEnded)
            }
            Err(e) => Err(e),
        }
    }
}
