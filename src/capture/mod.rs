//! Frame capture for the face landmarks agent.
//!
//! A [`VideoTrack`] hands out still frames on demand; the [`FrameSampler`]
//! pulls one per detection tick.

pub mod sampler;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use sampler::FrameSampler;
pub use synthetic::SyntheticTrack;
pub use types::{CaptureError, Frame, VideoTrack};
