//! Face detection for the face landmarks agent.
//!
//! This module contains:
//! - Request/result types exchanged with the worker
//! - The face model trait and built-in backends
//! - The landmarks helper interpreting model output
//! - The detection worker running the model off the async runtime

pub mod backends;
pub mod detector;
pub mod helper;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use backends::{ReplayDetector, UnsupportedDetector};
pub use detector::{DetectError, FaceDetector};
pub use helper::LandmarksHelper;
pub use types::{
    DetectionRequest, DetectionResponse, DetectionResult, DetectionType, EmotionScore, Expression,
    FaceBox, RawFace,
};
pub use worker::{DetectionWorker, SubmitOutcome, WorkerError, WorkerEvent};
