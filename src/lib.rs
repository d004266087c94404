//! Face Landmarks Agent - face analysis orchestration for video meetings.
//!
//! This library samples frames from the local participant's video track,
//! runs face analysis off the main task and turns the stream of per-frame
//! results into expression runs, face positions and face counts.
//!
//! # Privacy Guarantees
//!
//! - **No frame storage**: Frames are analyzed in memory and dropped
//! - **No face data upload**: Only expression runs and face position leave the device
//! - **Transparency**: All analysis is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Face Landmarks Agent                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Capture   │──▶│   Detect    │──▶│ Aggregator  │       │
//! │  │  (sampler)  │   │  (worker)   │   │   (runs)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │Transparency │                     │  Publisher  │       │
//! │  │    Log      │                     │store/peer/web│      │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use face_landmarks_agent::{Config, LandmarksSession, ReplayDetector, SharedStore, SyntheticTrack};
//!
//! # async fn run() {
//! let store = SharedStore::new();
//! let mut session = LandmarksSession::new(Config::default(), Arc::new(store.clone()), || {
//!     Box::new(ReplayDetector::from_emotions(&["happy", "neutral"]))
//! });
//!
//! session.start(Some(Arc::new(SyntheticTrack::new("camera", 640, 480)))).await;
//! // ... later
//! let summary = session.stop().await;
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod core;
pub mod detect;
pub mod publish;
pub mod session;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use capture::{CaptureError, Frame, FrameSampler, SyntheticTrack, VideoTrack};
pub use config::{Config, ConfigError, DetectionTypes, ParticipantIdentity};
pub use core::{AggregatorConfig, AggregatorEvent, ExpressionEvent, ResultAggregator};
pub use detect::{
    DetectError, DetectionResult, DetectionType, DetectionWorker, Expression, FaceBox,
    FaceDetector, ReplayDetector, UnsupportedDetector,
};
pub use publish::{
    BroadcastPeerChannel, DetectionObserver, FaceLandmarksDetected, FlushOutcome,
    LandmarksAction, LandmarksState, PeerChannel, SharedStore, StatePublisher, StateSink,
    WebhookClient, WebhookConfig, WebhookError,
};
pub use session::{LandmarksSession, RunSummary, SessionError, SessionState};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║            FACE LANDMARKS AGENT - PRIVACY DECLARATION            ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent analyzes your camera image during a meeting.         ║
║                                                                  ║
║  ✓ WHAT WE SHARE:                                                ║
║    • Which expression you showed and for how long                ║
║    • Estimated age and gender, averaged per expression run       ║
║    • Where your face is in the frame (left/right, in percent)    ║
║    • How many faces were seen at once                            ║
║                                                                  ║
║  ✗ WHAT WE NEVER SHARE:                                          ║
║    • Camera frames or snapshots                                  ║
║    • Face landmarks or descriptors                               ║
║    • Anything after detection is stopped                         ║
║                                                                  ║
║  Frames are analyzed locally and dropped right after analysis.   ║
║                                                                  ║
║  You can view analysis statistics anytime with:                  ║
║    face-landmarks status                                         ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER SHARE"));
        assert!(PRIVACY_DECLARATION.contains("Camera frames"));
    }
}
