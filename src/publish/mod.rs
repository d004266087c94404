//! Publishing of detection output.
//!
//! This module contains:
//! - The application-state store and its actions
//! - The peer channel relaying face boxes
//! - The webhook client delivering expression runs
//! - Per-detection notifications for the host
//! - The publisher routing aggregator events to all of the above

pub mod notify;
pub mod peer;
pub mod publisher;
pub mod store;
pub mod webhook;

// Re-export commonly used types
pub use notify::{DetectionObserver, FaceLandmarksDetected};
pub use peer::{
    relay_remote_face_boxes, BroadcastPeerChannel, FaceBoxMessage, PeerChannel, PeerError,
    FACE_BOX_EVENT_TYPE,
};
pub use publisher::{FlushOutcome, StatePublisher};
pub use store::{LandmarksAction, LandmarksState, SharedStore, StateSink};
pub use webhook::{WebhookClient, WebhookConfig, WebhookError, WebhookPayload};
