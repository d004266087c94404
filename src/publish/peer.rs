//! Face box relay between conference participants.
//!
//! The signaling layer is supplied by the host; the session only needs to
//! know how many participants there are and how to broadcast a face box.

use crate::detect::types::FaceBox;
use crate::publish::store::{LandmarksAction, StateSink};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Endpoint message type carrying a face box.
pub const FACE_BOX_EVENT_TYPE: &str = "face-box";

/// Endpoint message relaying a participant's face box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceBoxMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub participant_id: String,
    pub face_box: FaceBox,
}

impl FaceBoxMessage {
    pub fn new(participant_id: impl Into<String>, face_box: FaceBox) -> Self {
        Self {
            kind: FACE_BOX_EVENT_TYPE.to_string(),
            participant_id: participant_id.into(),
            face_box,
        }
    }

    /// The store update for a received message; `None` for other message types.
    pub fn into_action(self) -> Option<LandmarksAction> {
        if self.kind != FACE_BOX_EVENT_TYPE {
            return None;
        }
        Some(LandmarksAction::ReceivedFaceBox {
            participant_id: self.participant_id,
            face_box: self.face_box,
        })
    }
}

/// Peer signaling collaborator.
pub trait PeerChannel: Send + Sync {
    /// Number of participants in the conference, including the local one.
    fn participant_count(&self) -> usize;

    /// Broadcast a face box to the other participants. Fire-and-forget.
    fn send_face_box(&self, message: &FaceBoxMessage) -> Result<(), PeerError>;
}

/// Errors that can occur while relaying to peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// Nobody is listening
    NoReceivers,
    /// The signaling channel is gone
    Closed(String),
}

impl std::fmt::Display for PeerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerError::NoReceivers => write!(f, "No peers are listening"),
            PeerError::Closed(e) => write!(f, "Peer channel closed: {e}"),
        }
    }
}

impl std::error::Error for PeerError {}

/// In-process peer channel backed by a tokio broadcast channel.
pub struct BroadcastPeerChannel {
    sender: broadcast::Sender<FaceBoxMessage>,
    participants: AtomicUsize,
}

impl BroadcastPeerChannel {
    pub fn new(capacity: usize, participants: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            participants: AtomicUsize::new(participants),
        }
    }

    pub fn set_participant_count(&self, count: usize) {
        self.participants.store(count, Ordering::SeqCst);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FaceBoxMessage> {
        self.sender.subscribe()
    }
}

impl PeerChannel for BroadcastPeerChannel {
    fn participant_count(&self) -> usize {
        self.participants.load(Ordering::SeqCst)
    }

    fn send_face_box(&self, message: &FaceBoxMessage) -> Result<(), PeerError> {
        self.sender
            .send(message.clone())
            .map(|_| ())
            .map_err(|_| PeerError::NoReceivers)
    }
}

/// Apply face boxes received from other participants to the store until
/// the channel closes. Messages from `local_id` are ignored.
pub async fn relay_remote_face_boxes(
    mut receiver: broadcast::Receiver<FaceBoxMessage>,
    local_id: String,
    sink: Arc<dyn StateSink>,
) {
    loop {
        match receiver.recv().await {
            Ok(message) if message.participant_id == local_id => {}
            Ok(message) => {
                debug!("Face box received from {}", message.participant_id);
                if let Some(action) = message.into_action() {
                    sink.dispatch(action);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Face box relay lagged, skipped {skipped} messages");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
