//! Publishes aggregator output to the store, the peers and the webhook.

use crate::config::ParticipantIdentity;
use crate::core::events::AggregatorEvent;
use crate::detect::types::DetectionResult;
use crate::publish::notify::{DetectionObserver, FaceLandmarksDetected};
use crate::publish::peer::{FaceBoxMessage, PeerChannel};
use crate::publish::store::{LandmarksAction, StateSink};
use crate::publish::webhook::{WebhookClient, WebhookPayload};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a webhook flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to send, or no webhook configured
    Skipped,
    /// This many runs were delivered and removed from the buffer
    Delivered(usize),
    /// Delivery failed; the buffer is kept for the next flush
    Failed,
}

/// Dispatches aggregator events to their destinations.
pub struct StatePublisher {
    sink: Arc<dyn StateSink>,
    peer: Option<Arc<dyn PeerChannel>>,
    webhook: Option<WebhookClient>,
    observer: Option<Arc<dyn DetectionObserver>>,
    identity: ParticipantIdentity,
    session_id: String,
    stats: SharedTransparencyLog,
}

impl StatePublisher {
    pub fn new(
        sink: Arc<dyn StateSink>,
        identity: ParticipantIdentity,
        session_id: impl Into<String>,
        stats: SharedTransparencyLog,
    ) -> Self {
        Self {
            sink,
            peer: None,
            webhook: None,
            observer: None,
            identity,
            session_id: session_id.into(),
            stats,
        }
    }

    /// Relay accepted face boxes to other participants.
    pub fn with_peer(mut self, peer: Arc<dyn PeerChannel>) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Buffer expression runs and deliver them with [`Self::flush_webhook`].
    pub fn with_webhook(mut self, webhook: WebhookClient) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Report every detection result to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn DetectionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook.is_some()
    }

    pub fn dispatch(&self, action: LandmarksAction) {
        self.sink.dispatch(action);
    }

    /// Tell the host about one detection result, aggregated or not.
    pub fn notify_detected(&self, result: &DetectionResult, at: DateTime<Utc>) {
        if let Some(ref observer) = self.observer {
            observer.face_landmarks_detected(&FaceLandmarksDetected::from_result(result, at));
        }
    }

    /// Publish one aggregator event.
    pub fn publish(&self, event: AggregatorEvent) {
        match event {
            AggregatorEvent::Expression(event) => {
                debug!(
                    "Expression run: {} x{} ({:.1}s)",
                    event.expression, event.duration_ticks, event.duration_secs
                );
                self.stats.record_expression_event();
                if self.webhook.is_some() {
                    self.sink
                        .dispatch(LandmarksAction::AddToExpressionsBuffer(event.clone()));
                }
                self.sink.dispatch(LandmarksAction::AddFaceLandmarks(event));
            }
            AggregatorEvent::FaceBox(face_box) => {
                self.stats.record_face_box_published();
                self.sink.dispatch(LandmarksAction::UpdateFaceCoordinates {
                    participant_id: self.identity.participant_id.clone(),
                    face_box,
                });

                if let Some(ref peer) = self.peer {
                    if peer.participant_count() > 1 {
                        let message =
                            FaceBoxMessage::new(self.identity.participant_id.clone(), face_box);
                        if let Err(e) = peer.send_face_box(&message) {
                            debug!("Face box not relayed: {e}");
                        }
                    }
                }
            }
            AggregatorEvent::MaxFaces(count) => {
                self.sink.dispatch(LandmarksAction::SetMaxFaces(count));
            }
        }
    }

    /// Deliver the buffered expression runs to the webhook.
    pub async fn flush_webhook(&self) -> FlushOutcome {
        let Some(ref webhook) = self.webhook else {
            return FlushOutcome::Skipped;
        };

        let buffer = self.sink.state().expressions_buffer;
        if buffer.is_empty() {
            return FlushOutcome::Skipped;
        }

        let count = buffer.len();
        let payload = WebhookPayload::new(&self.identity, &self.session_id, buffer);
        match webhook.send_expressions(&payload).await {
            Ok(()) => {
                self.sink
                    .dispatch(LandmarksAction::ClearExpressionsBuffer { count });
                self.stats.record_webhook_flush();
                info!("Delivered {count} expression runs to webhook");
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                self.stats.record_webhook_failure();
                warn!("Webhook delivery failed, keeping {count} runs: {e}");
                FlushOutcome::Failed
            }
        }
    }
}
