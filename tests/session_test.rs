//! End-to-end tests for face landmarks sessions against an in-process webhook.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use face_landmarks_agent::{
    config::{Config, DetectionTypes},
    detect::{EmotionScore, RawFace, ReplayDetector},
    publish::{
        relay_remote_face_boxes, BroadcastPeerChannel, FaceBoxMessage, FaceLandmarksDetected,
        FlushOutcome, PeerChannel, SharedStore, StateSink, WebhookConfig,
    },
    transparency::create_shared_log,
    Expression, FaceBox, LandmarksSession, SessionState, SyntheticTrack, VideoTrack,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Received {
    status: Option<StatusCode>,
    requests: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>,
}

impl Received {
    fn payloads(&self) -> Vec<(Option<String>, serde_json::Value)> {
        self.requests.lock().unwrap().clone()
    }
}

async fn receive_emotions(
    State(received): State<Received>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    received.requests.lock().unwrap().push((auth, body));
    received.status.unwrap_or(StatusCode::OK)
}

/// Start a webhook proxy answering every `/emotions` post with `status`.
async fn spawn_webhook(status: Option<StatusCode>) -> (SocketAddr, Received) {
    let received = Received {
        status,
        ..Received::default()
    };
    let app = Router::new()
        .route("/emotions", post(receive_emotions))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, received)
}

fn webhook_config(addr: SocketAddr) -> Config {
    Config {
        capture_interval: Duration::from_millis(100),
        webhook_send_interval: Duration::from_millis(300),
        webhook: Some(WebhookConfig::new(
            format!("http://{addr}"),
            Some("meeting-jwt".to_string()),
        )),
        ..Config::default()
    }
}

fn track() -> Option<Arc<dyn VideoTrack>> {
    Some(Arc::new(SyntheticTrack::new("test-cam", 8, 8)))
}

fn face_at(x: f64, emotion: &str) -> Vec<RawFace> {
    vec![RawFace {
        box_raw: [x, 0.2, 0.2, 0.4],
        age: Some(30.0),
        gender: Some("female".to_string()),
        emotions: vec![EmotionScore {
            emotion: emotion.to_string(),
            score: 0.9,
        }],
    }]
}

#[tokio::test]
async fn test_expressions_delivered_to_webhook() {
    let (addr, received) = spawn_webhook(None).await;
    let store = SharedStore::new();
    let config = webhook_config(addr);
    let identity = config.identity.clone();

    let mut session = LandmarksSession::new(config, Arc::new(store.clone()), || {
        Box::new(ReplayDetector::from_emotions(&[
            "happy", "happy", "surprise", "neutral", "neutral",
        ]))
    });

    assert_eq!(session.start(track()).await, SessionState::Active);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    let summary = session.stop().await.unwrap();

    assert_eq!(summary.final_flush.map(|o| o != FlushOutcome::Failed), Some(true));
    assert!(store.state().expressions_buffer.is_empty());

    let payloads = received.payloads();
    assert!(!payloads.is_empty());

    let mut delivered = 0;
    for (auth, body) in &payloads {
        assert_eq!(auth.as_deref(), Some("Bearer meeting-jwt"));
        assert_eq!(body["meetingFqn"], identity.meeting_fqn.as_str());
        assert_eq!(body["participantId"], identity.participant_id.as_str());
        assert_eq!(body["sessionId"], summary.session_id.as_str());
        delivered += body["emotions"].as_array().unwrap().len() as u64;
    }
    assert_eq!(delivered, summary.expression_events);

    let first = &payloads[0].1["emotions"][0];
    assert_eq!(first["emotion"], "happy");
    assert!(first["duration"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_failed_webhook_keeps_buffer() {
    let (addr, received) = spawn_webhook(Some(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let store = SharedStore::new();
    let stats = create_shared_log();

    let mut session = LandmarksSession::new(webhook_config(addr), Arc::new(store.clone()), || {
        Box::new(ReplayDetector::from_emotions(&["sad", "angry"]))
    })
    .with_stats(stats.clone());

    session.start(track()).await;
    tokio::time::sleep(Duration::from_millis(700)).await;
    let summary = session.stop().await.unwrap();

    assert_eq!(summary.final_flush, Some(FlushOutcome::Failed));
    assert!(!received.payloads().is_empty());
    assert!(summary.expression_events > 0);
    assert_eq!(
        store.state().expressions_buffer.len() as u64,
        summary.expression_events
    );
    assert!(stats.stats().webhook_failures >= 1);
    assert_eq!(stats.stats().webhook_flushes, 0);
}

#[tokio::test]
async fn test_slow_model_drops_overlapping_requests() {
    let store = SharedStore::new();
    let config = Config {
        capture_interval: Duration::from_millis(100),
        ..Config::default()
    };

    let mut session = LandmarksSession::new(config, Arc::new(store.clone()), || {
        Box::new(
            ReplayDetector::from_emotions(&["neutral"]).with_latency(Duration::from_millis(350)),
        )
    });

    session.start(track()).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let summary = session.stop().await.unwrap();

    assert!(summary.requests_dropped > 0);
    assert!(summary.detections_completed >= 1);
    assert!(summary.detections_completed < summary.frames_sampled);
}

#[tokio::test]
async fn test_face_boxes_relayed_to_peers() {
    let store = SharedStore::new();
    let config = Config {
        capture_interval: Duration::from_millis(100),
        detection_types: DetectionTypes::all(),
        ..Config::default()
    };
    let local_id = config.identity.participant_id.clone();

    let peer = Arc::new(BroadcastPeerChannel::new(16, 2));
    let mut remote = peer.subscribe();

    let mut session = LandmarksSession::new(config, Arc::new(store.clone()), || {
        Box::new(ReplayDetector::new(vec![
            face_at(0.1, "happy"),
            face_at(0.5, "happy"),
        ]))
    })
    .with_peer(peer.clone());

    session.start(track()).await;
    tokio::time::sleep(Duration::from_millis(450)).await;
    session.stop().await;

    let message = remote.try_recv().unwrap();
    assert_eq!(message.participant_id, local_id);
    assert_eq!(message.face_box, FaceBox::new(10.0, 30.0));
    assert!(store.state().face_boxes.contains_key(&local_id));
}

#[tokio::test]
async fn test_remote_face_boxes_applied_to_store() {
    let store = SharedStore::new();
    let sink: Arc<dyn StateSink> = Arc::new(store.clone());
    let peer = BroadcastPeerChannel::new(16, 3);

    let relay = tokio::spawn(relay_remote_face_boxes(
        peer.subscribe(),
        "local".to_string(),
        sink,
    ));

    peer.send_face_box(&FaceBoxMessage::new("local", FaceBox::new(0.0, 10.0)))
        .unwrap();
    peer.send_face_box(&FaceBoxMessage::new("remote", FaceBox::new(40.0, 60.0)))
        .unwrap();
    drop(peer);
    relay.await.unwrap();

    let state = store.state();
    assert!(!state.face_boxes.contains_key("local"));
    assert_eq!(state.face_boxes["remote"].width, 20.0);
}

#[tokio::test]
async fn test_no_updates_after_stop() {
    let store = SharedStore::new();
    let config = Config {
        capture_interval: Duration::from_millis(100),
        ..Config::default()
    };

    let mut session = LandmarksSession::new(config, Arc::new(store.clone()), || {
        Box::new(
            ReplayDetector::from_emotions(&["happy", "sad"])
                .with_latency(Duration::from_millis(150)),
        )
    });

    session.start(track()).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    session.stop().await;

    let stopped = store.state();
    assert!(!stopped.recognition_active);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let later = store.state();
    assert_eq!(later.face_landmarks.len(), stopped.face_landmarks.len());
    assert_eq!(later.max_faces, stopped.max_faces);
}

#[tokio::test]
async fn test_host_notified_of_every_detection() {
    let store = SharedStore::new();
    let config = Config {
        capture_interval: Duration::from_millis(100),
        face_centering_threshold: 50.0,
        detection_types: DetectionTypes::all(),
        ..Config::default()
    };
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<FaceLandmarksDetected>();

    let mut session = LandmarksSession::new(config, Arc::new(store.clone()), || {
        Box::new(ReplayDetector::new(vec![
            face_at(0.1, "happy"),
            face_at(0.2, "happy"),
        ]))
    })
    .with_observer(Arc::new(tx));

    session.start(track()).await;
    tokio::time::sleep(Duration::from_millis(550)).await;
    let summary = session.stop().await.unwrap();

    let mut notified = Vec::new();
    while let Ok(detection) = rx.try_recv() {
        notified.push(detection);
    }

    // Per-tick detections reach the host even though they are aggregated
    // into a single run and the debounced box is only published once.
    assert!(summary.detections_completed >= 2);
    assert_eq!(notified.len() as u64, summary.detections_completed);
    assert!(notified
        .iter()
        .all(|d| d.face_expression == Some(Expression::Happy)));
    assert_eq!(notified[0].face_box, Some(FaceBox::new(10.0, 30.0)));
    assert_eq!(notified[1].face_box, Some(FaceBox::new(20.0, 40.0)));
    assert_eq!(store.state().face_landmarks.len(), 1);
}
