//! Face landmarks detection session.
//!
//! A [`LandmarksSession`] owns everything one start-to-stop detection cycle
//! needs. Its lifecycle is `Idle → Loading → Active → Stopped`; a stopped
//! session can be started again.
//!
//! ```text
//!  VideoTrack ──▶ FrameSampler ──▶ DetectionWorker (own thread)
//!                                         │
//!                                         ▼
//!                 StatePublisher ◀── ResultAggregator
//!                  │     │     │
//!               store  peers  webhook
//! ```
//!
//! While active, a single tokio task runs the sampling timer, the webhook
//! timer and the worker responses. Every request carries the session
//! generation; stopping bumps it so late responses are discarded.

use crate::capture::{CaptureError, Frame, FrameSampler, VideoTrack};
use crate::config::Config;
use crate::core::{AggregatorConfig, AggregatorEvent, ExpressionEvent, ResultAggregator};
use crate::detect::{
    DetectionRequest, DetectionWorker, FaceDetector, SubmitOutcome, WorkerError, WorkerEvent,
};
use crate::publish::{
    DetectionObserver, FlushOutcome, LandmarksAction, PeerChannel, StatePublisher, StateSink,
    WebhookClient, WebhookError,
};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Builds a fresh face model for every session start.
pub type DetectorFactory = Box<dyn Fn() -> Box<dyn FaceDetector> + Send + Sync>;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Worker is loading the model
    Loading,
    /// Sampling and aggregating
    Active,
    Stopped,
}

/// Why a session did not start or degraded. Never fatal to the host.
#[derive(Debug)]
pub enum SessionError {
    /// No local video track to sample
    MissingVideoTrack,
    /// Every detection type is disabled
    NothingToDetect,
    /// The worker could not start (e.g. unsupported environment)
    Worker(WorkerError),
    /// The webhook client could not be created
    Webhook(WebhookError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::MissingVideoTrack => write!(f, "No local video track"),
            SessionError::NothingToDetect => write!(f, "All detection types are disabled"),
            SessionError::Worker(e) => write!(f, "{e}"),
            SessionError::Webhook(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// What happened during one active period.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub session_id: String,
    pub frames_sampled: u64,
    pub detections_completed: u64,
    pub requests_dropped: u64,
    pub stale_responses: u64,
    /// Expression runs emitted, including the terminal one
    pub expression_events: u64,
    /// Run flushed at stop, if one was pending
    pub terminal_event: Option<ExpressionEvent>,
    /// Outcome of the webhook flush at stop, when the webhook is enabled
    pub final_flush: Option<FlushOutcome>,
    /// The worker went away while the session was active
    pub worker_lost: bool,
}

struct RunningSession {
    session_id: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<RunSummary>,
}

/// One face landmarks detection session, owned by the caller.
pub struct LandmarksSession {
    config: Config,
    sink: Arc<dyn StateSink>,
    peer: Option<Arc<dyn PeerChannel>>,
    observer: Option<Arc<dyn DetectionObserver>>,
    detectors: DetectorFactory,
    stats: SharedTransparencyLog,
    state: SessionState,
    generation: Arc<AtomicU64>,
    running: Option<RunningSession>,
    last_error: Option<SessionError>,
}

impl LandmarksSession {
    pub fn new<F>(config: Config, sink: Arc<dyn StateSink>, detectors: F) -> Self
    where
        F: Fn() -> Box<dyn FaceDetector> + Send + Sync + 'static,
    {
        Self {
            config,
            sink,
            peer: None,
            observer: None,
            detectors: Box::new(detectors),
            stats: create_shared_log(),
            state: SessionState::Idle,
            generation: Arc::new(AtomicU64::new(0)),
            running: None,
            last_error: None,
        }
    }

    /// Relay face boxes to other participants through `peer`.
    pub fn with_peer(mut self, peer: Arc<dyn PeerChannel>) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Report every detection result to `observer`, before aggregation.
    pub fn with_observer(mut self, observer: Arc<dyn DetectionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Record statistics into `stats` instead of a private log.
    pub fn with_stats(mut self, stats: SharedTransparencyLog) -> Self {
        self.stats = stats;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &SharedTransparencyLog {
        &self.stats
    }

    /// Why the last start attempt failed or degraded.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    /// Identifier of the active period, sent with webhook submissions.
    pub fn session_id(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.session_id.as_str())
    }

    /// Current generation; bumped on every stop.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start detecting faces on `track`.
    ///
    /// Never fails the caller: problems are logged, recorded in
    /// [`Self::last_error`] and leave the session `Idle`. Calling this while
    /// already active is a no-op.
    pub async fn start(&mut self, track: Option<Arc<dyn VideoTrack>>) -> SessionState {
        if matches!(self.state, SessionState::Active | SessionState::Loading) {
            info!("Face recognition already active");
            return self.state;
        }

        let Some(track) = track else {
            warn!("Face landmarks detection is disabled due to missing local track");
            return self.abort_start(SessionError::MissingVideoTrack);
        };

        if !self.config.detection_types.any_enabled() {
            warn!("Face landmarks detection is disabled: no detection types enabled");
            return self.abort_start(SessionError::NothingToDetect);
        }

        self.state = SessionState::Loading;
        self.last_error = None;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let detector = (self.detectors)();
        let types = self.config.detection_types;
        let spawned = tokio::task::spawn_blocking(move || {
            DetectionWorker::spawn(detector, types, events_tx)
        })
        .await;

        let worker = match spawned {
            Ok(Ok(worker)) => worker,
            Ok(Err(e)) => {
                warn!("Face landmarks worker unavailable: {e}");
                return self.abort_start(SessionError::Worker(e));
            }
            Err(e) => {
                warn!("Face landmarks worker task failed: {e}");
                return self.abort_start(SessionError::Worker(WorkerError::Spawn(e.to_string())));
            }
        };

        let session_id = format!("SESS-{}", uuid::Uuid::new_v4());
        let mut publisher = StatePublisher::new(
            self.sink.clone(),
            self.config.identity.clone(),
            session_id.clone(),
            self.stats.clone(),
        );
        if let Some(ref peer) = self.peer {
            publisher = publisher.with_peer(peer.clone());
        }
        if let Some(ref observer) = self.observer {
            publisher = publisher.with_observer(observer.clone());
        }

        let mut webhook_interval = None;
        if let (true, Some(webhook)) = (self.config.webhook_enabled(), &self.config.webhook) {
            match WebhookClient::new(webhook.clone()) {
                Ok(client) => {
                    publisher = publisher.with_webhook(client);
                    webhook_interval = Some(self.config.webhook_send_interval);
                }
                Err(e) => {
                    warn!("Expressions webhook disabled: {e}");
                    self.last_error = Some(SessionError::Webhook(e));
                }
            }
        }

        let interval = self.config.detection_interval();
        let mut sampler = FrameSampler::new(track, interval);
        sampler.start();

        let aggregator = ResultAggregator::new(AggregatorConfig {
            face_box_threshold: self.config.face_centering_threshold,
            tick_interval: interval,
        });

        let undelivered = self.sink.state().expressions_buffer.len();
        if undelivered > 0 {
            warn!("Discarding {undelivered} undelivered expression runs from the previous session");
        }
        publisher.dispatch(LandmarksAction::StartDetection);
        info!(
            "Start face recognition on '{}' every {}ms (backend: {}, session: {session_id})",
            sampler.track_label(),
            interval.as_millis(),
            worker.backend()
        );

        let run = RunLoop {
            sampler,
            worker,
            events: events_rx,
            aggregator,
            publisher,
            generation: self.generation.clone(),
            live_generation: self.generation.load(Ordering::SeqCst),
            webhook_interval,
            stats: self.stats.clone(),
            next_sequence: 0,
            events_closed: false,
            summary: RunSummary {
                session_id: session_id.clone(),
                ..RunSummary::default()
            },
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run.run(shutdown_rx));

        self.running = Some(RunningSession {
            session_id,
            shutdown: shutdown_tx,
            task,
        });
        self.state = SessionState::Active;
        self.state
    }

    /// Stop detecting. Flushes the pending expression run as a final event,
    /// attempts a last webhook delivery and shuts the worker down.
    ///
    /// Returns `None` when the session was not active.
    pub async fn stop(&mut self) -> Option<RunSummary> {
        let running = self.running.take()?;

        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = running.shutdown.send(());

        let summary = match running.task.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Face landmarks session task failed: {e}");
                None
            }
        };

        self.sink.dispatch(LandmarksAction::StopDetection);
        self.state = SessionState::Stopped;
        info!("Stop face recognition");

        summary
    }

    fn abort_start(&mut self, error: SessionError) -> SessionState {
        self.last_error = Some(error);
        self.state = SessionState::Idle;
        self.state
    }
}

impl Drop for LandmarksSession {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            let _ = running.shutdown.send(());
            self.sink.dispatch(LandmarksAction::StopDetection);
        }
    }
}

/// State owned by the session task while active.
struct RunLoop {
    sampler: FrameSampler,
    worker: DetectionWorker,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    aggregator: ResultAggregator,
    publisher: StatePublisher,
    generation: Arc<AtomicU64>,
    live_generation: u64,
    webhook_interval: Option<Duration>,
    stats: SharedTransparencyLog,
    next_sequence: u64,
    events_closed: bool,
    summary: RunSummary,
}

impl RunLoop {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> RunSummary {
        let mut webhook_ticker = self.webhook_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                capture = self.sampler.next_capture() => self.on_capture(capture),
                event = self.events.recv(), if !self.events_closed => match event {
                    Some(event) => self.on_worker_event(event),
                    None => {
                        self.events_closed = true;
                        self.on_worker_lost();
                    }
                },
                _ = next_tick(&mut webhook_ticker) => {
                    self.publisher.flush_webhook().await;
                }
            }
        }

        self.finish().await
    }

    fn on_capture(&mut self, capture: Result<Frame, CaptureError>) {
        let frame = match capture {
            Ok(frame) => frame,
            Err(CaptureError::TrackEnded) => {
                warn!("Video track ended, face sampling stopped");
                return;
            }
            Err(e) => {
                debug!("Skipping detection tick: {e}");
                return;
            }
        };

        self.stats.record_frame_sampled();
        self.summary.frames_sampled += 1;
        self.next_sequence += 1;

        let request = DetectionRequest {
            sequence: self.next_sequence,
            generation: self.live_generation,
            frame,
        };

        match self.worker.submit(request) {
            SubmitOutcome::Queued => {}
            SubmitOutcome::Busy => {
                debug!("Detection {} dropped, worker busy", self.next_sequence);
                self.stats.record_request_dropped();
                self.summary.requests_dropped += 1;
            }
            SubmitOutcome::Closed => self.on_worker_lost(),
        }
    }

    fn on_worker_lost(&mut self) {
        if !self.summary.worker_lost {
            warn!("Detection worker is gone, face sampling stopped");
        }
        self.summary.worker_lost = true;
        self.sampler.stop();
    }

    fn on_worker_event(&mut self, event: WorkerEvent) {
        if event.generation() != self.generation.load(Ordering::SeqCst) {
            self.stats.record_stale_response();
            self.summary.stale_responses += 1;
            return;
        }

        match event {
            WorkerEvent::Completed(response) => {
                self.stats.record_detection_completed();
                self.summary.detections_completed += 1;

                let now = Utc::now();
                self.publisher.notify_detected(&response.result, now);
                for event in self.aggregator.ingest(&response.result, now) {
                    if matches!(event, AggregatorEvent::Expression(_)) {
                        self.summary.expression_events += 1;
                    }
                    self.publisher.publish(event);
                }
            }
            WorkerEvent::Failed {
                sequence, error, ..
            } => {
                warn!("Detection {sequence} failed: {error}");
            }
        }
    }

    async fn finish(mut self) -> RunSummary {
        self.sampler.stop();

        if let Some(event) = self.aggregator.finish() {
            self.summary.expression_events += 1;
            self.summary.terminal_event = Some(event.clone());
            self.publisher.publish(AggregatorEvent::Expression(event));
        }

        if self.publisher.has_webhook() {
            self.summary.final_flush = Some(self.publisher.flush_webhook().await);
        }

        let worker = self.worker;
        if let Err(e) = tokio::task::spawn_blocking(move || worker.shutdown()).await {
            warn!("Detection worker did not shut down cleanly: {e}");
        }

        self.summary
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
