//! Detection worker running the face model on its own thread.
//!
//! Requests go in over a crossbeam channel, results come back over a tokio
//! channel so the session loop can `select!` on them. At most one request is
//! in flight: a frame submitted while the model is busy is dropped.

use crate::config::DetectionTypes;
use crate::detect::detector::{DetectError, FaceDetector};
use crate::detect::helper::LandmarksHelper;
use crate::detect::types::{DetectionRequest, DetectionResponse};
use crossbeam_channel::{bounded, unbounded, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Messages to the worker thread.
enum WorkerMessage {
    Detect(DetectionRequest),
    Shutdown,
}

/// Messages from the worker thread.
#[derive(Debug)]
pub enum WorkerEvent {
    Completed(DetectionResponse),
    Failed {
        sequence: u64,
        generation: u64,
        error: DetectError,
    },
}

impl WorkerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            WorkerEvent::Completed(response) => response.generation,
            WorkerEvent::Failed { generation, .. } => *generation,
        }
    }
}

/// What happened to a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Handed to the worker
    Queued,
    /// A previous request is still being processed; this one was dropped
    Busy,
    /// The worker thread is gone
    Closed,
}

/// Errors that can occur while starting the worker.
#[derive(Debug)]
pub enum WorkerError {
    /// The model failed to load
    Init(DetectError),
    /// The thread could not be spawned or died during init
    Spawn(String),
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Init(e) => write!(f, "Worker initialization failed: {e}"),
            WorkerError::Spawn(e) => write!(f, "Worker thread failed: {e}"),
        }
    }
}

impl std::error::Error for WorkerError {}

/// Handle to a running detection worker.
pub struct DetectionWorker {
    requests: Sender<WorkerMessage>,
    in_flight: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    backend: &'static str,
}

impl DetectionWorker {
    /// Spawn the worker thread and load the model on it.
    ///
    /// Blocks until the model has loaded (or failed to), so call it from a
    /// blocking context when inside an async runtime.
    pub fn spawn(
        mut detector: Box<dyn FaceDetector>,
        types: DetectionTypes,
        events: UnboundedSender<WorkerEvent>,
    ) -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = unbounded::<WorkerMessage>();
        let (init_tx, init_rx) = bounded::<Result<(), DetectError>>(1);
        let in_flight = Arc::new(AtomicBool::new(false));
        let in_flight_worker = in_flight.clone();
        let backend = detector.name();

        let handle = std::thread::Builder::new()
            .name("face-landmarks-worker".to_string())
            .spawn(move || {
                if let Err(e) = detector.load(&types) {
                    let _ = init_tx.send(Err(e));
                    return;
                }
                let _ = init_tx.send(Ok(()));

                let helper = LandmarksHelper::new(types);
                while let Ok(WorkerMessage::Detect(request)) = request_rx.recv() {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        helper.run(detector.as_mut(), &request.frame)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(DetectError::Inference(format!(
                            "model panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                    });

                    let event = match outcome {
                        Ok(result) => WorkerEvent::Completed(DetectionResponse {
                            sequence: request.sequence,
                            generation: request.generation,
                            result,
                        }),
                        Err(error) => WorkerEvent::Failed {
                            sequence: request.sequence,
                            generation: request.generation,
                            error,
                        },
                    };

                    in_flight_worker.store(false, Ordering::SeqCst);
                    if events.send(event).is_err() {
                        break;
                    }
                }
                debug!("Detection worker exiting");
            })
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        match init_rx.recv() {
            Ok(Ok(())) => {
                info!("Detection worker ready (backend: {backend})");
                Ok(Self {
                    requests: request_tx,
                    in_flight,
                    handle: Some(handle),
                    backend,
                })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(WorkerError::Init(e))
            }
            Err(_) => {
                let _ = handle.join();
                Err(WorkerError::Spawn(
                    "worker exited before reporting readiness".to_string(),
                ))
            }
        }
    }

    /// Submit a request unless one is already in flight.
    pub fn submit(&self, request: DetectionRequest) -> SubmitOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SubmitOutcome::Busy;
        }

        match self.requests.send(WorkerMessage::Detect(request)) {
            Ok(()) => SubmitOutcome::Queued,
            Err(_) => {
                self.in_flight.store(false, Ordering::SeqCst);
                SubmitOutcome::Closed
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Stop the worker and wait for its thread. An inference in progress
    /// finishes first.
    pub fn shutdown(mut self) {
        let _ = self.requests.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerMessage::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::Frame;
    use crate::detect::backends::{ReplayDetector, UnsupportedDetector};
    use crate::detect::types::{Expression, RawFace};
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    fn request(sequence: u64) -> DetectionRequest {
        DetectionRequest {
            sequence,
            generation: 7,
            frame: Frame::blank(2, 2),
        }
    }

    #[tokio::test]
    async fn test_worker_round_trip() {
        let (tx, mut rx) = unbounded_channel();
        let detector = Box::new(ReplayDetector::from_emotions(&["sad"]));
        let worker = DetectionWorker::spawn(detector, DetectionTypes::all(), tx).unwrap();
        assert_eq!(worker.backend(), "replay");

        assert_eq!(worker.submit(request(1)), SubmitOutcome::Queued);
        match rx.recv().await.unwrap() {
            WorkerEvent::Completed(response) => {
                assert_eq!(response.sequence, 1);
                assert_eq!(response.generation, 7);
                assert_eq!(response.result.expression, Some(Expression::Sad));
                assert_eq!(response.result.face_count, Some(1));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        worker.shutdown();
    }

    #[tokio::test]
    async fn test_worker_drops_while_busy() {
        let (tx, mut rx) = unbounded_channel();
        let detector = Box::new(
            ReplayDetector::from_emotions(&["happy"]).with_latency(Duration::from_millis(200)),
        );
        let worker = DetectionWorker::spawn(detector, DetectionTypes::all(), tx).unwrap();

        assert_eq!(worker.submit(request(1)), SubmitOutcome::Queued);
        assert_eq!(worker.submit(request(2)), SubmitOutcome::Busy);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, WorkerEvent::Completed(ref r) if r.sequence == 1));
        assert!(!worker.is_busy());

        assert_eq!(worker.submit(request(3)), SubmitOutcome::Queued);
        let next = rx.recv().await.unwrap();
        assert!(matches!(next, WorkerEvent::Completed(ref r) if r.sequence == 3));

        worker.shutdown();
    }

    /// Panics on every inference call.
    struct PanickingDetector;

    impl FaceDetector for PanickingDetector {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn load(&mut self, _types: &DetectionTypes) -> Result<(), DetectError> {
            Ok(())
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawFace>, DetectError> {
            panic!("model crashed");
        }
    }

    #[tokio::test]
    async fn test_model_panic_reported_and_worker_stays_usable() {
        let (tx, mut rx) = unbounded_channel();
        let worker =
            DetectionWorker::spawn(Box::new(PanickingDetector), DetectionTypes::all(), tx)
                .unwrap();

        assert_eq!(worker.submit(request(1)), SubmitOutcome::Queued);
        match rx.recv().await.unwrap() {
            WorkerEvent::Failed {
                sequence, error, ..
            } => {
                assert_eq!(sequence, 1);
                assert_eq!(
                    error,
                    DetectError::Inference("model panicked: model crashed".to_string())
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert!(!worker.is_busy());
        assert_eq!(worker.submit(request(2)), SubmitOutcome::Queued);
        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkerEvent::Failed { sequence: 2, .. }
        ));

        worker.shutdown();
    }

    #[test]
    fn test_worker_init_failure() {
        let (tx, _rx) = unbounded_channel();
        let detector = Box::new(UnsupportedDetector::new("no worker support"));

        match DetectionWorker::spawn(detector, DetectionTypes::all(), tx) {
            Err(WorkerError::Init(DetectError::Unsupported(reason))) => {
                assert_eq!(reason, "no worker support")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("worker should not start"),
        }
    }

    #[test]
    fn test_submit_after_shutdown_is_closed() {
        let (tx, _rx) = unbounded_channel();
        let detector = Box::new(ReplayDetector::from_emotions(&["happy"]));
        let worker = DetectionWorker::spawn(detector, DetectionTypes::all(), tx).unwrap();

        let _ = worker.requests.send(WorkerMessage::Shutdown);
        if let Some(handle) = worker.handle.as_ref() {
            while !handle.is_finished() {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        assert_eq!(worker.submit(request(1)), SubmitOutcome::Closed);
    }
}
