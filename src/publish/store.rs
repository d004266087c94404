//! Application-state store for face landmarks.
//!
//! The host treats detection output as typed actions reduced into a plain
//! state value. [`SharedStore`] is the in-process store; hosts with their own
//! state container implement [`StateSink`] instead.

use crate::core::events::ExpressionEvent;
use crate::detect::types::FaceBox;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Updates dispatched by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LandmarksAction {
    StartDetection,
    StopDetection,
    /// A completed expression run
    AddFaceLandmarks(ExpressionEvent),
    /// Queue an expression run for the webhook
    AddToExpressionsBuffer(ExpressionEvent),
    /// Drop the first `count` buffered runs after a successful webhook flush
    ClearExpressionsBuffer { count: usize },
    SetMaxFaces(usize),
    /// New face box of the local participant
    UpdateFaceCoordinates {
        participant_id: String,
        face_box: FaceBox,
    },
    /// Face box relayed by a remote participant
    ReceivedFaceBox {
        participant_id: String,
        face_box: FaceBox,
    },
}

/// State of the face landmarks feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LandmarksState {
    pub recognition_active: bool,
    /// All completed expression runs of the current session
    pub face_landmarks: Vec<ExpressionEvent>,
    /// Runs not yet delivered to the webhook
    pub expressions_buffer: Vec<ExpressionEvent>,
    /// Latest face box per participant
    pub face_boxes: HashMap<String, FaceBox>,
    pub max_faces: usize,
}

impl LandmarksState {
    /// Apply an action.
    pub fn reduce(&mut self, action: LandmarksAction) {
        match action {
            LandmarksAction::StartDetection => {
                // Undelivered runs belong to the previous session id.
                self.recognition_active = true;
                self.expressions_buffer.clear();
            }
            LandmarksAction::StopDetection => {
                self.recognition_active = false;
            }
            LandmarksAction::AddFaceLandmarks(event) => {
                self.face_landmarks.push(event);
            }
            LandmarksAction::AddToExpressionsBuffer(event) => {
                self.expressions_buffer.push(event);
            }
            LandmarksAction::ClearExpressionsBuffer { count } => {
                let count = count.min(self.expressions_buffer.len());
                self.expressions_buffer.drain(..count);
            }
            LandmarksAction::SetMaxFaces(max_faces) => {
                self.max_faces = max_faces;
            }
            LandmarksAction::UpdateFaceCoordinates {
                participant_id,
                face_box,
            }
            | LandmarksAction::ReceivedFaceBox {
                participant_id,
                face_box,
            } => {
                self.face_boxes.insert(participant_id, face_box);
            }
        }
    }
}

/// Where the session dispatches its updates.
pub trait StateSink: Send + Sync {
    fn dispatch(&self, action: LandmarksAction);

    /// Current state, cloned.
    fn state(&self) -> LandmarksState;
}

/// Thread-safe in-process store.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<LandmarksState>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LandmarksState> {
        // A panic while reducing leaves plain data behind; keep serving it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateSink for SharedStore {
    fn dispatch(&self, action: LandmarksAction) {
        self.lock().reduce(action);
    }

    fn state(&self) -> LandmarksState {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::types::Expression;
    use chrono::Utc;

    fn event(expression: Expression) -> ExpressionEvent {
        ExpressionEvent {
            expression,
            timestamp: Utc::now(),
            duration_ticks: 1,
            duration_secs: 1.0,
            age: None,
            gender: None,
        }
    }

    #[test]
    fn test_start_stop() {
        let store = SharedStore::new();
        store.dispatch(LandmarksAction::StartDetection);
        assert!(store.state().recognition_active);
        store.dispatch(LandmarksAction::StopDetection);
        assert!(!store.state().recognition_active);
    }

    #[test]
    fn test_start_discards_previous_session_buffer() {
        let mut state = LandmarksState::default();
        state.reduce(LandmarksAction::StartDetection);
        state.reduce(LandmarksAction::AddFaceLandmarks(event(Expression::Sad)));
        state.reduce(LandmarksAction::AddToExpressionsBuffer(event(Expression::Sad)));
        state.reduce(LandmarksAction::StopDetection);
        assert_eq!(state.expressions_buffer.len(), 1);

        state.reduce(LandmarksAction::StartDetection);
        assert!(state.recognition_active);
        assert!(state.expressions_buffer.is_empty());
        assert_eq!(state.face_landmarks.len(), 1);
    }

    #[test]
    fn test_clear_buffer_keeps_newer_entries() {
        let mut state = LandmarksState::default();
        state.reduce(LandmarksAction::AddToExpressionsBuffer(event(Expression::Happy)));
        state.reduce(LandmarksAction::AddToExpressionsBuffer(event(Expression::Sad)));
        state.reduce(LandmarksAction::AddToExpressionsBuffer(event(Expression::Angry)));

        state.reduce(LandmarksAction::ClearExpressionsBuffer { count: 2 });
        assert_eq!(state.expressions_buffer.len(), 1);
        assert_eq!(state.expressions_buffer[0].expression, Expression::Angry);

        state.reduce(LandmarksAction::ClearExpressionsBuffer { count: 10 });
        assert!(state.expressions_buffer.is_empty());
    }

    #[test]
    fn test_face_boxes_per_participant() {
        let mut state = LandmarksState::default();
        state.reduce(LandmarksAction::UpdateFaceCoordinates {
            participant_id: "local".to_string(),
            face_box: FaceBox::new(10.0, 30.0),
        });
        state.reduce(LandmarksAction::ReceivedFaceBox {
            participant_id: "remote".to_string(),
            face_box: FaceBox::new(50.0, 70.0),
        });
        state.reduce(LandmarksAction::UpdateFaceCoordinates {
            participant_id: "local".to_string(),
            face_box: FaceBox::new(40.0, 60.0),
        });

        assert_eq!(state.face_boxes.len(), 2);
        assert_eq!(state.face_boxes["local"].left, 40.0);
        assert_eq!(state.face_boxes["remote"].left, 50.0);
    }

    #[test]
    fn test_landmarks_and_buffer_are_independent() {
        let store = SharedStore::new();
        store.dispatch(LandmarksAction::AddFaceLandmarks(event(Expression::Happy)));
        store.dispatch(LandmarksAction::SetMaxFaces(2));

        let state = store.state();
        assert_eq!(state.face_landmarks.len(), 1);
        assert!(state.expressions_buffer.is_empty());
        assert_eq!(state.max_faces, 2);
    }
}
