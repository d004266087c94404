//! Per-detection notifications for the host application.
//!
//! Unlike the store, which only sees aggregated runs, an observer hears about
//! every detection result as it arrives, with the face box as computed on
//! that frame.

use crate::detect::types::{DetectionResult, Expression, FaceBox};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// One detection result, as reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceLandmarksDetected {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_box: Option<FaceBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_expression: Option<Expression>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl FaceLandmarksDetected {
    pub fn from_result(result: &DetectionResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            face_box: result.face_box,
            face_expression: result.expression,
            timestamp,
        }
    }
}

/// Receives every detection result of an active session.
pub trait DetectionObserver: Send + Sync {
    fn face_landmarks_detected(&self, detection: &FaceLandmarksDetected);
}

impl DetectionObserver for UnboundedSender<FaceLandmarksDetected> {
    fn face_landmarks_detected(&self, detection: &FaceLandmarksDetected) {
        // A host that stopped listening is not an error.
        let _ = self.send(detection.clone());
    }
}
