//! Turns raw model output into a [`DetectionResult`].
//!
//! Per-face outputs (age, gender, expression) come from the first face the
//! model reports; the face box and count cover all faces.

use crate::capture::types::Frame;
use crate::config::DetectionTypes;
use crate::detect::detector::{DetectError, FaceDetector};
use crate::detect::types::{DetectionResult, Expression, FaceBox, RawFace};

/// Interprets model output for the enabled detection types.
#[derive(Debug, Clone, Copy)]
pub struct LandmarksHelper {
    types: DetectionTypes,
}

impl LandmarksHelper {
    pub fn new(types: DetectionTypes) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &DetectionTypes {
        &self.types
    }

    /// Run the model once on `frame` and interpret the faces.
    ///
    /// The model is not called at all when no type is enabled.
    pub fn run(
        &self,
        detector: &mut dyn FaceDetector,
        frame: &Frame,
    ) -> Result<DetectionResult, DetectError> {
        if !self.types.any_enabled() {
            return Ok(DetectionResult::default());
        }

        let faces = detector.detect(frame)?;
        Ok(self.analyze(&faces))
    }

    /// Interpret faces already produced by the model.
    pub fn analyze(&self, faces: &[RawFace]) -> DetectionResult {
        let first = faces.first();

        DetectionResult {
            age: if self.types.age {
                first.and_then(|f| f.age)
            } else {
                None
            },
            gender: if self.types.gender {
                first.and_then(|f| f.gender.clone())
            } else {
                None
            },
            expression: if self.types.face_expressions {
                first
                    .and_then(|f| f.emotions.first())
                    .and_then(|e| Expression::from_model_label(&e.emotion))
            } else {
                None
            },
            face_box: if self.types.face_box {
                FaceBox::from_faces(faces)
            } else {
                None
            },
            face_count: if self.types.face_count {
                Some(faces.len())
            } else {
                None
            },
        }
    }
}
