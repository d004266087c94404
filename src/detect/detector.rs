//! Face analysis model interface.
//!
//! The model itself is a black box supplied by the host. The worker only
//! needs it to load once and then turn frames into raw faces.

use crate::capture::types::Frame;
use crate::config::DetectionTypes;
use crate::detect::types::RawFace;

/// A face analysis model.
///
/// Implementations run on the detection worker thread and may block for as
/// long as inference takes. Frames must be treated as read-only and not kept
/// beyond the `detect` call.
pub trait FaceDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Load the model for the given detection types.
    ///
    /// Environments that cannot run the model return [`DetectError::Unsupported`].
    fn load(&mut self, types: &DetectionTypes) -> Result<(), DetectError>;

    /// Run inference on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawFace>, DetectError>;
}

/// Errors raised by a face analysis model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    /// No worker capability in this environment
    Unsupported(String),
    /// Model files could not be loaded
    ModelLoad(String),
    /// Inference on a frame failed
    Inference(String),
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectError::Unsupported(e) => write!(f, "Unsupported environment: {e}"),
            DetectError::ModelLoad(e) => write!(f, "Model load failed: {e}"),
            DetectError::Inference(e) => write!(f, "Inference failed: {e}"),
        }
    }
}

impl std::error::Error for DetectError {}
