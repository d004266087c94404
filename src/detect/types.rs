//! Detection request/result types shared between the worker and the aggregator.

use crate::capture::types::Frame;
use serde::{Deserialize, Serialize};

/// Independently togglable inference outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionType {
    Age,
    Gender,
    FaceExpressions,
    FaceBox,
    FaceCount,
}

impl DetectionType {
    pub const ALL: [DetectionType; 5] = [
        DetectionType::Age,
        DetectionType::Gender,
        DetectionType::FaceExpressions,
        DetectionType::FaceBox,
        DetectionType::FaceCount,
    ];
}

/// Facial expression labels as published to the store and the webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Happy,
    Neutral,
    Surprised,
    Angry,
    Fearful,
    Disgusted,
    Sad,
}

impl Expression {
    /// Map an emotion name produced by the model to an expression label.
    pub fn from_model_label(label: &str) -> Option<Self> {
        match label {
            "happy" => Some(Expression::Happy),
            "neutral" => Some(Expression::Neutral),
            "surprise" => Some(Expression::Surprised),
            "angry" => Some(Expression::Angry),
            "fear" => Some(Expression::Fearful),
            "disgust" => Some(Expression::Disgusted),
            "sad" => Some(Expression::Sad),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::Happy => "happy",
            Expression::Neutral => "neutral",
            Expression::Surprised => "surprised",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Sad => "sad",
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emotion score reported by the model for a face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub emotion: String,
    pub score: f64,
}

/// A face as reported by the model, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFace {
    /// `[x, y, width, height]`, normalized to 0..1 of the frame
    pub box_raw: [f64; 4],
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Emotion scores, best first
    #[serde(default)]
    pub emotions: Vec<EmotionScore>,
}

/// Horizontal extent of the detected faces, in percent of the frame width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub left: f64,
    pub right: f64,
    pub width: f64,
}

impl FaceBox {
    pub fn new(left: f64, right: f64) -> Self {
        Self {
            left,
            right,
            width: right - left,
        }
    }

    /// Bounding extent over all faces; `None` when there are none.
    pub fn from_faces(faces: &[RawFace]) -> Option<Self> {
        if faces.is_empty() {
            return None;
        }

        let left = faces
            .iter()
            .map(|f| f.box_raw[0])
            .fold(f64::INFINITY, f64::min);
        let right = faces
            .iter()
            .map(|f| f.box_raw[0] + f.box_raw[2])
            .fold(f64::NEG_INFINITY, f64::max);

        Some(Self::new((left * 100.0).round(), (right * 100.0).round()))
    }

    /// Absolute left-edge shift against `other`.
    pub fn left_shift(&self, other: &FaceBox) -> f64 {
        (self.left - other.left).abs()
    }
}

/// A frame submitted to the worker, tagged for correlation.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    /// Monotonic per-session request number
    pub sequence: u64,
    /// Session generation the request belongs to
    pub generation: u64,
    pub frame: Frame,
}

/// Outputs of one inference call. Only enabled types are filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub expression: Option<Expression>,
    pub face_box: Option<FaceBox>,
    pub face_count: Option<usize>,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.gender.is_none()
            && self.expression.is_none()
            && self.face_box.is_none()
            && self.face_count.is_none()
    }
}

/// A result travelling back from the worker with its request's tags.
#[derive(Debug, Clone)]
pub struct DetectionResponse {
    pub sequence: u64,
    pub generation: u64,
    pub result: DetectionResult,
}
