//! Built-in face detector backends.
//!
//! Real models are supplied by the host application. These backends cover
//! replaying recorded model output and environments without any model.

use crate::capture::types::Frame;
use crate::config::DetectionTypes;
use crate::detect::detector::{DetectError, FaceDetector};
use crate::detect::types::{EmotionScore, RawFace};
use std::path::Path;
use std::time::Duration;

/// Replays recorded model output, one entry per frame, cycling at the end.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    script: Vec<Vec<RawFace>>,
    cursor: usize,
    latency: Duration,
    loaded: bool,
}

impl ReplayDetector {
    pub fn new(script: Vec<Vec<RawFace>>) -> Self {
        Self {
            script,
            cursor: 0,
            latency: Duration::ZERO,
            loaded: false,
        }
    }

    /// Read a script from a JSON Lines file: one JSON array of faces per line.
    pub fn from_jsonl(path: &Path) -> Result<Self, DetectError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DetectError::ModelLoad(format!("{}: {e}", path.display())))?;
        Self::parse_jsonl(&content)
    }

    /// Parse a JSON Lines script. Blank lines are skipped.
    pub fn parse_jsonl(content: &str) -> Result<Self, DetectError> {
        let script = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<Vec<RawFace>>(line)
                    .map_err(|e| DetectError::ModelLoad(format!("line {}: {e}", n + 1)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(script))
    }

    /// One centered face per frame showing the given model emotion labels.
    pub fn from_emotions(labels: &[&str]) -> Self {
        let script = labels
            .iter()
            .map(|label| {
                vec![RawFace {
                    box_raw: [0.35, 0.2, 0.3, 0.5],
                    age: None,
                    gender: None,
                    emotions: vec![EmotionScore {
                        emotion: label.to_string(),
                        score: 1.0,
                    }],
                }]
            })
            .collect();

        Self::new(script)
    }

    /// Sleep this long in every `detect` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

impl FaceDetector for ReplayDetector {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn load(&mut self, _types: &DetectionTypes) -> Result<(), DetectError> {
        if self.script.is_empty() {
            return Err(DetectError::ModelLoad("replay script is empty".to_string()));
        }
        self.loaded = true;
        Ok(())
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawFace>, DetectError> {
        if !self.loaded {
            return Err(DetectError::Inference("model not loaded".to_string()));
        }
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let faces = self.script[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.script.len();
        Ok(faces)
    }
}

/// Stands in for environments with no worker capability; never loads.
#[derive(Debug, Default)]
pub struct UnsupportedDetector {
    reason: String,
}

impl UnsupportedDetector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FaceDetector for UnsupportedDetector {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn load(&mut self, _types: &DetectionTypes) -> Result<(), DetectError> {
        Err(DetectError::Unsupported(self.reason.clone()))
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawFace>, DetectError> {
        Err(DetectError::Unsupported(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_cycles() {
        let mut detector = ReplayDetector::from_emotions(&["happy", "sad"]);
        detector.load(&DetectionTypes::all()).unwrap();
        let frame = Frame::blank(1, 1);

        let labels: Vec<String> = (0..3)
            .map(|_| detector.detect(&frame).unwrap()[0].emotions[0].emotion.clone())
            .collect();
        assert_eq!(labels, vec!["happy", "sad", "happy"]);
    }

    #[test]
    fn test_replay_requires_load() {
        let mut detector = ReplayDetector::from_emotions(&["happy"]);
        assert!(matches!(
            detector.detect(&Frame::blank(1, 1)),
            Err(DetectError::Inference(_))
        ));
    }

    #[test]
    fn test_empty_replay_fails_to_load() {
        let mut detector = ReplayDetector::new(Vec::new());
        assert!(matches!(
            detector.load(&DetectionTypes::all()),
            Err(DetectError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_parse_jsonl() {
        let content = r#"
[{"box_raw":[0.1,0.1,0.2,0.2],"age":30.0,"gender":"male","emotions":[{"emotion":"happy","score":0.8}]}]

[]
"#;
        let detector = ReplayDetector::parse_jsonl(content).unwrap();
        assert_eq!(detector.len(), 2);
    }

    #[test]
    fn test_parse_jsonl_reports_line() {
        let err = ReplayDetector::parse_jsonl("[]\n{oops").err().unwrap();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_unsupported_never_loads() {
        let mut detector = UnsupportedDetector::new("no worker support");
        assert_eq!(
            detector.load(&DetectionTypes::all()),
            Err(DetectError::Unsupported("no worker support".to_string()))
        );
    }
}
