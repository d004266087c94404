//! Aggregation of per-frame detection results.
//!
//! Consecutive identical expressions are collapsed into a single
//! [`ExpressionEvent`] whose duration is the length of the run. Age and
//! gender samples observed during a run are summarized into it. Face boxes
//! are debounced on their left edge and the face count keeps a running
//! maximum.

use crate::core::events::{AggregatorEvent, ExpressionEvent};
use crate::detect::types::{DetectionResult, Expression, FaceBox};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Tuning for the aggregator.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    /// Minimum left-edge shift (percent) for a new face box to be accepted
    pub face_box_threshold: f64,
    /// Time between two detections, used to turn run lengths into seconds
    pub tick_interval: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            face_box_threshold: 10.0,
            tick_interval: Duration::from_millis(1000),
        }
    }
}

/// Accumulates detection results for one session.
pub struct ResultAggregator {
    config: AggregatorConfig,
    /// Expression of the run in progress
    last_expression: Option<Expression>,
    /// When the run in progress started
    last_expression_timestamp: Option<DateTime<Utc>>,
    /// Repeats of `last_expression` after its first detection
    consecutive_count: u32,
    ages: Vec<f64>,
    genders: Vec<String>,
    last_face_box: Option<FaceBox>,
    max_faces: usize,
}

impl ResultAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            last_expression: None,
            last_expression_timestamp: None,
            consecutive_count: 0,
            ages: Vec::new(),
            genders: Vec::new(),
            last_face_box: None,
            max_faces: 0,
        }
    }

    /// Fold one detection result in, returning what should be published.
    pub fn ingest(&mut self, result: &DetectionResult, now: DateTime<Utc>) -> Vec<AggregatorEvent> {
        let mut events = Vec::new();

        // Samples from the switching tick belong to the run it closes.
        if let Some(age) = result.age {
            self.ages.push(age);
        }
        if let Some(ref gender) = result.gender {
            self.genders.push(gender.clone());
        }

        if let Some(expression) = result.expression {
            if self.last_expression == Some(expression) {
                self.consecutive_count += 1;
            } else {
                if let Some(event) = self.take_pending() {
                    events.push(AggregatorEvent::Expression(event));
                }
                self.last_expression = Some(expression);
                self.last_expression_timestamp = Some(now);
                self.consecutive_count = 0;
            }
        }

        if let Some(face_box) = result.face_box {
            if self.accept_face_box(face_box) {
                events.push(AggregatorEvent::FaceBox(face_box));
            }
        }

        if let Some(count) = result.face_count {
            if count > self.max_faces {
                self.max_faces = count;
                events.push(AggregatorEvent::MaxFaces(count));
            }
        }

        events
    }

    /// End the session: flush the pending run, if any, and reset all state.
    pub fn finish(&mut self) -> Option<ExpressionEvent> {
        let pending = self.take_pending();
        self.ages.clear();
        self.genders.clear();
        self.last_face_box = None;
        self.max_faces = 0;
        pending
    }

    /// Expression of the run in progress.
    pub fn pending_expression(&self) -> Option<Expression> {
        self.last_expression
    }

    /// Length of the run in progress, in detections.
    pub fn pending_ticks(&self) -> u32 {
        if self.last_expression.is_some() {
            self.consecutive_count + 1
        } else {
            0
        }
    }

    pub fn max_faces(&self) -> usize {
        self.max_faces
    }

    pub fn last_face_box(&self) -> Option<FaceBox> {
        self.last_face_box
    }

    fn accept_face_box(&mut self, face_box: FaceBox) -> bool {
        if let Some(ref last) = self.last_face_box {
            if face_box.left_shift(last) < self.config.face_box_threshold {
                return false;
            }
        }
        self.last_face_box = Some(face_box);
        true
    }

    /// Close the run in progress and clear its samples.
    fn take_pending(&mut self) -> Option<ExpressionEvent> {
        let expression = self.last_expression.take()?;
        let timestamp = self.last_expression_timestamp.take()?;
        let duration_ticks = self.consecutive_count + 1;
        self.consecutive_count = 0;

        let event = ExpressionEvent {
            expression,
            timestamp,
            duration_ticks,
            duration_secs: duration_ticks as f64 * self.config.tick_interval.as_secs_f64(),
            age: average_age(&self.ages),
            gender: most_occurred_gender(&self.genders),
        };
        self.ages.clear();
        self.genders.clear();

        Some(event)
    }
}

/// Arithmetic mean of the age samples.
pub fn average_age(ages: &[f64]) -> Option<f64> {
    if ages.is_empty() {
        return None;
    }
    Some(ages.iter().sum::<f64>() / ages.len() as f64)
}

/// Most frequent gender label; ties go to the label seen first.
pub fn most_occurred_gender(genders: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for gender in genders {
        *counts.entry(gender.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for gender in genders {
        let count = counts[gender.as_str()];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((gender.as_str(), count));
        }
    }

    best.map(|(gender, _)| gender.to_string())
}
