//! Events emitted by the result aggregator.

use crate::detect::types::{Expression, FaceBox};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed run of identical consecutive expressions.
///
/// Serialized the way the webhook expects its `emotions` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionEvent {
    #[serde(rename = "emotion")]
    pub expression: Expression,
    /// When the run started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Number of consecutive detections in the run
    pub duration_ticks: u32,
    /// Run length in seconds (ticks times the detection interval)
    #[serde(rename = "duration")]
    pub duration_secs: f64,
    /// Average age over the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    /// Most frequent gender over the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

/// Something the publisher has to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatorEvent {
    /// An expression run ended
    Expression(ExpressionEvent),
    /// A face box passed the debounce threshold
    FaceBox(FaceBox),
    /// A new maximum number of faces was observed
    MaxFaces(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expression_event_wire_format() {
        let event = ExpressionEvent {
            expression: Expression::Happy,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            duration_ticks: 3,
            duration_secs: 3.0,
            age: Some(30.0),
            gender: None,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["emotion"], "happy");
        assert_eq!(value["timestamp"], 1_700_000_000_123i64);
        assert_eq!(value["durationTicks"], 3);
        assert_eq!(value["duration"], 3.0);
        assert_eq!(value["age"], 30.0);
        assert!(value.get("gender").is_none());
    }
}
