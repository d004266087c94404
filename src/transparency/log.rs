//! Transparency log for face analysis.
//!
//! Tracks what the agent did with the camera (how many frames were analyzed,
//! what was published) without keeping any frame or face data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Counters for the current process.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Frames captured from the video track
    frames_sampled: AtomicU64,
    /// Inference calls that produced a result
    detections_completed: AtomicU64,
    /// Frames dropped because the worker was busy
    requests_dropped: AtomicU64,
    /// Worker responses discarded because their session was stopped
    stale_responses: AtomicU64,
    /// Expression runs emitted
    expression_events: AtomicU64,
    /// Face boxes published
    face_boxes_published: AtomicU64,
    /// Successful webhook deliveries
    webhook_flushes: AtomicU64,
    /// Failed webhook deliveries
    webhook_failures: AtomicU64,
    /// Log start time
    started_at: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            frames_sampled: AtomicU64::new(0),
            detections_completed: AtomicU64::new(0),
            requests_dropped: AtomicU64::new(0),
            stale_responses: AtomicU64::new(0),
            expression_events: AtomicU64::new(0),
            face_boxes_published: AtomicU64::new(0),
            webhook_flushes: AtomicU64::new(0),
            webhook_failures: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log with persistence.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        // Try to load existing stats
        if let Err(e) = log.load() {
            warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_frame_sampled(&self) {
        self.frames_sampled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_completed(&self) {
        self.detections_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_dropped(&self) {
        self.requests_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_response(&self) {
        self.stale_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expression_event(&self) {
        self.expression_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_face_box_published(&self) {
        self.face_boxes_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_flush(&self) {
        self.webhook_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_failure(&self) {
        self.webhook_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            frames_sampled: self.frames_sampled.load(Ordering::Relaxed),
            detections_completed: self.detections_completed.load(Ordering::Relaxed),
            requests_dropped: self.requests_dropped.load(Ordering::Relaxed),
            stale_responses: self.stale_responses.load(Ordering::Relaxed),
            expression_events: self.expression_events.load(Ordering::Relaxed),
            face_boxes_published: self.face_boxes_published.load(Ordering::Relaxed),
            webhook_flushes: self.webhook_flushes.load(Ordering::Relaxed),
            webhook_failures: self.webhook_failures.load(Ordering::Relaxed),
            started_at: self.started_at,
            duration_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Frames analyzed: {}\n\
             - Detections completed: {}\n\
             - Frames dropped (worker busy): {}\n\
             - Stale results discarded: {}\n\
             - Expression runs: {}\n\
             - Face boxes published: {}\n\
             - Webhook deliveries: {} ({} failed)\n\
             - Duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No frames stored or transmitted\n\
             - Only expression runs and face position leave the device",
            stats.frames_sampled,
            stats.detections_completed,
            stats.requests_dropped,
            stats.stale_responses,
            stats.expression_events,
            stats.face_boxes_published,
            stats.webhook_flushes,
            stats.webhook_failures,
            stats.duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_sampled: stats.frames_sampled,
                detections_completed: stats.detections_completed,
                requests_dropped: stats.requests_dropped,
                stale_responses: stats.stale_responses,
                expression_events: stats.expression_events,
                face_boxes_published: stats.face_boxes_published,
                webhook_flushes: stats.webhook_flushes,
                webhook_failures: stats.webhook_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_sampled
                    .store(persisted.frames_sampled, Ordering::Relaxed);
                self.detections_completed
                    .store(persisted.detections_completed, Ordering::Relaxed);
                self.requests_dropped
                    .store(persisted.requests_dropped, Ordering::Relaxed);
                self.stale_responses
                    .store(persisted.stale_responses, Ordering::Relaxed);
                self.expression_events
                    .store(persisted.expression_events, Ordering::Relaxed);
                self.face_boxes_published
                    .store(persisted.face_boxes_published, Ordering::Relaxed);
                self.webhook_flushes
                    .store(persisted.webhook_flushes, Ordering::Relaxed);
                self.webhook_failures
                    .store(persisted.webhook_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.frames_sampled,
            &self.detections_completed,
            &self.requests_dropped,
            &self.stale_responses,
            &self.expression_events,
            &self.face_boxes_published,
            &self.webhook_flushes,
            &self.webhook_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub frames_sampled: u64,
    pub detections_completed: u64,
    pub requests_dropped: u64,
    pub stale_responses: u64,
    pub expression_events: u64,
    pub face_boxes_published: u64,
    pub webhook_flushes: u64,
    pub webhook_failures: u64,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_sampled: u64,
    detections_completed: u64,
    requests_dropped: u64,
    #[serde(default)]
    stale_responses: u64,
    expression_events: u64,
    #[serde(default)]
    face_boxes_published: u64,
    webhook_flushes: u64,
    #[serde(default)]
    webhook_failures: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparency_log_counting() {
        let log = TransparencyLog::new();

        log.record_frame_sampled();
        log.record_frame_sampled();
        log.record_request_dropped();
        log.record_expression_event();

        let stats = log.stats();
        assert_eq!(stats.frames_sampled, 2);
        assert_eq!(stats.requests_dropped, 1);
        assert_eq!(stats.expression_events, 1);
        assert_eq!(stats.detections_completed, 0);
    }

    #[test]
    fn test_transparency_log_reset() {
        let log = TransparencyLog::new();

        log.record_frame_sampled();
        log.record_webhook_failure();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.frames_sampled, 0);
        assert_eq!(stats.webhook_failures, 0);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats").join("transparency.json");

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_frame_sampled();
        log.record_detection_completed();
        log.record_webhook_flush();
        log.record_stale_response();
        log.record_face_box_published();
        log.record_face_box_published();
        log.record_webhook_failure();
        log.save().unwrap();

        let reloaded = TransparencyLog::with_persistence(path);
        let stats = reloaded.stats();
        assert_eq!(stats.frames_sampled, 1);
        assert_eq!(stats.detections_completed, 1);
        assert_eq!(stats.webhook_flushes, 1);
        assert_eq!(stats.stale_responses, 1);
        assert_eq!(stats.face_boxes_published, 2);
        assert_eq!(stats.webhook_failures, 1);
    }

    #[test]
    fn test_load_stats_without_newer_counters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transparency.json");
        std::fs::write(
            &path,
            r#"{"frames_sampled":4,"detections_completed":3,"requests_dropped":1,
                "expression_events":2,"webhook_flushes":1,
                "last_updated":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let stats = TransparencyLog::with_persistence(path).stats();
        assert_eq!(stats.frames_sampled, 4);
        assert_eq!(stats.stale_responses, 0);
        assert_eq!(stats.webhook_failures, 0);
    }

    #[test]
    fn test_summary_format() {
        let log = TransparencyLog::new();
        let summary = log.summary();

        assert!(summary.contains("Frames analyzed"));
        assert!(summary.contains("Expression runs"));
        assert!(summary.contains("No frames stored"));
    }
}
