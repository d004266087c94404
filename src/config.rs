//! Configuration for the face landmarks agent.

use crate::detect::types::DetectionType;
use crate::publish::webhook::WebhookConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest capture interval the sampler will run at.
pub const MIN_CAPTURE_INTERVAL: Duration = Duration::from_millis(100);

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interval between two frame captures
    #[serde(with = "duration_serde")]
    pub capture_interval: Duration,

    /// Interval between two webhook flushes of the expressions buffer
    #[serde(with = "duration_serde")]
    pub webhook_send_interval: Duration,

    /// Minimum left-edge shift (percent of frame width) before a new face box is published
    pub face_centering_threshold: f64,

    /// Which detection types the worker computes
    pub detection_types: DetectionTypes,

    /// Expressions webhook, if any
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,

    /// Who we are in the conference
    pub identity: ParticipantIdentity,

    /// Path for storing session statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("face-landmarks-agent");

        Self {
            capture_interval: Duration::from_millis(1000),
            webhook_send_interval: Duration::from_millis(15_000),
            face_centering_threshold: 10.0,
            detection_types: DetectionTypes::default(),
            webhook: None,
            identity: ParticipantIdentity::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("face-landmarks-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// The effective sampling interval.
    pub fn detection_interval(&self) -> Duration {
        self.capture_interval.max(MIN_CAPTURE_INTERVAL)
    }

    /// Whether the expressions webhook should run for this configuration.
    pub fn webhook_enabled(&self) -> bool {
        self.detection_types.face_expressions
            && self.webhook.is_some()
            && !self.webhook_send_interval.is_zero()
    }
}

/// Detection types the worker computes. Each one is toggled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionTypes {
    pub age: bool,
    pub gender: bool,
    pub face_expressions: bool,
    pub face_box: bool,
    pub face_count: bool,
}

impl Default for DetectionTypes {
    fn default() -> Self {
        Self {
            age: true,
            gender: true,
            face_expressions: true,
            face_box: false,
            face_count: true,
        }
    }
}

impl DetectionTypes {
    /// All detection types disabled.
    pub fn none() -> Self {
        Self {
            age: false,
            gender: false,
            face_expressions: false,
            face_box: false,
            face_count: false,
        }
    }

    /// All detection types enabled.
    pub fn all() -> Self {
        Self {
            age: true,
            gender: true,
            face_expressions: true,
            face_box: true,
            face_count: true,
        }
    }

    /// Parse detection types from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let types: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();
        let has = |names: &[&str]| types.iter().any(|t| t == "all" || names.contains(&t.as_str()));

        Self {
            age: has(&["age"]),
            gender: has(&["gender"]),
            face_expressions: has(&["expressions", "face-expressions", "face_expressions"]),
            face_box: has(&["box", "face-box", "face_box"]),
            face_count: has(&["count", "face-count", "face_count"]),
        }
    }

    /// Check if `kind` is enabled.
    pub fn contains(&self, kind: DetectionType) -> bool {
        match kind {
            DetectionType::Age => self.age,
            DetectionType::Gender => self.gender,
            DetectionType::FaceExpressions => self.face_expressions,
            DetectionType::FaceBox => self.face_box,
            DetectionType::FaceCount => self.face_count,
        }
    }

    /// Check if at least one detection type is enabled.
    pub fn any_enabled(&self) -> bool {
        self.age || self.gender || self.face_expressions || self.face_box || self.face_count
    }

    /// The enabled types, in a stable order.
    pub fn enabled(&self) -> Vec<DetectionType> {
        DetectionType::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }
}

/// Identity of the local participant, sent along with webhook submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantIdentity {
    /// Fully-qualified meeting name
    pub meeting_fqn: String,
    pub participant_id: String,
    pub participant_name: String,
}

impl Default for ParticipantIdentity {
    fn default() -> Self {
        let name = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            meeting_fqn: "local/meeting".to_string(),
            participant_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            participant_name: name,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, stored as milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_types_parsing() {
        let types = DetectionTypes::from_csv("age,expressions");
        assert!(types.age);
        assert!(types.face_expressions);
        assert!(!types.gender);
        assert!(!types.face_box);

        let types = DetectionTypes::from_csv("all");
        assert_eq!(types, DetectionTypes::all());

        let types = DetectionTypes::from_csv(" Face-Box , count ");
        assert!(types.face_box);
        assert!(types.face_count);
        assert!(!types.age);

        assert!(!DetectionTypes::from_csv("").any_enabled());
    }

    #[test]
    fn test_enabled_order() {
        let types = DetectionTypes::from_csv("count,age");
        assert_eq!(
            types.enabled(),
            vec![DetectionType::Age, DetectionType::FaceCount]
        );
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.capture_interval, Duration::from_millis(1000));
        assert_eq!(config.webhook_send_interval, Duration::from_millis(15_000));
        assert!(config.detection_types.face_expressions);
        assert!(!config.detection_types.face_box);
        assert!(config.webhook.is_none());
        assert!(!config.webhook_enabled());
    }

    #[test]
    fn test_detection_interval_floor() {
        let config = Config {
            capture_interval: Duration::from_millis(5),
            ..Config::default()
        };
        assert_eq!(config.detection_interval(), MIN_CAPTURE_INTERVAL);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            capture_interval: Duration::from_millis(250),
            face_centering_threshold: 5.0,
            webhook: Some(WebhookConfig::new("https://proxy.example.com", None)),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.capture_interval, Duration::from_millis(250));
        assert_eq!(loaded.face_centering_threshold, 5.0);
        assert!(loaded.webhook_enabled());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.capture_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
