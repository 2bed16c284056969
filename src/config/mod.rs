//! Runtime configuration
//!
//! ## Loading Order
//!
//! 1. Explicit path (`--config` flag)
//! 2. `ECOFLEET_CONFIG` environment variable (path to TOML file)
//! 3. `ecofleet.toml` in the current working directory
//! 4. Built-in defaults
//!
//! Every collaborator handle (store, queue, gateway, advisory backend) is
//! constructed once at startup from this config and injected into the stages.
//! There are no lazily initialized process globals: a missing collaborator is
//! discovered - and logged - before the first message arrives.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::feedback::FeedbackPolicy;
use crate::store::PartitionKeyField;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EcoFleetConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub queue: QueueConfig,
    pub advisor: AdvisorConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP bind address
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Record store directory
    pub path: PathBuf,
    /// Which record field the store partitions on
    pub partition_key: PartitionKeyField,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/telemetry-db"),
            partition_key: PartitionKeyField::Id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Advice queue directory
    pub dir: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/advice-queue"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Generative backend endpoint; rule table only when unset
    pub backend_url: Option<String>,
    /// Model name passed to the backend
    pub model: String,
    /// Bound on one backend call (seconds)
    pub timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            model: "llama3.2".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// When to push verdicts back to vehicles
    pub policy: FeedbackPolicy,
    /// Device-messaging gateway endpoint; downlink disabled when unset
    pub gateway_url: Option<String>,
    /// Bound on one downlink send (seconds)
    pub timeout_secs: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            policy: FeedbackPolicy::WarnAndCritical,
            gateway_url: None,
            timeout_secs: 5,
        }
    }
}

impl EcoFleetConfig {
    /// Load configuration following the documented order.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var("ECOFLEET_CONFIG") {
            return Self::from_file(Path::new(&path));
        }
        let default_path = Path::new("ecofleet.toml");
        if default_path.exists() {
            return Self::from_file(default_path);
        }
        info!("No config file found - using built-in defaults");
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = toml::from_str(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EcoFleetConfig::default();
        assert_eq!(config.server.addr, "0.0.0.0:8080");
        assert_eq!(config.store.partition_key, PartitionKeyField::Id);
        assert!(config.advisor.backend_url.is_none());
        assert_eq!(config.feedback.policy, FeedbackPolicy::WarnAndCritical);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            addr = "127.0.0.1:9090"

            [store]
            path = "/var/lib/ecofleet/db"
            partition_key = "vehicle_id"

            [queue]
            dir = "/var/lib/ecofleet/advice-queue"

            [advisor]
            backend_url = "http://llm:11434"
            model = "qwen2.5:3b"
            timeout_secs = 20

            [feedback]
            policy = "always"
            gateway_url = "http://gateway:9000"
        "#;
        let config: EcoFleetConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:9090");
        assert_eq!(config.store.partition_key, PartitionKeyField::VehicleId);
        assert_eq!(config.advisor.backend_url.as_deref(), Some("http://llm:11434"));
        assert_eq!(config.advisor.timeout_secs, 20);
        assert_eq!(config.feedback.policy, FeedbackPolicy::Always);
        // Unset field keeps its default
        assert_eq!(config.feedback.timeout_secs, 5);
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: EcoFleetConfig = toml::from_str("[server]\naddr = \"0.0.0.0:8000\"\n").unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:8000");
        assert_eq!(config.queue.dir, PathBuf::from("data/advice-queue"));
    }
}
