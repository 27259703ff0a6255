//! Configuration loading and management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Queue configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Queue-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Default claim timeout for new tasks, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: i64,

    /// Default retry bound for new tasks.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            default_timeout_seconds: default_timeout_seconds(),
            default_max_retries: default_max_retries(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".task-relay/queue.db")
}

fn default_timeout_seconds() -> i64 {
    900 // 15 minutes
}

fn default_max_retries() -> i64 {
    3
}

/// Per-task defaults applied at creation when the caller leaves fields unset.
#[derive(Debug, Clone, Copy)]
pub struct QueueDefaults {
    pub timeout_seconds: i64,
    pub max_retries: i64,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the default location, falling back to
    /// defaults with environment overrides.
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::load(".task-relay/config.yaml") {
            return config;
        }

        let mut config = Self::default();

        if let Ok(db_path) = std::env::var("TASK_RELAY_DB_PATH") {
            config.queue.db_path = PathBuf::from(db_path);
        }

        if let Ok(timeout) = std::env::var("TASK_RELAY_DEFAULT_TIMEOUT") {
            if let Ok(timeout) = timeout.parse() {
                config.queue.default_timeout_seconds = timeout;
            }
        }

        if let Ok(retries) = std::env::var("TASK_RELAY_MAX_RETRIES") {
            if let Ok(retries) = retries.parse() {
                config.queue.default_max_retries = retries;
            }
        }

        config
    }

    /// Task-creation defaults derived from this configuration.
    pub fn defaults(&self) -> QueueDefaults {
        QueueDefaults {
            timeout_seconds: self.queue.default_timeout_seconds,
            max_retries: self.queue.default_max_retries,
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.queue.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.queue.default_timeout_seconds, 900);
        assert_eq!(config.queue.default_max_retries, 3);
    }

    #[test]
    fn parses_partial_yaml() {
        let config: Config = serde_yaml::from_str("queue:\n  default_max_retries: 7\n").unwrap();
        assert_eq!(config.queue.default_max_retries, 7);
        assert_eq!(config.queue.default_timeout_seconds, 900);
    }
}
