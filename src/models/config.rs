//! Process configuration, read once at start-up
//!
//! Loaded from `taxogate.toml` (or an explicit path), then overridden by
//! `TAXOGATE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "taxogate.toml";

pub const DEFAULT_ENDPOINT: &str = "https://api.taxogate.dev/v1/evaluate";

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Which decision backend answers evaluations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    #[default]
    Local,
    Remote,
}

/// Decision backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecisionConfig {
    pub mode: DecisionMode,
    /// Bearer credential for the remote backend
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            mode: DecisionMode::Local,
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl DecisionConfig {
    pub fn wants_remote(&self) -> bool {
        self.mode == DecisionMode::Remote
    }

    /// Remote mode is only usable with a credential
    pub fn use_remote(&self) -> bool {
        self.wants_remote() && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// HTTP boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3456,
        }
    }
}

/// Completion-window estimate for apply-all
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessingConfig {
    pub base_secs: u64,
    pub per_change_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            base_secs: 120,
            per_change_secs: 15,
        }
    }
}

impl ProcessingConfig {
    pub fn estimate(&self, change_count: usize) -> chrono::Duration {
        let secs = self
            .base_secs
            .saturating_add(self.per_change_secs.saturating_mul(change_count as u64));
        chrono::Duration::seconds(secs.min(i64::MAX as u64) as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GovernorConfig {
    pub decision: DecisionConfig,
    pub server: ServerConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

impl GovernorConfig {
    /// Load from an explicit file, or `taxogate.toml` in the working directory.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply `TAXOGATE_*` overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(flag) = lookup("TAXOGATE_REMOTE") {
            self.decision.mode = if parse_flag(&flag) {
                DecisionMode::Remote
            } else {
                DecisionMode::Local
            };
        }
        if let Some(key) = lookup("TAXOGATE_API_KEY") {
            self.decision.api_key = Some(key);
        }
        if let Some(endpoint) = lookup("TAXOGATE_ENDPOINT") {
            self.decision.endpoint = endpoint;
        }
        if let Some(port) = lookup("TAXOGATE_PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "TAXOGATE_PORT",
                value: port.clone(),
            })?;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
