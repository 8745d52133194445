//! Server configuration.
//!
//! Loaded from an optional TOML file; every field has a default, so an empty
//! file (or none at all) yields a working configuration.
//!
//! ```toml
//! [kubernetes]
//! kubeconfig = "/etc/k8s-mcp/kubeconfig"
//! context = "staging"
//! connect_timeout_secs = 5
//! read_timeout_secs = 30
//!
//! [tools]
//! call_timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use control_plane::ConnectOptions;
use observability::{parse_level, TracingConfig};

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading or writing the configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_level() -> String {
    "info".to_string()
}

/// How to reach the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// Kubeconfig file; inferred when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context; the current context when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Deadline for each control-plane call made by a tool.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a configuration file. Not validated here: overrides may still
    /// be applied, so call [`validate`](Self::validate) on the final value.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kubernetes.connect_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "kubernetes.connect_timeout_secs must be greater than zero",
            ));
        }
        if self.kubernetes.read_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "kubernetes.read_timeout_secs must be greater than zero",
            ));
        }
        if self.tools.call_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "tools.call_timeout_secs must be greater than zero",
            ));
        }
        if parse_level(&self.logging.level).is_none() {
            return Err(ConfigError::validation(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.call_timeout_secs)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            kubeconfig: self.kubernetes.kubeconfig.clone(),
            context: self.kubernetes.context.clone(),
            connect_timeout: Duration::from_secs(self.kubernetes.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.kubernetes.read_timeout_secs),
        }
    }

    /// Tracing setup for this configuration. An unknown level falls back to
    /// the default.
    pub fn tracing_config(&self) -> TracingConfig {
        let mut tracing = TracingConfig::default().with_json(self.logging.json);
        if let Some(level) = parse_level(&self.logging.level) {
            tracing = tracing.with_level(level);
        }
        tracing
    }
}
