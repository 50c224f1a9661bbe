//! Global configuration parsing and validation.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_http_port() -> u16 {
    7742
}

fn default_binary() -> String {
    "claude".into()
}

fn default_read_timeout_seconds() -> u64 {
    120
}

fn default_display_width() -> u32 {
    1024
}

fn default_display_height() -> u32 {
    768
}

fn default_model() -> String {
    "haiku".into()
}

fn default_max_turns() -> u32 {
    10
}

/// Default settings applied to agentic runs when the request omits them.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentDefaults {
    /// Model alias passed to the binary (`haiku`, `sonnet`, `opus`).
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum conversation turns per run.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Screen width reported to the model.
    #[serde(default = "default_display_width")]
    pub display_width: u32,
    /// Screen height reported to the model.
    #[serde(default = "default_display_height")]
    pub display_height: u32,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_turns: default_max_turns(),
            display_width: default_display_width(),
            display_height: default_display_height(),
        }
    }
}

/// Bearer-token authentication settings.
///
/// Authentication is enforced only when at least one key source is present:
/// a keys file on disk or the `RELAY_KEY_HASHES` environment variable.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AuthConfig {
    /// Path to the key-hash file (`hash|name|created` lines, `#` comments).
    #[serde(default)]
    pub keys_file: Option<PathBuf>,
    /// Disable authentication even when key sources exist.
    #[serde(default)]
    pub disabled: bool,
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// HTTP port the axum server binds to.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Name (or path) of the CLI binary driven by the bridge.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Hard per-line timeout when reading the child's output channel.
    #[serde(default = "default_read_timeout_seconds")]
    pub read_timeout_seconds: u64,
    /// Defaults for agentic runs.
    #[serde(default)]
    pub agent: AgentDefaults,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            binary: default_binary(),
            read_timeout_seconds: default_read_timeout_seconds(),
            agent: AgentDefaults::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-line read timeout as a [`Duration`].
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            return Err(AppError::Config("binary must not be empty".into()));
        }

        if self.read_timeout_seconds == 0 {
            return Err(AppError::Config(
                "read_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.agent.max_turns == 0 {
            return Err(AppError::Config(
                "agent.max_turns must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
