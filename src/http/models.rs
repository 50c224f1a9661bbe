//! Request and response types for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

fn default_chat_model() -> String {
    "haiku".into()
}

fn default_chat_max_turns() -> u32 {
    1
}

fn default_agent_model() -> String {
    "sonnet".into()
}

fn default_agent_max_turns() -> u32 {
    10
}

/// Request body for the chat endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Prompt to send.
    pub prompt: String,
    /// Optional system instructions.
    #[serde(default)]
    pub system: Option<String>,
    /// Model alias: `haiku` (fast), `sonnet` (balanced), `opus` (powerful).
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Maximum conversation turns.
    #[serde(default = "default_chat_max_turns")]
    pub max_turns: u32,
}

impl ChatRequest {
    /// Check request bounds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the prompt is empty or `max_turns`
    /// falls outside `1..=10`.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::Config("prompt must not be empty".into()));
        }
        if !(1..=10).contains(&self.max_turns) {
            return Err(AppError::Config("max_turns must be between 1 and 10".into()));
        }
        Ok(())
    }
}

/// Request body for the computer-use streaming endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ComputerUseRequest {
    /// Task for the agent to perform on the desktop.
    pub prompt: String,
    /// Model alias; agentic runs default to `sonnet`.
    #[serde(default = "default_agent_model")]
    pub model: String,
    /// Maximum conversation turns.
    #[serde(default = "default_agent_max_turns")]
    pub max_turns: u32,
    /// Optional system instructions.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Screen width reported to the model; global default when absent.
    #[serde(default)]
    pub display_width: Option<u32>,
    /// Screen height reported to the model; global default when absent.
    #[serde(default)]
    pub display_height: Option<u32>,
}

impl ComputerUseRequest {
    /// Check request bounds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the prompt is empty or `max_turns`
    /// falls outside `1..=50`.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::Config("prompt must not be empty".into()));
        }
        if !(1..=50).contains(&self.max_turns) {
            return Err(AppError::Config("max_turns must be between 1 and 50".into()));
        }
        Ok(())
    }
}

/// Response from the chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Response text.
    pub text: String,
    /// Model used.
    pub model: String,
    /// Whether the query failed.
    pub is_error: bool,
    /// Failure detail when `is_error` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Response from the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Whether the binary is on `PATH` and runnable.
    pub available: bool,
    /// Resolved binary path, when found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<String>,
    /// Reported binary version, when runnable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Response from the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status, always `ok`.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            service: "claude-relay",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Catalog entry for one model alias.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    /// Alias accepted by the CLI binary.
    pub id: &'static str,
    /// Official API model identifier.
    pub api_id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// Context window in tokens.
    pub context_window: u32,
    /// Maximum output tokens.
    pub max_output: u32,
    /// Price per million input tokens.
    pub input_price: &'static str,
    /// Price per million output tokens.
    pub output_price: &'static str,
}

/// Response from the models endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    /// Available models.
    pub models: &'static [ModelInfo],
}

/// Model catalog, aligned with the official API lineup.
pub const AVAILABLE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "haiku",
        api_id: "claude-haiku-4-5-20251001",
        name: "Claude Haiku 4.5",
        description: "Our fastest model with near-frontier intelligence",
        context_window: 200_000,
        max_output: 64_000,
        input_price: "$1",
        output_price: "$5",
    },
    ModelInfo {
        id: "sonnet",
        api_id: "claude-sonnet-4-5-20250929",
        name: "Claude Sonnet 4.5",
        description: "Our smart model for complex agents and coding",
        context_window: 200_000,
        max_output: 64_000,
        input_price: "$3",
        output_price: "$15",
    },
    ModelInfo {
        id: "opus",
        api_id: "claude-opus-4-5-20251101",
        name: "Claude Opus 4.5",
        description: "Premium model combining maximum intelligence with practical performance",
        context_window: 200_000,
        max_output: 64_000,
        input_price: "$5",
        output_price: "$25",
    },
];

/// JSON error body returned by failing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable failure detail.
    pub detail: String,
}

impl ErrorBody {
    /// Build an error body from any displayable detail.
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
