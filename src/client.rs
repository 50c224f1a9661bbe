//! Thin in-process client for one-shot queries.
//!
//! Runs the binary in print mode to completion, extracts the result line
//! from its `stream-json` output, and optionally parses the response text as
//! JSON with markdown-fence and embedded-object fallbacks.

use std::path::PathBuf;
use std::process::Stdio;

use regex::Regex;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::bridge::spawner::{find_binary, sanitized_env};
use crate::config::GlobalConfig;
use crate::stream::{decode_line, StreamMessage};
use crate::{AppError, Result};

/// Outcome of a one-shot chat query.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Response text.
    pub text: String,
    /// Model the query ran against.
    pub model: String,
    /// Whether the query failed or returned nothing.
    pub is_error: bool,
    /// Failure detail when `is_error` is set.
    pub error_message: Option<String>,
}

/// One-shot client for the CLI binary.
///
/// Each call spawns a fresh process and waits for it to exit; there is no
/// session state between calls.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    binary_path: PathBuf,
    model: String,
    max_turns: u32,
}

impl ClaudeClient {
    /// Build a client from global defaults plus per-request overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] if the binary cannot be located on `PATH`.
    pub fn new(config: &GlobalConfig, model: Option<String>, max_turns: Option<u32>) -> Result<Self> {
        let binary_path = find_binary(&config.binary).ok_or_else(|| {
            AppError::Spawn(format!(
                "{} binary not found. Install with: npm install -g @anthropic-ai/claude-code",
                config.binary
            ))
        })?;

        Ok(Self {
            binary_path,
            model: model.unwrap_or_else(|| config.agent.model.clone()),
            max_turns: max_turns.unwrap_or(1),
        })
    }

    /// Model alias this client queries.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a prompt and wait for the full response.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] if the process cannot be started. Query
    /// failures (non-zero exit, empty response) are reported through
    /// [`ChatOutcome::is_error`], not as errors.
    pub async fn chat(&self, prompt: &str, system: Option<&str>) -> Result<ChatOutcome> {
        let mut args = vec![
            "-p".to_owned(),
            "--output-format".to_owned(),
            "stream-json".to_owned(),
            "--verbose".to_owned(),
            "--model".to_owned(),
            self.model.clone(),
            "--max-turns".to_owned(),
            self.max_turns.to_string(),
        ];

        if let Some(system) = system {
            args.push("--system-prompt".to_owned());
            args.push(system.to_owned());
        }

        args.push("--".to_owned());
        args.push(prompt.to_owned());

        let output = Command::new(&self.binary_path)
            .args(&args)
            .env_clear()
            .envs(sanitized_env())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| AppError::Spawn(format!("failed to run binary: {err}")))?;

        if !output.status.success() {
            let mut detail = format!("Exit code {}", output.status.code().unwrap_or(-1));
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                detail.push_str(&format!("\nstderr: {}", clip(&stderr, 500)));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                detail.push_str(&format!("\nstdout: {}", clip(&stdout, 500)));
            }

            return Ok(ChatOutcome {
                text: String::new(),
                model: self.model.clone(),
                is_error: true,
                error_message: Some(detail),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = parse_result_text(&stdout).unwrap_or_default();
        let is_error = text.is_empty();

        Ok(ChatOutcome {
            text,
            model: self.model.clone(),
            is_error,
            error_message: is_error.then(|| "Empty response".to_owned()),
        })
    }

    /// Send a prompt and parse the response text as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tool`] if the query failed, or
    /// [`AppError::Stream`] if no JSON could be extracted from the response.
    pub async fn chat_json(&self, prompt: &str, system: Option<&str>) -> Result<Value> {
        let outcome = self.chat(prompt, system).await?;

        if outcome.is_error {
            return Err(AppError::Tool(format!(
                "query failed: {}",
                outcome.error_message.unwrap_or_default()
            )));
        }

        extract_json(&outcome.text)
    }
}

/// Extract the final result text from `stream-json` output.
///
/// Scans the line-delimited output for the terminal `result` message,
/// skipping undecodable lines.
#[must_use]
pub fn parse_result_text(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        if let Some(StreamMessage::Result { result, .. }) = decode_line(line) {
            return Some(result);
        }
    }
    None
}

/// Extract a JSON object from response text.
///
/// Tries, in order: direct parse, a fenced ```` ```json ```` block, and the
/// first embedded `{…}` span.
///
/// # Errors
///
/// Returns [`AppError::Stream`] when none of the strategies produce valid
/// JSON.
pub fn extract_json(text: &str) -> Result<Value> {
    let text = text.trim();

    // Strategy 1: the whole response is JSON.
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    // Strategy 2: a markdown code fence.
    if let Ok(fence) = Regex::new(r"(?s)```(?:json)?\s*(.*?)```") {
        if let Some(caps) = fence.captures(text) {
            if let Some(inner) = caps.get(1) {
                if let Ok(value) = serde_json::from_str(inner.as_str().trim()) {
                    return Ok(value);
                }
            }
        }
    }

    // Strategy 3: the first embedded object span.
    if let Ok(object) = Regex::new(r"(?s)\{.*\}") {
        if let Some(found) = object.find(text) {
            if let Ok(value) = serde_json::from_str(found.as_str()) {
                return Ok(value);
            }
        }
    }

    debug!("no JSON extractable from response text");
    Err(AppError::Stream(format!(
        "could not extract JSON from response: {}",
        clip(text, 200)
    )))
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
