//! Normalized event sequences emitted by the bridge to its callers.

use serde::Serialize;
use serde_json::Value;

use crate::computer::ToolResult;
use crate::stream::ToolInvocation;

/// Event yielded by the agentic loop driver.
///
/// The sequence is order-preserving and forward-only: `start`, then zero or
/// more `text` / `tool_use` / `tool_result`, then exactly one terminal
/// `end` or `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// The loop has started and the initial prompt was delivered.
    Start,
    /// Incremental response text from the model.
    Text {
        /// The text fragment.
        text: String,
    },
    /// The model invoked a tool.
    ToolUse {
        /// Invocation identifier.
        id: String,
        /// Tool name.
        name: String,
        /// Accumulated input payload.
        input: Value,
    },
    /// A tool invocation completed.
    ToolResult {
        /// Invocation identifier the result belongs to.
        id: String,
        /// Execution outcome summary.
        result: ToolOutcome,
    },
    /// The run finished with a final response.
    End {
        /// Final response text.
        result: String,
    },
    /// The run failed; no further events follow.
    Error {
        /// Failure description.
        message: String,
    },
}

/// Caller-facing summary of one tool execution.
///
/// Image payloads are flagged rather than embedded; the full base64 image is
/// only sent back to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    /// Human-readable output text.
    pub output: String,
    /// Error description when the action failed.
    pub error: Option<String>,
    /// Whether an image was attached to the result.
    pub has_image: bool,
}

impl From<&ToolResult> for ToolOutcome {
    fn from(result: &ToolResult) -> Self {
        Self {
            output: result.output.clone(),
            error: result.error.clone(),
            has_image: result.base64_image.is_some(),
        }
    }
}

/// Event yielded by the streaming response adapter.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The stream has started.
    Start,
    /// A chunk of response text.
    Chunk {
        /// The text chunk.
        text: String,
    },
    /// The stream completed.
    End,
    /// The stream failed.
    Error {
        /// Failure description.
        message: String,
    },
}

/// Optional observer notified as tool invocations are resolved.
///
/// Both methods are invoked synchronously at the same points the
/// corresponding [`LoopEvent`]s are produced; implementations must be
/// side-effect-light and non-blocking to preserve the loop's ordering
/// guarantees.
pub trait ToolObserver: Send + Sync {
    /// Called when a tool invocation is about to execute.
    fn on_tool_invoked(&self, invocation: &ToolInvocation) {
        let _ = invocation;
    }

    /// Called when a tool invocation has completed.
    fn on_tool_completed(&self, id: &str, result: &ToolResult) {
        let _ = (id, result);
    }
}
