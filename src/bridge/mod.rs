//! Subprocess stream-protocol bridge.
//!
//! Owns the child process lifecycle and the agentic read/execute/respond
//! cycle: [`spawner`] locates and launches the binary with sanitized
//! environment and piped stdio, [`driver`] runs the bidirectional tool
//! loop, and [`chat`] is the one-directional streaming variant for plain
//! conversation.

pub mod chat;
pub mod driver;
pub mod events;
pub mod spawner;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::computer::{self, ToolResult};
use crate::config::GlobalConfig;

pub use chat::{run_chat_stream, spawn_chat_stream, ChatConfig};
pub use driver::{run_agent_loop, spawn_agent_loop};
pub use events::{ChatEvent, LoopEvent, ToolObserver, ToolOutcome};
pub use spawner::AgentProcess;

/// Configuration for one agentic run.
///
/// Immutable for the duration of the loop; created by the caller from the
/// global defaults plus per-request overrides.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Name (or path) of the CLI binary.
    pub binary: String,
    /// Model alias passed to the binary.
    pub model: String,
    /// Maximum conversation turns.
    pub max_turns: u32,
    /// Optional system instructions.
    pub system_prompt: Option<String>,
    /// Screen width reported to the model.
    pub display_width: u32,
    /// Screen height reported to the model.
    pub display_height: u32,
    /// Hard per-line timeout on the output channel.
    pub read_timeout: Duration,
    /// Whether to send an initial screenshot with the opening prompt.
    pub initial_screenshot: bool,
}

impl AgentConfig {
    /// Build an agent configuration from global defaults.
    #[must_use]
    pub fn from_global(config: &GlobalConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.agent.model.clone(),
            max_turns: config.agent.max_turns,
            system_prompt: None,
            display_width: config.agent.display_width,
            display_height: config.agent.display_height,
            read_timeout: config.read_timeout(),
            initial_screenshot: true,
        }
    }
}

/// Seam between the loop driver and tool execution.
///
/// The driver resolves tool names and sequencing; implementations only run
/// one `computer` payload and return its uniform result. Implementations are
/// expected to be blocking-but-bounded, per the executor contract.
pub trait ActionRunner: Send + Sync {
    /// Execute one tool-call input payload.
    fn run(&self, input: &Value) -> ToolResult;
}

/// Production runner backed by the platform action executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformRunner;

impl ActionRunner for PlatformRunner {
    fn run(&self, input: &Value) -> ToolResult {
        computer::execute_tool(input)
    }
}

/// Shared handle to a runner.
pub type SharedRunner = Arc<dyn ActionRunner>;
