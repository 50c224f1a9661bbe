//! Computer Use action execution.
//!
//! Translates tool-call payloads from the model into invocations of the
//! host's screenshot and input-automation utilities. Execution is
//! intentionally synchronous: each action is one short-lived external
//! command bounded by an explicit timeout, and only one tool executes at a
//! time per loop instance.

pub mod action;
pub mod executor;
pub mod screenshot;

pub use action::{ComputerAction, ScrollDirection, ToolResult, MAX_WAIT_SECONDS};
pub use executor::execute_tool;
pub use screenshot::capture_screenshot;
