//! Computer Use action payloads and results.

use serde::{Deserialize, Serialize};

/// Upper bound applied to `wait` requests, in seconds.
///
/// Bounds adversarial or buggy wait durations so a single tool call cannot
/// stall the loop indefinitely.
pub const MAX_WAIT_SECONDS: f64 = 30.0;

fn default_scroll_amount() -> u32 {
    3
}

fn default_wait_duration() -> f64 {
    1.0
}

/// Scroll direction requested by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    /// Scroll up.
    Up,
    /// Scroll down.
    #[default]
    Down,
    /// Scroll left.
    Left,
    /// Scroll right.
    Right,
}

/// A Computer Use action, tagged by the `action` field of the tool input.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ComputerAction {
    /// Capture the full screen.
    Screenshot,
    /// Move the pointer to a coordinate.
    MouseMove {
        /// Target `[x, y]` position.
        #[serde(default)]
        coordinate: [i64; 2],
    },
    /// Single left click at a coordinate.
    LeftClick {
        /// Target `[x, y]` position.
        #[serde(default)]
        coordinate: [i64; 2],
    },
    /// Single right click at a coordinate.
    RightClick {
        /// Target `[x, y]` position.
        #[serde(default)]
        coordinate: [i64; 2],
    },
    /// Double left click at a coordinate.
    DoubleClick {
        /// Target `[x, y]` position.
        #[serde(default)]
        coordinate: [i64; 2],
    },
    /// Triple left click at a coordinate.
    TripleClick {
        /// Target `[x, y]` position.
        #[serde(default)]
        coordinate: [i64; 2],
    },
    /// Press at one coordinate, drag to another, release.
    LeftClickDrag {
        /// Drag origin `[x, y]`.
        #[serde(default)]
        start_coordinate: [i64; 2],
        /// Drag destination `[x, y]`.
        #[serde(default)]
        coordinate: [i64; 2],
    },
    /// Type literal text.
    Type {
        /// Text to type.
        #[serde(default)]
        text: String,
    },
    /// Press a symbolic key (e.g. `Return`, `Tab`, `ctrl+a`).
    Key {
        /// Key name.
        #[serde(default)]
        text: String,
    },
    /// Scroll at a coordinate.
    Scroll {
        /// Pointer position for the scroll.
        #[serde(default)]
        coordinate: [i64; 2],
        /// Direction to scroll.
        #[serde(default)]
        scroll_direction: ScrollDirection,
        /// Number of scroll ticks.
        #[serde(default = "default_scroll_amount")]
        scroll_amount: u32,
    },
    /// Suspend for a duration (clamped to [`MAX_WAIT_SECONDS`]).
    Wait {
        /// Requested duration in seconds.
        #[serde(default = "default_wait_duration")]
        duration: f64,
    },
}

/// Uniform result of executing one tool invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolResult {
    /// Human-readable output text.
    pub output: String,
    /// Error description when the action failed.
    pub error: Option<String>,
    /// Base64-encoded PNG attached to the result (screenshots).
    pub base64_image: Option<String>,
}

impl ToolResult {
    /// Build a successful result with output text.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// Build a failed result with only the error field set.
    #[must_use]
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach a base64 PNG payload to the result.
    #[must_use]
    pub fn with_image(mut self, base64_image: impl Into<String>) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    /// Whether the result represents a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
