//! Synchronous dispatch of Computer Use actions to host utilities.
//!
//! Pointer and keyboard actions shell out to `cliclick` (macOS) or `xdotool`
//! (Linux). Every utility invocation is bounded by a fixed timeout, and a
//! missing utility is converted into a descriptive error result — never an
//! unhandled failure. Unsupported action/platform combinations likewise
//! yield error results rather than panicking.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use super::action::{ComputerAction, ScrollDirection, ToolResult, MAX_WAIT_SECONDS};
use super::screenshot::capture_screenshot;

/// Timeout for pointer and key-press utility invocations.
const UTILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for text-typing invocations, which scale with text length.
const TYPE_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for a utility to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Outcome of a utility invocation that ran to completion.
#[derive(Debug)]
pub struct UtilityOutput {
    /// Whether the utility exited with status zero.
    pub success: bool,
    /// Captured stderr, trimmed.
    pub stderr: String,
}

/// Failure running a utility at all.
#[derive(Debug)]
pub enum UtilityError {
    /// The utility binary is not installed.
    NotFound(String),
    /// The utility did not exit within the timeout and was killed.
    TimedOut,
    /// Another I/O failure while spawning or reaping the utility.
    Io(String),
}

/// Run an external utility synchronously with a hard timeout.
///
/// Blocks the calling thread while polling for exit. On timeout the child is
/// killed and reaped before returning [`UtilityError::TimedOut`].
///
/// # Errors
///
/// Returns [`UtilityError::NotFound`] when the binary is absent,
/// [`UtilityError::TimedOut`] past the deadline, or [`UtilityError::Io`] for
/// other spawn/wait failures.
pub fn run_utility(
    utility: &str,
    args: &[&str],
    timeout: Duration,
) -> std::result::Result<UtilityOutput, UtilityError> {
    let mut child = Command::new(utility)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                UtilityError::NotFound(utility.to_owned())
            } else {
                UtilityError::Io(err.to_string())
            }
        })?;

    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stderr = child
                    .stderr
                    .take()
                    .and_then(|mut pipe| {
                        use std::io::Read;
                        let mut buf = String::new();
                        pipe.read_to_string(&mut buf).ok().map(|_| buf)
                    })
                    .unwrap_or_default();

                return Ok(UtilityOutput {
                    success: status.success(),
                    stderr: stderr.trim().to_owned(),
                });
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(UtilityError::TimedOut);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(UtilityError::Io(err.to_string()));
            }
        }
    }
}

/// Clamp a requested wait duration to [`MAX_WAIT_SECONDS`].
#[must_use]
pub fn clamp_wait(seconds: f64) -> Duration {
    let clamped = seconds.clamp(0.0, MAX_WAIT_SECONDS);
    Duration::from_secs_f64(clamped)
}

/// Execute one Computer Use tool invocation synchronously.
///
/// The input payload is decoded by its tagged `action` field; an
/// unrecognised action yields an error result.
#[must_use]
pub fn execute_tool(input: &Value) -> ToolResult {
    let action: ComputerAction = match serde_json::from_value(input.clone()) {
        Ok(action) => action,
        Err(err) => {
            let name = input
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or("<missing>");
            debug!(%err, action = name, "undecodable computer action");
            return ToolResult::err(format!("Unknown action: {name}"));
        }
    };

    dispatch(action)
}

fn dispatch(action: ComputerAction) -> ToolResult {
    match action {
        ComputerAction::Screenshot => capture_screenshot(),
        ComputerAction::MouseMove { coordinate } => pointer_action("mouse_move", coordinate),
        ComputerAction::LeftClick { coordinate } => pointer_action("left_click", coordinate),
        ComputerAction::RightClick { coordinate } => pointer_action("right_click", coordinate),
        ComputerAction::DoubleClick { coordinate } => pointer_action("double_click", coordinate),
        ComputerAction::TripleClick { coordinate } => pointer_action("triple_click", coordinate),
        ComputerAction::LeftClickDrag {
            start_coordinate,
            coordinate,
        } => drag_action(start_coordinate, coordinate),
        ComputerAction::Type { text } => type_text(&text),
        ComputerAction::Key { text } => press_key(&text),
        ComputerAction::Scroll {
            coordinate,
            scroll_direction,
            scroll_amount,
        } => scroll_action(coordinate, scroll_direction, scroll_amount),
        ComputerAction::Wait { duration } => {
            std::thread::sleep(clamp_wait(duration));
            ToolResult::ok(format!("Waited {duration} seconds"))
        }
    }
}

// ── Pointer actions ──────────────────────────────────────────────────────────

#[cfg(target_os = "macos")]
fn pointer_action(action: &str, [x, y]: [i64; 2]) -> ToolResult {
    let spec = match action {
        "mouse_move" => format!("m:{x},{y}"),
        "left_click" => format!("c:{x},{y}"),
        "right_click" => format!("rc:{x},{y}"),
        "double_click" => format!("dc:{x},{y}"),
        "triple_click" => format!("tc:{x},{y}"),
        other => return ToolResult::err(format!("Unsupported action on macOS: {other}")),
    };

    match run_utility("cliclick", &[&spec], UTILITY_TIMEOUT) {
        Ok(output) if output.success => ToolResult::ok(format!("Executed {action} at ({x}, {y})")),
        Ok(output) => ToolResult::err(format!("cliclick error: {}", output.stderr)),
        Err(UtilityError::NotFound(_)) => {
            ToolResult::err("cliclick not found. Install with: brew install cliclick")
        }
        Err(err) => ToolResult::err(format!("Mouse action error: {err:?}")),
    }
}

#[cfg(target_os = "linux")]
fn pointer_action(action: &str, [x, y]: [i64; 2]) -> ToolResult {
    let x_str = x.to_string();
    let y_str = y.to_string();

    if let Err(result) = xdotool(&["mousemove", &x_str, &y_str]) {
        return result;
    }

    let click_args: Vec<&str> = match action {
        "mouse_move" => return ToolResult::ok(format!("Executed {action} at ({x}, {y})")),
        "left_click" => vec!["click", "1"],
        "right_click" => vec!["click", "3"],
        "double_click" => vec!["click", "--repeat", "2", "1"],
        "triple_click" => vec!["click", "--repeat", "3", "1"],
        other => return ToolResult::err(format!("Unsupported action on Linux: {other}")),
    };

    match xdotool(&click_args) {
        Ok(()) => ToolResult::ok(format!("Executed {action} at ({x}, {y})")),
        Err(result) => result,
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn pointer_action(_action: &str, _coordinate: [i64; 2]) -> ToolResult {
    unsupported_platform()
}

#[cfg(target_os = "macos")]
fn drag_action([sx, sy]: [i64; 2], [x, y]: [i64; 2]) -> ToolResult {
    let press = format!("dd:{sx},{sy}");
    let release = format!("du:{x},{y}");

    match run_utility("cliclick", &[&press, &release], UTILITY_TIMEOUT) {
        Ok(output) if output.success => {
            ToolResult::ok(format!("Dragged from ({sx}, {sy}) to ({x}, {y})"))
        }
        Ok(output) => ToolResult::err(format!("cliclick error: {}", output.stderr)),
        Err(UtilityError::NotFound(_)) => {
            ToolResult::err("cliclick not found. Install with: brew install cliclick")
        }
        Err(err) => ToolResult::err(format!("Mouse action error: {err:?}")),
    }
}

#[cfg(target_os = "linux")]
fn drag_action([sx, sy]: [i64; 2], [x, y]: [i64; 2]) -> ToolResult {
    let steps: [Vec<String>; 4] = [
        vec!["mousemove".into(), sx.to_string(), sy.to_string()],
        vec!["mousedown".into(), "1".into()],
        vec!["mousemove".into(), x.to_string(), y.to_string()],
        vec!["mouseup".into(), "1".into()],
    ];

    for step in &steps {
        let args: Vec<&str> = step.iter().map(String::as_str).collect();
        if let Err(result) = xdotool(&args) {
            return result;
        }
    }

    ToolResult::ok(format!("Dragged from ({sx}, {sy}) to ({x}, {y})"))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn drag_action(_start: [i64; 2], _end: [i64; 2]) -> ToolResult {
    unsupported_platform()
}

// ── Keyboard actions ─────────────────────────────────────────────────────────

#[cfg(target_os = "macos")]
fn type_text(text: &str) -> ToolResult {
    let spec = format!("t:{text}");

    match run_utility("cliclick", &[&spec], TYPE_TIMEOUT) {
        Ok(output) if output.success => ToolResult::ok(format!("Typed: {}", truncate(text, 50))),
        Ok(output) => ToolResult::err(format!("cliclick error: {}", output.stderr)),
        Err(UtilityError::NotFound(_)) => ToolResult::err("cliclick not found"),
        Err(err) => ToolResult::err(format!("Type error: {err:?}")),
    }
}

#[cfg(target_os = "linux")]
fn type_text(text: &str) -> ToolResult {
    match run_utility("xdotool", &["type", "--", text], TYPE_TIMEOUT) {
        Ok(output) if output.success => ToolResult::ok(format!("Typed: {}", truncate(text, 50))),
        Ok(output) => ToolResult::err(format!("xdotool error: {}", output.stderr)),
        Err(UtilityError::NotFound(_)) => ToolResult::err("xdotool not found"),
        Err(err) => ToolResult::err(format!("Type error: {err:?}")),
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn type_text(_text: &str) -> ToolResult {
    unsupported_platform()
}

/// Map a symbolic key name to a `cliclick` key-press token.
///
/// Known names get their utility-specific tokens; anything else is passed
/// through lower-cased as a best-effort fallback.
#[cfg(target_os = "macos")]
fn macos_key_token(key: &str) -> String {
    match key {
        "Return" => "kp:return".into(),
        "Tab" => "kp:tab".into(),
        "Escape" => "kp:escape".into(),
        "Backspace" => "kp:delete".into(),
        "Delete" => "kp:fwd-delete".into(),
        other => format!("kp:{}", other.to_lowercase()),
    }
}

#[cfg(target_os = "macos")]
fn press_key(key: &str) -> ToolResult {
    let token = macos_key_token(key);

    match run_utility("cliclick", &[&token], UTILITY_TIMEOUT) {
        Ok(output) if output.success => ToolResult::ok(format!("Pressed key: {key}")),
        Ok(output) => ToolResult::err(format!("cliclick error: {}", output.stderr)),
        Err(UtilityError::NotFound(_)) => ToolResult::err("cliclick not found"),
        Err(err) => ToolResult::err(format!("Key press error: {err:?}")),
    }
}

#[cfg(target_os = "linux")]
fn press_key(key: &str) -> ToolResult {
    match run_utility("xdotool", &["key", key], UTILITY_TIMEOUT) {
        Ok(output) if output.success => ToolResult::ok(format!("Pressed key: {key}")),
        Ok(output) => ToolResult::err(format!("xdotool error: {}", output.stderr)),
        Err(UtilityError::NotFound(_)) => ToolResult::err("xdotool not found"),
        Err(err) => ToolResult::err(format!("Key press error: {err:?}")),
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn press_key(_key: &str) -> ToolResult {
    unsupported_platform()
}

// ── Scroll ───────────────────────────────────────────────────────────────────

#[cfg(target_os = "linux")]
fn scroll_action([x, y]: [i64; 2], direction: ScrollDirection, amount: u32) -> ToolResult {
    // X11 maps scroll to buttons 4 (up), 5 (down), 6 (left), 7 (right).
    let button = match direction {
        ScrollDirection::Up => "4",
        ScrollDirection::Down => "5",
        ScrollDirection::Left => "6",
        ScrollDirection::Right => "7",
    };

    let x_str = x.to_string();
    let y_str = y.to_string();
    if let Err(result) = xdotool(&["mousemove", &x_str, &y_str]) {
        return result;
    }

    let repeat = amount.max(1).to_string();
    match xdotool(&["click", "--repeat", &repeat, button]) {
        Ok(()) => ToolResult::ok(format!("Scrolled {direction:?} at ({x}, {y}) by {amount}")),
        Err(result) => result,
    }
}

#[cfg(not(target_os = "linux"))]
fn scroll_action([x, y]: [i64; 2], direction: ScrollDirection, amount: u32) -> ToolResult {
    // No scroll-capable utility on this platform; report the intent so the
    // model can fall back to keyboard navigation.
    ToolResult::ok(format!("Scroll {direction:?} at ({x}, {y}) by {amount}"))
}

// ── Helpers ──────────────────────────────────────────────────────────────────

#[cfg(target_os = "linux")]
fn xdotool(args: &[&str]) -> std::result::Result<(), ToolResult> {
    match run_utility("xdotool", args, UTILITY_TIMEOUT) {
        Ok(output) if output.success => Ok(()),
        Ok(output) => Err(ToolResult::err(format!("xdotool error: {}", output.stderr))),
        Err(UtilityError::NotFound(_)) => Err(ToolResult::err(
            "xdotool not found. Install with: apt install xdotool",
        )),
        Err(err) => Err(ToolResult::err(format!("Mouse action error: {err:?}"))),
    }
}

#[allow(dead_code)]
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_owned()
    } else {
        let prefix: String = text.chars().take(max_chars).collect();
        format!("{prefix}...")
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn unsupported_platform() -> ToolResult {
    ToolResult::err(format!("Unsupported platform: {}", std::env::consts::OS))
}
