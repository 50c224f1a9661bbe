//! Platform screenshot capture.
//!
//! Shells out to the host's screenshot utility (`screencapture` on macOS,
//! `gnome-screenshot` or `scrot` on Linux), reads the captured PNG, encodes
//! it as base64, and removes the temporary file. Every failure mode —
//! utility missing, non-zero exit, I/O error — yields a [`ToolResult`] with
//! only the error field set.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::action::ToolResult;
use super::executor::{run_utility, UtilityError};

/// Timeout for a single screenshot utility invocation.
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capture a screenshot for the current platform.
///
/// Returns a [`ToolResult`] carrying the base64-encoded PNG on success, or
/// an error-shaped result when no utility is available or capture fails.
#[must_use]
pub fn capture_screenshot() -> ToolResult {
    #[cfg(target_os = "macos")]
    {
        capture_macos()
    }

    #[cfg(target_os = "linux")]
    {
        capture_linux()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        ToolResult::err(format!(
            "Unsupported platform for screenshot: {}",
            std::env::consts::OS
        ))
    }
}

#[cfg(target_os = "macos")]
fn capture_macos() -> ToolResult {
    let temp = match tempfile::Builder::new().suffix(".png").tempfile() {
        Ok(file) => file,
        Err(err) => return ToolResult::err(format!("Screenshot error: {err}")),
    };
    let path = temp.path().to_path_buf();

    // -x suppresses the capture sound.
    match run_utility(
        "screencapture",
        &["-x", &path.to_string_lossy()],
        SCREENSHOT_TIMEOUT,
    ) {
        Ok(output) if output.success => encode_and_cleanup(&path),
        Ok(output) => ToolResult::err(format!("screencapture failed: {}", output.stderr)),
        Err(err) => ToolResult::err(utility_failure("screencapture", &err)),
    }
}

#[cfg(target_os = "linux")]
fn capture_linux() -> ToolResult {
    let path = std::env::temp_dir().join(format!("relay-shot-{}.png", uuid::Uuid::new_v4()));
    let path_str = path.to_string_lossy().to_string();

    // Prefer gnome-screenshot, fall back to scrot.
    let attempts: [(&str, Vec<&str>); 2] = [
        ("gnome-screenshot", vec!["-f", &path_str]),
        ("scrot", vec![&path_str]),
    ];

    for (utility, args) in attempts {
        match run_utility(utility, &args, SCREENSHOT_TIMEOUT) {
            Ok(output) if output.success => return encode_and_cleanup(&path),
            Ok(_) | Err(UtilityError::NotFound(_)) => {}
            Err(err) => return ToolResult::err(utility_failure(utility, &err)),
        }
    }

    ToolResult::err("No screenshot tool available (tried gnome-screenshot, scrot)")
}

/// Read the captured file, base64-encode it, and delete the temporary file.
fn encode_and_cleanup(path: &Path) -> ToolResult {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            remove_quietly(path);
            return ToolResult::err(format!("Screenshot error: {err}"));
        }
    };

    remove_quietly(path);
    ToolResult::ok("Screenshot captured").with_image(BASE64.encode(bytes))
}

fn remove_quietly(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        tracing::debug!(path = %path.display(), %err, "failed to remove screenshot temp file");
    }
}

fn utility_failure(utility: &str, err: &UtilityError) -> String {
    match err {
        UtilityError::NotFound(_) => format!("{utility} not found"),
        UtilityError::TimedOut => format!("{utility} timed out"),
        UtilityError::Io(msg) => format!("{utility} error: {msg}"),
    }
}
