//! Child process spawning and lifecycle.
//!
//! Locates the CLI binary on `PATH`, spawns it with piped stdio and a
//! sanitized environment, and wraps the handle in [`AgentProcess`] whose
//! [`shutdown`](AgentProcess::shutdown) is idempotent and runs on every
//! exit path. `kill_on_drop(true)` backstops cleanup if a handle is dropped
//! without an explicit shutdown.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use crate::{AppError, Result};

use super::AgentConfig;

/// Ambient environment variables stripped before spawning the child.
///
/// The binary manages its own OAuth credentials; an inherited
/// `ANTHROPIC_API_KEY` (e.g. loaded from dotenv by the embedding service)
/// conflicts with that and is removed from the child's environment.
pub const STRIPPED_ENV_VARS: &[&str] = &["ANTHROPIC_API_KEY"];

/// Build the child's environment as an explicit derived map.
///
/// A copy of the ambient environment with [`STRIPPED_ENV_VARS`] removed —
/// the parent's environment is never mutated.
#[must_use]
pub fn sanitized_env() -> Vec<(String, String)> {
    std::env::vars()
        .filter(|(key, _)| !STRIPPED_ENV_VARS.contains(&key.as_str()))
        .collect()
}

/// Locate a binary by name on `PATH`.
///
/// A name containing a path separator is checked directly; otherwise each
/// `PATH` entry is scanned for an executable file of that name.
#[must_use]
pub fn find_binary(name: &str) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Command-line arguments for an agentic (two-way stream-json) run.
///
/// The prompt is not included; it is delivered over stdin as the initial
/// user message.
#[must_use]
pub fn agent_args(config: &AgentConfig) -> Vec<String> {
    let mut args = vec![
        "-p".to_owned(),
        "--input-format".to_owned(),
        "stream-json".to_owned(),
        "--output-format".to_owned(),
        "stream-json".to_owned(),
        "--include-partial-messages".to_owned(),
        "--verbose".to_owned(),
        "--model".to_owned(),
        config.model.clone(),
        "--max-turns".to_owned(),
        config.max_turns.to_string(),
    ];

    if let Some(system) = &config.system_prompt {
        args.push("--system-prompt".to_owned());
        args.push(system.clone());
    }

    args
}

/// The spawned child and its channels.
///
/// Owned exclusively by one loop instance for the lifetime of one logical
/// request — no pooling, no cross-request reuse. `stdin` and `stdout` are
/// `Option`s so the driver can take them while retaining the handle for
/// shutdown.
#[derive(Debug)]
pub struct AgentProcess {
    child: Child,
    /// Input channel (write-only); `None` once taken or closed.
    pub stdin: Option<ChildStdin>,
    /// Output channel (read-only); `None` once taken.
    pub stdout: Option<ChildStdout>,
}

impl AgentProcess {
    /// OS process identifier, when the child is still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Close the input channel (if still open) and wait for process exit.
    ///
    /// Runs on every loop exit path — normal, error, timeout, cancellation —
    /// and is idempotent: a second call observes the already-reaped status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] if waiting on the process fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        // Dropping stdin closes the pipe, signalling EOF to the child.
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .await
            .map_err(|err| AppError::Spawn(format!("failed to wait for child exit: {err}")))?;

        debug!(?status, "child process reaped");
        Ok(())
    }
}

/// Spawn the binary with piped stdio and the sanitized environment.
///
/// # Errors
///
/// Returns [`AppError::Spawn`] on OS spawn failure or when a requested pipe
/// cannot be captured.
pub fn spawn_process(binary_path: &Path, args: &[String]) -> Result<AgentProcess> {
    let mut cmd = Command::new(binary_path);
    cmd.args(args)
        .env_clear()
        .envs(sanitized_env())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Spawn(format!("failed to spawn {}: {err}", binary_path.display())))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture child stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture child stdout".into()))?;

    info!(
        pid = child.id().unwrap_or(0),
        binary = %binary_path.display(),
        "child process spawned"
    );

    Ok(AgentProcess {
        child,
        stdin: Some(stdin),
        stdout: Some(stdout),
    })
}
