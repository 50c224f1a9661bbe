#![forbid(unsafe_code)]

//! `claude-relay` — HTTP/SSE gateway for the Claude Code CLI.
//!
//! The core of the crate is the subprocess stream-protocol bridge in
//! [`bridge`]: it spawns the `claude` binary with piped stdio, parses its
//! newline-delimited JSON output incrementally, executes Computer Use tool
//! actions out-of-process, and feeds results back over stdin — the agentic
//! loop. The [`http`] module exposes the bridge over axum with SSE streaming,
//! and [`client`] offers a thin one-shot in-process client.

pub mod bridge;
pub mod client;
pub mod computer;
pub mod config;
pub mod errors;
pub mod http;
pub mod stream;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
