//! Streaming response adapter for plain chat.
//!
//! A restricted, one-directional variant of the agentic loop: the prompt is
//! passed as a trailing process argument, the input channel is unused after
//! spawn, and only text deltas and the terminal result are classified. When
//! the upstream emits no incremental deltas, the consolidated result text is
//! surfaced as a single chunk so a successful stream is never empty.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::stream::wire::{Delta, StreamEventBody, StreamMessage};
use crate::stream::{decode_line, StreamCodec};
use crate::AppError;

use super::events::ChatEvent;
use super::spawner::{find_binary, spawn_process};

/// Configuration for one streaming chat run.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Name (or path) of the CLI binary.
    pub binary: String,
    /// Model alias passed to the binary.
    pub model: String,
    /// Maximum conversation turns.
    pub max_turns: u32,
    /// Optional system instructions.
    pub system_prompt: Option<String>,
    /// Hard per-line timeout on the output channel.
    pub read_timeout: Duration,
}

impl ChatConfig {
    /// Build a chat configuration from global defaults.
    #[must_use]
    pub fn from_global(config: &GlobalConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.agent.model.clone(),
            max_turns: 1,
            system_prompt: None,
            read_timeout: config.read_timeout(),
        }
    }

    /// Command-line arguments including the trailing prompt.
    #[must_use]
    pub fn args(&self, prompt: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_owned(),
            "--output-format".to_owned(),
            "stream-json".to_owned(),
            "--include-partial-messages".to_owned(),
            "--verbose".to_owned(),
            "--model".to_owned(),
            self.model.clone(),
            "--max-turns".to_owned(),
            self.max_turns.to_string(),
        ];

        if let Some(system) = &self.system_prompt {
            args.push("--system-prompt".to_owned());
            args.push(system.clone());
        }

        args.push("--".to_owned());
        args.push(prompt.to_owned());
        args
    }
}

/// Run a streaming chat, emitting [`ChatEvent`]s through `events`.
///
/// The sequence is `start`, zero or more `chunk`s, an optional `error`, and
/// a final `end`. The child process is shut down on every exit path.
pub async fn run_chat_stream(
    config: ChatConfig,
    prompt: String,
    events: mpsc::Sender<ChatEvent>,
    cancel: CancellationToken,
) {
    let Some(binary_path) = find_binary(&config.binary) else {
        emit(
            &events,
            ChatEvent::Error {
                message: format!("{} binary not found on PATH", config.binary),
            },
        )
        .await;
        emit(&events, ChatEvent::End).await;
        return;
    };

    let args = config.args(&prompt);
    let mut process = match spawn_process(&binary_path, &args) {
        Ok(process) => process,
        Err(err) => {
            emit(
                &events,
                ChatEvent::Error {
                    message: err.to_string(),
                },
            )
            .await;
            emit(&events, ChatEvent::End).await;
            return;
        }
    };

    // The prompt travelled as an argument; this stream never writes stdin.
    drop(process.stdin.take());

    emit(&events, ChatEvent::Start).await;

    if let Some(stdout) = process.stdout.take() {
        relay_chat_io(stdout, config.read_timeout, &events, &cancel).await;
    }

    if let Err(err) = process.shutdown().await {
        warn!(%err, "chat child process shutdown failed");
    }

    emit(&events, ChatEvent::End).await;
}

/// Spawn [`run_chat_stream`] as a background task, returning the event stream.
#[must_use]
pub fn spawn_chat_stream(
    config: ChatConfig,
    prompt: String,
    cancel: CancellationToken,
) -> mpsc::Receiver<ChatEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(run_chat_stream(config, prompt, tx, cancel));
    rx
}

/// Relay decoded chunks from an output stream until result or EOF.
///
/// Public so the adapter can be exercised against any byte stream.
pub async fn relay_chat_io<R>(
    stdout: R,
    read_timeout: Duration,
    events: &mpsc::Sender<ChatEvent>,
    cancel: &CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(stdout, StreamCodec::new());
    let mut has_streamed = false;

    loop {
        if events.is_closed() {
            debug!("chat stream: event receiver dropped, stopping");
            return;
        }

        let item = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("chat stream: cancellation received");
                return;
            }

            item = tokio::time::timeout(read_timeout, framed.next()) => item,
        };

        let line = match item {
            Err(_elapsed) => {
                emit(
                    events,
                    ChatEvent::Error {
                        message: "Timeout waiting for response".into(),
                    },
                )
                .await;
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(AppError::Stream(msg)))) => {
                warn!(error = %msg, "chat stream: skipping oversized line");
                continue;
            }
            Ok(Some(Err(err))) => {
                emit(
                    events,
                    ChatEvent::Error {
                        message: format!("stream error: {err}"),
                    },
                )
                .await;
                return;
            }
            Ok(Some(Ok(line))) => line,
        };

        let Some(message) = decode_line(&line) else {
            continue;
        };

        match message {
            StreamMessage::StreamEvent {
                event:
                    StreamEventBody::ContentBlockDelta {
                        delta: Delta::TextDelta { text },
                        ..
                    },
            } if !text.is_empty() => {
                has_streamed = true;
                emit(events, ChatEvent::Chunk { text }).await;
            }

            StreamMessage::Result { result, .. } => {
                // No deltas arrived — surface the consolidated text so the
                // caller never receives an empty stream on success.
                if !has_streamed && !result.is_empty() {
                    emit(events, ChatEvent::Chunk { text: result }).await;
                }
                info!("chat stream finished");
                return;
            }

            _ => {}
        }
    }
}

async fn emit(events: &mpsc::Sender<ChatEvent>, event: ChatEvent) {
    if events.send(event).await.is_err() {
        debug!("chat event receiver dropped; caller disconnected");
    }
}
