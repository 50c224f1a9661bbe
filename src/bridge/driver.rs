//! Agentic loop driver.
//!
//! Drives the read/execute/respond cycle against the child process:
//! reads one NDJSON line at a time from the output channel under a hard
//! per-line timeout, folds tool-use announcements into the accumulator,
//! executes ready invocations in announcement order, writes each reply back
//! on the input channel before the next read, and emits the normalized
//! [`LoopEvent`] sequence to the caller.
//!
//! Every exit path — terminal result, end-of-stream, timeout, write
//! failure, caller cancellation — runs the process shutdown step.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::computer::{capture_screenshot, ToolResult};
use crate::stream::wire::{ContentBlock, Delta, OutboundMessage, StreamEventBody, StreamMessage};
use crate::stream::{decode_line, StreamCodec, ToolInvocation, ToolUseAccumulator};
use crate::AppError;

use super::events::{LoopEvent, ToolObserver, ToolOutcome};
use super::spawner::{agent_args, find_binary, spawn_process};
use super::{AgentConfig, SharedRunner};

/// Why the read loop stopped.
enum LoopExit {
    /// A terminal result message arrived; `End` has been emitted.
    Finished,
    /// The caller cancelled; no terminal event is owed.
    Cancelled,
    /// A fatal condition; `Error` has been emitted.
    Errored,
}

/// Run the agentic loop, emitting [`LoopEvent`]s through `events`.
///
/// All failures surface as terminal [`LoopEvent::Error`] events rather than
/// return values; the function only stops emitting once a terminal event has
/// been sent (or the caller cancelled / dropped the receiver). The child
/// process is shut down on every exit path.
pub async fn run_agent_loop(
    config: AgentConfig,
    prompt: String,
    runner: SharedRunner,
    observer: Option<Arc<dyn ToolObserver>>,
    events: mpsc::Sender<LoopEvent>,
    cancel: CancellationToken,
) {
    let Some(binary_path) = find_binary(&config.binary) else {
        emit(
            &events,
            LoopEvent::Error {
                message: format!("{} binary not found on PATH", config.binary),
            },
        )
        .await;
        return;
    };

    let args = agent_args(&config);
    let mut process = match spawn_process(&binary_path, &args) {
        Ok(process) => process,
        Err(err) => {
            emit(
                &events,
                LoopEvent::Error {
                    message: err.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let Some(mut stdin) = process.stdin.take() else {
        emit(
            &events,
            LoopEvent::Error {
                message: "child stdin unavailable".into(),
            },
        )
        .await;
        cleanup(&mut process).await;
        return;
    };
    let Some(stdout) = process.stdout.take() else {
        emit(
            &events,
            LoopEvent::Error {
                message: "child stdout unavailable".into(),
            },
        )
        .await;
        cleanup(&mut process).await;
        return;
    };

    // Opening user message: optional screenshot for visual context, then the
    // prompt annotated with the display dimensions.
    let initial = initial_message(&config, &prompt);
    if let Err(err) = write_message(&mut stdin, &initial).await {
        emit(
            &events,
            LoopEvent::Error {
                message: format!("failed to send initial message: {err}"),
            },
        )
        .await;
        cleanup(&mut process).await;
        return;
    }

    emit(&events, LoopEvent::Start).await;

    run_agent_io(
        stdout,
        &mut stdin,
        config.read_timeout,
        runner,
        observer,
        &events,
        &cancel,
    )
    .await;

    drop(stdin);
    cleanup(&mut process).await;
}

/// Spawn [`run_agent_loop`] as a background task, returning the event stream.
///
/// Dropping the receiver stops the loop at its next emission; the spawned
/// task still performs process cleanup.
#[must_use]
pub fn spawn_agent_loop(
    config: AgentConfig,
    prompt: String,
    runner: SharedRunner,
    observer: Option<Arc<dyn ToolObserver>>,
    cancel: CancellationToken,
) -> mpsc::Receiver<LoopEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(run_agent_loop(config, prompt, runner, observer, tx, cancel));
    rx
}

/// Core read/execute/respond cycle over already-established channels.
///
/// Separated from process management so the cycle can be exercised against
/// any byte streams. Emits events through `events` and returns once a
/// terminal condition is reached; the caller owns channel/process cleanup.
pub async fn run_agent_io<R, W>(
    stdout: R,
    stdin: &mut W,
    read_timeout: Duration,
    runner: SharedRunner,
    observer: Option<Arc<dyn ToolObserver>>,
    events: &mpsc::Sender<LoopEvent>,
    cancel: &CancellationToken,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut framed = FramedRead::new(stdout, StreamCodec::new());
    let mut accumulator = ToolUseAccumulator::new();

    let exit = loop {
        if events.is_closed() {
            debug!("agent loop: event receiver dropped, stopping");
            break LoopExit::Cancelled;
        }

        let item = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("agent loop: cancellation received");
                break LoopExit::Cancelled;
            }

            item = tokio::time::timeout(read_timeout, framed.next()) => item,
        };

        let line = match item {
            Err(_elapsed) => {
                emit(
                    events,
                    LoopEvent::Error {
                        message: "Timeout waiting for response".into(),
                    },
                )
                .await;
                break LoopExit::Errored;
            }
            Ok(None) => {
                // End of stream without a terminal result.
                emit(
                    events,
                    LoopEvent::Error {
                        message: "stream closed before a result message".into(),
                    },
                )
                .await;
                break LoopExit::Errored;
            }
            Ok(Some(Err(AppError::Stream(msg)))) => {
                // Oversized line — skip it, keep the loop alive.
                warn!(error = %msg, "agent loop: skipping oversized line");
                continue;
            }
            Ok(Some(Err(err))) => {
                emit(
                    events,
                    LoopEvent::Error {
                        message: format!("stream error: {err}"),
                    },
                )
                .await;
                break LoopExit::Errored;
            }
            Ok(Some(Ok(line))) => line,
        };

        let Some(message) = decode_line(&line) else {
            continue;
        };

        match classify(message, &mut accumulator, events).await {
            Classified::Continue => {}
            Classified::ExecuteTools => {
                let ready = accumulator.finish_turn();
                if let Err(exit) = execute_turn(
                    ready,
                    stdin,
                    runner.as_ref(),
                    observer.as_deref(),
                    events,
                )
                .await
                {
                    break exit;
                }
            }
            Classified::Finished => break LoopExit::Finished,
        }
    };

    match exit {
        LoopExit::Finished => info!("agent loop finished"),
        LoopExit::Cancelled => info!("agent loop cancelled by caller"),
        LoopExit::Errored => info!("agent loop terminated with error"),
    }
}

/// What a classified stream message means for the loop state machine.
enum Classified {
    /// Stay in `AwaitingOutput`.
    Continue,
    /// The turn is complete; resolve accumulated tool invocations.
    ExecuteTools,
    /// Terminal result observed; `End` has been emitted.
    Finished,
}

/// Fold one decoded message into loop state, emitting text events inline.
async fn classify(
    message: StreamMessage,
    accumulator: &mut ToolUseAccumulator,
    events: &mpsc::Sender<LoopEvent>,
) -> Classified {
    match message {
        StreamMessage::StreamEvent { event } => match event {
            StreamEventBody::ContentBlockStart {
                index,
                content_block: ContentBlock::ToolUse { id, name, input },
            } => {
                accumulator.begin(index, &id, &name, input);
                Classified::Continue
            }
            StreamEventBody::ContentBlockDelta { index, delta } => {
                match delta {
                    Delta::TextDelta { text } if !text.is_empty() => {
                        emit(events, LoopEvent::Text { text }).await;
                    }
                    Delta::InputJsonDelta { partial_json } => {
                        accumulator.append_fragment(index, &partial_json);
                    }
                    Delta::TextDelta { .. } | Delta::Unknown => {}
                }
                Classified::Continue
            }
            StreamEventBody::MessageStop if !accumulator.is_empty() => Classified::ExecuteTools,
            _ => Classified::Continue,
        },

        StreamMessage::Assistant { message } => {
            let mut saw_tool_use = false;
            for block in message.content {
                if let ContentBlock::ToolUse { id, name, input } = block {
                    accumulator.supply_whole(&id, &name, input);
                    saw_tool_use = true;
                }
            }
            if saw_tool_use {
                Classified::ExecuteTools
            } else {
                Classified::Continue
            }
        }

        StreamMessage::Result { result, .. } => {
            emit(events, LoopEvent::End { result }).await;
            Classified::Finished
        }

        StreamMessage::System { subtype, session_id } => {
            debug!(subtype, session_id, "agent session initialized");
            Classified::Continue
        }

        StreamMessage::User | StreamMessage::Unknown => Classified::Continue,
    }
}

/// Resolve a turn's ready invocations strictly in announcement order.
///
/// For each invocation: emit `tool_use`, execute (or synthesize an
/// unknown-tool error), emit `tool_result`, and write the reply message to
/// the input channel — all before the next invocation, and all before the
/// loop reads further output.
async fn execute_turn<W>(
    ready: Vec<ToolInvocation>,
    stdin: &mut W,
    runner: &dyn super::ActionRunner,
    observer: Option<&dyn ToolObserver>,
    events: &mpsc::Sender<LoopEvent>,
) -> std::result::Result<(), LoopExit>
where
    W: AsyncWrite + Unpin,
{
    for invocation in ready {
        emit(
            events,
            LoopEvent::ToolUse {
                id: invocation.id.clone(),
                name: invocation.name.clone(),
                input: invocation.input.clone(),
            },
        )
        .await;

        if let Some(observer) = observer {
            observer.on_tool_invoked(&invocation);
        }

        let result = if invocation.name == "computer" {
            runner.run(&invocation.input)
        } else {
            ToolResult::err(format!("Unknown tool: {}", invocation.name))
        };

        if let Some(observer) = observer {
            observer.on_tool_completed(&invocation.id, &result);
        }

        emit(
            events,
            LoopEvent::ToolResult {
                id: invocation.id.clone(),
                result: ToolOutcome::from(&result),
            },
        )
        .await;

        let reply = tool_reply(&invocation.id, &result);
        if let Err(err) = write_message(stdin, &reply).await {
            emit(
                events,
                LoopEvent::Error {
                    message: format!("failed to send tool result: {err}"),
                },
            )
            .await;
            return Err(LoopExit::Errored);
        }
    }

    Ok(())
}

/// Build the opening user message for an agentic run.
fn initial_message(config: &AgentConfig, prompt: &str) -> OutboundMessage {
    let mut content = Vec::new();

    if config.initial_screenshot {
        let shot = capture_screenshot();
        if let Some(image) = shot.base64_image {
            content.push(ContentBlock::png_image(image));
        } else if let Some(err) = shot.error {
            debug!(error = err, "initial screenshot unavailable");
        }
    }

    content.push(ContentBlock::text(format!(
        "Screen size: {}x{} pixels.\n\n{prompt}",
        config.display_width, config.display_height
    )));

    OutboundMessage::user(content)
}

/// Build the reply message for one resolved invocation.
fn tool_reply(tool_use_id: &str, result: &ToolResult) -> OutboundMessage {
    let mut content = Vec::new();
    let mut is_error = None;

    if let Some(error) = &result.error {
        content.push(ContentBlock::text(format!("Error: {error}")));
        is_error = Some(true);
    } else {
        if !result.output.is_empty() {
            content.push(ContentBlock::text(result.output.clone()));
        }
        if let Some(image) = &result.base64_image {
            content.push(ContentBlock::png_image(image.clone()));
        }
    }

    OutboundMessage::ToolResult {
        tool_use_id: tool_use_id.to_owned(),
        content,
        is_error,
    }
}

/// Write one outbound message as an NDJSON line, flushed before returning.
async fn write_message<W>(stdin: &mut W, message: &OutboundMessage) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stdin.write_all(&message.to_ndjson()).await?;
    stdin.flush().await
}

/// Send an event, tolerating a dropped receiver (caller went away).
async fn emit(events: &mpsc::Sender<LoopEvent>, event: LoopEvent) {
    if events.send(event).await.is_err() {
        debug!("event receiver dropped; caller disconnected");
    }
}

/// Shut the process down, logging rather than propagating failures.
async fn cleanup(process: &mut super::AgentProcess) {
    if let Err(err) = process.shutdown().await {
        warn!(%err, "child process shutdown failed");
    }
}
