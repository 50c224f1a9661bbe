//! Integration tests for the agentic loop driver.
//!
//! Exercises `run_agent_io` over in-memory duplex streams standing in for
//! the child process's stdio, with a stub action runner, so event ordering
//! and the read/execute/respond protocol can be asserted without spawning a
//! real binary.

use std::sync::Arc;
use std::time::Duration;

use claude_relay::bridge::driver::run_agent_io;
use claude_relay::bridge::{ActionRunner, LoopEvent, SharedRunner};
use claude_relay::computer::ToolResult;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Runner that echoes the requested action name instead of touching the host.
struct StubRunner;

impl ActionRunner for StubRunner {
    fn run(&self, input: &Value) -> ToolResult {
        let action = input
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("<none>");
        ToolResult::ok(format!("stub executed {action}"))
    }
}

struct Harness {
    /// Write side feeding the driver's "stdout".
    feeder: DuplexStream,
    /// Read side observing what the driver wrote to "stdin".
    replies: BufReader<DuplexStream>,
    events: mpsc::Receiver<LoopEvent>,
    task: tokio::task::JoinHandle<()>,
}

fn start_driver(read_timeout: Duration) -> Harness {
    let (stdout_for_driver, feeder) = tokio::io::duplex(256 * 1024);
    let (stdin_for_driver, reply_side) = tokio::io::duplex(256 * 1024);
    let (tx, rx) = mpsc::channel(64);

    let runner: SharedRunner = Arc::new(StubRunner);
    let task = tokio::spawn(async move {
        let mut stdin = stdin_for_driver;
        let cancel = CancellationToken::new();
        run_agent_io(
            stdout_for_driver,
            &mut stdin,
            read_timeout,
            runner,
            None,
            &tx,
            &cancel,
        )
        .await;
    });

    Harness {
        feeder,
        replies: BufReader::new(reply_side),
        events: rx,
        task,
    }
}

async fn feed(harness: &mut Harness, lines: &[&str]) {
    for line in lines {
        harness
            .feeder
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("feed line");
    }
    harness.feeder.flush().await.expect("flush");
}

async fn collect_events(harness: &mut Harness) -> Vec<LoopEvent> {
    let mut events = Vec::new();
    while let Some(event) = harness.events.recv().await {
        let terminal = matches!(event, LoopEvent::End { .. } | LoopEvent::Error { .. });
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

async fn read_reply(harness: &mut Harness) -> Value {
    let mut line = String::new();
    harness
        .replies
        .read_line(&mut line)
        .await
        .expect("read reply line");
    serde_json::from_str(line.trim()).expect("reply is valid JSON")
}

#[tokio::test]
async fn result_only_stream_ends_cleanly() {
    let mut harness = start_driver(Duration::from_secs(5));
    feed(
        &mut harness,
        &[r#"{"type":"result","result":"nothing to do","is_error":false}"#],
    )
    .await;

    let events = collect_events(&mut harness).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], LoopEvent::End { result } if result == "nothing to do"));

    harness.task.await.expect("driver task");
}

#[tokio::test]
async fn text_deltas_stream_before_the_result() {
    let mut harness = start_driver(Duration::from_secs(5));
    feed(
        &mut harness,
        &[
            r#"{"type":"system","subtype":"init","session_id":"s1"}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Look"}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"ing"}}}"#,
            r#"{"type":"result","result":"Looking","is_error":false}"#,
        ],
    )
    .await;

    let events = collect_events(&mut harness).await;
    assert!(matches!(&events[0], LoopEvent::Text { text } if text == "Look"));
    assert!(matches!(&events[1], LoopEvent::Text { text } if text == "ing"));
    assert!(matches!(&events[2], LoopEvent::End { .. }));
}

#[tokio::test]
async fn incremental_tool_use_executes_after_message_stop() {
    let mut harness = start_driver(Duration::from_secs(5));
    feed(
        &mut harness,
        &[
            r#"{"type":"stream_event","event":{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"computer","input":{}}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"action\":"}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"screenshot\"}"}}}"#,
            r#"{"type":"stream_event","event":{"type":"message_stop"}}"#,
            r#"{"type":"result","result":"done","is_error":false}"#,
        ],
    )
    .await;

    let events = collect_events(&mut harness).await;

    let LoopEvent::ToolUse { id, name, input } = &events[0] else {
        panic!("expected tool_use first, got {events:?}");
    };
    assert_eq!(id, "toolu_1");
    assert_eq!(name, "computer");
    assert_eq!(input["action"], "screenshot");

    let LoopEvent::ToolResult { id, result } = &events[1] else {
        panic!("expected tool_result second");
    };
    assert_eq!(id, "toolu_1");
    assert_eq!(result.output, "stub executed screenshot");
    assert!(matches!(&events[2], LoopEvent::End { .. }));

    // The reply went back over stdin before the result was read.
    let reply = read_reply(&mut harness).await;
    assert_eq!(reply["type"], "tool_result");
    assert_eq!(reply["tool_use_id"], "toolu_1");
    assert!(reply.get("is_error").is_none());
}

#[tokio::test]
async fn whole_input_tool_uses_execute_in_announcement_order() {
    let mut harness = start_driver(Duration::from_secs(5));
    feed(
        &mut harness,
        &[
            r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"toolu_a","name":"computer","input":{"action":"screenshot"}},{"type":"tool_use","id":"toolu_b","name":"computer","input":{"action":"key","text":"Return"}}]}}"#,
            r#"{"type":"result","result":"both done","is_error":false}"#,
        ],
    )
    .await;

    let events = collect_events(&mut harness).await;
    let kinds: Vec<String> = events
        .iter()
        .map(|e| match e {
            LoopEvent::ToolUse { id, .. } => format!("use:{id}"),
            LoopEvent::ToolResult { id, .. } => format!("result:{id}"),
            LoopEvent::End { .. } => "end".into(),
            other => format!("{other:?}"),
        })
        .collect();
    assert_eq!(
        kinds,
        ["use:toolu_a", "result:toolu_a", "use:toolu_b", "result:toolu_b", "end"]
    );

    // One stdin reply per invocation, in the same order.
    let first = read_reply(&mut harness).await;
    let second = read_reply(&mut harness).await;
    assert_eq!(first["tool_use_id"], "toolu_a");
    assert_eq!(second["tool_use_id"], "toolu_b");
}

#[tokio::test]
async fn unknown_tool_gets_an_error_reply_and_the_loop_continues() {
    let mut harness = start_driver(Duration::from_secs(5));
    feed(
        &mut harness,
        &[
            r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"toolu_x","name":"bash","input":{"command":"ls"}}]}}"#,
            r#"{"type":"result","result":"recovered","is_error":false}"#,
        ],
    )
    .await;

    let events = collect_events(&mut harness).await;

    let LoopEvent::ToolResult { result, .. } = &events[1] else {
        panic!("expected tool_result, got {events:?}");
    };
    assert_eq!(result.error.as_deref(), Some("Unknown tool: bash"));

    // The loop did not abort: the terminal event is still End.
    assert!(matches!(events.last(), Some(LoopEvent::End { result }) if result == "recovered"));

    let reply = read_reply(&mut harness).await;
    assert_eq!(reply["is_error"], true);
    let text = reply["content"][0]["text"].as_str().expect("text block");
    assert!(text.starts_with("Error:"));
}

#[tokio::test]
async fn garbage_lines_are_skipped_without_breaking_the_loop() {
    let mut harness = start_driver(Duration::from_secs(5));
    feed(
        &mut harness,
        &[
            "this is not json",
            "",
            r#"{"type":"some_future_message","data":1}"#,
            r#"{"type":"result","result":"fine","is_error":false}"#,
        ],
    )
    .await;

    let events = collect_events(&mut harness).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], LoopEvent::End { .. }));
}

#[tokio::test]
async fn silent_stream_times_out_with_an_error_event() {
    let mut harness = start_driver(Duration::from_millis(100));
    // Feed nothing; the read must give up on its own.

    let events = collect_events(&mut harness).await;
    assert_eq!(events.len(), 1);
    assert!(
        matches!(&events[0], LoopEvent::Error { message } if message.contains("Timeout")),
        "got {events:?}"
    );
}

#[tokio::test]
async fn closed_stream_without_result_is_an_error() {
    let mut harness = start_driver(Duration::from_secs(5));
    feed(
        &mut harness,
        &[r#"{"type":"system","subtype":"init","session_id":"s1"}"#],
    )
    .await;
    drop(harness.feeder);

    let mut events = Vec::new();
    while let Some(event) = harness.events.recv().await {
        events.push(event);
    }
    assert!(
        matches!(events.last(), Some(LoopEvent::Error { message }) if message.contains("stream closed")),
        "got {events:?}"
    );
}

#[tokio::test]
async fn cancellation_stops_the_loop_without_a_terminal_event() {
    let (stdout_for_driver, _feeder) = tokio::io::duplex(1024);
    let (stdin_for_driver, _reply_side) = tokio::io::duplex(1024);
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let runner: SharedRunner = Arc::new(StubRunner);
    let loop_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let mut stdin = stdin_for_driver;
        run_agent_io(
            stdout_for_driver,
            &mut stdin,
            Duration::from_secs(30),
            runner,
            None,
            &tx,
            &loop_cancel,
        )
        .await;
    });

    cancel.cancel();
    task.await.expect("driver task exits promptly");
    assert!(rx.recv().await.is_none(), "no events after cancellation");
}
