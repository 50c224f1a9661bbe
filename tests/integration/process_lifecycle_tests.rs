//! Integration tests for child process spawning and cleanup.

use std::sync::Arc;
use std::time::Duration;

use claude_relay::bridge::driver::spawn_agent_loop;
use claude_relay::bridge::spawner::{find_binary, spawn_process};
use claude_relay::bridge::{AgentConfig, LoopEvent, PlatformRunner};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

fn missing_binary_config() -> AgentConfig {
    AgentConfig {
        binary: "claude-relay-definitely-not-installed".into(),
        model: "haiku".into(),
        max_turns: 1,
        system_prompt: None,
        display_width: 800,
        display_height: 600,
        read_timeout: Duration::from_secs(2),
        initial_screenshot: false,
    }
}

#[cfg(unix)]
#[tokio::test]
async fn spawned_process_shutdown_is_idempotent() {
    let sh = find_binary("sh").expect("sh on PATH");
    let args = vec!["-c".to_owned(), "cat >/dev/null".to_owned()];

    let mut process = spawn_process(&sh, &args).expect("spawns");
    assert!(process.id().is_some());

    // First shutdown closes stdin (EOF ends `cat`) and reaps the child.
    process.shutdown().await.expect("first shutdown");
    // Second shutdown observes the already-reaped status.
    process.shutdown().await.expect("second shutdown");
}

#[cfg(unix)]
#[tokio::test]
async fn stdio_channels_are_piped_and_writable() {
    let sh = find_binary("sh").expect("sh on PATH");
    let args = vec!["-c".to_owned(), "cat >/dev/null".to_owned()];

    let mut process = spawn_process(&sh, &args).expect("spawns");
    let mut stdin = process.stdin.take().expect("stdin piped");
    assert!(process.stdout.is_some(), "stdout piped");

    stdin.write_all(b"hello\n").await.expect("write to child");
    drop(stdin);

    process.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn missing_binary_yields_a_single_error_event() {
    let events = spawn_agent_loop(
        missing_binary_config(),
        "do something".into(),
        Arc::new(PlatformRunner),
        None,
        CancellationToken::new(),
    );

    let mut events = events;
    let first = events.recv().await.expect("one event");
    assert!(
        matches!(&first, LoopEvent::Error { message } if message.contains("not found")),
        "got {first:?}"
    );
    assert!(events.recv().await.is_none(), "channel closes after the error");
}
