use std::time::Duration;

use claude_relay::bridge::spawner::{agent_args, find_binary, sanitized_env, STRIPPED_ENV_VARS};
use claude_relay::bridge::AgentConfig;
use serial_test::serial;

fn test_agent_config() -> AgentConfig {
    AgentConfig {
        binary: "claude".into(),
        model: "sonnet".into(),
        max_turns: 15,
        system_prompt: None,
        display_width: 1024,
        display_height: 768,
        read_timeout: Duration::from_secs(120),
        initial_screenshot: false,
    }
}

#[test]
#[serial]
fn sanitized_env_strips_api_key_without_mutating_parent() {
    std::env::set_var("ANTHROPIC_API_KEY", "sk-test-123");
    std::env::set_var("RELAY_SPAWNER_TEST_MARKER", "present");

    let env = sanitized_env();

    assert!(
        !env.iter().any(|(key, _)| key == "ANTHROPIC_API_KEY"),
        "stripped variable must not reach the child"
    );
    assert!(
        env.iter()
            .any(|(key, value)| key == "RELAY_SPAWNER_TEST_MARKER" && value == "present"),
        "unrelated variables pass through"
    );
    // The parent's own environment is untouched.
    assert_eq!(
        std::env::var("ANTHROPIC_API_KEY").as_deref(),
        Ok("sk-test-123")
    );

    std::env::remove_var("ANTHROPIC_API_KEY");
    std::env::remove_var("RELAY_SPAWNER_TEST_MARKER");
}

#[test]
fn stripped_list_names_the_api_key() {
    assert!(STRIPPED_ENV_VARS.contains(&"ANTHROPIC_API_KEY"));
}

#[test]
fn find_binary_locates_a_common_shell() {
    #[cfg(unix)]
    assert!(find_binary("sh").is_some());
}

#[test]
fn find_binary_misses_nonexistent_name() {
    assert!(find_binary("claude-relay-definitely-not-installed").is_none());
}

#[test]
fn find_binary_with_separator_checks_path_directly() {
    assert!(find_binary("no/such/dir/claude").is_none());
}

#[test]
fn agent_args_carry_the_stream_json_flags() {
    let args = agent_args(&test_agent_config());

    assert_eq!(args[0], "-p");
    let joined = args.join(" ");
    assert!(joined.contains("--input-format stream-json"));
    assert!(joined.contains("--output-format stream-json"));
    assert!(joined.contains("--include-partial-messages"));
    assert!(joined.contains("--verbose"));
    assert!(joined.contains("--model sonnet"));
    assert!(joined.contains("--max-turns 15"));
    assert!(!joined.contains("--system-prompt"));
}

#[test]
fn agent_args_append_system_prompt_when_set() {
    let mut config = test_agent_config();
    config.system_prompt = Some("be careful".into());

    let args = agent_args(&config);
    let pos = args
        .iter()
        .position(|a| a == "--system-prompt")
        .expect("flag present");
    assert_eq!(args[pos + 1], "be careful");
}
