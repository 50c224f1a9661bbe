use claude_relay::client::{extract_json, parse_result_text};
use claude_relay::AppError;
use serde_json::json;

#[test]
fn parse_result_text_finds_terminal_result() {
    let stdout = concat!(
        r#"{"type":"system","subtype":"init","session_id":"s1"}"#,
        "\n",
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Paris"}]}}"#,
        "\n",
        r#"{"type":"result","result":"The capital of France is Paris.","is_error":false}"#,
        "\n",
    );

    assert_eq!(
        parse_result_text(stdout).as_deref(),
        Some("The capital of France is Paris.")
    );
}

#[test]
fn parse_result_text_skips_garbage_lines() {
    let stdout = "not json\n\n{\"type\":\"result\",\"result\":\"ok\"}\n";
    assert_eq!(parse_result_text(stdout).as_deref(), Some("ok"));
}

#[test]
fn parse_result_text_returns_none_without_result() {
    let stdout = r#"{"type":"system","subtype":"init","session_id":"s1"}"#;
    assert!(parse_result_text(stdout).is_none());
}

#[test]
fn extract_json_parses_direct_object() {
    let value = extract_json(r#"{"primes": [2, 3, 5]}"#).expect("direct parse");
    assert_eq!(value["primes"], json!([2, 3, 5]));
}

#[test]
fn extract_json_parses_direct_array() {
    let value = extract_json("[1, 2, 3]").expect("direct parse");
    assert_eq!(value, json!([1, 2, 3]));
}

#[test]
fn extract_json_unwraps_markdown_fence() {
    let text = "Here is the data:\n```json\n{\"name\": \"relay\"}\n```\nDone.";
    let value = extract_json(text).expect("fenced parse");
    assert_eq!(value["name"], "relay");
}

#[test]
fn extract_json_unwraps_unlabelled_fence() {
    let text = "```\n{\"a\": 1}\n```";
    let value = extract_json(text).expect("fenced parse");
    assert_eq!(value["a"], 1);
}

#[test]
fn extract_json_finds_embedded_object() {
    let text = "The answer is {\"count\": 7} as requested.";
    let value = extract_json(text).expect("embedded parse");
    assert_eq!(value["count"], 7);
}

#[test]
fn extract_json_fails_on_plain_text() {
    let err = extract_json("No structured data here, sorry.").expect_err("no JSON");
    assert!(matches!(err, AppError::Stream(msg) if msg.contains("could not extract JSON")));
}
