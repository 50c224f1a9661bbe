use claude_relay::bridge::{ChatEvent, LoopEvent, ToolOutcome};
use claude_relay::computer::ToolResult;
use serde_json::json;

#[test]
fn loop_events_serialize_with_snake_case_tags() {
    assert_eq!(
        serde_json::to_value(LoopEvent::Start).expect("serializes"),
        json!({"type": "start"})
    );
    assert_eq!(
        serde_json::to_value(LoopEvent::Text { text: "hi".into() }).expect("serializes"),
        json!({"type": "text", "text": "hi"})
    );
    assert_eq!(
        serde_json::to_value(LoopEvent::End {
            result: "done".into()
        })
        .expect("serializes"),
        json!({"type": "end", "result": "done"})
    );
    assert_eq!(
        serde_json::to_value(LoopEvent::Error {
            message: "boom".into()
        })
        .expect("serializes"),
        json!({"type": "error", "message": "boom"})
    );
}

#[test]
fn tool_use_event_carries_the_full_input() {
    let event = LoopEvent::ToolUse {
        id: "toolu_1".into(),
        name: "computer".into(),
        input: json!({"action": "screenshot"}),
    };
    let value = serde_json::to_value(event).expect("serializes");
    assert_eq!(value["type"], "tool_use");
    assert_eq!(value["id"], "toolu_1");
    assert_eq!(value["input"]["action"], "screenshot");
}

#[test]
fn tool_outcome_flags_images_without_embedding_them() {
    let result = ToolResult::ok("Screenshot captured").with_image("aVeryLongBase64Blob");
    let outcome = ToolOutcome::from(&result);

    assert!(outcome.has_image);
    assert_eq!(outcome.output, "Screenshot captured");
    assert!(outcome.error.is_none());

    let value = serde_json::to_value(LoopEvent::ToolResult {
        id: "toolu_1".into(),
        result: outcome,
    })
    .expect("serializes");
    assert_eq!(value["result"]["has_image"], true);
    assert!(
        value["result"].get("base64_image").is_none(),
        "image bytes stay out of caller-facing events"
    );
}

#[test]
fn tool_outcome_preserves_errors() {
    let outcome = ToolOutcome::from(&ToolResult::err("xdotool not found"));
    assert_eq!(outcome.error.as_deref(), Some("xdotool not found"));
    assert!(!outcome.has_image);
}

#[test]
fn chat_events_serialize_with_snake_case_tags() {
    assert_eq!(
        serde_json::to_value(ChatEvent::Start).expect("serializes"),
        json!({"type": "start"})
    );
    assert_eq!(
        serde_json::to_value(ChatEvent::Chunk { text: "Par".into() }).expect("serializes"),
        json!({"type": "chunk", "text": "Par"})
    );
    assert_eq!(
        serde_json::to_value(ChatEvent::End).expect("serializes"),
        json!({"type": "end"})
    );
    assert_eq!(
        serde_json::to_value(ChatEvent::Error {
            message: "timeout".into()
        })
        .expect("serializes"),
        json!({"type": "error", "message": "timeout"})
    );
}
