use claude_relay::computer::{execute_tool, ComputerAction, ScrollDirection, ToolResult};
use serde_json::json;

#[test]
fn left_click_parses_with_coordinate() {
    let action: ComputerAction =
        serde_json::from_value(json!({"action": "left_click", "coordinate": [100, 250]}))
            .expect("parses");
    assert!(matches!(action, ComputerAction::LeftClick { coordinate } if coordinate == [100, 250]));
}

#[test]
fn coordinate_defaults_to_origin_when_absent() {
    let action: ComputerAction =
        serde_json::from_value(json!({"action": "mouse_move"})).expect("parses");
    assert!(matches!(action, ComputerAction::MouseMove { coordinate } if coordinate == [0, 0]));
}

#[test]
fn drag_parses_both_coordinates() {
    let action: ComputerAction = serde_json::from_value(json!({
        "action": "left_click_drag",
        "start_coordinate": [1, 2],
        "coordinate": [3, 4]
    }))
    .expect("parses");

    let ComputerAction::LeftClickDrag {
        start_coordinate,
        coordinate,
    } = action
    else {
        panic!("expected drag");
    };
    assert_eq!(start_coordinate, [1, 2]);
    assert_eq!(coordinate, [3, 4]);
}

#[test]
fn scroll_defaults_direction_and_amount() {
    let action: ComputerAction =
        serde_json::from_value(json!({"action": "scroll", "coordinate": [50, 60]}))
            .expect("parses");

    let ComputerAction::Scroll {
        coordinate,
        scroll_direction,
        scroll_amount,
    } = action
    else {
        panic!("expected scroll");
    };
    assert_eq!(coordinate, [50, 60]);
    assert_eq!(scroll_direction, ScrollDirection::Down);
    assert_eq!(scroll_amount, 3);
}

#[test]
fn scroll_direction_parses_all_variants() {
    for (name, expected) in [
        ("up", ScrollDirection::Up),
        ("down", ScrollDirection::Down),
        ("left", ScrollDirection::Left),
        ("right", ScrollDirection::Right),
    ] {
        let direction: ScrollDirection =
            serde_json::from_value(json!(name)).expect("parses direction");
        assert_eq!(direction, expected);
    }
}

#[test]
fn wait_defaults_to_one_second() {
    let action: ComputerAction =
        serde_json::from_value(json!({"action": "wait"})).expect("parses");
    let ComputerAction::Wait { duration } = action else {
        panic!("expected wait");
    };
    assert!((duration - 1.0).abs() < f64::EPSILON);
}

#[test]
fn key_and_type_carry_text() {
    let key: ComputerAction =
        serde_json::from_value(json!({"action": "key", "text": "ctrl+a"})).expect("parses");
    assert!(matches!(key, ComputerAction::Key { text } if text == "ctrl+a"));

    let typed: ComputerAction =
        serde_json::from_value(json!({"action": "type", "text": "hello"})).expect("parses");
    assert!(matches!(typed, ComputerAction::Type { text } if text == "hello"));
}

#[test]
fn unknown_action_yields_error_result() {
    let result = execute_tool(&json!({"action": "teleport", "coordinate": [1, 1]}));
    assert!(result.is_error());
    assert_eq!(result.error.as_deref(), Some("Unknown action: teleport"));
}

#[test]
fn missing_action_field_yields_error_result() {
    let result = execute_tool(&json!({"coordinate": [1, 1]}));
    assert!(result.is_error());
    assert_eq!(result.error.as_deref(), Some("Unknown action: <missing>"));
}

#[test]
fn wait_action_executes_and_reports_duration() {
    let result = execute_tool(&json!({"action": "wait", "duration": 0.01}));
    assert!(!result.is_error());
    assert!(result.output.contains("Waited"));
}

#[test]
fn tool_result_constructors() {
    let ok = ToolResult::ok("done");
    assert!(!ok.is_error());
    assert_eq!(ok.output, "done");
    assert!(ok.base64_image.is_none());

    let err = ToolResult::err("boom");
    assert!(err.is_error());
    assert_eq!(err.error.as_deref(), Some("boom"));

    let imaged = ToolResult::ok("").with_image("QUJD");
    assert_eq!(imaged.base64_image.as_deref(), Some("QUJD"));
}

#[test]
fn tool_result_serializes_all_fields() {
    let result = ToolResult::err("nope");
    let value = serde_json::to_value(&result).expect("serializes");
    assert_eq!(value["output"], "");
    assert_eq!(value["error"], "nope");
    assert_eq!(value["base64_image"], serde_json::Value::Null);
}
