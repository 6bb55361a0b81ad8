//! Tests for stream-json line parsing.

use super::*;
use serde_json::json;

// ===== Successful Parsing Tests =====

#[test]
fn parse_line_system_init_keeps_full_payload() {
    let raw = r#"{"type":"system","subtype":"init","model":"claude-sonnet-4-5","tools":["Read","Bash"]}"#;
    let parsed = parse_line(raw, 1).expect("valid system line");

    let StreamMessage::Events(events) = parsed else {
        panic!("expected events, got {parsed:?}");
    };
    assert_eq!(events.len(), 1);
    match &events[0] {
        SdkEvent::System { subtype, data } => {
            assert_eq!(subtype, "init");
            assert_eq!(data["tools"], json!(["Read", "Bash"]));
        }
        other => panic!("expected system event, got {other:?}"),
    }
}

#[test]
fn parse_line_assistant_splits_blocks_into_events() {
    let raw = r#"{"type":"assistant","message":{"role":"assistant","model":"claude-sonnet-4-5","content":[{"type":"text","text":"Looking up Casey"},{"type":"tool_use","id":"toolu_1","name":"mcp__demo__lookup_user_profile","input":{"user_id":"casey-123"}}]}}"#;
    let StreamMessage::Events(events) = parse_line(raw, 3).unwrap() else {
        panic!("expected events");
    };

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        SdkEvent::AssistantText {
            model: Some("claude-sonnet-4-5".into()),
            text: "Looking up Casey".into(),
        }
    );
    match &events[1] {
        SdkEvent::ToolCallRequest(call) => {
            assert_eq!(call.id().as_str(), "toolu_1");
            assert_eq!(call.name(), "mcp__demo__lookup_user_profile");
            assert_eq!(call.input(), &json!({"user_id": "casey-123"}));
        }
        other => panic!("expected tool call, got {other:?}"),
    }
}

#[test]
fn parse_line_assistant_skips_thinking_blocks() {
    let raw = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"thinking","thinking":"hmm","signature":"abc"},{"type":"text","text":"Done"}]}}"#;
    let StreamMessage::Events(events) = parse_line(raw, 1).unwrap() else {
        panic!("expected events");
    };
    assert_eq!(
        events,
        vec![SdkEvent::AssistantText {
            model: None,
            text: "Done".into()
        }]
    );
}

#[test]
fn parse_line_user_tool_result_becomes_result_event() {
    let raw = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"toolu_1","content":[{"type":"text","text":"ok"}],"is_error":true}]}}"#;
    let StreamMessage::Events(events) = parse_line(raw, 1).unwrap() else {
        panic!("expected events");
    };
    assert_eq!(events.len(), 1);
    match &events[0] {
        SdkEvent::ToolCallResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id.as_str(), "toolu_1");
            assert_eq!(content, &json!([{"type": "text", "text": "ok"}]));
            assert!(is_error);
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[test]
fn parse_line_user_text_is_other() {
    let raw = r#"{"type":"user","message":{"role":"user","content":"Hello"}}"#;
    let StreamMessage::Events(events) = parse_line(raw, 1).unwrap() else {
        panic!("expected events");
    };
    assert!(matches!(&events[0], SdkEvent::Other { kind, .. } if kind == "user"));
}

#[test]
fn parse_line_result_extracts_summary() {
    let raw = r#"{"type":"result","subtype":"success","is_error":false,"duration_ms":5321,"duration_api_ms":4100,"num_turns":3,"total_cost_usd":0.0123,"session_id":"sess-1","result":"All done","usage":{"input_tokens":12,"output_tokens":34,"server_tool_use":{"web_search_requests":0}}}"#;
    let StreamMessage::Events(events) = parse_line(raw, 9).unwrap() else {
        panic!("expected events");
    };
    let SdkEvent::Result(summary) = &events[0] else {
        panic!("expected result");
    };
    assert_eq!(summary.subtype, "success");
    assert!(!summary.is_error);
    assert_eq!(summary.duration_ms, 5321);
    assert_eq!(summary.duration_api_ms, 4100);
    assert_eq!(summary.num_turns, 3);
    assert_eq!(summary.total_cost_usd, Some(0.0123));
    assert_eq!(summary.session_id.as_deref(), Some("sess-1"));
    assert_eq!(summary.result.as_deref(), Some("All done"));
    assert_eq!(summary.usage.map(|u| u.total()), Some(46));
}

#[test]
fn parse_line_control_request_mcp_message() {
    let raw = r#"{"type":"control_request","request_id":"req_7","request":{"subtype":"mcp_message","server_name":"demo","message":{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"list_open_invoices","arguments":{"user_id":"casey-123"}}}}}"#;
    let parsed = parse_line(raw, 1).unwrap();
    let StreamMessage::ControlRequest(request) = parsed else {
        panic!("expected control request");
    };
    assert_eq!(request.request_id, "req_7");
    match request.body {
        ControlRequestBody::McpMessage {
            server_name,
            message,
        } => {
            assert_eq!(server_name, "demo");
            assert_eq!(message["method"], "tools/call");
        }
        other => panic!("expected mcp message, got {other:?}"),
    }
}

#[test]
fn parse_line_control_request_unknown_subtype_is_other() {
    let raw = r#"{"type":"control_request","request_id":"req_1","request":{"subtype":"hook_callback","callback_id":"x"}}"#;
    let StreamMessage::ControlRequest(request) = parse_line(raw, 1).unwrap() else {
        panic!("expected control request");
    };
    assert_eq!(
        request.body,
        ControlRequestBody::Other {
            subtype: "hook_callback".into()
        }
    );
}

#[test]
fn parse_line_control_request_with_bad_body_stays_answerable() {
    let raw = r#"{"type":"control_request","request_id":"req_5","request":{"subtype":"mcp_message","message":{"jsonrpc":"2.0","id":1,"method":"tools/list"}}}"#;
    let ParseResult::Valid(StreamMessage::ControlRequest(request)) = parse_line_graceful(raw, 3) else {
        panic!("a readable request id must not make the line malformed");
    };
    assert_eq!(request.request_id, "req_5");
    match request.body {
        ControlRequestBody::Invalid { subtype, reason } => {
            assert_eq!(subtype.as_deref(), Some("mcp_message"));
            assert!(reason.contains("server_name"), "reason: {reason}");
        }
        other => panic!("expected invalid body, got {other:?}"),
    }
}

#[test]
fn parse_line_control_request_without_subtype_is_invalid() {
    let raw = r#"{"type":"control_request","request_id":"req_6","request":{}}"#;
    let StreamMessage::ControlRequest(request) = parse_line(raw, 1).unwrap() else {
        panic!("expected control request");
    };
    assert!(matches!(request.body, ControlRequestBody::Invalid { subtype: None, .. }));
}

#[test]
fn parse_line_control_request_without_id_is_malformed() {
    let raw = r#"{"type":"control_request","request":{"subtype":"mcp_message"}}"#;
    assert!(matches!(parse_line_graceful(raw, 1), ParseResult::Malformed(_)));
}

#[test]
fn parse_line_control_response_error() {
    let raw = r#"{"type":"control_response","response":{"subtype":"error","request_id":"req_1_init","error":"not supported"}}"#;
    assert_eq!(
        parse_line(raw, 1).unwrap(),
        StreamMessage::ControlResponse {
            request_id: Some("req_1_init".into()),
            error: Some("not supported".into()),
        }
    );
}

#[test]
fn parse_line_unknown_type_is_other() {
    let raw = r#"{"type":"stream_event","event":{"type":"message_start"}}"#;
    let StreamMessage::Events(events) = parse_line(raw, 1).unwrap() else {
        panic!("expected events");
    };
    assert!(matches!(&events[0], SdkEvent::Other { kind, .. } if kind == "stream_event"));
}

#[test]
fn parse_line_blank_is_empty() {
    assert_eq!(parse_line("   ", 1).unwrap(), StreamMessage::Events(vec![]));
}

// ===== Error Tests =====

#[test]
fn parse_line_invalid_json_reports_line() {
    let err = parse_line("{not json", 12).unwrap_err();
    assert!(matches!(err, ParseError::InvalidJson { line: 12, .. }));
}

#[test]
fn parse_line_missing_type_field() {
    let err = parse_line(r#"{"uuid":"x"}"#, 2).unwrap_err();
    assert_eq!(
        err,
        ParseError::MissingField {
            line: 2,
            field: "type"
        }
    );
}

#[test]
fn parse_line_empty_tool_use_id_is_rejected() {
    let raw = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"","name":"Bash","input":{}}]}}"#;
    let err = parse_line(raw, 5).unwrap_err();
    assert_eq!(
        err,
        ParseError::MissingField {
            line: 5,
            field: "tool_use.id"
        }
    );
}

#[test]
fn parse_line_graceful_wraps_malformed() {
    match parse_line_graceful("garbage", 4) {
        ParseResult::Malformed(line) => {
            assert_eq!(line.line_number(), 4);
            assert_eq!(line.raw_line(), "garbage");
            assert!(line.error_message().contains("Invalid JSON"));
        }
        other => panic!("expected malformed, got {other:?}"),
    }
}
