//! Human-readable rendering of session events.

use crate::model::{SdkEvent, ToolInvocation};
use crate::tools::{pretty_json, ToolResult};
use serde_json::Value;
use std::io::{self, Write};

/// Write the console rendering of `event`, followed by a blank line.
pub fn write_event(out: &mut dyn Write, event: &SdkEvent) -> io::Result<()> {
    match event {
        SdkEvent::AssistantText { text, .. } => writeln!(out, "Claude: {text}\n"),
        SdkEvent::ToolCallRequest(call) => writeln!(
            out,
            "[tool-call] {} requested with input:\n{}\n",
            call.name(),
            pretty_json(call.input())
        ),
        SdkEvent::ToolCallResult {
            tool_use_id,
            content,
            ..
        } => writeln!(
            out,
            "[tool-result] Result for {tool_use_id}:\n{}\n",
            pretty_json(content)
        ),
        SdkEvent::System { subtype, data } => writeln!(out, "[system:{subtype}] {data}\n"),
        SdkEvent::Result(summary) => {
            let cost = summary
                .total_cost_usd
                .map_or_else(|| "n/a".to_string(), |cost| format!("${cost:.4}"));
            writeln!(
                out,
                "[result] session complete — duration={}ms cost={cost}\n",
                summary.duration_ms
            )
        }
        SdkEvent::ToolInvocation(invocation) => writeln!(
            out,
            "[tool-run] {} called with:\n{}\n",
            invocation.tool_name(),
            pretty_json(&Value::Object(invocation.arguments().clone()))
        ),
        SdkEvent::Other { value, .. } => writeln!(out, "[message] {value}\n"),
    }
}

/// Write the outcome of a host-side tool run.
pub fn write_tool_outcome(out: &mut dyn Write, invocation: &ToolInvocation, result: &ToolResult) -> io::Result<()> {
    let status = if result.is_error() { "failed" } else { "returned" };
    writeln!(
        out,
        "[tool-run] {} {status}:\n{}\n",
        invocation.tool_name(),
        result.joined_text()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InvocationId, ResultSummary, ToolCall, ToolUseId};
    use serde_json::{json, Map};

    fn render(event: &SdkEvent) -> String {
        let mut out = Vec::new();
        write_event(&mut out, event).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn assistant_text() {
        let event = SdkEvent::AssistantText {
            model: None,
            text: "Hello Casey".into(),
        };
        assert_eq!(render(&event), "Claude: Hello Casey\n\n");
    }

    #[test]
    fn tool_call_request_pretty_prints_input() {
        let event = SdkEvent::ToolCallRequest(ToolCall::new(
            ToolUseId::new("toolu_1").unwrap(),
            "mcp__demo__list_open_invoices",
            json!({"user_id": "casey-123"}),
        ));
        insta::assert_snapshot!(render(&event), @r###"
        [tool-call] mcp__demo__list_open_invoices requested with input:
        {
          "user_id": "casey-123"
        }
        "###);
    }

    #[test]
    fn tool_call_result_shows_id_and_content() {
        let event = SdkEvent::ToolCallResult {
            tool_use_id: ToolUseId::new("toolu_1").unwrap(),
            content: json!("done"),
            is_error: false,
        };
        assert_eq!(render(&event), "[tool-result] Result for toolu_1:\n\"done\"\n\n");
    }

    #[test]
    fn system_message_shows_subtype_and_data() {
        let event = SdkEvent::System {
            subtype: "init".into(),
            data: json!({"model": "m"}),
        };
        assert_eq!(render(&event), "[system:init] {\"model\":\"m\"}\n\n");
    }

    #[test]
    fn result_summary_with_and_without_cost() {
        let mut summary = ResultSummary {
            duration_ms: 5321,
            total_cost_usd: Some(0.0123),
            ..ResultSummary::default()
        };
        assert_eq!(
            render(&SdkEvent::Result(summary.clone())),
            "[result] session complete — duration=5321ms cost=$0.0123\n\n"
        );

        summary.total_cost_usd = None;
        assert_eq!(
            render(&SdkEvent::Result(summary)),
            "[result] session complete — duration=5321ms cost=n/a\n\n"
        );
    }

    #[test]
    fn tool_outcome_marks_failures() {
        let invocation = ToolInvocation::new(InvocationId::new("req_1").unwrap(), "lookup_user_profile", Map::new());
        let mut out = Vec::new();
        write_tool_outcome(&mut out, &invocation, &ToolResult::error("No customer found for id 'x'.")).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[tool-run] lookup_user_profile failed:\nNo customer found for id 'x'.\n\n"
        );
    }
}
