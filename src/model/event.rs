//! Events produced by an agent session.
//!
//! One stream-json message can carry several content blocks; the parser
//! flattens them so that every [`SdkEvent`] is one displayable unit.

use crate::model::{InvocationId, TokenUsage, ToolUseId};
use serde_json::{Map, Value};

// ===== SdkEvent =====

/// A single event received from the agent SDK.
///
/// Sum type over everything the command layer renders and reports.
#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    /// System notice (e.g. the `init` message listing tools and model).
    System {
        /// Message subtype such as `init`.
        subtype: String,
        /// Remaining message payload.
        data: Value,
    },
    /// Text written by the assistant.
    AssistantText {
        /// Model that produced the text, when reported.
        model: Option<String>,
        /// Markdown text.
        text: String,
    },
    /// The assistant asked for a tool to be called.
    ToolCallRequest(ToolCall),
    /// A tool produced a result that was fed back to the assistant.
    ToolCallResult {
        /// Links the result to its [`ToolCall`].
        tool_use_id: ToolUseId,
        /// Raw content (string or content-block list).
        content: Value,
        /// Whether the tool reported failure.
        is_error: bool,
    },
    /// The agent asks this process to run one of its registered tools.
    ToolInvocation(ToolInvocation),
    /// Final summary; the session is complete after this event.
    Result(ResultSummary),
    /// Any message type not modelled above.
    Other {
        /// The `type` tag of the message.
        kind: String,
        /// The full message.
        value: Value,
    },
}

// ===== ToolCall =====

/// Tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    id: ToolUseId,
    name: String,
    input: Value,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: ToolUseId, name: impl Into<String>, input: Value) -> Self {
        Self {
            id,
            name: name.into(),
            input,
        }
    }

    /// Identifier linking this call to its result
    pub fn id(&self) -> &ToolUseId {
        &self.id
    }

    /// Tool name as the agent knows it (e.g. `Read`, `mcp__demo__list_open_invoices`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool-specific input parameters
    pub fn input(&self) -> &Value {
        &self.input
    }
}

// ===== ToolInvocation =====

/// Request to execute a host-registered tool mid-stream.
///
/// The answer must be sent back through the session before the stream
/// continues.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    id: InvocationId,
    tool_name: String,
    arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Create a new invocation.
    pub fn new(id: InvocationId, tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id,
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Routing identifier for the answer.
    pub fn id(&self) -> &InvocationId {
        &self.id
    }

    /// Registry name of the tool (without any `mcp__` prefix).
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Arguments supplied by the agent.
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }
}

// ===== ResultSummary =====

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSummary {
    /// `success`, `error_max_turns`, `error_during_execution`, ...
    pub subtype: String,
    /// Whether the agent run failed.
    pub is_error: bool,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Time spent waiting on the model API in milliseconds.
    pub duration_api_ms: u64,
    /// Number of conversation turns.
    pub num_turns: u32,
    /// Total cost, when reported.
    pub total_cost_usd: Option<f64>,
    /// Session identifier assigned by the SDK.
    pub session_id: Option<String>,
    /// Final result text.
    pub result: Option<String>,
    /// Aggregate token usage.
    pub usage: Option<TokenUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_accessors_return_fields() {
        let call = ToolCall::new(
            ToolUseId::new("toolu_1").unwrap(),
            "Read",
            json!({"file_path": "/tmp/a"}),
        );
        assert_eq!(call.id().as_str(), "toolu_1");
        assert_eq!(call.name(), "Read");
        assert_eq!(call.input()["file_path"], "/tmp/a");
    }
}
