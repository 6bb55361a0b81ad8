//! Parser for the Claude Code `stream-json` protocol.
//!
//! This module provides pure parsing functions for converting one protocol
//! line into either user-facing [`SdkEvent`]s or a control message that the
//! session has to answer.

use crate::model::{
    MalformedLine, ParseError, ResultSummary, SdkEvent, TokenUsage, ToolCall, ToolUseId,
};
use serde::Deserialize;
use serde_json::Value;

// Message type string constants
const TYPE_SYSTEM: &str = "system";
const TYPE_ASSISTANT: &str = "assistant";
const TYPE_USER: &str = "user";
const TYPE_RESULT: &str = "result";
const TYPE_CONTROL_REQUEST: &str = "control_request";
const TYPE_CONTROL_RESPONSE: &str = "control_response";

// Control request subtypes
const SUBTYPE_MCP_MESSAGE: &str = "mcp_message";
const SUBTYPE_CAN_USE_TOOL: &str = "can_use_tool";

#[derive(Debug, Deserialize)]
struct RawChatMessage {
    message: RawMessage,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    content: RawMessageContent,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMessageContent {
    Text(String),
    Blocks(Vec<RawContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    // thinking, redacted_thinking, images, server tools: not rendered
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    subtype: String,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    duration_api_ms: u64,
    #[serde(default)]
    num_turns: u32,
    #[serde(default)]
    total_cost_usd: Option<f64>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct RawControlRequest {
    request_id: String,
    request: Value,
}

#[derive(Debug, Deserialize)]
struct RawMcpMessage {
    server_name: String,
    message: Value,
}

#[derive(Debug, Deserialize)]
struct RawCanUseTool {
    tool_name: String,
    #[serde(default)]
    input: Value,
}

#[derive(Debug, Deserialize)]
struct RawControlResponse {
    response: RawControlResponseBody,
}

#[derive(Debug, Deserialize)]
struct RawControlResponseBody {
    subtype: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// One parsed protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Zero or more displayable events (one per content block).
    Events(Vec<SdkEvent>),
    /// The CLI asks the host to do something and waits for an answer.
    ControlRequest(ControlRequest),
    /// The CLI answered a control request sent by the host.
    ControlResponse {
        /// Request being answered.
        request_id: Option<String>,
        /// Error text when the request failed.
        error: Option<String>,
    },
}

/// Control request issued by the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlRequest {
    /// Identifier to echo back in the response.
    pub request_id: String,
    /// What is being asked.
    pub body: ControlRequestBody,
}

/// Payload of a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequestBody {
    /// JSON-RPC message for an in-process MCP server.
    McpMessage {
        /// Name the server was registered under.
        server_name: String,
        /// The JSON-RPC request or notification.
        message: Value,
    },
    /// Permission prompt for a tool call.
    CanUseTool {
        /// Tool the agent wants to use.
        tool_name: String,
        /// Proposed input.
        input: Value,
    },
    /// Anything else (hooks, interrupts).
    Other {
        /// Request subtype.
        subtype: String,
    },
    /// A request whose id is readable but whose body is not. It still gets
    /// an error response.
    Invalid {
        /// Request subtype, when present.
        subtype: Option<String>,
        /// Why the body was rejected.
        reason: String,
    },
}

/// Result of parsing a line with graceful error handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    /// Successfully parsed line.
    Valid(StreamMessage),
    /// Line that could not be parsed.
    Malformed(MalformedLine),
}

/// Parse a single line gracefully.
///
/// Unlike [`parse_line`], this function never returns an error. A line that
/// fails to parse becomes a [`MalformedLine`] for the caller to log.
///
/// # Arguments
///
/// * `raw` - The raw line to parse
/// * `line_number` - The line number (1-indexed) for error reporting
pub fn parse_line_graceful(raw: &str, line_number: usize) -> ParseResult {
    match parse_line(raw, line_number) {
        Ok(message) => ParseResult::Valid(message),
        Err(parse_error) => {
            ParseResult::Malformed(MalformedLine::new(line_number, raw, parse_error.to_string()))
        }
    }
}

/// Parse a single stream-json line.
///
/// Blank lines parse to an empty event list. Unknown message types become
/// [`SdkEvent::Other`].
///
/// # Errors
///
/// Returns `ParseError` if the JSON is malformed or a required field is
/// missing.
pub fn parse_line(raw: &str, line_number: usize) -> Result<StreamMessage, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(StreamMessage::Events(Vec::new()));
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| ParseError::InvalidJson {
        line: line_number,
        message: e.to_string(),
    })?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField {
            line: line_number,
            field: "type",
        })?
        .to_string();

    match kind.as_str() {
        TYPE_SYSTEM => {
            let subtype = value
                .get("subtype")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            Ok(StreamMessage::Events(vec![SdkEvent::System {
                subtype,
                data: value,
            }]))
        }
        TYPE_ASSISTANT => parse_assistant(value, line_number).map(StreamMessage::Events),
        TYPE_USER => parse_user(value, line_number).map(StreamMessage::Events),
        TYPE_RESULT => {
            let raw: RawResult = deserialize(value, line_number)?;
            Ok(StreamMessage::Events(vec![SdkEvent::Result(ResultSummary {
                subtype: raw.subtype,
                is_error: raw.is_error,
                duration_ms: raw.duration_ms,
                duration_api_ms: raw.duration_api_ms,
                num_turns: raw.num_turns,
                total_cost_usd: raw.total_cost_usd,
                session_id: raw.session_id,
                result: raw.result,
                usage: raw.usage,
            })]))
        }
        TYPE_CONTROL_REQUEST => {
            parse_control_request(value, line_number).map(StreamMessage::ControlRequest)
        }
        TYPE_CONTROL_RESPONSE => {
            let raw: RawControlResponse = deserialize(value, line_number)?;
            let error = match raw.response.subtype.as_str() {
                "error" => Some(raw.response.error.unwrap_or_default()),
                _ => None,
            };
            Ok(StreamMessage::ControlResponse {
                request_id: raw.response.request_id,
                error,
            })
        }
        _ => Ok(StreamMessage::Events(vec![SdkEvent::Other { kind, value }])),
    }
}

fn deserialize<T: for<'de> Deserialize<'de>>(
    value: Value,
    line_number: usize,
) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|e| ParseError::InvalidJson {
        line: line_number,
        message: e.to_string(),
    })
}

/// Split an assistant message into one event per rendered block.
fn parse_assistant(value: Value, line_number: usize) -> Result<Vec<SdkEvent>, ParseError> {
    let raw: RawChatMessage = deserialize(value, line_number)?;
    let model = raw.message.model;

    let blocks = match raw.message.content {
        RawMessageContent::Text(text) => {
            return Ok(vec![SdkEvent::AssistantText { model, text }]);
        }
        RawMessageContent::Blocks(blocks) => blocks,
    };

    let mut events = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block {
            RawContentBlock::Text { text } => events.push(SdkEvent::AssistantText {
                model: model.clone(),
                text,
            }),
            other => {
                if let Some(event) = parse_tool_block(other, line_number)? {
                    events.push(event);
                }
            }
        }
    }
    Ok(events)
}

/// User messages carry tool results back to the model; anything else is an echo.
fn parse_user(value: Value, line_number: usize) -> Result<Vec<SdkEvent>, ParseError> {
    let raw: RawChatMessage = deserialize(value.clone(), line_number)?;

    let tool_results = match raw.message.content {
        RawMessageContent::Text(_) => Vec::new(),
        RawMessageContent::Blocks(blocks) => {
            let mut events = Vec::new();
            for block in blocks {
                if matches!(block, RawContentBlock::ToolResult { .. }) {
                    if let Some(event) = parse_tool_block(block, line_number)? {
                        events.push(event);
                    }
                }
            }
            events
        }
    };

    if tool_results.is_empty() {
        Ok(vec![SdkEvent::Other {
            kind: TYPE_USER.to_string(),
            value,
        }])
    } else {
        Ok(tool_results)
    }
}

fn parse_tool_block(
    block: RawContentBlock,
    line_number: usize,
) -> Result<Option<SdkEvent>, ParseError> {
    match block {
        RawContentBlock::ToolUse { id, name, input } => {
            let id = ToolUseId::new(id).map_err(|_| ParseError::MissingField {
                line: line_number,
                field: "tool_use.id",
            })?;
            Ok(Some(SdkEvent::ToolCallRequest(ToolCall::new(id, name, input))))
        }
        RawContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let tool_use_id = ToolUseId::new(tool_use_id).map_err(|_| ParseError::MissingField {
                line: line_number,
                field: "tool_result.tool_use_id",
            })?;
            Ok(Some(SdkEvent::ToolCallResult {
                tool_use_id,
                content,
                is_error: is_error.unwrap_or(false),
            }))
        }
        RawContentBlock::Text { .. } | RawContentBlock::Unsupported => Ok(None),
    }
}

fn parse_control_request(value: Value, line_number: usize) -> Result<ControlRequest, ParseError> {
    let raw: RawControlRequest = deserialize(value, line_number)?;
    if raw.request_id.is_empty() {
        return Err(ParseError::MissingField {
            line: line_number,
            field: "request_id",
        });
    }

    // From here on the request can be answered, so body errors are kept
    let body = match parse_control_body(raw.request, line_number) {
        Ok(body) => body,
        Err((subtype, error)) => ControlRequestBody::Invalid {
            subtype,
            reason: error.to_string(),
        },
    };

    Ok(ControlRequest {
        request_id: raw.request_id,
        body,
    })
}

fn parse_control_body(
    request: Value,
    line_number: usize,
) -> Result<ControlRequestBody, (Option<String>, ParseError)> {
    let Some(subtype) = request.get("subtype").and_then(Value::as_str).map(str::to_string) else {
        return Err((
            None,
            ParseError::MissingField {
                line: line_number,
                field: "request.subtype",
            },
        ));
    };

    match subtype.as_str() {
        SUBTYPE_MCP_MESSAGE => match deserialize::<RawMcpMessage>(request, line_number) {
            Ok(mcp) => Ok(ControlRequestBody::McpMessage {
                server_name: mcp.server_name,
                message: mcp.message,
            }),
            Err(e) => Err((Some(subtype), e)),
        },
        SUBTYPE_CAN_USE_TOOL => match deserialize::<RawCanUseTool>(request, line_number) {
            Ok(prompt) => Ok(ControlRequestBody::CanUseTool {
                tool_name: prompt.tool_name,
                input: prompt.input,
            }),
            Err(e) => Err((Some(subtype), e)),
        },
        _ => Ok(ControlRequestBody::Other { subtype }),
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
