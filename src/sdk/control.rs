//! Control protocol and the in-process MCP bridge.
//!
//! The agent reaches host tools by sending `control_request` messages whose
//! `mcp_message` payload is a JSON-RPC request. Everything except
//! `tools/call` is answered immediately; `tools/call` becomes a
//! [`ToolInvocation`] that the command layer executes and answers through
//! [`ControlHandler::tool_response`].

use super::{McpServerSpec, MCP_SERVER_VERSION};
use crate::model::{InvocationId, SdkError, ToolInvocation};
use crate::parser::{ControlRequest, ControlRequestBody};
use crate::tools::ToolResult;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// MCP protocol revision announced during `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

const JSONRPC_METHOD_NOT_FOUND: i64 = -32601;
const JSONRPC_INVALID_PARAMS: i64 = -32602;

/// What the session should do with a control request.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlAction {
    /// Write this `control_response` back immediately.
    Reply(Value),
    /// Surface the invocation to the caller and answer later.
    Invoke(ToolInvocation),
}

/// Answers control requests on behalf of the host.
#[derive(Debug, Default)]
pub struct ControlHandler {
    server: Option<McpServerSpec>,
    pending: HashMap<InvocationId, Value>,
}

impl ControlHandler {
    /// Handler serving `server`, or no in-process server at all.
    pub fn new(server: Option<McpServerSpec>) -> Self {
        Self {
            server,
            pending: HashMap::new(),
        }
    }

    /// Number of invocations still waiting for an answer.
    pub fn pending_invocations(&self) -> usize {
        self.pending.len()
    }

    /// Decide how to answer `request`.
    pub fn handle(&mut self, request: ControlRequest) -> ControlAction {
        let request_id = request.request_id;
        match request.body {
            ControlRequestBody::McpMessage {
                server_name,
                message,
            } => self.handle_mcp(request_id, &server_name, message),
            ControlRequestBody::CanUseTool { tool_name, input } => {
                debug!(tool = %tool_name, "Allowing tool use");
                ControlAction::Reply(success(
                    &request_id,
                    json!({ "behavior": "allow", "updatedInput": input }),
                ))
            }
            ControlRequestBody::Other { subtype } => {
                warn!(%subtype, "Unsupported control request");
                ControlAction::Reply(failure(
                    &request_id,
                    &format!("Unsupported control request subtype: {subtype}"),
                ))
            }
            ControlRequestBody::Invalid { subtype, reason } => {
                warn!(?subtype, %reason, "Rejecting unreadable control request");
                ControlAction::Reply(failure(&request_id, &format!("Invalid control request: {reason}")))
            }
        }
    }

    /// `control_response` carrying the result of a finished invocation.
    ///
    /// # Errors
    ///
    /// Returns `UnknownInvocation` if the id was never issued or was already
    /// answered.
    pub fn tool_response(&mut self, invocation: &ToolInvocation, result: &ToolResult) -> Result<Value, SdkError> {
        let rpc_id = self
            .pending
            .remove(invocation.id())
            .ok_or_else(|| SdkError::UnknownInvocation(invocation.id().clone()))?;

        Ok(success(
            invocation.id().as_str(),
            json!({ "mcp_response": { "jsonrpc": "2.0", "id": rpc_id, "result": result.to_mcp_value() } }),
        ))
    }

    fn handle_mcp(&mut self, request_id: String, server_name: &str, message: Value) -> ControlAction {
        let Some(server) = self.server.as_ref().filter(|s| s.name == server_name) else {
            return ControlAction::Reply(failure(
                &request_id,
                &format!("Server '{server_name}' not found"),
            ));
        };

        let rpc_id = message.get("id").cloned().unwrap_or(Value::Null);
        let method = message.get("method").and_then(Value::as_str).unwrap_or_default();
        debug!(server = server_name, method, "MCP request");

        let reply = match method {
            "initialize" => rpc_result(
                rpc_id,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": server.name, "version": MCP_SERVER_VERSION },
                }),
            ),
            "notifications/initialized" => json!({ "jsonrpc": "2.0", "result": {} }),
            "tools/list" => {
                let tools: Vec<Value> = server.tools.iter().map(|t| t.to_mcp_value()).collect();
                rpc_result(rpc_id, json!({ "tools": tools }))
            }
            "tools/call" => return self.start_invocation(request_id, rpc_id, &message),
            other => rpc_error(
                rpc_id,
                JSONRPC_METHOD_NOT_FOUND,
                &format!("Method '{other}' not found"),
            ),
        };

        ControlAction::Reply(success(&request_id, json!({ "mcp_response": reply })))
    }

    fn start_invocation(&mut self, request_id: String, rpc_id: Value, message: &Value) -> ControlAction {
        let params = message.get("params");
        let name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let arguments = match params.and_then(|p| p.get("arguments")) {
            None | Some(Value::Null) => Some(Map::new()),
            Some(Value::Object(map)) => Some(map.clone()),
            Some(_) => None,
        };

        let invalid = |reason: &str| {
            ControlAction::Reply(success(
                &request_id,
                json!({ "mcp_response": rpc_error(rpc_id.clone(), JSONRPC_INVALID_PARAMS, reason) }),
            ))
        };

        if name.is_empty() {
            return invalid("tools/call requires a tool name");
        }
        let Some(arguments) = arguments else {
            return invalid("tools/call arguments must be an object");
        };
        let Ok(id) = InvocationId::new(request_id.clone()) else {
            return invalid("control request id is empty");
        };

        self.pending.insert(id.clone(), rpc_id);
        ControlAction::Invoke(ToolInvocation::new(id, name, arguments))
    }
}

/// The `initialize` control request sent when a session starts.
pub fn initialize_request(request_id: &str) -> Value {
    json!({
        "type": "control_request",
        "request_id": request_id,
        "request": { "subtype": "initialize", "hooks": null },
    })
}

/// The user message carrying the prompt.
pub fn user_message(prompt: &str) -> Value {
    json!({
        "type": "user",
        "message": { "role": "user", "content": prompt },
        "parent_tool_use_id": null,
        "session_id": "default",
    })
}

fn success(request_id: &str, response: Value) -> Value {
    json!({
        "type": "control_response",
        "response": { "subtype": "success", "request_id": request_id, "response": response },
    })
}

fn failure(request_id: &str, error: &str) -> Value {
    json!({
        "type": "control_response",
        "response": { "subtype": "error", "request_id": request_id, "error": error },
    })
}

fn rpc_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
