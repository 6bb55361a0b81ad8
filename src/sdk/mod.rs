//! Boundary to the Claude Code agent.
//!
//! A [`SessionLauncher`] turns a [`SessionRequest`] into a running
//! [`AgentSession`]. The command layer pulls events from the session one at
//! a time and answers tool invocations before pulling the next event.
//!
//! Two launchers exist: [`ClaudeCliLauncher`] spawns the `claude` executable
//! and speaks its `stream-json` protocol, [`ReplayLauncher`] feeds a recorded
//! transcript through the same control handling.

pub mod cli;
pub mod control;
pub mod replay;

pub use cli::ClaudeCliLauncher;
pub use control::{ControlAction, ControlHandler};
pub use replay::{ReplayLauncher, ReplayStep};

use crate::model::{QueryOptions, SdkError, SdkEvent, ToolInvocation};
use crate::tools::{ToolDescriptor, ToolResult};
use serde_json::json;

/// Version reported by in-process MCP servers during `initialize`.
pub const MCP_SERVER_VERSION: &str = "1.0.0";

/// In-process MCP server exposed to the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerSpec {
    /// Name the agent addresses the server by (`mcp__<name>__<tool>`).
    pub name: String,
    /// Tools listed by `tools/list`.
    pub tools: Vec<ToolDescriptor>,
}

impl McpServerSpec {
    /// Server with the given tools.
    pub fn new(name: impl Into<String>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            name: name.into(),
            tools,
        }
    }
}

/// Everything needed to start one agent session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    /// User prompt.
    pub prompt: String,
    /// Call options.
    pub options: QueryOptions,
    /// In-process tools, if any.
    pub mcp_server: Option<McpServerSpec>,
}

/// Starts agent sessions.
pub trait SessionLauncher {
    /// Start a session for `request`.
    ///
    /// # Errors
    ///
    /// Returns `SdkError` if the session cannot be started (missing
    /// credentials, executable not found, broken pipe).
    fn launch(&self, request: &SessionRequest) -> Result<Box<dyn AgentSession>, SdkError>;
}

/// A running agent session.
pub trait AgentSession {
    /// Next event, or `None` once the stream ends.
    ///
    /// # Errors
    ///
    /// Returns `SdkError` on transport failures or a session-level error.
    fn next_event(&mut self) -> Result<Option<SdkEvent>, SdkError>;

    /// Answer a [`SdkEvent::ToolInvocation`] previously returned by
    /// [`AgentSession::next_event`].
    ///
    /// # Errors
    ///
    /// Returns `UnknownInvocation` for an id the session never issued, or a
    /// transport error.
    fn respond_to_tool(&mut self, invocation: &ToolInvocation, result: &ToolResult) -> Result<(), SdkError>;

    /// Release the session and report how it ended.
    ///
    /// # Errors
    ///
    /// Returns `ProcessFailed` if the agent exited unsuccessfully.
    fn finish(self: Box<Self>) -> Result<(), SdkError>;
}

/// Command-line flags for the `claude` executable.
pub fn cli_arguments(options: &QueryOptions, mcp_server: Option<&McpServerSpec>) -> Vec<String> {
    let mut args: Vec<String> = [
        "--output-format",
        "stream-json",
        "--verbose",
        "--input-format",
        "stream-json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if let Some(system_prompt) = &options.system_prompt {
        args.push("--system-prompt".into());
        args.push(system_prompt.clone());
    }
    if !options.allowed_tools.is_empty() {
        args.push("--allowedTools".into());
        args.push(options.allowed_tools.join(","));
    }
    if let Some(max_turns) = options.max_turns {
        args.push("--max-turns".into());
        args.push(max_turns.to_string());
    }
    if let Some(model) = &options.model {
        args.push("--model".into());
        args.push(model.clone());
    }
    if let Some(mode) = options.permission_mode {
        args.push("--permission-mode".into());
        args.push(mode.as_str().into());
    }
    if let Some(server) = mcp_server {
        let config = json!({
            "mcpServers": {
                server.name.as_str(): { "type": "sdk", "name": server.name },
            }
        });
        args.push("--mcp-config".into());
        args.push(config.to_string());
    }

    args
}
