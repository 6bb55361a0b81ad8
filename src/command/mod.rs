//! The `query` and `demo-tools` commands.
//!
//! Both commands build a [`SessionRequest`], start it through a
//! [`SessionLauncher`] and pump events until the stream ends. Every event is
//! rendered to `out` and produces exactly one telemetry record, in the order
//! received. Tool invocations are executed locally and answered before the
//! next event is read.

pub mod render;

use crate::model::{CommandError, PermissionMode, QueryOptions, ResultSummary, SdkEvent};
use crate::sdk::{AgentSession, McpServerSpec, SessionLauncher, SessionRequest};
use crate::telemetry::{TelemetryEmitter, TelemetryRecord};
use crate::tools::demo::{
    demo_registry, qualified_tool_name, DEMO_SERVER_NAME, DEFAULT_DEMO_PROMPT,
};
use crate::tools::{ToolError, ToolRegistry};
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};

/// Turn limit for `demo-tools` when none is given.
pub const DEFAULT_DEMO_MAX_TURNS: u32 = 4;

/// Characters of the prompt kept in completion records.
const PROMPT_PREVIEW_CHARS: usize = 120;

/// Shared collaborators for one command run.
pub struct CommandContext<'a> {
    /// Starts the agent session.
    pub launcher: &'a dyn SessionLauncher,
    /// Receives one record per event.
    pub telemetry: &'a TelemetryEmitter,
    /// Console output.
    pub out: &'a mut dyn Write,
}

/// Inputs of `demo-tools`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoRequest {
    /// Prompt sent to the agent.
    pub prompt: String,
    /// Turn limit.
    pub max_turns: u32,
    /// Model override.
    pub model: Option<String>,
    /// Working directory for the agent.
    pub cwd: Option<PathBuf>,
}

impl Default for DemoRequest {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_DEMO_PROMPT.to_string(),
            max_turns: DEFAULT_DEMO_MAX_TURNS,
            model: None,
            cwd: None,
        }
    }
}

/// Run a single prompt with the given options.
///
/// # Errors
///
/// Returns `CommandError` if the session fails, the agent reports an error
/// result, or output cannot be written.
pub fn run_query(ctx: &mut CommandContext<'_>, prompt: &str, options: QueryOptions) -> Result<(), CommandError> {
    ctx.telemetry.emit(TelemetryRecord::new(
        "query.start",
        &json!({
            "allowed_tools": options.allowed_tools,
            "model": options.model,
            "permission_mode": options.permission_mode.map(|mode| mode.as_str()),
        }),
    ));

    let request = SessionRequest {
        prompt: prompt.to_string(),
        options,
        mcp_server: None,
    };

    // No in-process server: MCP calls are rejected before reaching the registry
    let no_tools = ToolRegistry::new();
    match drive(ctx, &request, &no_tools) {
        Ok(_) => {
            ctx.telemetry.emit(TelemetryRecord::new(
                "query.complete",
                &json!({ "prompt": preview(prompt) }),
            ));
            Ok(())
        }
        Err(err) => Err(fail(ctx.telemetry, "query", err)),
    }
}

/// Run the tool demonstration against the in-process demo server.
///
/// # Errors
///
/// Returns `CommandError` if the session fails, the agent reports an error
/// result, or output cannot be written.
pub fn run_demo_tools(ctx: &mut CommandContext<'_>, demo: &DemoRequest) -> Result<(), CommandError> {
    let registry = demo_registry().map_err(demo_setup_error)?;
    let allowed_tools: Vec<String> = registry
        .names()
        .map(|name| qualified_tool_name(DEMO_SERVER_NAME, name))
        .collect();

    ctx.telemetry.emit(TelemetryRecord::new(
        "demo.start",
        &json!({
            "prompt": demo.prompt,
            "allowed_tools": allowed_tools,
            "max_turns": demo.max_turns,
        }),
    ));

    let request = SessionRequest {
        prompt: demo.prompt.clone(),
        options: QueryOptions {
            allowed_tools,
            permission_mode: Some(PermissionMode::BypassPermissions),
            max_turns: Some(demo.max_turns),
            model: demo.model.clone(),
            cwd: demo.cwd.clone(),
            system_prompt: None,
        },
        mcp_server: Some(McpServerSpec::new(DEMO_SERVER_NAME, registry.descriptors())),
    };

    match drive(ctx, &request, &registry) {
        Ok(_) => {
            ctx.telemetry.emit(TelemetryRecord::new(
                "demo.complete",
                &json!({ "prompt": preview(&demo.prompt) }),
            ));
            Ok(())
        }
        Err(err) => Err(fail(ctx.telemetry, "demo", err)),
    }
}

fn demo_setup_error(err: ToolError) -> CommandError {
    CommandError::AgentFailed {
        subtype: "setup".to_string(),
        message: err.to_string(),
    }
}

fn preview(prompt: &str) -> String {
    prompt.chars().take(PROMPT_PREVIEW_CHARS).collect()
}

fn fail(telemetry: &TelemetryEmitter, command: &str, err: CommandError) -> CommandError {
    error!(command, "{err}");
    telemetry.emit(TelemetryRecord::new(
        format!("{command}.failed"),
        &json!({ "error": err.to_string() }),
    ));
    err
}

/// Start a session, pump it to completion and check the result summary.
fn drive(
    ctx: &mut CommandContext<'_>,
    request: &SessionRequest,
    registry: &ToolRegistry,
) -> Result<Option<ResultSummary>, CommandError> {
    let mut session = ctx.launcher.launch(request)?;
    let pumped = pump(ctx, session.as_mut(), registry);
    let finished = session.finish();

    let summary = pumped?;
    finished?;

    match summary {
        Some(summary) if summary.is_error => Err(CommandError::AgentFailed {
            subtype: summary.subtype.clone(),
            message: summary.result.clone().unwrap_or_default(),
        }),
        summary => {
            info!(has_summary = summary.is_some(), "Session finished");
            Ok(summary)
        }
    }
}

fn pump(
    ctx: &mut CommandContext<'_>,
    session: &mut dyn AgentSession,
    registry: &ToolRegistry,
) -> Result<Option<ResultSummary>, CommandError> {
    let mut summary = None;

    while let Some(event) = session.next_event()? {
        render::write_event(&mut *ctx.out, &event)?;

        match &event {
            SdkEvent::ToolInvocation(invocation) => {
                let result = registry.invoke(
                    invocation.tool_name(),
                    &Value::Object(invocation.arguments().clone()),
                );
                ctx.telemetry
                    .emit(TelemetryRecord::from_event(&event).with_outcome(&result));
                render::write_tool_outcome(&mut *ctx.out, invocation, &result)?;
                session.respond_to_tool(invocation, &result)?;
            }
            other => {
                ctx.telemetry.emit(TelemetryRecord::from_event(other));
                if let SdkEvent::Result(result) = other {
                    summary = Some(result.clone());
                }
            }
        }
    }

    ctx.out.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::ReplayLauncher;

    const LINES: &str = r#"{"type":"assistant","message":{"model":"m","content":[{"type":"text","text":"Hi"}]}}
{"type":"result","subtype":"error_max_turns","is_error":true,"duration_ms":3,"duration_api_ms":2,"num_turns":4,"result":"Reached max turns"}
"#;

    #[test]
    fn preview_truncates_by_characters() {
        let prompt = "é".repeat(200);
        assert_eq!(preview(&prompt).chars().count(), 120);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn error_result_fails_query_after_rendering() {
        let launcher = ReplayLauncher::from_jsonl(LINES);
        let telemetry = TelemetryEmitter::console_only();
        let mut out = Vec::new();
        let mut ctx = CommandContext {
            launcher: &launcher,
            telemetry: &telemetry,
            out: &mut out,
        };

        let err = run_query(&mut ctx, "hello", QueryOptions::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Agent run failed (error_max_turns): Reached max turns"
        );
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with("Claude: Hi\n"));
        assert!(printed.contains("[result] session complete"));
    }

    #[test]
    fn query_rejects_mcp_calls_without_server() {
        let lines = r#"{"type":"control_request","request_id":"req_2","request":{"subtype":"mcp_message","server_name":"demo","message":{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"lookup_user_profile","arguments":{}}}}}"#;
        let launcher = ReplayLauncher::from_jsonl(lines);
        let telemetry = TelemetryEmitter::console_only();
        let mut out = Vec::new();
        let mut ctx = CommandContext {
            launcher: &launcher,
            telemetry: &telemetry,
            out: &mut out,
        };

        // A query carries no MCP server, so the control handler rejects the
        // call before it reaches the command layer.
        run_query(&mut ctx, "hello", QueryOptions::default()).unwrap();
        let transcript = launcher.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0]["response"]["error"], "Server 'demo' not found");
    }
}
