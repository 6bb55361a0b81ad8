//! Live sessions backed by the `claude` executable.

use super::control::{initialize_request, user_message, ControlAction, ControlHandler};
use super::{cli_arguments, AgentSession, SessionLauncher, SessionRequest};
use crate::model::{SdkError, SdkEvent, ToolInvocation};
use crate::parser::{parse_line_graceful, ParseResult, StreamMessage};
use crate::tools::ToolResult;
use chrono::Utc;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Variable whose presence is required before `claude` is spawned.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Launches `claude` as a child process.
#[derive(Debug, Clone)]
pub struct ClaudeCliLauncher {
    program: PathBuf,
}

impl ClaudeCliLauncher {
    /// Launcher for the given executable (name or path).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SessionLauncher for ClaudeCliLauncher {
    fn launch(&self, request: &SessionRequest) -> Result<Box<dyn AgentSession>, SdkError> {
        if std::env::var_os(API_KEY_ENV).is_none() {
            return Err(SdkError::MissingApiKey);
        }

        let mut command = Command::new(&self.program);
        command
            .args(cli_arguments(&request.options, request.mcp_server.as_ref()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &request.options.cwd {
            command.current_dir(cwd);
        }

        info!(program = ?self.program, "Starting Claude Code");
        let mut child = command.spawn().map_err(|source| SdkError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            // Unreachable with piped stdio, but the child must not be leaked
            let _ = child.kill();
            let _ = child.wait();
            return Err(SdkError::Session("Claude Code stdio was not captured".into()));
        };

        let stderr_reader = stderr.and_then(|stderr| {
            thread::Builder::new()
                .name("claude-stderr".to_string())
                .spawn(move || {
                    let mut collected = Vec::new();
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        debug!(target: "claude_code_cli::sdk::stderr", "{line}");
                        collected.push(line);
                    }
                    collected.join("\n")
                })
                .map_err(|e| warn!("Failed to start stderr reader: {e}"))
                .ok()
        });

        let init_id = format!("req_1_{:08x}", Utc::now().timestamp_subsec_nanos() ^ std::process::id());
        let mut session = CliSession {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            stderr_reader,
            control: ControlHandler::new(request.mcp_server.clone()),
            queued: VecDeque::new(),
            init_id: init_id.clone(),
            line_number: 0,
            exhausted: false,
        };

        session.send(&initialize_request(&init_id))?;
        session.send(&user_message(&request.prompt))?;
        Ok(Box::new(session))
    }
}

struct CliSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr_reader: Option<JoinHandle<String>>,
    control: ControlHandler,
    queued: VecDeque<SdkEvent>,
    init_id: String,
    line_number: usize,
    exhausted: bool,
}

impl CliSession {
    fn send(&mut self, message: &Value) -> Result<(), SdkError> {
        let Some(stdin) = self.stdin.as_mut() else {
            debug!("Input already closed; dropping control message");
            return Ok(());
        };
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        stdin.write_all(line.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }
}

impl AgentSession for CliSession {
    fn next_event(&mut self) -> Result<Option<SdkEvent>, SdkError> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Ok(Some(event));
            }
            if self.exhausted {
                return Ok(None);
            }

            let mut raw = String::new();
            if self.stdout.read_line(&mut raw)? == 0 {
                self.exhausted = true;
                continue;
            }
            self.line_number += 1;

            let message = match parse_line_graceful(&raw, self.line_number) {
                ParseResult::Valid(message) => message,
                ParseResult::Malformed(malformed) => {
                    warn!(
                        line = malformed.line_number(),
                        error = malformed.error_message(),
                        "Skipping malformed line from Claude Code"
                    );
                    continue;
                }
            };

            match message {
                StreamMessage::Events(events) => {
                    if events.iter().any(|e| matches!(e, SdkEvent::Result(_))) {
                        // Closing stdin lets the CLI exit once it has flushed
                        self.stdin.take();
                    }
                    self.queued.extend(events);
                }
                StreamMessage::ControlRequest(request) => match self.control.handle(request) {
                    ControlAction::Reply(reply) => self.send(&reply)?,
                    ControlAction::Invoke(invocation) => {
                        return Ok(Some(SdkEvent::ToolInvocation(invocation)));
                    }
                },
                StreamMessage::ControlResponse { request_id, error } => match error {
                    Some(error) if request_id.as_deref() == Some(self.init_id.as_str()) => {
                        return Err(SdkError::Session(format!("initialize rejected: {error}")));
                    }
                    Some(error) => warn!(?request_id, "Control request failed: {error}"),
                    None => debug!(?request_id, "Control request acknowledged"),
                },
            }
        }
    }

    fn respond_to_tool(&mut self, invocation: &ToolInvocation, result: &ToolResult) -> Result<(), SdkError> {
        let response = self.control.tool_response(invocation, result)?;
        self.send(&response)
    }

    fn finish(self: Box<Self>) -> Result<(), SdkError> {
        let CliSession {
            mut child,
            stdin,
            stdout,
            stderr_reader,
            ..
        } = *self;
        drop(stdin);
        drop(stdout);

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            debug!("Claude Code exited cleanly");
            return Ok(());
        }
        Err(SdkError::ProcessFailed {
            exit_code: status.code(),
            stderr: stderr.trim().to_string(),
        })
    }
}
