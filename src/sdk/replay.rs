//! Sessions replayed from a recorded `stream-json` transcript.
//!
//! Used by `--replay` for offline runs and by tests as a stand-in for the
//! agent. Control requests in the transcript go through the same
//! [`ControlHandler`] as a live session; every reply is recorded so callers
//! can inspect what would have been written to the agent.

use super::control::{ControlAction, ControlHandler};
use super::{AgentSession, SessionLauncher, SessionRequest};
use crate::model::{SdkError, SdkEvent, ToolInvocation};
use crate::parser::{parse_line_graceful, ParseResult, StreamMessage};
use crate::tools::ToolResult;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// One scripted step.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayStep {
    /// A protocol message as if read from the agent.
    Message(StreamMessage),
    /// The session fails with this message.
    Failure(String),
}

/// Launcher that plays back a fixed script. Each launch starts from the
/// beginning of the script.
#[derive(Debug, Clone, Default)]
pub struct ReplayLauncher {
    steps: Vec<ReplayStep>,
    transcript: Arc<Mutex<Vec<Value>>>,
    requests: Arc<Mutex<Vec<SessionRequest>>>,
}

impl ReplayLauncher {
    /// Launcher playing `steps` in order.
    pub fn from_steps(steps: Vec<ReplayStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Launcher whose sessions fail on the first read.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::from_steps(vec![ReplayStep::Failure(message.into())])
    }

    /// Parse a JSONL transcript. Malformed lines are logged and skipped.
    pub fn from_jsonl(contents: &str) -> Self {
        let steps = contents
            .lines()
            .enumerate()
            .filter_map(|(index, line)| match parse_line_graceful(line, index + 1) {
                ParseResult::Valid(message) => Some(ReplayStep::Message(message)),
                ParseResult::Malformed(malformed) => {
                    warn!(
                        line = malformed.line_number(),
                        error = malformed.error_message(),
                        "Skipping malformed transcript line"
                    );
                    None
                }
            })
            .collect();
        Self::from_steps(steps)
    }

    /// Read a JSONL transcript from disk.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Io` if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, SdkError> {
        let contents = std::fs::read_to_string(path)?;
        debug!(?path, "Loaded replay transcript");
        Ok(Self::from_jsonl(&contents))
    }

    /// Scripted steps.
    pub fn steps(&self) -> &[ReplayStep] {
        &self.steps
    }

    /// Every control response written so far, across all launches.
    pub fn transcript(&self) -> Vec<Value> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every request this launcher was asked to start.
    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionLauncher for ReplayLauncher {
    fn launch(&self, request: &SessionRequest) -> Result<Box<dyn AgentSession>, SdkError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        Ok(Box::new(ReplaySession {
            steps: self.steps.iter().cloned().collect(),
            queued: VecDeque::new(),
            control: ControlHandler::new(request.mcp_server.clone()),
            transcript: Arc::clone(&self.transcript),
        }))
    }
}

struct ReplaySession {
    steps: VecDeque<ReplayStep>,
    queued: VecDeque<SdkEvent>,
    control: ControlHandler,
    transcript: Arc<Mutex<Vec<Value>>>,
}

impl ReplaySession {
    fn record(&self, message: Value) {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

impl AgentSession for ReplaySession {
    fn next_event(&mut self) -> Result<Option<SdkEvent>, SdkError> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Ok(Some(event));
            }
            let Some(step) = self.steps.pop_front() else {
                return Ok(None);
            };

            match step {
                ReplayStep::Failure(message) => return Err(SdkError::Session(message)),
                ReplayStep::Message(StreamMessage::Events(events)) => self.queued.extend(events),
                ReplayStep::Message(StreamMessage::ControlRequest(request)) => {
                    match self.control.handle(request) {
                        ControlAction::Reply(reply) => self.record(reply),
                        ControlAction::Invoke(invocation) => {
                            return Ok(Some(SdkEvent::ToolInvocation(invocation)));
                        }
                    }
                }
                ReplayStep::Message(StreamMessage::ControlResponse { request_id, .. }) => {
                    debug!(?request_id, "Ignoring recorded control response");
                }
            }
        }
    }

    fn respond_to_tool(&mut self, invocation: &ToolInvocation, result: &ToolResult) -> Result<(), SdkError> {
        let response = self.control.tool_response(invocation, result)?;
        self.record(response);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), SdkError> {
        if self.control.pending_invocations() > 0 {
            warn!(
                pending = self.control.pending_invocations(),
                "Replay finished with unanswered tool invocations"
            );
        }
        Ok(())
    }
}
