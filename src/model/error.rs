//! Error types for claude-code-cli.
//!
//! This module defines the error taxonomy using `thiserror`. Errors compose
//! via `?` and `From` conversions up to [`AppError`], which `main` turns into
//! a message on stderr and a non-zero exit code.
//!
//! # Error Hierarchy
//!
//! - [`AppError`] - Top-level error wrapping every fatal failure
//!   - [`ConfigError`] - Config file read/parse failures
//!   - [`LoggingError`] - Tracing subscriber setup failures
//!   - [`CommandError`] - A command could not complete
//!     - [`SdkError`] - The agent session failed (spawn, I/O, non-zero exit)
//!
//! # Non-fatal errors
//!
//! - [`ParseError`] - a malformed protocol line is logged and skipped.
//! - Tool failures become error-flagged tool results (see `tools`).
//! - Telemetry delivery failures are logged with `warn!` (see `telemetry`).

use crate::config::ConfigError;
use crate::logging::LoggingError;
use crate::model::InvocationId;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be initialised.
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    /// The selected command failed.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Failure of a `query` or `demo-tools` run.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The agent session could not be started or broke down mid-stream.
    #[error(transparent)]
    Sdk(#[from] SdkError),

    /// The agent finished but reported failure in its result summary.
    #[error("Agent run failed ({subtype}): {message}")]
    AgentFailed {
        /// Result subtype, e.g. `error_max_turns`.
        subtype: String,
        /// Result text or a generic description.
        message: String,
    },

    /// Rendering to stdout failed.
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Errors raised by the agent SDK boundary.
///
/// These are surfaced to the user verbatim and never retried.
#[derive(Debug, Error)]
pub enum SdkError {
    /// `ANTHROPIC_API_KEY` is not exported.
    #[error("ANTHROPIC_API_KEY is not set. Export your Claude API key before running.")]
    MissingApiKey,

    /// The `claude` executable could not be started.
    #[error("Failed to start {program:?}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the agent process failed.
    #[error("Agent I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A control message could not be encoded.
    #[error("Failed to encode control message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The agent process exited unsuccessfully.
    #[error("Claude Code exited with {}: {stderr}", exit_code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    ProcessFailed {
        /// Exit status, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// The session reported an error without a process-level failure.
    #[error("Agent session failed: {0}")]
    Session(String),

    /// An answer was sent for an invocation the session never issued.
    #[error("No pending tool invocation with id {0}")]
    UnknownInvocation(InvocationId),
}

/// Errors encountered when parsing one stream-json line.
///
/// Parse errors are **non-fatal**: the line is logged and skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line is not valid JSON.
    #[error("Invalid JSON at line {line}: {message}")]
    InvalidJson {
        /// The 1-based line number in the stream.
        line: usize,
        /// The JSON parser error message.
        message: String,
    },

    /// A required field is absent or empty.
    #[error("Missing required field '{field}' at line {line}")]
    MissingField {
        /// The 1-based line number in the stream.
        line: usize,
        /// Name of the missing field.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn parse_error_invalid_json_display() {
        let err = ParseError::InvalidJson {
            line: 42,
            message: "unexpected character '}'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid JSON"));
        assert!(msg.contains("line 42"));
        assert!(msg.contains("unexpected character '}'"));
    }

    #[test]
    fn parse_error_missing_field_display() {
        let err = ParseError::MissingField {
            line: 15,
            field: "request_id",
        };
        let msg = err.to_string();
        assert!(msg.contains("'request_id'"));
        assert!(msg.contains("line 15"));
    }

    #[test]
    fn sdk_error_process_failed_mentions_status_and_stderr() {
        let err = SdkError::ProcessFailed {
            exit_code: Some(1),
            stderr: "Invalid API key".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status 1"));
        assert!(msg.contains("Invalid API key"));

        let signalled = SdkError::ProcessFailed {
            exit_code: None,
            stderr: String::new(),
        };
        assert!(signalled.to_string().contains("a signal"));
    }

    #[test]
    fn command_error_from_sdk_error_is_transparent() {
        let cmd: CommandError = SdkError::Session("authentication_failed".into()).into();
        assert_eq!(cmd.to_string(), "Agent session failed: authentication_failed");
    }

    #[test]
    fn app_error_from_io_through_command_error() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broken");
        let cmd: CommandError = io_err.into();
        let app: AppError = cmd.into();
        let msg = app.to_string();
        assert!(msg.contains("Failed to write output"));
        assert!(msg.contains("pipe broken"));
    }

    #[test]
    fn app_error_from_config_error() {
        let err: AppError = ConfigError::InvalidPath("bad".into()).into();
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
