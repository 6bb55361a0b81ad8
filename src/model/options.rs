//! Options forwarded to the agent SDK for one session.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Accepted spellings of [`PermissionMode`], in CLI order.
pub const PERMISSION_MODES: [&str; 4] = ["default", "acceptEdits", "bypassPermissions", "plan"];

/// SDK policy controlling whether the agent may act without confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionMode {
    /// Ask before every potentially destructive action.
    Default,
    /// Apply file edits without asking.
    AcceptEdits,
    /// Never ask.
    BypassPermissions,
    /// Plan only, do not act.
    Plan,
}

impl PermissionMode {
    /// Wire spelling used by the SDK.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::Plan => "plan",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised permission mode string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission mode '{0}' (expected one of: default, acceptEdits, bypassPermissions, plan)")]
pub struct InvalidPermissionMode(pub String);

impl FromStr for PermissionMode {
    type Err = InvalidPermissionMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "acceptEdits" => Ok(Self::AcceptEdits),
            "bypassPermissions" => Ok(Self::BypassPermissions),
            "plan" => Ok(Self::Plan),
            other => Err(InvalidPermissionMode(other.to_string())),
        }
    }
}

/// Flat set of call options for one agent session.
///
/// No cross-field invariants; `None` means "use the SDK default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// System prompt override.
    pub system_prompt: Option<String>,
    /// Tools the agent may call without prompting.
    pub allowed_tools: Vec<String>,
    /// Permission policy.
    pub permission_mode: Option<PermissionMode>,
    /// Model identifier.
    pub model: Option<String>,
    /// Working directory exposed to the agent.
    pub cwd: Option<PathBuf>,
    /// Turn limit.
    pub max_turns: Option<u32>,
}
