//! Identifier newtypes with smart constructors.
//!
//! All identifiers validate non-empty strings at construction time.
//! Raw constructors are never exported - use smart constructors only.

use std::fmt;

/// Identifier linking an assistant `tool_use` block to its `tool_result`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolUseId(String);

impl ToolUseId {
    /// Smart constructor: validates non-empty tool use ID
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidToolUseId> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(InvalidToolUseId::Empty);
        }
        Ok(Self(raw))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolUseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a host-side tool invocation.
///
/// For the live CLI this is the `request_id` of the control request that
/// carried the MCP `tools/call`; the session uses it to route the answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationId(String);

impl InvocationId {
    /// Smart constructor: validates non-empty invocation ID
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidInvocationId> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(InvalidInvocationId::Empty);
        }
        Ok(Self(raw))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ===== Error Types =====

/// Rejected [`ToolUseId`] input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidToolUseId {
    /// The identifier was the empty string.
    #[error("Tool Use ID cannot be empty")]
    Empty,
}

/// Rejected [`InvocationId`] input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInvocationId {
    /// The identifier was the empty string.
    #[error("Invocation ID cannot be empty")]
    Empty,
}

// ===== Tests =====
