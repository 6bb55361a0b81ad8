//! Domain model types (pure).
//!
//! All types in this module are pure data with smart constructors.

pub mod error;
pub mod event;
pub mod identifiers;
pub mod malformed_line;
pub mod options;
pub mod usage;

// Re-export for convenience
pub use error::{AppError, CommandError, ParseError, SdkError};
pub use event::{ResultSummary, SdkEvent, ToolCall, ToolInvocation};
pub use identifiers::{InvalidInvocationId, InvalidToolUseId, InvocationId, ToolUseId};
pub use malformed_line::MalformedLine;
pub use options::{InvalidPermissionMode, PermissionMode, QueryOptions, PERMISSION_MODES};
pub use usage::TokenUsage;
