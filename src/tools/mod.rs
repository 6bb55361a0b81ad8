//! In-process tool registry.
//!
//! Tools are plain closures paired with a flat parameter schema. The
//! registry validates arguments before calling a handler and converts every
//! failure into an error-flagged [`ToolResult`], so the agent session keeps
//! running when a tool misbehaves.

pub mod demo;

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by registration and invocation.
///
/// [`ToolRegistry::invoke`] folds these into error results; only
/// [`ToolRegistry::register`] and [`ToolRegistry::try_invoke`] return them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// A tool with this name is already registered.
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// No tool with this name is registered.
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    /// Arguments do not match the tool's schema.
    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments {
        /// Tool being invoked.
        tool: String,
        /// What did not match.
        reason: String,
    },

    /// The handler reported a failure.
    #[error("Tool handler failed: {0}")]
    Handler(String),

    /// The handler panicked.
    #[error("Tool '{0}' panicked")]
    Panicked(String),
}

// ===== Schema =====

/// Primitive JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// Whole JSON number.
    Integer,
    /// JSON boolean.
    Boolean,
}

impl ParamType {
    /// JSON Schema type name.
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    /// Whether `value` has this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// Ordered mapping of parameter name to primitive type.
///
/// Every declared parameter is required. Extra arguments are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSchema {
    params: Vec<(String, ParamType)>,
}

impl ToolSchema {
    /// Empty schema (tool takes no arguments).
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required parameter (builder pattern).
    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push((name.into(), ty));
        self
    }

    /// Declared parameters in declaration order.
    pub fn params(&self) -> &[(String, ParamType)] {
        &self.params
    }

    /// Check `args` against the schema.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` when `args` is not an object, a parameter
    /// is missing, or a parameter has the wrong type.
    pub fn validate<'a>(&self, tool: &str, args: &'a Value) -> Result<&'a Map<String, Value>, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason,
        };

        let object = args
            .as_object()
            .ok_or_else(|| invalid("arguments must be a JSON object".to_string()))?;

        for (name, ty) in &self.params {
            match object.get(name) {
                None | Some(Value::Null) => {
                    return Err(invalid(format!("missing required parameter '{name}'")));
                }
                Some(value) if !ty.accepts(value) => {
                    return Err(invalid(format!(
                        "parameter '{name}' must be of type {}",
                        ty.json_type()
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(object)
    }

    /// JSON Schema object advertised to the agent.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|(name, ty)| (name.clone(), json!({ "type": ty.json_type() })))
            .collect();
        let required: Vec<&str> = self.params.iter().map(|(name, _)| name.as_str()).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

// ===== Results =====

/// One content item of a tool result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolContent {
    /// Plain text.
    Text(String),
}

/// Outcome of a tool call with an explicit error flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    content: Vec<ToolContent>,
    is_error: bool,
}

impl ToolResult {
    /// Successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text(text.into())],
            is_error: false,
        }
    }

    /// Error-flagged text result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text(text.into())],
            is_error: true,
        }
    }

    /// Whether the tool failed.
    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// Content items.
    pub fn content(&self) -> &[ToolContent] {
        &self.content
    }

    /// All text content joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|ToolContent::Text(text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// MCP `tools/call` result payload.
    pub fn to_mcp_value(&self) -> Value {
        let content: Vec<Value> = self
            .content
            .iter()
            .map(|ToolContent::Text(text)| json!({ "type": "text", "text": text }))
            .collect();
        json!({ "content": content, "isError": self.is_error })
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::error(err.to_string())
    }
}

// ===== Definitions =====

/// Handler signature: validated arguments in, result out.
pub type ToolHandler = Box<dyn Fn(&Map<String, Value>) -> Result<ToolResult, ToolError> + Send + Sync>;

/// A registered tool. Immutable after registration.
pub struct ToolDefinition {
    name: String,
    description: String,
    schema: ToolSchema,
    handler: ToolHandler,
}

impl ToolDefinition {
    /// Create a definition from its parts.
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<ToolResult, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(handler),
        }
    }

    /// Tool name, unique within a registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description shown to the agent.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parameter schema.
    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    /// Descriptor advertised through MCP `tools/list`.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.to_json_schema(),
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Serializable description of a tool, detached from its handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Description.
    pub description: String,
    /// JSON Schema for the arguments.
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// MCP `tools/list` entry.
    pub fn to_mcp_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

// ===== Registry =====

/// Name-keyed collection of tools.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTool` if the name is already registered.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), ToolError> {
        if self.tools.contains_key(definition.name()) {
            return Err(ToolError::DuplicateTool(definition.name().to_string()));
        }
        debug!(tool = definition.name(), "Registered tool");
        self.tools.insert(definition.name().to_string(), definition);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every registered tool, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(ToolDefinition::descriptor).collect()
    }

    /// Validate and run a tool, returning the typed error on failure.
    ///
    /// A panicking handler is caught and reported as `Panicked`.
    ///
    /// # Errors
    ///
    /// `UnknownTool`, `InvalidArguments`, `Handler` or `Panicked`.
    pub fn try_invoke(&self, name: &str, args: &Value) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let arguments = tool.schema.validate(name, args)?;

        catch_unwind(AssertUnwindSafe(|| (tool.handler)(arguments)))
            .map_err(|_| ToolError::Panicked(name.to_string()))?
    }

    /// Validate and run a tool. Never fails: every error is folded into an
    /// error-flagged result.
    pub fn invoke(&self, name: &str, args: &Value) -> ToolResult {
        match self.try_invoke(name, args) {
            Ok(result) => result,
            Err(err) => {
                warn!(tool = name, error = %err, "Tool invocation failed");
                ToolResult::from(err)
            }
        }
    }
}

/// Pretty-print JSON with two-space indentation and sorted keys.
///
/// Object keys come out sorted because `serde_json::Map` is ordered.
pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
