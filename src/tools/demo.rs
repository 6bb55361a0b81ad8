//! Demo tools over a fixed in-memory customer dataset.

use super::{pretty_json, ParamType, ToolDefinition, ToolError, ToolRegistry, ToolResult, ToolSchema};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Name of the in-process MCP server that exposes the demo tools.
pub const DEMO_SERVER_NAME: &str = "demo";

/// Profile lookup tool name.
pub const LOOKUP_USER_PROFILE: &str = "lookup_user_profile";
/// Invoice listing tool name.
pub const LIST_OPEN_INVOICES: &str = "list_open_invoices";
/// Summary tool name.
pub const GENERATE_FINANCE_SUMMARY: &str = "generate_finance_summary";

/// Prompt used by `demo-tools` when none is given.
pub const DEFAULT_DEMO_PROMPT: &str = "Demonstrate the available tools. Greet our sample user 'Casey', \
fetch their open invoices, and summarize the results.";

/// The only customer in the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    /// Customer identifier.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// ISO language code.
    pub preferred_language: &'static str,
    /// Plan tier.
    pub tier: &'static str,
}

/// An unpaid invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    /// Invoice number.
    pub id: &'static str,
    /// Amount in USD.
    pub amount: f64,
    /// `due` or `overdue`.
    pub status: &'static str,
    /// ISO date.
    pub due_date: &'static str,
}

/// The sample customer.
pub fn sample_user() -> UserProfile {
    UserProfile {
        id: "casey-123",
        name: "Casey Doe",
        preferred_language: "en",
        tier: "pro",
    }
}

/// The sample customer's open invoices, oldest number first.
pub fn open_invoices() -> Vec<Invoice> {
    vec![
        Invoice {
            id: "INV-001",
            amount: 1200.0,
            status: "due",
            due_date: "2024-09-15",
        },
        Invoice {
            id: "INV-002",
            amount: 580.5,
            status: "overdue",
            due_date: "2024-07-30",
        },
    ]
}

/// Name under which the agent sees a tool served by `server`.
pub fn qualified_tool_name(server: &str, tool: &str) -> String {
    format!("mcp__{server}__{tool}")
}

/// Registry holding the three demo tools.
///
/// # Errors
///
/// Only fails if the tool names collide, which would be a programming error.
pub fn demo_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();

    registry.register(ToolDefinition::new(
        LOOKUP_USER_PROFILE,
        "Fetch a customer profile by identifier",
        ToolSchema::new().param("user_id", ParamType::String),
        lookup_user_profile,
    ))?;

    registry.register(ToolDefinition::new(
        LIST_OPEN_INVOICES,
        "Return invoices that still require payment",
        ToolSchema::new().param("user_id", ParamType::String),
        list_open_invoices,
    ))?;

    registry.register(ToolDefinition::new(
        GENERATE_FINANCE_SUMMARY,
        "Compose a finance summary that can be shared with stakeholders",
        ToolSchema::new()
            .param("user_id", ParamType::String)
            .param("focus", ParamType::String),
        generate_finance_summary,
    ))?;

    Ok(registry)
}

fn user_id(args: &Map<String, Value>) -> &str {
    args.get("user_id").and_then(Value::as_str).unwrap_or_default()
}

/// An empty id means the sample customer.
fn is_other_customer(requested: &str) -> bool {
    !requested.is_empty() && requested != sample_user().id
}

fn to_pretty<T: Serialize>(data: &T) -> Result<String, ToolError> {
    serde_json::to_value(data)
        .map(|value| pretty_json(&value))
        .map_err(|e| ToolError::Handler(e.to_string()))
}

fn lookup_user_profile(args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
    let requested = user_id(args);
    debug!(user_id = requested, "lookup_user_profile");

    if is_other_customer(requested) {
        return Ok(ToolResult::error(format!(
            "No customer found for id '{requested}'."
        )));
    }
    Ok(ToolResult::text(to_pretty(&sample_user())?))
}

fn list_open_invoices(args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
    let requested = user_id(args);
    debug!(user_id = requested, "list_open_invoices");

    if is_other_customer(requested) {
        return Ok(ToolResult::text(format!(
            "No open invoices for customer '{requested}'."
        )));
    }
    Ok(ToolResult::text(to_pretty(&open_invoices())?))
}

fn generate_finance_summary(args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
    debug!(args = ?args, "generate_finance_summary");

    let user = sample_user();
    let invoices = open_invoices();
    let total_due: f64 = invoices.iter().map(|invoice| invoice.amount).sum();
    let urgent = invoices
        .last()
        .ok_or_else(|| ToolError::Handler("no open invoices".to_string()))?;

    Ok(ToolResult::text(format!(
        "Customer {} currently owes {} across {} invoices. The most urgent item is invoice {} which is marked {}.",
        user.name,
        format_usd(total_due),
        invoices.len(),
        urgent.id,
        urgent.status,
    )))
}

/// Format a dollar amount with thousands separators and cents, e.g. `$1,780.50`.
pub fn format_usd(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}
