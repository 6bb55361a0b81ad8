//! Telemetry records and their construction from session events.

use crate::model::{ResultSummary, SdkEvent};
use crate::tools::ToolResult;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Typed attribute value, mirroring the OTLP `AnyValue` subset we emit.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// UTF-8 string.
    String(String),
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Double(f64),
    /// Homogeneous string array.
    StringArray(Vec<String>),
}

impl AttributeValue {
    /// Plain JSON rendering for local logs.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => json!(s),
            Self::Bool(b) => json!(b),
            Self::Int(i) => json!(i),
            Self::Double(d) => json!(d),
            Self::StringArray(items) => json!(items),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// One structured log record, sent as soon as it is built.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    event_type: String,
    timestamp: DateTime<Utc>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl TelemetryRecord {
    /// Build a record stamped with the current time.
    ///
    /// `payload` is flattened: nested objects become `.`-joined keys, string
    /// arrays stay arrays, other arrays are JSON-encoded, nulls are dropped.
    pub fn new(event_type: impl Into<String>, payload: &Value) -> Self {
        let mut attributes = BTreeMap::new();
        match payload {
            Value::Object(map) => flatten_object("", map, &mut attributes),
            other => flatten_value("value".to_string(), other, &mut attributes),
        }
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            attributes,
        }
    }

    /// Replace the timestamp (builder pattern).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Event type tag such as `assistant.text`.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// When the record was built.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Flattened attributes.
    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Single attribute lookup.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Attributes as one JSON object, for the local log line.
    pub fn attributes_json(&self) -> Value {
        Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Record for one session event.
    pub fn from_event(event: &SdkEvent) -> Self {
        match event {
            SdkEvent::System { subtype, data } => Self::new(
                "system.message",
                &json!({ "subtype": subtype, "data": data }),
            ),
            SdkEvent::AssistantText { model, text } => Self::new(
                "assistant.text",
                &json!({ "model": model, "text": text }),
            ),
            SdkEvent::ToolCallRequest(call) => Self::new(
                "assistant.tool_request",
                &json!({ "tool_name": call.name(), "tool_use_id": call.id().as_str() }),
            ),
            SdkEvent::ToolCallResult {
                tool_use_id,
                is_error,
                ..
            } => Self::new(
                "assistant.tool_result",
                &json!({ "tool_use_id": tool_use_id.as_str(), "is_error": is_error }),
            ),
            SdkEvent::ToolInvocation(invocation) => Self::new(
                format!("tool.{}", invocation.tool_name()),
                &json!({
                    "args": invocation.arguments(),
                    "invocation_id": invocation.id().as_str(),
                }),
            ),
            SdkEvent::Result(summary) => Self::new("result.summary", &result_payload(summary)),
            SdkEvent::Other { kind, value } => Self::new(
                "message.unknown",
                &json!({ "kind": kind, "value": value.to_string() }),
            ),
        }
    }

    /// Attach the outcome of a host-side tool run.
    pub fn with_outcome(mut self, result: &ToolResult) -> Self {
        self.attributes
            .insert("is_error".to_string(), AttributeValue::Bool(result.is_error()));
        self
    }
}

fn result_payload(summary: &ResultSummary) -> Value {
    json!({
        "subtype": summary.subtype,
        "is_error": summary.is_error,
        "duration_ms": summary.duration_ms,
        "api_duration_ms": summary.duration_api_ms,
        "total_cost_usd": summary.total_cost_usd,
        "num_turns": summary.num_turns,
        "session_id": summary.session_id,
        "usage": summary.usage,
    })
}

fn flatten_object(prefix: &str, map: &Map<String, Value>, out: &mut BTreeMap<String, AttributeValue>) {
    for (key, value) in map {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        flatten_value(full_key, value, out);
    }
}

fn flatten_value(key: String, value: &Value, out: &mut BTreeMap<String, AttributeValue>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(key, AttributeValue::Bool(*b));
        }
        Value::Number(n) => {
            let attr = match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => AttributeValue::Double(n.as_f64().unwrap_or_default()),
            };
            out.insert(key, attr);
        }
        Value::String(s) => {
            out.insert(key, AttributeValue::String(s.clone()));
        }
        Value::Array(items) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            let attr = match strings {
                Some(strings) => AttributeValue::StringArray(strings),
                None => AttributeValue::String(value.to_string()),
            };
            out.insert(key, attr);
        }
        Value::Object(map) => flatten_object(&key, map, out),
    }
}
