//! OTLP/HTTP JSON encoding and the Braintrust exporter.

use super::record::{AttributeValue, TelemetryRecord};
use super::{BraintrustConfig, TelemetryError};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Instrumentation scope name carried by every batch.
pub const SCOPE_NAME: &str = "claude_code_cli";

/// Header Braintrust uses to route logs to a project.
pub const PARENT_HEADER: &str = "x-bt-parent";

const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);
const SEVERITY_INFO: u8 = 9;

/// Resource attributes attached to every exported batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    attributes: BTreeMap<String, AttributeValue>,
}

impl Resource {
    /// Resource describing this process for the given project.
    pub fn for_config(config: &BraintrustConfig) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "service.name".to_string(),
            AttributeValue::String(config.service_name.clone()),
        );
        attributes.insert("telemetry.sdk.language".to_string(), AttributeValue::from("rust"));
        attributes.insert(
            "braintrust.project_id".to_string(),
            AttributeValue::String(config.project_id.clone()),
        );
        if let Some(version) = &config.service_version {
            attributes.insert(
                "service.version".to_string(),
                AttributeValue::String(version.clone()),
            );
        }
        Self { attributes }
    }

    /// Resource attributes.
    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }
}

/// Encode records as an OTLP `ExportLogsServiceRequest` in JSON form.
pub fn encode_logs_request(resource: &Resource, records: &[TelemetryRecord]) -> Value {
    let log_records: Vec<Value> = records.iter().map(encode_record).collect();
    json!({
        "resourceLogs": [{
            "resource": { "attributes": encode_attributes(resource.attributes()) },
            "scopeLogs": [{
                "scope": { "name": SCOPE_NAME, "version": env!("CARGO_PKG_VERSION") },
                "logRecords": log_records,
            }],
        }],
    })
}

fn encode_record(record: &TelemetryRecord) -> Value {
    // int64 fields are strings in OTLP/JSON
    let nanos = record
        .timestamp()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .to_string();

    let mut attributes = record.attributes().clone();
    attributes.insert(
        "event_type".to_string(),
        AttributeValue::from(record.event_type()),
    );

    json!({
        "timeUnixNano": nanos,
        "observedTimeUnixNano": nanos,
        "severityNumber": SEVERITY_INFO,
        "severityText": "INFO",
        "body": { "stringValue": record.event_type() },
        "attributes": encode_attributes(&attributes),
    })
}

fn encode_attributes(attributes: &BTreeMap<String, AttributeValue>) -> Vec<Value> {
    attributes
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": any_value(value) }))
        .collect()
}

fn any_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::String(s) => json!({ "stringValue": s }),
        AttributeValue::Bool(b) => json!({ "boolValue": b }),
        AttributeValue::Int(i) => json!({ "intValue": i.to_string() }),
        AttributeValue::Double(d) => json!({ "doubleValue": d }),
        AttributeValue::StringArray(items) => {
            let values: Vec<Value> = items.iter().map(|s| json!({ "stringValue": s })).collect();
            json!({ "arrayValue": { "values": values } })
        }
    }
}

/// Destination for telemetry records.
///
/// Implementations run on the background export thread, one record at a time.
pub trait LogExporter: Send {
    /// Deliver one record.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError` on transport or HTTP failures. Callers log
    /// and drop the record.
    fn export(&self, resource: &Resource, record: &TelemetryRecord) -> Result<(), TelemetryError>;
}

/// Blocking OTLP/HTTP exporter for the Braintrust logs endpoint.
#[derive(Debug)]
pub struct HttpExporter {
    client: Client,
    endpoint: String,
}

impl HttpExporter {
    /// Build a client with the bearer token and project routing headers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeader` if the key or project id cannot be sent as a
    /// header, or `Http` if the client cannot be built.
    pub fn new(config: &BraintrustConfig) -> Result<Self, TelemetryError> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| TelemetryError::InvalidHeader(AUTHORIZATION.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let parent = HeaderValue::from_str(&format!("project_id:{}", config.project_id))
            .map_err(|_| TelemetryError::InvalidHeader(PARENT_HEADER.to_string()))?;
        headers.insert(PARENT_HEADER, parent);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(EXPORT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Target URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LogExporter for HttpExporter {
    fn export(&self, resource: &Resource, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        let body = encode_logs_request(resource, std::slice::from_ref(record));
        let response = self.client.post(&self.endpoint).json(&body).send()?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(TelemetryError::Status {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        })
    }
}
