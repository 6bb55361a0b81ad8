//! Tests for mode resolution and the emitter.

use super::*;
use serde_json::json;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Mutex;
use std::time::Instant;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[derive(Clone, Default)]
struct RecordingExporter {
    seen: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl LogExporter for RecordingExporter {
    fn export(&self, _resource: &Resource, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        self.seen.lock().unwrap().push(record.event_type().to_string());
        if self.fail {
            return Err(TelemetryError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }
}

fn resource() -> Resource {
    Resource::for_config(&BraintrustConfig {
        api_key: "k".into(),
        project_id: "p".into(),
        endpoint: DEFAULT_OTLP_ENDPOINT.into(),
        service_name: DEFAULT_SERVICE_NAME.into(),
        service_version: None,
    })
}

// ===== Mode resolution =====

#[test]
fn resolve_without_api_key_is_console_only() {
    let mode = TelemetryMode::resolve(env(&[(ENV_PROJECT_ID, "p")]), None);
    assert_eq!(
        mode,
        TelemetryMode::ConsoleOnly {
            reason: "BRAINTRUST_API_KEY not set".into()
        }
    );
}

#[test]
fn resolve_without_project_is_console_only() {
    let mode = TelemetryMode::resolve(env(&[(ENV_API_KEY, "k")]), None);
    assert!(matches!(mode, TelemetryMode::ConsoleOnly { reason } if reason.contains(ENV_PROJECT_ID)));
}

#[test]
fn resolve_treats_blank_values_as_unset() {
    let mode = TelemetryMode::resolve(env(&[(ENV_API_KEY, "  "), (ENV_PROJECT_ID, "p")]), None);
    assert!(matches!(mode, TelemetryMode::ConsoleOnly { .. }));
}

#[test]
fn resolve_uses_defaults_when_only_credentials_set() {
    let mode = TelemetryMode::resolve(env(&[(ENV_API_KEY, "k"), (ENV_PROJECT_ID, "p")]), None);
    let TelemetryMode::Otlp(config) = mode else {
        panic!("expected OTLP mode");
    };
    assert_eq!(config.endpoint, DEFAULT_OTLP_ENDPOINT);
    assert_eq!(config.service_name, DEFAULT_SERVICE_NAME);
    assert_eq!(config.service_version, None);
}

#[test]
fn resolve_endpoint_env_beats_config_fallback() {
    let lookup = env(&[
        (ENV_API_KEY, "k"),
        (ENV_PROJECT_ID, "p"),
        (ENV_ENDPOINT, "http://env/logs"),
    ]);
    let TelemetryMode::Otlp(config) = TelemetryMode::resolve(lookup, Some("http://file/logs")) else {
        panic!("expected OTLP mode");
    };
    assert_eq!(config.endpoint, "http://env/logs");

    let lookup = env(&[(ENV_API_KEY, "k"), (ENV_PROJECT_ID, "p")]);
    let TelemetryMode::Otlp(config) = TelemetryMode::resolve(lookup, Some("http://file/logs")) else {
        panic!("expected OTLP mode");
    };
    assert_eq!(config.endpoint, "http://file/logs");
}

#[test]
fn braintrust_config_debug_redacts_key() {
    let config = BraintrustConfig {
        api_key: "sk-secret".into(),
        project_id: "p".into(),
        endpoint: DEFAULT_OTLP_ENDPOINT.into(),
        service_name: DEFAULT_SERVICE_NAME.into(),
        service_version: None,
    };
    let debug = format!("{config:?}");
    assert!(!debug.contains("sk-secret"));
    assert!(debug.contains("<redacted>"));
}

// ===== Emitter =====

#[test]
fn console_only_mode_builds_no_exporter() {
    let emitter = TelemetryEmitter::from_mode(&TelemetryMode::ConsoleOnly {
        reason: "test".into(),
    });
    assert!(emitter.is_console_only());
    emitter.emit(TelemetryRecord::new("demo.start", &json!({"prompt": "hi"})));
    emitter.shutdown();
}

#[test]
fn emitter_exports_records_in_order() {
    let exporter = RecordingExporter::default();
    let seen = Arc::clone(&exporter.seen);

    let emitter = TelemetryEmitter::with_exporter(resource(), Box::new(exporter));
    assert!(!emitter.is_console_only());
    for event_type in ["query.start", "assistant.text", "result.summary"] {
        emitter.emit(TelemetryRecord::new(event_type, &json!({})));
    }
    emitter.shutdown();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["query.start", "assistant.text", "result.summary"]
    );
}

#[test]
fn emitter_survives_export_failures() {
    let exporter = RecordingExporter {
        fail: true,
        ..RecordingExporter::default()
    };
    let seen = Arc::clone(&exporter.seen);

    let emitter = TelemetryEmitter::with_exporter(resource(), Box::new(exporter));
    emitter.emit(TelemetryRecord::new("a", &json!({})));
    emitter.emit(TelemetryRecord::new("b", &json!({})));
    drop(emitter);

    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[test]
fn shutdown_gives_up_on_a_collector_that_never_answers() {
    // Connections are accepted by the kernel backlog but never read
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let exporter = HttpExporter::new(&BraintrustConfig {
        api_key: "k".into(),
        project_id: "p".into(),
        endpoint: format!("http://127.0.0.1:{port}/otel/v1/logs"),
        service_name: DEFAULT_SERVICE_NAME.into(),
        service_version: None,
    })
    .unwrap();

    let emitter = TelemetryEmitter::with_exporter(resource(), Box::new(exporter))
        .with_flush_timeout(Duration::from_millis(200));
    for event_type in ["demo.start", "assistant.text", "demo.complete"] {
        emitter.emit(TelemetryRecord::new(event_type, &json!({})));
    }

    let started = Instant::now();
    emitter.shutdown();
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "shutdown blocked for {:?}",
        started.elapsed()
    );
    drop(listener);
}

#[test]
fn shutdown_waits_for_a_fast_exporter_within_the_deadline() {
    let exporter = RecordingExporter::default();
    let seen = Arc::clone(&exporter.seen);

    let emitter = TelemetryEmitter::with_exporter(resource(), Box::new(exporter))
        .with_flush_timeout(Duration::from_secs(5));
    for _ in 0..20 {
        emitter.emit(TelemetryRecord::new("tool.lookup_user_profile", &json!({})));
    }
    emitter.shutdown();

    assert_eq!(seen.lock().unwrap().len(), 20);
}
