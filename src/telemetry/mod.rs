//! Braintrust telemetry over OTLP/HTTP.
//!
//! Every record is written to the local tracing log. When Braintrust
//! credentials are present the record is also queued for a background
//! thread that posts it to the OTLP logs endpoint. Export failures are
//! logged as warnings and never reach the command.

pub mod otlp;
pub mod record;

pub use otlp::{encode_logs_request, HttpExporter, LogExporter, Resource};
pub use record::{AttributeValue, TelemetryRecord};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Braintrust OTLP logs endpoint used when none is configured.
pub const DEFAULT_OTLP_ENDPOINT: &str = "https://api.braintrust.dev/otel/v1/logs";

/// How long [`TelemetryEmitter::shutdown`] waits for queued records.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// `service.name` used when `BRAINTRUST_SERVICE_NAME` is unset.
pub const DEFAULT_SERVICE_NAME: &str = "claude-code-cli";

/// Environment variable holding the Braintrust API key.
pub const ENV_API_KEY: &str = "BRAINTRUST_API_KEY";
/// Environment variable holding the Braintrust project id.
pub const ENV_PROJECT_ID: &str = "BRAINTRUST_PROJECT_ID";
/// Environment variable overriding the OTLP endpoint.
pub const ENV_ENDPOINT: &str = "BRAINTRUST_OTLP_ENDPOINT";
/// Environment variable overriding `service.name`.
pub const ENV_SERVICE_NAME: &str = "BRAINTRUST_SERVICE_NAME";
/// Environment variable setting `service.version`.
pub const ENV_SERVICE_VERSION: &str = "BRAINTRUST_SERVICE_VERSION";

/// Errors raised while exporting telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A credential cannot be encoded as an HTTP header value.
    #[error("Invalid value for header {0}")]
    InvalidHeader(String),

    /// Transport failure.
    #[error("OTLP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The collector answered with a non-success status.
    #[error("OTLP collector returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
}

/// Credentials and routing for the Braintrust collector.
#[derive(Clone, PartialEq, Eq)]
pub struct BraintrustConfig {
    /// Bearer token.
    pub api_key: String,
    /// Project receiving the logs.
    pub project_id: String,
    /// OTLP/HTTP logs URL.
    pub endpoint: String,
    /// `service.name` resource attribute.
    pub service_name: String,
    /// `service.version` resource attribute.
    pub service_version: Option<String>,
}

impl fmt::Debug for BraintrustConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BraintrustConfig")
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("endpoint", &self.endpoint)
            .field("service_name", &self.service_name)
            .field("service_version", &self.service_version)
            .finish()
    }
}

/// Where records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryMode {
    /// Local log plus OTLP export.
    Otlp(BraintrustConfig),
    /// Local log only.
    ConsoleOnly {
        /// Why export is disabled.
        reason: String,
    },
}

impl TelemetryMode {
    /// Resolve from the process environment.
    ///
    /// `endpoint_fallback` (from the config file) applies when
    /// `BRAINTRUST_OTLP_ENDPOINT` is unset.
    pub fn from_env(endpoint_fallback: Option<&str>) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), endpoint_fallback)
    }

    /// Resolve using `lookup` for environment access. Empty values count as
    /// unset.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>, endpoint_fallback: Option<&str>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let Some(api_key) = get(ENV_API_KEY) else {
            return Self::ConsoleOnly {
                reason: format!("{ENV_API_KEY} not set"),
            };
        };
        let Some(project_id) = get(ENV_PROJECT_ID) else {
            return Self::ConsoleOnly {
                reason: format!("{ENV_PROJECT_ID} not set"),
            };
        };

        let endpoint = get(ENV_ENDPOINT)
            .or_else(|| endpoint_fallback.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string());

        Self::Otlp(BraintrustConfig {
            api_key,
            project_id,
            endpoint,
            service_name: get(ENV_SERVICE_NAME).unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            service_version: get(ENV_SERVICE_VERSION),
        })
    }
}

/// Sink for telemetry records.
///
/// Dropping the emitter (or calling [`TelemetryEmitter::shutdown`]) waits for
/// queued records to be exported, up to one overall flush timeout. Records
/// still queued after that are dropped.
#[derive(Debug)]
pub struct TelemetryEmitter {
    sender: Option<Sender<TelemetryRecord>>,
    worker: Option<JoinHandle<()>>,
    // Disconnects when the worker exits
    finished: Option<Receiver<()>>,
    abandoned: Arc<AtomicBool>,
    flush_timeout: Duration,
}

impl TelemetryEmitter {
    /// Emitter that only writes to the local log. No HTTP client is built.
    pub fn console_only() -> Self {
        Self {
            sender: None,
            worker: None,
            finished: None,
            abandoned: Arc::new(AtomicBool::new(false)),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }

    /// Emitter for a resolved mode. A client that fails to build downgrades
    /// to console-only.
    pub fn from_mode(mode: &TelemetryMode) -> Self {
        match mode {
            TelemetryMode::ConsoleOnly { reason } => {
                warn!("Braintrust export disabled: {reason}");
                Self::console_only()
            }
            TelemetryMode::Otlp(config) => match HttpExporter::new(config) {
                Ok(exporter) => {
                    info!(endpoint = exporter.endpoint(), project_id = %config.project_id, "Braintrust export enabled");
                    Self::with_exporter(Resource::for_config(config), Box::new(exporter))
                }
                Err(e) => {
                    error!("Failed to configure Braintrust export: {e}");
                    Self::console_only()
                }
            },
        }
    }

    /// Emitter that hands records to `exporter` on a background thread.
    pub fn with_exporter(resource: Resource, exporter: Box<dyn LogExporter>) -> Self {
        let (sender, receiver) = mpsc::channel::<TelemetryRecord>();
        let (finished_tx, finished) = mpsc::channel::<()>();
        let abandoned = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&abandoned);

        let spawned = thread::Builder::new()
            .name("telemetry-export".to_string())
            .spawn(move || {
                let _finished = finished_tx;
                for record in receiver {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    match exporter.export(&resource, &record) {
                        Ok(()) => debug!(event_type = record.event_type(), "Exported record"),
                        Err(e) => warn!(event_type = record.event_type(), "Telemetry export failed: {e}"),
                    }
                }
            });

        match spawned {
            Ok(worker) => Self {
                sender: Some(sender),
                worker: Some(worker),
                finished: Some(finished),
                abandoned,
                flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            },
            Err(e) => {
                error!("Failed to start telemetry export thread: {e}");
                Self::console_only()
            }
        }
    }

    /// Replace the overall flush timeout used at shutdown.
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Whether records stay local.
    pub fn is_console_only(&self) -> bool {
        self.sender.is_none()
    }

    /// Log `record` locally and queue it for export.
    pub fn emit(&self, record: TelemetryRecord) {
        info!(
            event_type = record.event_type(),
            attributes = %record.attributes_json(),
            "{}",
            record.event_type()
        );

        if let Some(sender) = &self.sender {
            if sender.send(record).is_err() {
                warn!("Telemetry export thread stopped; record dropped");
            }
        }
    }

    /// Flush queued records and stop the export thread.
    pub fn shutdown(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        // Closing the channel ends the worker loop
        self.sender.take();
        let Some(worker) = self.worker.take() else {
            return;
        };

        let drained = match self.finished.take() {
            Some(finished) => match finished.recv_timeout(self.flush_timeout) {
                Err(RecvTimeoutError::Timeout) => false,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            },
            None => true,
        };

        if !drained {
            // A blocked request cannot be cancelled; detach the worker
            self.abandoned.store(true, Ordering::Relaxed);
            warn!(
                timeout_ms = self.flush_timeout.as_millis() as u64,
                "Telemetry flush timed out; remaining records dropped"
            );
            return;
        }
        if worker.join().is_err() {
            warn!("Telemetry export thread panicked");
        }
    }
}

impl Drop for TelemetryEmitter {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
