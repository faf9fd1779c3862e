//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handler produces, per request:
//!     → access log record  → logging.rs (stdout, non-blocking)  → collector (OTLP logs)
//!     → handle_request span → otel.rs (batch exporter)          → collector (OTLP traces)
//!     → counters/histogram  → metrics.rs (registry)             → /metrics (scraped)
//!                                    └→ otel.rs (periodic reader) → collector (OTLP metrics)
//!
//! Consumers (external):
//!     → Collector fans out to the metrics store and the log store
//!     → Dashboards query those stores
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID and trace ID flow into every log record
//! - Metrics are cheap (atomic increments)
//! - OTLP export is optional; without an endpoint only stdout and `/metrics` remain
//! - With an endpoint, request metrics are both scraped and pushed

pub mod logging;
pub mod metrics;
pub mod otel;

use tracing_appender::non_blocking::WorkerGuard;

pub use logging::init_telemetry;
pub use metrics::MetricsRegistry;
pub use otel::OtlpPipeline;

/// Error type for telemetry initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to build OTLP exporter: {0}")]
    Exporter(String),
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("Failed to set global subscriber: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the log writer and exporters alive.
///
/// Call `shutdown()` on exit so pending spans and log records are flushed.
pub struct TelemetryGuard {
    _writer: WorkerGuard,
    otlp: Option<OtlpPipeline>,
}

impl TelemetryGuard {
    fn new(writer: WorkerGuard, otlp: Option<OtlpPipeline>) -> Self {
        Self {
            _writer: writer,
            otlp,
        }
    }

    /// Meter for OTLP metric push, when an endpoint is configured.
    pub fn meter(&self) -> Option<opentelemetry::metrics::Meter> {
        self.otlp.as_ref().map(OtlpPipeline::meter)
    }

    pub fn shutdown(self) {
        if let Some(pipeline) = self.otlp {
            pipeline.shutdown();
        }
        // Dropping the writer guard flushes buffered log lines.
    }
}
