//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Synthetic outcome and latency parameters.
    pub simulation: SimulationConfig,

    /// Logging, tracing and metrics export.
    pub telemetry: TelemetryConfig,

    /// Error tracker connection.
    pub error_reporting: ErrorReportingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Grace period for draining telemetry on shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 5,
        }
    }
}

/// Inclusive-exclusive range of simulated processing time.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    pub const ZERO: LatencyRange = LatencyRange { min_ms: 0, max_ms: 0 };

    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }
}

/// Outcome and latency simulation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Probability that a default-route request fails (0.0–1.0).
    pub error_rate: f64,

    /// Seed for reproducible outcomes. `None` uses the thread RNG.
    pub seed: Option<u64>,

    /// Processing time simulated on the default route.
    pub root_latency: LatencyRange,

    /// Processing time simulated on the metrics routes.
    pub metrics_latency: LatencyRange,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            error_rate: 0.10,
            seed: None,
            root_latency: LatencyRange::new(100, 500),
            metrics_latency: LatencyRange::new(200, 800),
        }
    }
}

/// OTLP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OtlpProtocol {
    #[serde(rename = "grpc")]
    Grpc,
    #[serde(rename = "http/protobuf")]
    HttpProtobuf,
}

impl std::str::FromStr for OtlpProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "grpc" => Ok(OtlpProtocol::Grpc),
            "http/protobuf" | "http" => Ok(OtlpProtocol::HttpProtobuf),
            other => Err(other.to_string()),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `service.name` resource attribute and `service` metric label.
    pub service_name: String,

    /// Deployment environment tag.
    pub environment: String,

    /// Log filter directive (RUST_LOG syntax); `RUST_LOG` wins when set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Collector endpoint. `None` disables OTLP export.
    pub otlp_endpoint: Option<String>,

    /// OTLP transport: gRPC (4317) or HTTP/protobuf (4318).
    pub otlp_protocol: OtlpProtocol,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,

    /// Interval between OTLP metric pushes, in milliseconds.
    pub metrics_export_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "simple-app".to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            otlp_endpoint: None,
            otlp_protocol: OtlpProtocol::Grpc,
            duration_buckets: crate::observability::metrics::DEFAULT_DURATION_BUCKETS.to_vec(),
            metrics_export_interval_ms: 60_000,
        }
    }
}

/// Error tracker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorReportingConfig {
    /// Connection string. `None` logs events locally instead of sending them.
    pub dsn: Option<String>,

    /// Release identifier attached to events.
    pub release: Option<String>,

    /// Bounded queue size between handlers and the delivery worker.
    pub queue_capacity: usize,

    /// Breadcrumbs kept per request.
    pub max_breadcrumbs: usize,

    /// Per-event delivery timeout in seconds.
    pub send_timeout_secs: u64,
}

impl Default for ErrorReportingConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            release: None,
            queue_capacity: crate::reporting::reporter::DEFAULT_QUEUE_CAPACITY,
            max_breadcrumbs: crate::reporting::scope::DEFAULT_MAX_BREADCRUMBS,
            send_timeout_secs: 5,
        }
    }
}
