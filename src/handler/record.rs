//! The per-request telemetry record and its access log line.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::outcome::{Outcome, Route};

/// Target of the one access log record every request emits.
pub const ACCESS_LOG_TARGET: &str = "telemetry_demo::access";

/// Immutable summary of one handled request.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub route: &'static str,
    pub outcome: &'static str,
    pub status: u16,
    #[serde(with = "duration_secs")]
    pub latency: Duration,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
}

impl TelemetryRecord {
    pub fn new(
        route: Route,
        outcome: Outcome,
        latency: Duration,
        request_id: impl Into<String>,
        trace_id: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            route: route.path(),
            outcome: outcome.as_str(),
            status: outcome.status_code(),
            latency,
            request_id: request_id.into(),
            trace_id,
            error_type: None,
        }
    }

    pub fn with_error_type(mut self, error_type: &'static str) -> Self {
        self.error_type = Some(error_type);
        self
    }

    /// Emit the access log: ERROR for failures, WARN for abandoned requests, INFO otherwise.
    pub fn emit(&self) {
        let latency_ms = self.latency.as_secs_f64() * 1000.0;
        let trace_id = self.trace_id.as_deref().unwrap_or("");
        if self.status >= 500 {
            tracing::error!(
                target: ACCESS_LOG_TARGET,
                route = self.route,
                outcome = self.outcome,
                status = self.status,
                latency_ms,
                request_id = %self.request_id,
                trace_id,
                error_type = self.error_type.unwrap_or(""),
                "Request to {} failed",
                self.route
            );
        } else if self.status >= 400 {
            tracing::warn!(
                target: ACCESS_LOG_TARGET,
                route = self.route,
                outcome = self.outcome,
                status = self.status,
                latency_ms,
                request_id = %self.request_id,
                trace_id,
                "Request to {} abandoned before completion",
                self.route
            );
        } else {
            tracing::info!(
                target: ACCESS_LOG_TARGET,
                route = self.route,
                outcome = self.outcome,
                status = self.status,
                latency_ms,
                request_id = %self.request_id,
                trace_id,
                "Successfully processed request to {}",
                self.route
            );
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}
