//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (error rate, latency ranges, capacities)
//! - Validate addresses and connection strings parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{AppConfig, LatencyRange};
use crate::reporting::Dsn;

/// A single semantic problem with a config value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }

    let rate = config.simulation.error_rate;
    if !(0.0..=1.0).contains(&rate) {
        errors.push(ValidationError::new(
            "simulation.error_rate",
            format!("{} is outside [0, 1]", rate),
        ));
    }
    check_range(&mut errors, "simulation.root_latency", config.simulation.root_latency);
    check_range(&mut errors, "simulation.metrics_latency", config.simulation.metrics_latency);
    let timeout_ms = config.server.request_timeout_secs.saturating_mul(1000);
    for (field, range) in [
        ("simulation.root_latency", config.simulation.root_latency),
        ("simulation.metrics_latency", config.simulation.metrics_latency),
    ] {
        if timeout_ms > 0 && range.max_ms >= timeout_ms {
            errors.push(ValidationError::new(
                field,
                format!(
                    "max_ms {} must stay below server.request_timeout_secs ({} ms)",
                    range.max_ms, timeout_ms
                ),
            ));
        }
    }

    if config.telemetry.service_name.trim().is_empty() {
        errors.push(ValidationError::new("telemetry.service_name", "must not be empty"));
    }
    if let Some(endpoint) = &config.telemetry.otlp_endpoint {
        if url::Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new(
                "telemetry.otlp_endpoint",
                format!("'{}' is not a URL", endpoint),
            ));
        }
    }
    if config.telemetry.metrics_export_interval_ms == 0 {
        errors.push(ValidationError::new(
            "telemetry.metrics_export_interval_ms",
            "must be > 0",
        ));
    }
    let buckets = &config.telemetry.duration_buckets;
    if buckets.is_empty() || buckets.windows(2).any(|w| w[0] >= w[1]) {
        errors.push(ValidationError::new(
            "telemetry.duration_buckets",
            "must be non-empty and strictly increasing",
        ));
    }

    if let Some(dsn) = &config.error_reporting.dsn {
        if let Err(e) = dsn.parse::<Dsn>() {
            errors.push(ValidationError::new("error_reporting.dsn", e.to_string()));
        }
    }
    if config.error_reporting.queue_capacity == 0 {
        errors.push(ValidationError::new("error_reporting.queue_capacity", "must be > 0"));
    }
    if config.error_reporting.max_breadcrumbs == 0 {
        errors.push(ValidationError::new("error_reporting.max_breadcrumbs", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_range(errors: &mut Vec<ValidationError>, field: &'static str, range: LatencyRange) {
    if range.min_ms > range.max_ms {
        errors.push(ValidationError::new(
            field,
            format!("min_ms {} exceeds max_ms {}", range.min_ms, range.max_ms),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.server.bind_address = "nowhere".into();
        config.simulation.error_rate = 1.5;
        config.simulation.root_latency = LatencyRange::new(500, 100);
        config.error_reporting.dsn = Some("https://example.com/1".into());
        config.error_reporting.queue_capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "simulation.error_rate",
                "simulation.root_latency",
                "error_reporting.dsn",
                "error_reporting.queue_capacity",
            ]
        );
    }

    #[test]
    fn test_latency_must_fit_inside_request_timeout() {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 1;
        config.simulation.metrics_latency = LatencyRange::new(200, 1000);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "simulation.metrics_latency");

        config.simulation.metrics_latency = LatencyRange::new(200, 999);
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_buckets_must_increase() {
        let mut config = AppConfig::default();
        config.telemetry.duration_buckets = vec![0.1, 0.1, 0.5];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "telemetry.duration_buckets");
    }
}
