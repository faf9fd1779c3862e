//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then process environment, then validate.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };
    let config = apply_env(config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Overlay environment variables onto `config`. `lookup` returns a variable's value.
pub fn apply_env<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(addr) = get("APP_BIND_ADDRESS") {
        config.server.bind_address = addr;
    }
    if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(endpoint);
    }
    if let Some(protocol) = get("OTEL_EXPORTER_OTLP_PROTOCOL") {
        config.telemetry.otlp_protocol = protocol.parse().map_err(|value| ConfigError::Env {
            var: "OTEL_EXPORTER_OTLP_PROTOCOL",
            value,
        })?;
    }
    if let Some(interval) = get("OTEL_METRIC_EXPORT_INTERVAL") {
        config.telemetry.metrics_export_interval_ms =
            interval.trim().parse().map_err(|_| ConfigError::Env {
                var: "OTEL_METRIC_EXPORT_INTERVAL",
                value: interval.clone(),
            })?;
    }
    if let Some(name) = get("OTEL_SERVICE_NAME") {
        config.telemetry.service_name = name;
    }
    if let Some(environment) = get("SENTRY_ENVIRONMENT").or_else(|| get("ENVIRONMENT")) {
        config.telemetry.environment = environment;
    }
    if let Some(dsn) = get("SENTRY_DSN") {
        config.error_reporting.dsn = Some(dsn);
    }
    if let Some(release) = get("SENTRY_RELEASE") {
        config.error_reporting.release = Some(release);
    }
    if let Some(rate) = get("APP_ERROR_RATE") {
        config.simulation.error_rate = rate.trim().parse().map_err(|_| ConfigError::Env {
            var: "APP_ERROR_RATE",
            value: rate.clone(),
        })?;
    }
    if let Some(seed) = get("APP_SEED") {
        config.simulation.seed = Some(seed.trim().parse().map_err(|_| ConfigError::Env {
            var: "APP_SEED",
            value: seed.clone(),
        })?);
    }

    Ok(config)
}
