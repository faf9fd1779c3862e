//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global subscriber
//! - Attach the OTLP trace and log layers when an endpoint is configured
//! - Keep log I/O off the request path
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config; `RUST_LOG` takes precedence
//! - stdout is written through a `tracing-appender` non-blocking worker

use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use super::otel::OtlpPipeline;
use super::{TelemetryError, TelemetryGuard};
use crate::config::{LogFormat, TelemetryConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. Must run inside the Tokio runtime when OTLP is enabled.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    let (writer, writer_guard) = tracing_appender::non_blocking(std::io::stdout());
    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer().with_writer(writer).boxed(),
    });

    let otlp = match &config.otlp_endpoint {
        Some(endpoint) => Some(OtlpPipeline::install(config, endpoint)?),
        None => None,
    };
    if let Some(pipeline) = &otlp {
        layers.push(
            tracing_opentelemetry::layer()
                .with_tracer(pipeline.tracer(&config.service_name))
                .boxed(),
        );
        layers.push(
            OpenTelemetryTracingBridge::new(pipeline.logger_provider())
                .with_filter(export_filter())
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard::new(writer_guard, otlp))
}

/// Exporter internals must not be fed back into the log exporter.
fn export_filter() -> Targets {
    Targets::new()
        .with_default(LevelFilter::INFO)
        .with_target("opentelemetry", LevelFilter::OFF)
        .with_target("opentelemetry_sdk", LevelFilter::OFF)
        .with_target("opentelemetry_otlp", LevelFilter::OFF)
        .with_target("tonic", LevelFilter::OFF)
        .with_target("h2", LevelFilter::OFF)
        .with_target("hyper", LevelFilter::OFF)
        .with_target("reqwest", LevelFilter::OFF)
}
