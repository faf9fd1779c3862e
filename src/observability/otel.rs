//! OTLP export of traces, metrics and logs to the collector.
//!
//! # Responsibilities
//! - Build span, metric and log exporters (gRPC on 4317 or HTTP/protobuf on 4318)
//! - Batch spans and logs, push metrics periodically; all on the Tokio runtime
//! - Install W3C Trace Context propagation
//! - Flush and shut down on exit
//!
//! # Design Decisions
//! - Disabled entirely when no endpoint is configured
//! - Resource carries `service.name` and `deployment.environment`

use std::time::Duration;

use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};

use super::TelemetryError;
use crate::config::{OtlpProtocol, TelemetryConfig};

/// Instrumentation scope of the mirrored request metrics.
pub const METER_NAME: &str = "telemetry-demo";

/// Installed span, metric and log providers.
pub struct OtlpPipeline {
    tracer_provider: TracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: LoggerProvider,
}

impl OtlpPipeline {
    /// Build exporters for `endpoint` and register the tracer and meter providers globally.
    pub fn install(config: &TelemetryConfig, endpoint: &str) -> Result<Self, TelemetryError> {
        let resource = resource(config);

        let span_exporter = match config.otlp_protocol {
            OtlpProtocol::Grpc => SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build(),
            OtlpProtocol::HttpProtobuf => SpanExporter::builder()
                .with_http()
                .with_endpoint(signal_url(endpoint, "traces"))
                .build(),
        }
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let metric_exporter = match config.otlp_protocol {
            OtlpProtocol::Grpc => MetricExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build(),
            OtlpProtocol::HttpProtobuf => MetricExporter::builder()
                .with_http()
                .with_endpoint(signal_url(endpoint, "metrics"))
                .build(),
        }
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let log_exporter = match config.otlp_protocol {
            OtlpProtocol::Grpc => LogExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build(),
            OtlpProtocol::HttpProtobuf => LogExporter::builder()
                .with_http()
                .with_endpoint(signal_url(endpoint, "logs"))
                .build(),
        }
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let tracer_provider = TracerProvider::builder()
            .with_batch_exporter(span_exporter, runtime::Tokio)
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource.clone())
            .build();

        let reader = PeriodicReader::builder(metric_exporter, runtime::Tokio)
            .with_interval(Duration::from_millis(config.metrics_export_interval_ms))
            .build();
        let meter_provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource.clone())
            .build();

        let logger_provider = LoggerProvider::builder()
            .with_batch_exporter(log_exporter, runtime::Tokio)
            .with_resource(resource)
            .build();

        global::set_text_map_propagator(TraceContextPropagator::new());
        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        tracing::debug!(
            endpoint = %endpoint,
            protocol = ?config.otlp_protocol,
            "OTLP pipeline installed"
        );

        Ok(Self {
            tracer_provider,
            meter_provider,
            logger_provider,
        })
    }

    pub fn tracer(&self, name: &str) -> Tracer {
        self.tracer_provider.tracer(name.to_string())
    }

    /// Meter that request metrics are mirrored into for OTLP push.
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(METER_NAME)
    }

    pub fn logger_provider(&self) -> &LoggerProvider {
        &self.logger_provider
    }

    /// Flush pending batches and stop the exporters.
    pub fn shutdown(self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            tracing::error!("Failed to shutdown tracer provider: {}", e);
        }
        if let Err(e) = self.meter_provider.shutdown() {
            tracing::error!("Failed to shutdown meter provider: {}", e);
        }
        if let Err(e) = self.logger_provider.shutdown() {
            tracing::error!("Failed to shutdown logger provider: {}", e);
        }
    }
}

fn resource(config: &TelemetryConfig) -> Resource {
    Resource::new(vec![
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            config.service_name.clone(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        ),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ])
}

/// HTTP exporters take the full per-signal URL: `{base}/v1/{signal}`.
fn signal_url(endpoint: &str, signal: &str) -> String {
    format!("{}/v1/{}", endpoint.trim_end_matches('/'), signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Outcome, Route};
    use crate::observability::metrics::{MetricsRegistry, DEFAULT_DURATION_BUCKETS};

    #[test]
    fn test_signal_url() {
        assert_eq!(
            signal_url("http://otel-collector:4318", "traces"),
            "http://otel-collector:4318/v1/traces"
        );
        assert_eq!(
            signal_url("http://otel-collector:4318/", "logs"),
            "http://otel-collector:4318/v1/logs"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_mirrors_request_metrics() {
        let config = TelemetryConfig {
            otlp_protocol: OtlpProtocol::HttpProtobuf,
            metrics_export_interval_ms: 50,
            ..TelemetryConfig::default()
        };
        // Nothing listens on the discard port; export failures are logged, not raised.
        let pipeline = OtlpPipeline::install(&config, "http://127.0.0.1:9").unwrap();

        let metrics = MetricsRegistry::new("test-app", "test", DEFAULT_DURATION_BUCKETS)
            .unwrap()
            .with_meter(&pipeline.meter());
        assert!(metrics.exports_otlp());
        metrics.record_request(Route::Root, Outcome::Success, 200, Duration::from_millis(5));
        metrics.record_error(Route::Error, "forced");

        tokio::task::spawn_blocking(move || pipeline.shutdown())
            .await
            .unwrap();
    }
}
