//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the metrics registry and error reporter from configuration
//! - Install the fault hook and assemble the handler
//! - Serve until shutdown, then drain the reporter
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener is bound by the caller, so tests can use an ephemeral port

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::metrics::Meter;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::error::StartupError;
use crate::handler::{HandlerSettings, RandomSource, SeededRandom, TelemetryHandler, ThreadRandom};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::MetricsRegistry;
use crate::reporting::{
    install_panic_hook, Dsn, ErrorReporter, HttpTransport, LogTransport, ReporterOptions,
    ReporterWorker, Transport,
};

/// A fully wired service, ready to serve.
pub struct Application {
    config: AppConfig,
    handler: Arc<TelemetryHandler>,
    reporter: ErrorReporter,
    worker: ReporterWorker,
}

impl Application {
    /// Wire every subsystem. Must run inside the Tokio runtime.
    ///
    /// With a `meter`, request metrics are pushed over OTLP as well as served
    /// at `/metrics`.
    pub fn build(config: AppConfig, meter: Option<Meter>) -> Result<Self, StartupError> {
        let mut metrics = MetricsRegistry::new(
            &config.telemetry.service_name,
            &config.telemetry.environment,
            &config.telemetry.duration_buckets,
        )?;
        if let Some(meter) = &meter {
            metrics = metrics.with_meter(meter);
        }
        let metrics = Arc::new(metrics);

        let transport = build_transport(&config)?;
        let (reporter, worker) = ErrorReporter::spawn(transport, reporter_options(&config));
        if !install_panic_hook(reporter.clone()) {
            tracing::warn!("Fault hook was installed earlier; uncaught faults go to that reporter");
        }

        let random: Arc<dyn RandomSource> = match config.simulation.seed {
            Some(seed) => {
                tracing::info!(seed, "Using seeded random source");
                Arc::new(SeededRandom::new(seed))
            }
            None => Arc::new(ThreadRandom),
        };

        let handler = Arc::new(TelemetryHandler::new(
            metrics,
            reporter.clone(),
            random,
            HandlerSettings::from_config(&config),
        ));

        Ok(Self {
            config,
            handler,
            reporter,
            worker,
        })
    }

    pub fn handler(&self) -> Arc<TelemetryHandler> {
        Arc::clone(&self.handler)
    }

    /// Serve on `listener` until `shutdown` fires, then flush pending error reports.
    pub async fn serve(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), StartupError> {
        let server = HttpServer::new(&self.config.server, self.handler);
        server.run(listener, shutdown.clone()).await?;

        let timeout = Duration::from_secs(self.config.server.shutdown_timeout_secs);
        match self.worker.close(&self.reporter, timeout).await {
            Some(delivered) => tracing::info!(
                delivered,
                dropped = self.reporter.dropped(),
                "Error reporter drained"
            ),
            None => tracing::warn!("Error reporter closed with events pending"),
        }
        Ok(())
    }
}

fn build_transport(config: &AppConfig) -> Result<Arc<dyn Transport>, StartupError> {
    match &config.error_reporting.dsn {
        Some(dsn) => {
            let dsn: Dsn = dsn.parse()?;
            tracing::info!(host = dsn.host(), project = dsn.project_id(), "Error reporting enabled");
            let timeout = Duration::from_secs(config.error_reporting.send_timeout_secs);
            Ok(Arc::new(HttpTransport::new(dsn, timeout)?))
        }
        None => {
            tracing::warn!("No DSN configured, error reports are logged locally");
            Ok(Arc::new(LogTransport))
        }
    }
}

fn reporter_options(config: &AppConfig) -> ReporterOptions {
    let defaults = ReporterOptions::default();
    ReporterOptions {
        queue_capacity: config.error_reporting.queue_capacity,
        environment: Some(config.telemetry.environment.clone()),
        release: config.error_reporting.release.clone().or(defaults.release),
        server_name: std::env::var("HOSTNAME").ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_options_follow_config() {
        let mut config = AppConfig::default();
        config.telemetry.environment = "staging".into();
        config.error_reporting.queue_capacity = 8;

        let options = reporter_options(&config);
        assert_eq!(options.environment.as_deref(), Some("staging"));
        assert_eq!(options.queue_capacity, 8);
        assert!(options.release.unwrap().starts_with("telemetry-demo@"));
    }

    #[tokio::test]
    async fn test_build_mirrors_into_meter() {
        let meter = opentelemetry::global::meter("startup-test");
        let app = Application::build(AppConfig::default(), Some(meter)).unwrap();
        assert!(app.handler().metrics().exports_otlp());

        let app = Application::build(AppConfig::default(), None).unwrap();
        assert!(!app.handler().metrics().exports_otlp());
    }

    #[tokio::test]
    async fn test_invalid_dsn_fails_startup() {
        let mut config = AppConfig::default();
        config.error_reporting.dsn = Some("not a dsn".into());
        assert!(matches!(build_transport(&config), Err(StartupError::Dsn(_))));
    }
}
