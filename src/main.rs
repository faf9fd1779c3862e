//! Telemetry demo service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (request ID, timeout) ──▶ handler ──▶ outcome policy
//!                                                       │
//!                        ┌──────────────────────────────┼──────────────────────┐
//!                        ▼                              ▼                      ▼
//!                 span (OTLP traces)           metrics registry        error reporter
//!                 access log (OTLP logs)       (scraped /metrics)      (bounded queue)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use telemetry_demo::config::load_config;
use telemetry_demo::error::StartupError;
use telemetry_demo::lifecycle::{wait_for_signal, Application, Shutdown};
use telemetry_demo::observability::init_telemetry;

#[derive(Parser)]
#[command(name = "telemetry-demo")]
#[command(about = "HTTP service emitting traces, metrics, logs and error reports", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long, env = "APP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let telemetry = init_telemetry(&config.telemetry)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.telemetry.service_name,
        environment = %config.telemetry.environment,
        error_rate = config.simulation.error_rate,
        otlp_endpoint = config.telemetry.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let app = Application::build(config, telemetry.meter())?;

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                tracing::info!(%signal, "Stop signal received");
                signal_shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for stop signals"),
        }
    });

    let result = app.serve(listener, &shutdown).await;

    // Exporter shutdown blocks on the final flush.
    if tokio::task::spawn_blocking(move || telemetry.shutdown())
        .await
        .is_err()
    {
        eprintln!("telemetry shutdown panicked");
    }
    result
}
