//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use telemetry_demo::handler::{HandlerSettings, RandomSource, TelemetryHandler};
use telemetry_demo::http::{build_router, AppState};
use telemetry_demo::lifecycle::Shutdown;
use telemetry_demo::observability::metrics::DEFAULT_DURATION_BUCKETS;
use telemetry_demo::observability::MetricsRegistry;
use telemetry_demo::reporting::{
    ErrorReporter, MemoryTransport, ReporterOptions, ReporterWorker,
};

/// A handler wired to an in-memory error transport, with no simulated latency.
pub struct Harness {
    pub handler: Arc<TelemetryHandler>,
    pub reporter: ErrorReporter,
    pub transport: MemoryTransport,
    pub worker: ReporterWorker,
}

impl Harness {
    /// Must be called inside a Tokio runtime.
    pub fn new(random: Arc<dyn RandomSource>, error_rate: f64) -> Self {
        let settings = HandlerSettings {
            error_rate,
            ..HandlerSettings::default()
        }
        .without_latency();
        Self::with_settings(random, settings)
    }

    pub fn with_settings(random: Arc<dyn RandomSource>, settings: HandlerSettings) -> Self {
        let metrics = Arc::new(
            MetricsRegistry::new("test-app", "test", DEFAULT_DURATION_BUCKETS).unwrap(),
        );
        let transport = MemoryTransport::new();
        let (reporter, worker) = ErrorReporter::spawn(
            Arc::new(transport.clone()),
            ReporterOptions {
                environment: Some("test".into()),
                ..ReporterOptions::default()
            },
        );
        let handler = Arc::new(TelemetryHandler::new(
            metrics,
            reporter.clone(),
            random,
            settings,
        ));
        Self {
            handler,
            reporter,
            transport,
            worker,
        }
    }

    pub fn router(&self) -> axum::Router {
        self.router_with_timeout(Duration::from_secs(5))
    }

    pub fn router_with_timeout(&self, timeout: Duration) -> axum::Router {
        build_router(
            AppState {
                handler: Arc::clone(&self.handler),
            },
            timeout,
        )
    }

    /// Wait until every captured event has reached the transport.
    pub async fn flush(&self) {
        assert!(self.reporter.flush(Duration::from_secs(5)).await);
    }

    /// Serve the router on an ephemeral port.
    pub async fn serve(&self, shutdown: &Shutdown) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.wait().await })
                .await
                .unwrap();
        });
        addr
    }
}

/// One sample line of a text exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

/// Parse the text exposition format. Panics on any malformed sample line.
pub fn parse_exposition(text: &str) -> Vec<Sample> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(parse_sample)
        .collect()
}

fn parse_sample(line: &str) -> Sample {
    let (series, value) = line
        .rsplit_once(' ')
        .unwrap_or_else(|| panic!("sample without value: {line}"));
    let value: f64 = value
        .parse()
        .unwrap_or_else(|_| panic!("bad sample value: {line}"));

    let (name, labels) = match series.split_once('{') {
        Some((name, rest)) => {
            let body = rest
                .strip_suffix('}')
                .unwrap_or_else(|| panic!("unterminated labels: {line}"));
            (name.to_string(), parse_labels(body))
        }
        None => (series.to_string(), BTreeMap::new()),
    };
    assert!(
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':'),
        "bad metric name: {line}"
    );
    Sample {
        name,
        labels,
        value,
    }
}

fn parse_labels(body: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    let mut rest = body;
    while !rest.is_empty() {
        let (key, after) = rest.split_once("=\"").expect("label without value");
        let end = after.find('"').expect("unterminated label value");
        labels.insert(key.to_string(), after[..end].to_string());
        rest = after[end + 1..].trim_start_matches(',');
    }
    labels
}

/// Sum of every sample named `name` whose labels include all of `matching`.
pub fn sum(samples: &[Sample], name: &str, matching: &[(&str, &str)]) -> f64 {
    samples
        .iter()
        .filter(|s| s.name == name)
        .filter(|s| {
            matching
                .iter()
                .all(|(k, v)| s.labels.get(*k).map(String::as_str) == Some(*v))
        })
        .map(|s| s.value)
        .sum()
}
