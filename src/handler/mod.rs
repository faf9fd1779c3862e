//! Telemetry-emitting request handler.
//!
//! # Request Lifecycle
//! ```text
//! START → DECIDE_OUTCOME → EMIT_TELEMETRY → RESPOND
//!                                         ↘ FAULT (diagnostic route only)
//! ```
//!
//! Every request, whatever its outcome, produces exactly one
//! `handle_request` span, one `http_requests_total` increment, one duration
//! sample and one access log record. Failed requests also produce one error
//! report. Nothing is retried. A request whose future is dropped early
//! (timeout, client gone) is still accounted for, with outcome `cancelled`.
//!
//! # Design Decisions
//! - Metrics registry, reporter and random source are injected, never global
//! - All methods take `&self`; the only shared mutable state is atomic
//! - Telemetry hand-off never awaits: logs go through a non-blocking writer,
//!   spans through the OTLP batch processor, reports through a bounded queue

pub mod outcome;
pub mod random;
pub mod record;

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::trace::TraceContextExt;
use serde::Serialize;
use tracing::field::Empty;
use tracing::{Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::{AppConfig, LatencyRange};
use crate::error::HandlerError;
use crate::observability::metrics::MetricsRegistry;
use crate::reporting::event::{Breadcrumb, ErrorEvent, EventLevel, Stacktrace};
use crate::reporting::scope::{self, RequestScope};
use crate::reporting::ErrorReporter;

pub use outcome::{Outcome, OutcomePolicy, Route};
pub use random::{FixedRandom, RandomSource, SeededRandom, ThreadRandom};
pub use record::{TelemetryRecord, ACCESS_LOG_TARGET};

/// Name of the one span opened per request.
pub const REQUEST_SPAN: &str = "handle_request";

/// `error_type` recorded for the diagnostic route.
pub const RUNTIME_FAULT_TYPE: &str = "runtime_fault";

/// Tunables for the handler.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub error_rate: f64,
    pub root_latency: LatencyRange,
    pub metrics_latency: LatencyRange,
    pub max_breadcrumbs: usize,
}

impl HandlerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            error_rate: config.simulation.error_rate,
            root_latency: config.simulation.root_latency,
            metrics_latency: config.simulation.metrics_latency,
            max_breadcrumbs: config.error_reporting.max_breadcrumbs,
        }
    }

    /// Same settings with simulated processing time disabled.
    pub fn without_latency(mut self) -> Self {
        self.root_latency = LatencyRange::ZERO;
        self.metrics_latency = LatencyRange::ZERO;
        self
    }
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Body of a successful default-route response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Greeting {
    pub message: &'static str,
    pub request_id: String,
}

/// Point-in-time view of the synthetic gauges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSummary {
    pub active_users: i64,
    pub memory_usage: u64,
    pub cpu_usage: f64,
}

/// The request handler. Share it behind an `Arc`.
pub struct TelemetryHandler {
    metrics: Arc<MetricsRegistry>,
    reporter: ErrorReporter,
    random: Arc<dyn RandomSource>,
    policy: OutcomePolicy,
    settings: HandlerSettings,
}

impl TelemetryHandler {
    pub fn new(
        metrics: Arc<MetricsRegistry>,
        reporter: ErrorReporter,
        random: Arc<dyn RandomSource>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            metrics,
            reporter,
            random,
            policy: OutcomePolicy::new(settings.error_rate),
            settings,
        }
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    /// `GET /`: succeed, or fail with probability `error_rate`.
    pub async fn hello(&self, request_id: &str) -> Result<Greeting, HandlerError> {
        let exchange = self.begin(Route::Root, request_id);
        let span = exchange.span.clone();
        let work = async move {
            self.simulate_latency(self.settings.root_latency).await;
            self.walk_active_users();

            match self.policy.decide(Route::Root, self.random.as_ref()) {
                Outcome::Success => {
                    exchange.finish(Outcome::Success, None);
                    Ok(Greeting {
                        message: "Hello, OpenTelemetry!",
                        request_id: request_id.to_string(),
                    })
                }
                _ => {
                    let error = HandlerError::SimulatedBusiness {
                        request_id: request_id.to_string(),
                    };
                    self.fail(exchange, &error);
                    Err(error)
                }
            }
        };
        scope::scoped(self.request_scope(Route::Root, request_id), work.instrument(span)).await
    }

    /// `GET /metrics`: text exposition of every counter and gauge.
    pub async fn metrics_snapshot(&self, request_id: &str) -> String {
        let exchange = self.begin(Route::Metrics, request_id);
        let span = exchange.span.clone();
        let work = async move {
            self.simulate_latency(self.settings.metrics_latency).await;
            self.walk_active_users();
            self.sample_resources();
            exchange.finish(Outcome::Success, None);
            self.metrics.render()
        };
        scope::scoped(self.request_scope(Route::Metrics, request_id), work.instrument(span)).await
    }

    /// `GET /metrics/summary`: the synthetic gauges as a JSON-friendly struct.
    pub async fn resource_summary(&self, request_id: &str) -> ResourceSummary {
        let exchange = self.begin(Route::MetricsSummary, request_id);
        let span = exchange.span.clone();
        let work = async move {
            self.simulate_latency(self.settings.metrics_latency).await;
            let active_users = self.walk_active_users();
            let (cpu_usage, memory_usage) = self.sample_resources();
            exchange.finish(Outcome::Success, None);
            ResourceSummary {
                active_users,
                memory_usage,
                cpu_usage,
            }
        };
        scope::scoped(
            self.request_scope(Route::MetricsSummary, request_id),
            work.instrument(span),
        )
        .await
    }

    /// `GET /error`: always fails and always reports.
    pub async fn forced_error(&self, request_id: &str) -> HandlerError {
        let exchange = self.begin(Route::Error, request_id);
        let span = exchange.span.clone();
        let work = async move {
            scope::add_breadcrumb(
                Breadcrumb::new("simulation", "Raising intentional error")
                    .level(EventLevel::Warning),
            );
            let error = HandlerError::Forced {
                route: Route::Error,
                request_id: request_id.to_string(),
            };
            self.fail(exchange, &error);
            error
        };
        scope::scoped(self.request_scope(Route::Error, request_id), work.instrument(span)).await
    }

    /// `GET /debug-sentry`: divides by zero.
    ///
    /// The panic is deliberately left uncaught so the process-level hook
    /// (`reporting::install_panic_hook`) is what observes it. The request is
    /// counted and logged before the fault so it is not missing from metrics.
    pub async fn diagnostic_fault(&self, request_id: &str) -> u32 {
        let exchange = self.begin(Route::Diagnostic, request_id);
        let span = exchange.span.clone();
        let work = async move {
            scope::add_breadcrumb(Breadcrumb::new(
                "diagnostic",
                "Recording request telemetry before fault",
            ));
            exchange.finish(Outcome::RuntimeFault, Some(RUNTIME_FAULT_TYPE));

            scope::add_breadcrumb(
                Breadcrumb::new("diagnostic", "Dividing by zero").level(EventLevel::Warning),
            );
            let divisor = std::hint::black_box(0u32);
            1 / divisor
        };
        scope::scoped(
            self.request_scope(Route::Diagnostic, request_id),
            work.instrument(span),
        )
        .await
    }

    fn begin(&self, route: Route, request_id: &str) -> Exchange {
        Exchange::begin(Arc::clone(&self.metrics), route, request_id)
    }

    fn request_scope(&self, route: Route, request_id: &str) -> RequestScope {
        let mut scope = RequestScope::new(self.settings.max_breadcrumbs);
        scope.set_tag("route", route.path());
        scope.set_tag("request_id", request_id);
        scope.push(
            Breadcrumb::new("http", format!("GET {}", route.path())).data("request_id", request_id),
        );
        scope
    }

    async fn simulate_latency(&self, range: LatencyRange) {
        if range.is_zero() {
            return;
        }
        let millis = self.random.between(range.min_ms as f64, range.max_ms as f64);
        tokio::time::sleep(Duration::from_secs_f64(millis / 1000.0)).await;
    }

    fn walk_active_users(&self) -> i64 {
        let delta = self.random.between_inclusive(-1, 1);
        self.metrics.adjust_active_users(delta)
    }

    fn sample_resources(&self) -> (f64, u64) {
        let cpu = self.random.between(10.0, 90.0);
        let memory = self.random.between_inclusive(1_000_000, 2_000_000) as u64;
        self.metrics.set_resource_usage(cpu, memory);
        (cpu, memory)
    }

    fn fail(&self, exchange: Exchange, error: &HandlerError) {
        let route = exchange.route;
        scope::add_breadcrumb(Breadcrumb::new("error", error.to_string()).level(EventLevel::Error));

        let (trace_id, span_id) = trace_ids(&exchange.span);
        let mut event = ErrorEvent::exception(error.kind(), error.to_string(), true)
            .with_stacktrace(Stacktrace::capture())
            .with_trace(trace_id, span_id);
        if let Some(scope) = scope::snapshot() {
            for (key, value) in scope.tags() {
                event = event.with_tag(key.clone(), value.clone());
            }
            event = event.with_breadcrumbs(scope.breadcrumbs().cloned());
        }
        let event = event
            .with_tag("route", route.path())
            .with_tag("error_type", error.error_type());
        self.reporter.capture(event);

        exchange.finish(error.outcome(), Some(error.error_type()));
    }
}

impl std::fmt::Debug for TelemetryHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryHandler")
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// One in-flight request.
///
/// Accounting runs exactly once: through `finish`, or from `Drop` with
/// `Outcome::Cancelled` when the request future is dropped first.
struct Exchange {
    metrics: Arc<MetricsRegistry>,
    route: Route,
    request_id: String,
    started: Instant,
    span: Span,
    settled: bool,
}

impl Exchange {
    fn begin(metrics: Arc<MetricsRegistry>, route: Route, request_id: &str) -> Self {
        let span = tracing::info_span!(
            REQUEST_SPAN,
            "otel.name" = %format!("GET {}", route.path()),
            "otel.kind" = "server",
            "otel.status_code" = Empty,
            "http.request.method" = "GET",
            "http.route" = route.path(),
            "http.response.status_code" = Empty,
            "operation.type" = route.operation(),
            request_id = %request_id,
            outcome = Empty,
            error_type = Empty,
        );
        Self {
            metrics,
            route,
            request_id: request_id.to_string(),
            started: Instant::now(),
            span,
            settled: false,
        }
    }

    fn finish(mut self, outcome: Outcome, error_type: Option<&'static str>) {
        self.settle(outcome, error_type);
    }

    /// Record span fields, metrics and the access log. No-op after the first call.
    fn settle(&mut self, outcome: Outcome, error_type: Option<&'static str>) {
        if self.settled {
            return;
        }
        self.settled = true;

        let latency = self.started.elapsed();
        let status = outcome.status_code();

        self.span.record("outcome", outcome.as_str());
        self.span.record("http.response.status_code", status);
        self.span
            .record("otel.status_code", if outcome.is_error() { "ERROR" } else { "OK" });

        self.metrics.record_request(self.route, outcome, status, latency);
        if let Some(error_type) = error_type {
            self.span.record("error_type", error_type);
            self.metrics.record_error(self.route, error_type);
        }

        let (trace_id, _) = trace_ids(&self.span);
        let mut record = TelemetryRecord::new(
            self.route,
            outcome,
            latency,
            self.request_id.clone(),
            trace_id,
        );
        if let Some(error_type) = error_type {
            record = record.with_error_type(error_type);
        }
        record.emit();
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if !self.settled {
            let span = self.span.clone();
            let _entered = span.enter();
            self.settle(Outcome::Cancelled, None);
        }
    }
}

/// Trace and span ids of `span` when it is exported over OTLP.
fn trace_ids(span: &Span) -> (Option<String>, Option<String>) {
    let context = span.context();
    let otel_span = context.span();
    let span_context = otel_span.span_context();
    if span_context.is_valid() {
        (
            Some(span_context.trace_id().to_string()),
            Some(span_context.span_id().to_string()),
        )
    } else {
        (None, None)
    }
}
