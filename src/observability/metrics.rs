//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own the process-wide metrics registry (injected, never global)
//! - Record per-request counters and latency
//! - Hold the synthetic gauges (active users, CPU, memory)
//! - Render the Prometheus text exposition format
//! - Mirror request metrics into an OpenTelemetry meter for OTLP push
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by route, outcome, status
//! - `http_errors_total` (counter): failed requests by route, error type
//! - `http_request_duration_seconds` (histogram): handling latency by route
//! - `active_users` (gauge): synthetic, random walk bounded below by zero
//! - `cpu_usage_percent` (gauge): synthetic, resampled on every snapshot
//! - `memory_usage_bytes` (gauge): synthetic, resampled on every snapshot
//!
//! # Design Decisions
//! - Handles come from a local `PrometheusRecorder`; no global recorder is
//!   installed, so tests can hold independent registries
//! - All updates go through the recorder's atomic handles
//! - The OTLP mirror is optional; the exposition is authoritative either way

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use metrics::{Key, KeyName, Label, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;

use crate::handler::{Outcome, Route};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_ERRORS_TOTAL: &str = "http_errors_total";
pub const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const ACTIVE_USERS: &str = "active_users";
pub const CPU_USAGE: &str = "cpu_usage_percent";
pub const MEMORY_USAGE: &str = "memory_usage_bytes";

/// Default latency buckets, tuned around the simulated 0.1–0.8s handling time.
pub const DEFAULT_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0,
];

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// OpenTelemetry counterparts of the request series.
struct OtlpInstruments {
    requests: Counter<u64>,
    errors: Counter<u64>,
    duration: Histogram<f64>,
    active_users: UpDownCounter<i64>,
}

impl OtlpInstruments {
    fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter(HTTP_REQUESTS_TOTAL)
                .with_description("Total number of HTTP requests")
                .build(),
            errors: meter
                .u64_counter(HTTP_ERRORS_TOTAL)
                .with_description("Total number of HTTP errors")
                .build(),
            duration: meter
                .f64_histogram(HTTP_REQUEST_DURATION)
                .with_description("HTTP request duration in seconds")
                .with_unit("s")
                .build(),
            active_users: meter
                .i64_up_down_counter(ACTIVE_USERS)
                .with_description("Number of active users")
                .build(),
        }
    }
}

/// Process-scoped metrics registry.
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    active_users: AtomicI64,
    otlp: Option<OtlpInstruments>,
}

impl MetricsRegistry {
    /// Create a registry whose series all carry `service` and `environment` labels.
    pub fn new(service: &str, environment: &str, buckets: &[f64]) -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .add_global_label("service", service)
            .add_global_label("environment", environment)
            .set_buckets_for_metric(Matcher::Full(HTTP_REQUEST_DURATION.to_string()), buckets)?
            .build_recorder();
        let handle = recorder.handle();

        let registry = Self {
            recorder,
            handle,
            active_users: AtomicI64::new(0),
            otlp: None,
        };
        registry.describe();
        Ok(registry)
    }

    /// Also push request metrics through `meter`.
    pub fn with_meter(mut self, meter: &Meter) -> Self {
        self.otlp = Some(OtlpInstruments::new(meter));
        self
    }

    pub fn exports_otlp(&self) -> bool {
        self.otlp.is_some()
    }

    fn describe(&self) {
        let counters = [
            (HTTP_REQUESTS_TOTAL, "Total number of HTTP requests"),
            (HTTP_ERRORS_TOTAL, "Total number of HTTP errors"),
        ];
        for (name, help) in counters {
            self.recorder.describe_counter(
                KeyName::from_const_str(name),
                Some(Unit::Count),
                SharedString::const_str(help),
            );
        }

        self.recorder.describe_histogram(
            KeyName::from_const_str(HTTP_REQUEST_DURATION),
            Some(Unit::Seconds),
            SharedString::const_str("HTTP request duration in seconds"),
        );

        let gauges = [
            (ACTIVE_USERS, Unit::Count, "Number of active users"),
            (CPU_USAGE, Unit::Percent, "CPU usage percentage"),
            (MEMORY_USAGE, Unit::Bytes, "Memory usage in bytes"),
        ];
        for (name, unit, help) in gauges {
            self.recorder.describe_gauge(
                KeyName::from_const_str(name),
                Some(unit),
                SharedString::const_str(help),
            );
        }
    }

    /// Count one handled request and record its duration.
    pub fn record_request(&self, route: Route, outcome: Outcome, status: u16, duration: Duration) {
        let key = Key::from_parts(
            HTTP_REQUESTS_TOTAL,
            vec![
                Label::new("route", route.path()),
                Label::new("outcome", outcome.as_str()),
                Label::new("status", status.to_string()),
            ],
        );
        self.recorder.register_counter(&key, &METADATA).increment(1);

        let key = Key::from_parts(HTTP_REQUEST_DURATION, vec![Label::new("route", route.path())]);
        self.recorder
            .register_histogram(&key, &METADATA)
            .record(duration.as_secs_f64());

        if let Some(otlp) = &self.otlp {
            otlp.requests.add(
                1,
                &[
                    KeyValue::new("route", route.path()),
                    KeyValue::new("outcome", outcome.as_str()),
                    KeyValue::new("status", i64::from(status)),
                ],
            );
            otlp.duration.record(
                duration.as_secs_f64(),
                &[KeyValue::new("route", route.path())],
            );
        }
    }

    /// Count one failed request.
    pub fn record_error(&self, route: Route, error_type: &'static str) {
        let key = Key::from_parts(
            HTTP_ERRORS_TOTAL,
            vec![
                Label::new("route", route.path()),
                Label::new("error_type", error_type),
            ],
        );
        self.recorder.register_counter(&key, &METADATA).increment(1);

        if let Some(otlp) = &self.otlp {
            otlp.errors.add(
                1,
                &[
                    KeyValue::new("route", route.path()),
                    KeyValue::new("error_type", error_type),
                ],
            );
        }
    }

    /// Move the active-user count by `delta`, never below zero. Returns the new value.
    ///
    /// The gauge is published from the atomic when sampled or rendered, so
    /// concurrent adjustments cannot leave it behind the count.
    pub fn adjust_active_users(&self, delta: i64) -> i64 {
        let previous = self
            .active_users
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some((current + delta).max(0))
            })
            .unwrap_or_else(|current| current);
        let current = (previous + delta).max(0);
        if let Some(otlp) = &self.otlp {
            otlp.active_users.add(current - previous, &[]);
        }
        current
    }

    pub fn active_users(&self) -> i64 {
        self.active_users.load(Ordering::Acquire)
    }

    /// Overwrite the synthetic resource gauges.
    pub fn set_resource_usage(&self, cpu_percent: f64, memory_bytes: u64) {
        self.gauge(CPU_USAGE).set(cpu_percent);
        self.gauge(MEMORY_USAGE).set(memory_bytes as f64);
        self.publish_active_users();
    }

    fn publish_active_users(&self) {
        self.gauge(ACTIVE_USERS).set(self.active_users() as f64);
    }

    fn gauge(&self, name: &'static str) -> metrics::Gauge {
        self.recorder.register_gauge(&Key::from_static_name(name), &METADATA)
    }

    /// Text exposition of every registered series.
    pub fn render(&self) -> String {
        self.publish_active_users();
        self.handle.render()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("active_users", &self.active_users())
            .field("exports_otlp", &self.exports_otlp())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MetricsRegistry {
        MetricsRegistry::new("test-app", "test", DEFAULT_DURATION_BUCKETS).unwrap()
    }

    fn sample_value(rendered: &str, name: &str, needle: &str) -> Option<f64> {
        rendered
            .lines()
            .filter(|l| l.starts_with(name) && l.contains(needle))
            .find_map(|l| l.rsplit(' ').next()?.parse().ok())
    }

    #[test]
    fn test_request_counter_by_labels() {
        let r = registry();
        r.record_request(Route::Root, Outcome::Success, 200, Duration::from_millis(5));
        r.record_request(Route::Root, Outcome::Success, 200, Duration::from_millis(5));
        r.record_request(Route::Root, Outcome::SimulatedError, 500, Duration::from_millis(5));

        let out = r.render();
        assert_eq!(
            sample_value(&out, "http_requests_total{", "outcome=\"success\""),
            Some(2.0)
        );
        assert_eq!(
            sample_value(&out, "http_requests_total{", "outcome=\"simulated_error\""),
            Some(1.0)
        );
        assert!(out.contains("environment=\"test\""));
        assert!(out.contains("# HELP http_requests_total"));
    }

    #[test]
    fn test_duration_rendered_as_histogram() {
        let r = registry();
        r.record_request(Route::Metrics, Outcome::Success, 200, Duration::from_millis(300));
        let out = r.render();
        assert!(out.contains("# TYPE http_request_duration_seconds histogram"));
        assert_eq!(
            sample_value(&out, "http_request_duration_seconds_count", "route=\"/metrics\""),
            Some(1.0)
        );
    }

    #[test]
    fn test_active_users_never_negative() {
        let r = registry();
        assert_eq!(r.adjust_active_users(-1), 0);
        assert_eq!(r.adjust_active_users(1), 1);
        assert_eq!(r.adjust_active_users(1), 2);
        assert_eq!(r.adjust_active_users(-1), 1);
        assert_eq!(r.active_users(), 1);
    }

    #[test]
    fn test_rendered_active_users_matches_count_after_concurrent_updates() {
        let r = std::sync::Arc::new(registry());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let r = std::sync::Arc::clone(&r);
                std::thread::spawn(move || {
                    for j in 0..500 {
                        r.adjust_active_users(if (i + j) % 3 == 0 { -1 } else { 1 });
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let out = r.render();
        assert_eq!(
            sample_value(&out, "active_users{", ""),
            Some(r.active_users() as f64)
        );
    }

    #[test]
    fn test_resource_gauges_overwritten() {
        let r = registry();
        r.set_resource_usage(42.5, 1_500_000);
        r.set_resource_usage(12.0, 1_000_000);
        let out = r.render();
        assert_eq!(sample_value(&out, "cpu_usage_percent{", ""), Some(12.0));
        assert_eq!(sample_value(&out, "memory_usage_bytes{", ""), Some(1_000_000.0));
    }

    #[test]
    fn test_meter_mirror_keeps_exposition() {
        let meter = opentelemetry::global::meter("metrics-test");
        let r = registry().with_meter(&meter);
        assert!(r.exports_otlp());

        r.record_request(Route::Root, Outcome::Success, 200, Duration::from_millis(5));
        r.record_error(Route::Error, "forced");
        assert_eq!(r.adjust_active_users(1), 1);

        let out = r.render();
        assert_eq!(
            sample_value(&out, "http_requests_total{", "route=\"/\""),
            Some(1.0)
        );
        assert_eq!(
            sample_value(&out, "http_errors_total{", "error_type=\"forced\""),
            Some(1.0)
        );
    }

    #[test]
    fn test_error_counter() {
        let r = registry();
        r.record_error(Route::Error, "forced");
        let out = r.render();
        assert_eq!(
            sample_value(&out, "http_errors_total{", "error_type=\"forced\""),
            Some(1.0)
        );
    }
}
