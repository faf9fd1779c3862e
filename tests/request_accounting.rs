//! Every request yields exactly one span, one access log and one counter
//! increment, including the diagnostic route that faults after accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use telemetry_demo::handler::{SeededRandom, ACCESS_LOG_TARGET, REQUEST_SPAN};
use telemetry_demo::observability::metrics::HTTP_REQUESTS_TOTAL;
use telemetry_demo::reporting::{install_panic_hook, RUNTIME_FAULT};

mod common;
use common::{parse_exposition, sum, Harness};

#[derive(Clone, Default)]
struct Counts {
    spans: Arc<AtomicUsize>,
    access_logs: Arc<AtomicUsize>,
}

impl<S: Subscriber> Layer<S> for Counts {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() == REQUEST_SPAN {
            self.spans.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() == ACCESS_LOG_TARGET {
            self.access_logs.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn test_one_span_one_log_one_count_per_request() {
    let counts = Counts::default();
    let subscriber = tracing_subscriber::registry().with(counts.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let harness = Harness::new(Arc::new(SeededRandom::new(99)), 0.5);
    assert!(install_panic_hook(harness.reporter.clone()));
    let mut issued = 0usize;

    for i in 0..40 {
        let _ = harness.handler.hello(&format!("root-{i}")).await;
        issued += 1;
    }
    for i in 0..5 {
        harness.handler.metrics_snapshot(&format!("metrics-{i}")).await;
        harness.handler.resource_summary(&format!("summary-{i}")).await;
        harness.handler.forced_error(&format!("error-{i}")).await;
        issued += 3;
    }
    for i in 0..3 {
        let handler = Arc::clone(&harness.handler);
        let id = format!("fault-{i}");
        let joined = tokio::spawn(async move { handler.diagnostic_fault(&id).await }).await;
        assert!(joined.unwrap_err().is_panic());
        issued += 1;
    }
    harness.flush().await;

    assert_eq!(counts.spans.load(Ordering::SeqCst), issued);
    assert_eq!(counts.access_logs.load(Ordering::SeqCst), issued);

    let samples = parse_exposition(&harness.handler.metrics().render());
    assert_eq!(sum(&samples, HTTP_REQUESTS_TOTAL, &[]), issued as f64);
    assert_eq!(sum(&samples, HTTP_REQUESTS_TOTAL, &[("route", "/error")]), 5.0);
    assert_eq!(
        sum(&samples, HTTP_REQUESTS_TOTAL, &[("route", "/metrics/summary")]),
        5.0
    );
    assert_eq!(
        sum(
            &samples,
            HTTP_REQUESTS_TOTAL,
            &[("route", "/debug-sentry"), ("outcome", "fault")]
        ),
        3.0
    );

    let faults = harness
        .transport
        .events()
        .into_iter()
        .filter(|e| e.kind() == Some(RUNTIME_FAULT))
        .count();
    assert_eq!(faults, 3);
}
