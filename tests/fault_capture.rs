//! The diagnostic route's fault escapes the handler and is captured by the
//! process-wide hook. Kept in its own binary because the hook is global.

use std::sync::Arc;

use telemetry_demo::handler::FixedRandom;
use telemetry_demo::reporting::{install_panic_hook, EventLevel, RUNTIME_FAULT};

mod common;
use common::Harness;

#[tokio::test]
async fn test_diagnostic_fault_is_uncaught_and_reported() {
    let harness = Harness::new(Arc::new(FixedRandom::always_succeed()), 0.0);
    assert!(install_panic_hook(harness.reporter.clone()));
    // A second install must not chain another capture in front of the first.
    assert!(!install_panic_hook(harness.reporter.clone()));

    let handler = Arc::clone(&harness.handler);
    let joined = tokio::spawn(async move { handler.diagnostic_fault("req-fault").await }).await;
    let error = joined.unwrap_err();
    assert!(error.is_panic());

    harness.flush().await;
    let events = harness.transport.events();
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.kind(), Some(RUNTIME_FAULT));
    assert_eq!(event.level, EventLevel::Fatal);
    assert_eq!(event.tag("route"), Some("/debug-sentry"));
    assert_eq!(event.tag("request_id"), Some("req-fault"));
    assert!(!event.breadcrumbs.values.is_empty());
    assert!(event
        .breadcrumbs
        .values
        .iter()
        .any(|b| b.message == "Dividing by zero"));

    // Counted before the fault.
    let rendered = harness.handler.metrics().render();
    assert!(rendered.contains("route=\"/debug-sentry\""));
    assert!(rendered.contains("error_type=\"runtime_fault\""));
}
