//! Route behavior through the full middleware stack.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use telemetry_demo::handler::{FixedRandom, SeededRandom};
use telemetry_demo::http::X_REQUEST_ID;
use telemetry_demo::lifecycle::Shutdown;
use telemetry_demo::observability::metrics::{
    ACTIVE_USERS, CPU_USAGE, HTTP_ERRORS_TOTAL, HTTP_REQUESTS_TOTAL, MEMORY_USAGE,
};

mod common;
use common::{parse_exposition, sum, Harness};

async fn get(router: &axum::Router, path: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_root_returns_greeting_with_request_id() {
    let harness = Harness::new(Arc::new(FixedRandom::always_succeed()), 0.10);
    let (status, headers, body) = get(&harness.router(), "/").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "Hello, OpenTelemetry!");
    let echoed = headers[X_REQUEST_ID].to_str().unwrap();
    assert_eq!(json["request_id"], echoed);
}

#[tokio::test]
async fn test_caller_request_id_is_kept() {
    let harness = Harness::new(Arc::new(FixedRandom::always_succeed()), 0.10);
    let response = harness
        .router()
        .oneshot(
            Request::get("/")
                .header(X_REQUEST_ID, "caller-supplied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()[X_REQUEST_ID], "caller-supplied");
}

#[tokio::test]
async fn test_metrics_exposition_parses_and_counters_never_decrease() {
    let harness = Harness::new(Arc::new(SeededRandom::new(3)), 0.25);
    let router = harness.router();

    let mut previous = 0.0;
    for _ in 0..5 {
        for _ in 0..10 {
            get(&router, "/").await;
        }
        let (status, headers, body) = get(&router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let samples = parse_exposition(std::str::from_utf8(&body).unwrap());
        let total = sum(&samples, HTTP_REQUESTS_TOTAL, &[]);
        assert!(total >= previous + 10.0, "{total} after {previous}");
        previous = total;

        for gauge in [ACTIVE_USERS, CPU_USAGE, MEMORY_USAGE] {
            assert!(samples.iter().any(|s| s.name == gauge), "missing {gauge}");
        }
        let cpu = sum(&samples, CPU_USAGE, &[]);
        assert!((10.0..=90.0).contains(&cpu));
        assert!(samples
            .iter()
            .filter(|s| s.name == HTTP_REQUESTS_TOTAL)
            .all(|s| s.labels.get("service").map(String::as_str) == Some("test-app")));
    }
}

#[tokio::test]
async fn test_error_route_always_fails_and_reports_once() {
    let harness = Harness::new(Arc::new(FixedRandom::always_succeed()), 0.0);
    let router = harness.router();

    for _ in 0..3 {
        let (status, headers, body) = get(&router, "/error").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error_type"], "forced");
        assert_eq!(json["request_id"], headers[X_REQUEST_ID].to_str().unwrap());
    }

    harness.flush().await;
    let events = harness.transport.events();
    assert_eq!(events.len(), 3);
    for event in &events {
        assert_eq!(event.kind(), Some("ForcedError"));
        assert_eq!(event.tag("route"), Some("/error"));
        assert_eq!(event.tag("error_type"), Some("forced"));
        assert_eq!(event.environment.as_deref(), Some("test"));
    }

    let samples = parse_exposition(&harness.handler.metrics().render());
    assert_eq!(
        sum(&samples, HTTP_ERRORS_TOTAL, &[("route", "/error"), ("error_type", "forced")]),
        3.0
    );
}

#[tokio::test]
async fn test_summary_reports_synthetic_gauges() {
    let harness = Harness::new(Arc::new(SeededRandom::new(11)), 0.0);
    let (status, _, body) = get(&harness.router(), "/metrics/summary").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let cpu = json["cpu_usage"].as_f64().unwrap();
    let memory = json["memory_usage"].as_u64().unwrap();
    assert!((10.0..=90.0).contains(&cpu));
    assert!((1_000_000..=2_000_000).contains(&memory));
    assert!(json["active_users"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let harness = Harness::new(Arc::new(FixedRandom::always_succeed()), 0.0);
    let (status, _, _) = get(&harness.router(), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_served_over_tcp() {
    let harness = Harness::new(Arc::new(FixedRandom::always_succeed()), 0.0);
    let shutdown = Shutdown::new();
    let addr = harness.serve(&shutdown).await;

    let client = reqwest::Client::new();
    let ok = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    assert!(ok.headers().contains_key(X_REQUEST_ID));

    let err = client.get(format!("http://{addr}/error")).send().await.unwrap();
    assert_eq!(err.status().as_u16(), 500);

    shutdown.trigger();
}
