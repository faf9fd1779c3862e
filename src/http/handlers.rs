//! Route handlers. Each one is a thin adapter over `TelemetryHandler`.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::handler::ResourceSummary;
use crate::http::request::RequestId;
use crate::http::response::Exposition;
use crate::http::server::AppState;

/// `GET /`
pub async fn root(State(state): State<AppState>, RequestId(id): RequestId) -> Response {
    match state.handler.hello(&id).await {
        Ok(greeting) => Json(greeting).into_response(),
        Err(error) => error.into_response(),
    }
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>, RequestId(id): RequestId) -> Exposition {
    Exposition(state.handler.metrics_snapshot(&id).await)
}

/// `GET /metrics/summary`
pub async fn metrics_summary(
    State(state): State<AppState>,
    RequestId(id): RequestId,
) -> Json<ResourceSummary> {
    Json(state.handler.resource_summary(&id).await)
}

/// `GET /error`
pub async fn error(State(state): State<AppState>, RequestId(id): RequestId) -> Response {
    state.handler.forced_error(&id).await.into_response()
}

/// `GET /debug-sentry`. Never returns: the handler panics.
pub async fn debug_fault(State(state): State<AppState>, RequestId(id): RequestId) -> Response {
    let result = state.handler.diagnostic_fault(&id).await;
    Json(json!({ "result": result })).into_response()
}
