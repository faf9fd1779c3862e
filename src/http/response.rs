//! Response shaping.
//!
//! # Responsibilities
//! - Map handler errors to 500 JSON bodies with a fixed `error_type`
//! - Serve the metrics exposition with the scrape content type

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::HandlerError;

/// Content type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Body of every failure response.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'static str,
    pub error_type: &'static str,
    pub request_id: &'a str,
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: match self {
                HandlerError::SimulatedBusiness { .. } => "Simulated error",
                HandlerError::Forced { .. } => "Intentional error",
            },
            error_type: self.error_type(),
            request_id: self.request_id(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Metrics exposition body.
pub struct Exposition(pub String);

impl IntoResponse for Exposition {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Route;

    #[tokio::test]
    async fn test_forced_error_body() {
        let response = HandlerError::Forced {
            route: Route::Error,
            request_id: "r-9".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error_type"], "forced");
        assert_eq!(json["request_id"], "r-9");
    }

    #[test]
    fn test_exposition_content_type() {
        let response = Exposition("up 1\n".into()).into_response();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            EXPOSITION_CONTENT_TYPE
        );
    }
}
