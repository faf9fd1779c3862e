//! Telemetry demo service library.
//!
//! An HTTP service that emits traces, metrics, structured logs and error
//! reports for every request, with simulated failures to exercise them.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod reporting;

pub use config::schema::AppConfig;
pub use handler::TelemetryHandler;
pub use http::HttpServer;
pub use lifecycle::{Application, Shutdown};
