//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID + timeout layers)
//!     → request.rs (request ID extractor)
//!     → handlers.rs (route → TelemetryHandler operation)
//!     → response.rs (JSON / exposition bodies, error mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer};
