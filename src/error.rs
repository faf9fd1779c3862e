//! Error taxonomy.
//!
//! - `HandlerError`: expected, simulated failures. Caught where they arise,
//!   reported, and turned into a 500 response.
//! - Uncaught faults: only the diagnostic route panics; see
//!   `reporting::panic` for how they are observed.
//! - `StartupError`: anything that stops the service from starting. Fatal.

use crate::config::loader::ConfigError;
use crate::handler::{Outcome, Route};
use crate::observability::TelemetryError;
use crate::reporting::{DsnError, TransportError};

/// Simulated failures returned by the handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Drawn on the default route with probability `error_rate`.
    #[error("Simulated error")]
    SimulatedBusiness { request_id: String },

    /// Always raised by the error route.
    #[error("Intentional error raised at {route}")]
    Forced { route: Route, request_id: String },
}

impl HandlerError {
    /// Fixed `error_type` tag and label value.
    pub fn error_type(&self) -> &'static str {
        match self {
            HandlerError::SimulatedBusiness { .. } => "simulated",
            HandlerError::Forced { .. } => "forced",
        }
    }

    /// Exception type in error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::SimulatedBusiness { .. } => "SimulatedBusinessError",
            HandlerError::Forced { .. } => "ForcedError",
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            HandlerError::SimulatedBusiness { .. } => Outcome::SimulatedError,
            HandlerError::Forced { .. } => Outcome::ForcedError,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            HandlerError::SimulatedBusiness { request_id } => request_id,
            HandlerError::Forced { request_id, .. } => request_id,
        }
    }
}

/// Fatal errors raised while bringing the service up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("error reporting DSN: {0}")]
    Dsn(#[from] DsnError),
    #[error("error reporting transport: {0}")]
    Transport(#[from] TransportError),
    #[error("metrics registry: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
