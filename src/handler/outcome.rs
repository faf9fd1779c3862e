//! Routes, outcomes and the outcome decision.
//!
//! # Outcome per route
//! ```text
//! /              → Success | SimulatedError   (drawn, error_rate)
//! /metrics       → Success
//! /metrics/summary → Success
//! /error         → ForcedError                (always)
//! /debug-sentry  → RuntimeFault               (always, then panics)
//! ```

use std::fmt;

use super::random::RandomSource;

/// Routes served by the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Root,
    Metrics,
    MetricsSummary,
    Error,
    Diagnostic,
}

impl Route {
    /// Request path, also used as the `route` label on every signal.
    pub fn path(&self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::Metrics => "/metrics",
            Route::MetricsSummary => "/metrics/summary",
            Route::Error => "/error",
            Route::Diagnostic => "/debug-sentry",
        }
    }

    /// Value for the span's `operation.type` attribute.
    pub fn operation(&self) -> &'static str {
        match self {
            Route::Root => "hello",
            Route::Metrics | Route::MetricsSummary => "metrics",
            Route::Error => "error",
            Route::Diagnostic => "diagnostic",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Result of handling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    SimulatedError,
    ForcedError,
    /// Diagnostic route only; the request never produces a response.
    RuntimeFault,
    /// The response future was dropped before the handler finished
    /// (request timeout or client disconnect).
    Cancelled,
}

impl Outcome {
    /// Metric label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::SimulatedError => "simulated_error",
            Outcome::ForcedError => "forced_error",
            Outcome::RuntimeFault => "fault",
            Outcome::Cancelled => "cancelled",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Success => 200,
            // Client Closed Request
            Outcome::Cancelled => 499,
            _ => 500,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides the outcome of a request from a uniform draw.
#[derive(Debug, Clone, Copy)]
pub struct OutcomePolicy {
    error_rate: f64,
}

impl OutcomePolicy {
    /// `error_rate` is clamped to `[0, 1]`; config validation rejects anything outside.
    pub fn new(error_rate: f64) -> Self {
        Self {
            error_rate: error_rate.clamp(0.0, 1.0),
        }
    }

    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    /// Only the default route draws; every other route has a fixed outcome.
    pub fn decide(&self, route: Route, random: &dyn RandomSource) -> Outcome {
        match route {
            Route::Root => {
                if random.next_unit() < self.error_rate {
                    Outcome::SimulatedError
                } else {
                    Outcome::Success
                }
            }
            Route::Metrics | Route::MetricsSummary => Outcome::Success,
            Route::Error => Outcome::ForcedError,
            Route::Diagnostic => Outcome::RuntimeFault,
        }
    }
}

impl Default for OutcomePolicy {
    fn default() -> Self {
        Self::new(0.10)
    }
}
