//! Random sources behind the outcome decision and the synthetic values.
//!
//! # Design Decisions
//! - One object-safe trait so the handler holds `Arc<dyn RandomSource>`
//! - No locks: the seeded source derives each draw from an atomic index

use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws.
pub trait RandomSource: Send + Sync {
    /// Uniform value in `[0, 1)`.
    fn next_unit(&self) -> f64;

    /// Uniform value in `[low, high)`; `low` when the range is empty.
    fn between(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        low + (high - low) * self.next_unit()
    }

    /// Uniform integer in `[low, high]`.
    fn between_inclusive(&self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        let span = (high - low + 1) as f64;
        let offset = (self.next_unit() * span).floor() as i64;
        low + offset.min(high - low)
    }
}

/// Thread-local OS-seeded generator. Process default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible sequence of draws from a fixed seed.
///
/// Draw `n` is always the first output of `StdRng` seeded with `seed + n`,
/// so concurrent callers never contend on a shared generator.
#[derive(Debug)]
pub struct SeededRandom {
    seed: u64,
    index: AtomicU64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            index: AtomicU64::new(0),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        let n = self.index.fetch_add(1, Ordering::Relaxed);
        StdRng::seed_from_u64(self.seed.wrapping_add(n)).gen::<f64>()
    }
}

/// Always returns the same value. Forces outcomes.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(f64);

impl FixedRandom {
    /// `value` is clamped into `[0, 1)`.
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0 - f64::EPSILON))
    }

    /// A source under which the default route always succeeds.
    pub fn always_succeed() -> Self {
        Self::new(1.0)
    }

    /// A source under which the default route always fails (for any rate > 0).
    pub fn always_fail() -> Self {
        Self::new(0.0)
    }
}

impl RandomSource for FixedRandom {
    fn next_unit(&self) -> f64 {
        self.0
    }
}
