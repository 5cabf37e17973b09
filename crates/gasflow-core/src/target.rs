//! Target rate policies.
//!
//! The regulator re-evaluates its target on every adjustment. [`TargetRate`]
//! is a shared cell that lets an operator or a policy task retarget a running
//! regulator without restarting it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

/// A target rate that can be updated while a regulator is reading it.
///
/// Stores the `f64` bit pattern in an atomic, so reads are never torn.
#[derive(Debug, Clone)]
pub struct TargetRate {
    bits: Arc<AtomicU64>,
}

impl TargetRate {
    pub fn new(rate: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(rate.to_bits())),
        }
    }

    /// Current target in work units per second.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Replace the target. Takes effect on the next adjustment.
    pub fn set(&self, rate: f64) {
        let previous = f64::from_bits(self.bits.swap(rate.to_bits(), Ordering::AcqRel));
        info!(previous, rate, "target rate updated");
    }

    /// A target callback bound to this cell, for [`PriceRegulator::new`](crate::pricer::PriceRegulator::new).
    pub fn as_fn(&self) -> impl Fn() -> f64 + Send + Sync + use<> {
        let cell = self.clone();
        move || cell.get()
    }
}

/// A target callback that always returns `rate`.
pub fn constant(rate: f64) -> impl Fn() -> f64 + Send + Sync + 'static {
    move || rate
}
