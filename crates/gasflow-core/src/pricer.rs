//! Proportional gas price regulator.
//!
//! Moves the published gas price toward the level at which observed
//! throughput matches a target rate. Each adjustment compares the observed
//! rate against the target and moves the price by the relative error,
//! clamped to `max_change_percent` of the current price.
//!
//! # Adjustment rule
//!
//! 1. `target = target_rate()`; a non-positive or non-finite target is
//!    treated as maximal downward pressure.
//! 2. `error = (observed - target) / target`, clamped to `±max_change_percent / 100`.
//! 3. `delta = current * error`, rounded half away from zero. A nonzero delta
//!    always moves the price by at least one unit, so repeated identical
//!    observations keep converging instead of stalling on integer truncation.
//! 4. `new = max(current + delta, floor)`.
//!
//! There is no aggregate ceiling: sustained demand grows the price by at most
//! the bound per epoch, without limit across epochs.
//!
//! # Concurrency
//!
//! The live price sits behind a lock shared with every [`PriceHandle`], so
//! reporting code on other threads can read it while the controller adjusts.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::constants::MAX_CHANGE_PERCENT_LIMIT;
use crate::error::ConfigError;

/// Target rate callback: current desired throughput in work units per second.
pub type TargetRateFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// Clamped relative error between an observed and a target rate.
///
/// `bound` is the fractional limit (`max_change_percent / 100`). A target
/// that is not strictly positive and finite yields `-bound`. A NaN error
/// (e.g. NaN observation) yields `0.0`, holding the price.
pub fn relative_error(observed_rate: f64, target_rate: f64, bound: f64) -> f64 {
    if !(target_rate > 0.0 && target_rate.is_finite()) {
        return -bound;
    }
    let error = (observed_rate - target_rate) / target_rate;
    if error.is_nan() {
        return 0.0;
    }
    error.clamp(-bound, bound)
}

/// Apply a clamped relative error to `current`, never going below `floor`.
///
/// Zero error leaves `current` unchanged (before the floor is applied).
/// Any nonzero error moves the price by at least one unit in its direction.
pub fn next_price(current: u64, error: f64, floor: u64) -> u64 {
    let delta = current as f64 * error;

    let candidate = if delta > 0.0 {
        // `as` saturates on overflow.
        let step = (delta.round() as u64).max(1);
        current.saturating_add(step)
    } else if delta < 0.0 {
        let step = ((-delta).round() as u64).max(1);
        current.saturating_sub(step)
    } else {
        current
    };

    candidate.max(floor)
}

/// Read-only, cloneable view of a regulator's live price.
#[derive(Clone)]
pub struct PriceHandle {
    price: Arc<RwLock<u64>>,
}

impl PriceHandle {
    /// Snapshot of the current price.
    pub fn current_price(&self) -> u64 {
        *self.price.read()
    }
}

impl fmt::Debug for PriceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceHandle")
            .field("current_price", &self.current_price())
            .finish()
    }
}

/// The price regulator.
///
/// Owns the live price and the adjustment rule. Only [`adjust_toward`](Self::adjust_toward)
/// mutates the price.
pub struct PriceRegulator {
    price: Arc<RwLock<u64>>,
    floor_price: u64,
    target_rate: TargetRateFn,
    max_change_percent: f64,
}

impl fmt::Debug for PriceRegulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceRegulator")
            .field("current_price", &self.current_price())
            .field("floor_price", &self.floor_price)
            .field("max_change_percent", &self.max_change_percent)
            .finish_non_exhaustive()
    }
}

impl PriceRegulator {
    /// Create a regulator starting at `initial_price`.
    ///
    /// Fails if `max_change_percent` is not in `(0, 100]` or if
    /// `initial_price < floor_price`.
    pub fn new(
        initial_price: u64,
        floor_price: u64,
        target_rate: impl Fn() -> f64 + Send + Sync + 'static,
        max_change_percent: f64,
    ) -> Result<Self, ConfigError> {
        // Written as a negated range check so NaN is rejected too.
        if !(max_change_percent > 0.0 && max_change_percent <= MAX_CHANGE_PERCENT_LIMIT) {
            return Err(ConfigError::MaxChangeOutOfRange(max_change_percent));
        }
        if initial_price < floor_price {
            return Err(ConfigError::InitialBelowFloor {
                initial: initial_price,
                floor: floor_price,
            });
        }

        Ok(Self {
            price: Arc::new(RwLock::new(initial_price)),
            floor_price,
            target_rate: Box::new(target_rate),
            max_change_percent,
        })
    }

    /// Thread-safe snapshot of the live price.
    pub fn current_price(&self) -> u64 {
        *self.price.read()
    }

    /// A handle that reads the live price from other threads.
    pub fn handle(&self) -> PriceHandle {
        PriceHandle {
            price: Arc::clone(&self.price),
        }
    }

    pub fn floor_price(&self) -> u64 {
        self.floor_price
    }

    pub fn max_change_percent(&self) -> f64 {
        self.max_change_percent
    }

    /// Evaluate the target rate callback.
    pub fn target_rate(&self) -> f64 {
        (self.target_rate)()
    }

    /// Move the price toward the level where `observed_rate` meets the target.
    ///
    /// Commits and returns the new price.
    pub fn adjust_toward(&self, observed_rate: f64) -> u64 {
        let target = self.target_rate();
        let bound = self.max_change_percent / 100.0;
        let error = relative_error(observed_rate, target, bound);

        let (old, new) = {
            let mut price = self.price.write();
            let old = *price;
            let new = next_price(old, error, self.floor_price);
            *price = new;
            (old, new)
        };

        debug!(observed = observed_rate, target, error, old, new, "adjusted gas price");
        new
    }
}
