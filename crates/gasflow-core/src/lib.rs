//! # gasflow-core
//! Epoch-based gas price regulation.
//!
//! - [`pricer::PriceRegulator`] owns the live price and the proportional adjustment rule.
//! - [`epoch::EpochController`] measures throughput per epoch and drives the regulator.
//! - [`throughput`] converts block counts into work rates.

pub mod config;
pub mod constants;
pub mod epoch;
pub mod error;
pub mod pricer;
pub mod target;
pub mod throughput;

pub use crate::config::OracleConfig;
pub use epoch::{EpochController, EpochReport};
pub use error::{BoxError, ConfigError, OracleError};
pub use pricer::{PriceHandle, PriceRegulator};
pub use target::TargetRate;
