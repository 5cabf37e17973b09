//! Regulator configuration.
//!
//! [`OracleConfig`] is layered from built-in defaults, an optional TOML file,
//! and `GASFLOW_*` environment variables (e.g. `GASFLOW_FLOOR_PRICE=5`), in
//! that order of increasing precedence.

use std::path::Path;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_AVERAGE_BLOCK_GAS, DEFAULT_EPOCH_LENGTH_SECS, DEFAULT_FLOOR_PRICE,
    DEFAULT_INITIAL_PRICE, DEFAULT_MAX_CHANGE_PERCENT, DEFAULT_TARGET_GAS_PER_SECOND, ENV_PREFIX,
    MAX_CHANGE_PERCENT_LIMIT,
};
use crate::error::ConfigError;
use crate::pricer::PriceRegulator;

/// Configuration for a regulator and its epoch controller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Price at startup.
    pub initial_price: u64,
    /// Lowest price ever published.
    pub floor_price: u64,
    /// Throughput target in gas per second.
    pub target_gas_per_second: f64,
    /// Maximum change per epoch, in percent of the current price.
    pub max_change_percent: f64,
    /// Average gas per block, used to turn block counts into throughput.
    pub average_block_gas: f64,
    /// Nominal epoch length in seconds.
    pub epoch_length_secs: u64,
    /// Log level filter string (e.g. "info", "gasflow_core=debug").
    pub log_level: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            initial_price: DEFAULT_INITIAL_PRICE,
            floor_price: DEFAULT_FLOOR_PRICE,
            target_gas_per_second: DEFAULT_TARGET_GAS_PER_SECOND,
            max_change_percent: DEFAULT_MAX_CHANGE_PERCENT,
            average_block_gas: DEFAULT_AVERAGE_BLOCK_GAS,
            epoch_length_secs: DEFAULT_EPOCH_LENGTH_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl OracleConfig {
    /// Load defaults, then `path` (if given), then the environment.
    ///
    /// The result is validated before it is returned.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the parameter combinations the regulator and controller reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_change_percent > 0.0 && self.max_change_percent <= MAX_CHANGE_PERCENT_LIMIT) {
            return Err(ConfigError::MaxChangeOutOfRange(self.max_change_percent));
        }
        if self.initial_price < self.floor_price {
            return Err(ConfigError::InitialBelowFloor {
                initial: self.initial_price,
                floor: self.floor_price,
            });
        }
        if self.epoch_length_secs == 0 {
            return Err(ConfigError::ZeroEpochLength);
        }
        if !(self.average_block_gas > 0.0 && self.average_block_gas.is_finite()) {
            return Err(ConfigError::NonPositiveBlockWork(self.average_block_gas));
        }
        Ok(())
    }

    /// Build a regulator from this configuration and a target callback.
    ///
    /// Pass [`target::constant`](crate::target::constant)`(cfg.target_gas_per_second)`
    /// for a fixed target, or a [`TargetRate`](crate::target::TargetRate) for one
    /// that can be updated at runtime.
    pub fn build_regulator(
        &self,
        target_rate: impl Fn() -> f64 + Send + Sync + 'static,
    ) -> Result<PriceRegulator, ConfigError> {
        PriceRegulator::new(
            self.initial_price,
            self.floor_price,
            target_rate,
            self.max_change_percent,
        )
    }

    /// Blocks per epoch that the configured target corresponds to.
    pub fn target_blocks_per_epoch(&self) -> f64 {
        crate::throughput::target_blocks_per_epoch(
            self.target_gas_per_second,
            self.epoch_length_secs,
            self.average_block_gas,
        )
    }
}
