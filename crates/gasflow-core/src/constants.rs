//! Default regulator parameters. All prices are in the chain's smallest fee unit.

/// Default floor price. The regulator never publishes below this.
pub const DEFAULT_FLOOR_PRICE: u64 = 1;

/// Default starting price when no configuration overrides it.
pub const DEFAULT_INITIAL_PRICE: u64 = DEFAULT_FLOOR_PRICE;

/// Default throughput target, in gas per second.
///
/// With the default block gas and epoch length this targets one block per
/// second, i.e. ten blocks per epoch.
pub const DEFAULT_TARGET_GAS_PER_SECOND: f64 = 11_000_000.0;

/// Default per-epoch change bound, in percent of the current price.
pub const DEFAULT_MAX_CHANGE_PERCENT: f64 = 10.0;

/// Default average gas consumed per block.
pub const DEFAULT_AVERAGE_BLOCK_GAS: f64 = 11_000_000.0;

/// Default epoch length in seconds.
pub const DEFAULT_EPOCH_LENGTH_SECS: u64 = 10;

/// Upper bound for `max_change_percent`. A single epoch may move the price
/// by at most 100% of its current value.
pub const MAX_CHANGE_PERCENT_LIMIT: f64 = 100.0;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "GASFLOW";
