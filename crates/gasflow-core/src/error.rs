//! Error types for the gasflow regulator.
use thiserror::Error;

/// Boxed error returned by caller-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max change percent must be in (0, 100], got {0}")] MaxChangeOutOfRange(f64),
    #[error("initial price {initial} below floor price {floor}")] InitialBelowFloor { initial: u64, floor: u64 },
    #[error("epoch length must be non-zero")] ZeroEpochLength,
    #[error("average block work must be positive, got {0}")] NonPositiveBlockWork(f64),
    #[error("config source: {0}")] Source(String),
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error("block observation failed: {0}")] Observation(#[source] BoxError),
    #[error("block number moved backward: latest {latest} < epoch start {epoch_start}")] Regression { latest: u64, epoch_start: u64 },
    #[error("price delivery failed for {price}: {source}")] Sink { price: u64, #[source] source: BoxError },
}

impl OracleError {
    /// Whether the controller remains usable after this error.
    ///
    /// Only configuration errors are fatal.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

impl From<::config::ConfigError> for ConfigError {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Source(e.to_string())
    }
}
