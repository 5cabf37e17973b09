//! Throughput estimation from block counts.
//!
//! Converts the number of blocks observed over one epoch into an average
//! work rate (gas per second). The estimate is an average over the whole
//! epoch: a burst of blocks at the end of the epoch is indistinguishable
//! from the same number of blocks spread evenly across it.

/// Average work per second over an epoch.
///
/// Computes `blocks * average_block_work / epoch_length_secs`.
///
/// Returns `0.0` when `epoch_length_secs` is zero. The epoch controller
/// rejects a zero epoch length at construction, so this only matters for
/// direct callers.
pub fn throughput_estimate(blocks: u64, epoch_length_secs: u64, average_block_work: f64) -> f64 {
    if epoch_length_secs == 0 {
        return 0.0;
    }
    blocks as f64 * average_block_work / epoch_length_secs as f64
}

/// Number of blocks per epoch that a given target rate corresponds to.
///
/// Inverse of [`throughput_estimate`]: `target * epoch_length_secs / average_block_work`.
/// Returns `0.0` for non-positive block work.
pub fn target_blocks_per_epoch(target_rate: f64, epoch_length_secs: u64, average_block_work: f64) -> f64 {
    if average_block_work <= 0.0 {
        return 0.0;
    }
    target_rate * epoch_length_secs as f64 / average_block_work
}
