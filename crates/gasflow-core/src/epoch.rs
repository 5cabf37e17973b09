//! Epoch controller driving a [`PriceRegulator`].
//!
//! Each [`tick`](EpochController::tick) settles the epoch that just elapsed:
//!
//! 1. Read the chain head through the block source callback.
//! 2. Reject a head below the epoch start (stale or reorganizing source).
//! 3. Convert the blocks produced since the epoch start into an average
//!    throughput with [`throughput_estimate`].
//! 4. Adjust the price toward the target and deliver it to the sink.
//! 5. Advance the epoch start to the observed head.
//!
//! The epoch start advances even when delivery fails. The price has already
//! been committed in the regulator at that point; the controller favours
//! forward progress over redelivery, so a sink that needs exactly-once
//! semantics must be idempotent or retried by the caller.
//!
//! `tick` takes `&mut self`, so invocations are serialized by the borrow
//! checker. Readers on other threads use [`PriceHandle`] instead.

use std::fmt;

use tracing::{info, warn};

use crate::error::{BoxError, ConfigError, OracleError};
use crate::pricer::{PriceHandle, PriceRegulator};
use crate::throughput::throughput_estimate;

/// Block source callback: latest observed chain head.
pub type LatestBlockFn = Box<dyn FnMut() -> Result<u64, BoxError> + Send>;

/// Price sink callback: deliver a newly computed price downstream.
pub type PriceSinkFn = Box<dyn FnMut(u64) -> Result<(), BoxError> + Send>;

/// Summary of one settled epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// Epoch start block before this tick.
    pub start_block: u64,
    /// Observed chain head; the start of the next epoch.
    pub end_block: u64,
    pub blocks_elapsed: u64,
    /// Average work per second over the epoch.
    pub observed_rate: f64,
    pub old_price: u64,
    pub new_price: u64,
}

pub struct EpochController {
    pricer: PriceRegulator,
    epoch_start_block: u64,
    average_block_work: f64,
    epoch_length_secs: u64,
    latest_block: LatestBlockFn,
    sink: PriceSinkFn,
}

impl fmt::Debug for EpochController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochController")
            .field("pricer", &self.pricer)
            .field("epoch_start_block", &self.epoch_start_block)
            .field("average_block_work", &self.average_block_work)
            .field("epoch_length_secs", &self.epoch_length_secs)
            .finish_non_exhaustive()
    }
}

impl EpochController {
    /// Create a controller whose first epoch starts at `start_block`.
    ///
    /// Fails if `epoch_length_secs` is zero or `average_block_work` is not a
    /// positive finite number.
    pub fn new(
        pricer: PriceRegulator,
        start_block: u64,
        average_block_work: f64,
        epoch_length_secs: u64,
        latest_block: impl FnMut() -> Result<u64, BoxError> + Send + 'static,
        sink: impl FnMut(u64) -> Result<(), BoxError> + Send + 'static,
    ) -> Result<Self, ConfigError> {
        if epoch_length_secs == 0 {
            return Err(ConfigError::ZeroEpochLength);
        }
        if !(average_block_work > 0.0 && average_block_work.is_finite()) {
            return Err(ConfigError::NonPositiveBlockWork(average_block_work));
        }

        Ok(Self {
            pricer,
            epoch_start_block: start_block,
            average_block_work,
            epoch_length_secs,
            latest_block: Box::new(latest_block),
            sink: Box::new(sink),
        })
    }

    pub fn epoch_start_block(&self) -> u64 {
        self.epoch_start_block
    }

    pub fn average_block_work(&self) -> f64 {
        self.average_block_work
    }

    pub fn epoch_length_secs(&self) -> u64 {
        self.epoch_length_secs
    }

    pub fn pricer(&self) -> &PriceRegulator {
        &self.pricer
    }

    /// Read-only price handle for other threads.
    pub fn price_handle(&self) -> PriceHandle {
        self.pricer.handle()
    }

    /// Settle the elapsed epoch and publish the adjusted price.
    ///
    /// On [`OracleError::Observation`] and [`OracleError::Regression`] nothing
    /// changes and the tick can be retried. On [`OracleError::Sink`] the new
    /// price is already committed and the epoch has advanced.
    pub fn tick(&mut self) -> Result<EpochReport, OracleError> {
        let latest = (self.latest_block)().map_err(|e| {
            warn!(error = %e, "failed to read latest block");
            OracleError::Observation(e)
        })?;

        let start = self.epoch_start_block;
        if latest < start {
            warn!(latest, epoch_start = start, "block number moved backward");
            return Err(OracleError::Regression {
                latest,
                epoch_start: start,
            });
        }

        let blocks_elapsed = latest - start;
        let observed_rate =
            throughput_estimate(blocks_elapsed, self.epoch_length_secs, self.average_block_work);

        let old_price = self.pricer.current_price();
        let new_price = self.pricer.adjust_toward(observed_rate);

        let delivered = (self.sink)(new_price);
        self.epoch_start_block = latest;

        if let Err(source) = delivered {
            warn!(price = new_price, error = %source, "failed to deliver gas price");
            return Err(OracleError::Sink {
                price: new_price,
                source,
            });
        }

        info!(
            start,
            end = latest,
            blocks = blocks_elapsed,
            observed = observed_rate,
            old_price,
            new_price,
            "epoch settled"
        );

        Ok(EpochReport {
            start_block: start,
            end_block: latest,
            blocks_elapsed,
            observed_rate,
            old_price,
            new_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::target;

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Regulator targeting 3 blocks per 10 s epoch of 11M-gas blocks, 10% bound.
    fn pricer(initial: u64) -> PriceRegulator {
        PriceRegulator::new(initial, 1, target::constant(3_300_000.0), 10.0).unwrap()
    }

    /// Controller over a shared head and a recording sink.
    fn controller(initial: u64, head: &Arc<AtomicU64>, sent: &Arc<Mutex<Vec<u64>>>) -> EpochController {
        let head = Arc::clone(head);
        let sent = Arc::clone(sent);
        let start = head.load(Ordering::SeqCst);
        EpochController::new(
            pricer(initial),
            start,
            11_000_000.0,
            10,
            move || Ok(head.load(Ordering::SeqCst)),
            move |price| {
                sent.lock().push(price);
                Ok(())
            },
        )
        .unwrap()
    }

    fn fixture(initial: u64) -> (EpochController, Arc<AtomicU64>, Arc<Mutex<Vec<u64>>>) {
        let head = Arc::new(AtomicU64::new(10));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let c = controller(initial, &head, &sent);
        (c, head, sent)
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    #[test]
    fn rejects_zero_epoch_length() {
        let err = EpochController::new(pricer(1), 0, 1.0, 0, || Ok(0), |_| Ok(())).unwrap_err();
        assert_eq!(err, ConfigError::ZeroEpochLength);
    }

    #[test]
    fn rejects_zero_block_work() {
        let err = EpochController::new(pricer(1), 0, 0.0, 10, || Ok(0), |_| Ok(())).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveBlockWork(0.0));
    }

    #[test]
    fn rejects_negative_block_work() {
        let err = EpochController::new(pricer(1), 0, -5.0, 10, || Ok(0), |_| Ok(())).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveBlockWork(-5.0));
    }

    #[test]
    fn rejects_nan_block_work() {
        let err =
            EpochController::new(pricer(1), 0, f64::NAN, 10, || Ok(0), |_| Ok(())).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveBlockWork(_)));
    }

    #[test]
    fn starts_at_given_block() {
        let c = EpochController::new(pricer(1), 77, 1.0, 10, || Ok(0), |_| Ok(())).unwrap();
        assert_eq!(c.epoch_start_block(), 77);
        assert_eq!(c.epoch_length_secs(), 10);
        assert_eq!(c.average_block_work(), 1.0);
    }

    // ------------------------------------------------------------------
    // tick — happy path
    // ------------------------------------------------------------------

    #[test]
    fn tick_calls_sink_once_with_new_price() {
        let (mut c, head, sent) = fixture(1);
        head.fetch_add(3, Ordering::SeqCst);
        let report = c.tick().unwrap();
        assert_eq!(*sent.lock(), vec![report.new_price]);
        assert_eq!(report.new_price, c.pricer().current_price());
    }

    #[test]
    fn tick_reports_epoch() {
        let (mut c, head, _) = fixture(1_000);
        head.fetch_add(10, Ordering::SeqCst);
        let report = c.tick().unwrap();
        assert_eq!(
            report,
            EpochReport {
                start_block: 10,
                end_block: 20,
                blocks_elapsed: 10,
                observed_rate: 11_000_000.0,
                old_price: 1_000,
                new_price: 1_100,
            }
        );
        assert_eq!(c.epoch_start_block(), 20);
    }

    #[test]
    fn zero_block_epoch_lowers_price() {
        let (mut c, _, sent) = fixture(100);
        let report = c.tick().unwrap();
        assert_eq!(report.blocks_elapsed, 0);
        assert_eq!(report.observed_rate, 0.0);
        assert!(report.new_price < 100);
        assert_eq!(*sent.lock(), vec![90]);
    }

    #[test]
    fn on_target_epoch_holds_price() {
        let (mut c, head, _) = fixture(500);
        head.fetch_add(3, Ordering::SeqCst);
        assert_eq!(c.tick().unwrap().new_price, 500);
    }

    // ------------------------------------------------------------------
    // tick — failures
    // ------------------------------------------------------------------

    #[test]
    fn regression_rejected_and_state_kept() {
        let (mut c, head, sent) = fixture(1);
        head.store(0, Ordering::SeqCst);

        let err = c.tick().unwrap_err();
        assert!(matches!(err, OracleError::Regression { latest: 0, epoch_start: 10 }));
        assert_eq!(c.epoch_start_block(), 10);
        assert_eq!(c.pricer().current_price(), 1);
        assert!(sent.lock().is_empty());
    }

    #[test]
    fn regression_is_retryable_after_recovery() {
        let (mut c, head, _) = fixture(1_000);
        head.store(5, Ordering::SeqCst);
        assert!(c.tick().is_err());

        head.store(13, Ordering::SeqCst);
        let report = c.tick().unwrap();
        assert_eq!(report.start_block, 10);
        assert_eq!(report.blocks_elapsed, 3);
        assert_eq!(report.new_price, 1_000);
    }

    #[test]
    fn observation_error_propagates_unchanged() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&sent);
        let mut c = EpochController::new(
            pricer(50),
            10,
            11_000_000.0,
            10,
            || Err("node unreachable".into()),
            move |p| {
                sink_log.lock().push(p);
                Ok(())
            },
        )
        .unwrap();

        match c.tick() {
            Err(OracleError::Observation(e)) => assert_eq!(e.to_string(), "node unreachable"),
            other => panic!("expected observation error, got {other:?}"),
        }
        assert_eq!(c.epoch_start_block(), 10);
        assert_eq!(c.pricer().current_price(), 50);
        assert!(sent.lock().is_empty());
    }

    #[test]
    fn sink_error_commits_price_and_advances_epoch() {
        let head = Arc::new(AtomicU64::new(10));
        let source = Arc::clone(&head);
        let mut c = EpochController::new(
            pricer(1_000),
            10,
            11_000_000.0,
            10,
            move || Ok(source.load(Ordering::SeqCst)),
            |_| Err("publish failed".into()),
        )
        .unwrap();

        head.store(20, Ordering::SeqCst);
        match c.tick() {
            Err(OracleError::Sink { price, source }) => {
                assert_eq!(price, 1_100);
                assert_eq!(source.to_string(), "publish failed");
            }
            other => panic!("expected sink error, got {other:?}"),
        }
        assert_eq!(c.pricer().current_price(), 1_100);
        assert_eq!(c.epoch_start_block(), 20);
    }

    #[test]
    fn price_handle_sees_committed_price() {
        let (mut c, head, _) = fixture(1_000);
        let handle = c.price_handle();
        head.fetch_add(10, Ordering::SeqCst);
        c.tick().unwrap();
        assert_eq!(handle.current_price(), 1_100);
    }
}
