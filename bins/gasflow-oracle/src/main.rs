//! gasflow oracle dry-run driver.
//!
//! Runs the epoch controller against a scripted chain head: each tick the
//! simulated head advances by the next entry of `--blocks`, the epoch is
//! settled, and the resulting price is logged instead of being published.
//! Useful for tuning the target, floor, and change bound before deployment.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gasflow_core::{EpochController, OracleConfig, OracleError, TargetRate};
use tracing::{error, info, warn};

/// Epoch-based gas price oracle (dry run).
#[derive(Parser, Debug)]
#[command(
    name = "gasflow-oracle",
    version,
    about = "Replay per-epoch block counts through the gas price regulator"
)]
struct Args {
    /// TOML config file (GASFLOW_* environment variables override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Blocks produced in each simulated epoch (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    blocks: Vec<u64>,

    /// Chain head at startup
    #[arg(long, default_value_t = 0)]
    start_block: u64,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Override the starting price
    #[arg(long)]
    initial_price: Option<u64>,

    /// Override the floor price
    #[arg(long)]
    floor_price: Option<u64>,

    /// Override the target throughput (gas per second)
    #[arg(long)]
    target_gas_per_second: Option<f64>,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

/// Scripted chain head.
struct SimulatedChain {
    head: Arc<AtomicU64>,
    script: VecDeque<u64>,
}

impl SimulatedChain {
    fn new(start_block: u64, blocks: Vec<u64>) -> Self {
        Self {
            head: Arc::new(AtomicU64::new(start_block)),
            script: blocks.into(),
        }
    }

    /// Produce the next epoch's blocks. Returns `false` once the script is exhausted.
    fn advance(&mut self) -> bool {
        match self.script.pop_front() {
            Some(n) => {
                self.head.fetch_add(n, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

impl Args {
    /// Load the config file and environment, then apply CLI overrides.
    fn into_parts(self) -> Result<(OracleConfig, SimulatedChain, Duration, String)> {
        let mut config = OracleConfig::load(self.config.as_deref())
            .with_context(|| format!("failed to load config {:?}", self.config))?;

        if let Some(price) = self.initial_price {
            config.initial_price = price;
        }
        if let Some(price) = self.floor_price {
            config.floor_price = price;
        }
        if let Some(target) = self.target_gas_per_second {
            config.target_gas_per_second = target;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config.validate().context("invalid configuration")?;

        let chain = SimulatedChain::new(self.start_block, self.blocks);
        Ok((config, chain, Duration::from_millis(self.tick_ms), self.log_format))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, mut chain, tick_interval, log_format) = args.into_parts()?;

    init_logging(&config.log_level, &log_format);

    info!("gasflow oracle v{}", env!("CARGO_PKG_VERSION"));
    info!("initial_price: {}", config.initial_price);
    info!("floor_price: {}", config.floor_price);
    info!(
        "target: {} gas/s ({:.2} blocks/epoch)",
        config.target_gas_per_second,
        config.target_blocks_per_epoch()
    );
    info!("max_change_percent: {}", config.max_change_percent);
    info!("epoch_length_secs: {}", config.epoch_length_secs);
    info!("epochs scripted: {}", chain.script.len());

    let target = TargetRate::new(config.target_gas_per_second);
    let pricer = config.build_regulator(target.as_fn())?;

    let head = Arc::clone(&chain.head);
    let mut controller = EpochController::new(
        pricer,
        head.load(Ordering::SeqCst),
        config.average_block_gas,
        config.epoch_length_secs,
        move || Ok(head.load(Ordering::SeqCst)),
        |price| {
            info!(price, "published gas price");
            Ok(())
        },
    )?;
    let price = controller.price_handle();

    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    let mut interval = tokio::time::interval(tick_interval);
    // The first tick completes immediately; skip it so epoch one gets a full interval.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !chain.advance() {
                    info!("block script exhausted");
                    break;
                }
                match controller.tick() {
                    Ok(report) => info!(
                        blocks = report.blocks_elapsed,
                        old = report.old_price,
                        new = report.new_price,
                        "epoch {}..{}",
                        report.start_block,
                        report.end_block
                    ),
                    Err(e @ OracleError::Config(_)) => return Err(e.into()),
                    Err(e) => warn!("tick failed, retrying next epoch: {e}"),
                }
            }
            res = &mut shutdown_signal => {
                if let Err(e) = res {
                    error!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("final gas price: {}", price.current_price());
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` takes precedence over `level_str`. Pass `format = "json"` for
/// structured output; any other value selects human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
