//! Candlecast Runner: historical validation of the analysis pipeline.
//!
//! This crate builds on `candlecast-core` to provide:
//! - TOML run configuration
//! - CSV candle loading (a file-backed `CandleSource`)
//! - Sequential backtest replay with a trade ledger and metrics
//! - Parallel Monte Carlo resampling of backtest trade order
//! - JSON / CSV / Markdown artifact export

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod monte_carlo;
pub mod result;

pub use backtest::{Backtest, BacktestError};
pub use config::{BacktestSettings, ConfigError, LoadError, MonteCarloSettings, RunConfig};
pub use data_loader::{dataset_hash, load_csv, CsvCandleSource};
pub use export::{generate_report, save_artifacts};
pub use metrics::PerformanceMetrics;
pub use monte_carlo::{MonteCarloError, MonteCarloResult, SimulationResult};
pub use result::{BacktestResult, ExitReason, TradeRecord};

use candlecast_core::domain::Candle;

/// Replay `candles` (oldest first) with `config`.
pub fn run_backtest(candles: &[Candle], config: &RunConfig) -> Result<BacktestResult, BacktestError> {
    Backtest::new(config.clone()).run(candles, None)
}

/// Shuffle `result`'s trades `runs` times with the default seed.
pub fn run_monte_carlo(result: &BacktestResult, runs: usize) -> Result<MonteCarloResult, MonteCarloError> {
    let settings = MonteCarloSettings {
        runs,
        ..MonteCarloSettings::default()
    };
    monte_carlo::simulate(result, &settings, None)
}
