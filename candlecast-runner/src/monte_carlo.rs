//! Monte Carlo simulator: trade-order resampling of a backtest.
//!
//! Each run shuffles the backtest's win/loss sequence (wins contribute the
//! average gain, losses the average loss), replays it from a fixed starting
//! balance, and records the final balance, return, and drawdown. Runs draw
//! from independent generators derived from one master seed, so the
//! distribution is identical however rayon schedules them.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use candlecast_core::rng::SeedHierarchy;

use crate::config::MonteCarloSettings;
use crate::result::BacktestResult;

/// Fewest backtest trades a simulation accepts.
pub const MIN_TRADES: usize = 10;

const STREAM: &str = "monte_carlo";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonteCarloError {
    #[error("monte carlo needs at least {need} trades, backtest has {have}")]
    InsufficientTrades { have: usize, need: usize },
    #[error("monte carlo needs at least one run")]
    NoRuns,
    #[error("monte carlo cancelled")]
    Cancelled,
}

/// Outcome of one shuffled replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub final_balance: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    /// Sum of the replayed per-trade P&L.
    pub trade_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub simulations: usize,
    pub starting_balance: f64,
    pub worst: SimulationResult,
    pub p10: SimulationResult,
    pub p25: SimulationResult,
    pub median: SimulationResult,
    pub p75: SimulationResult,
    pub p90: SimulationResult,
    pub best: SimulationResult,
    pub mean_return_pct: f64,
    /// Fraction of runs with a positive total return.
    pub probability_of_profit: f64,
    pub median_drawdown_pct: f64,
    pub p95_drawdown_pct: f64,
    /// Every run, sorted by total return ascending.
    pub results: Vec<SimulationResult>,
}

/// Per-trade P&L in trade order: `+average_gain` per win, `-average_loss`
/// per loss.
pub fn trade_sequence(backtest: &BacktestResult) -> Vec<f64> {
    let gain = backtest.metrics.average_gain;
    let loss = backtest.metrics.average_loss;
    backtest
        .trades
        .iter()
        .map(|t| if t.is_winner() { gain } else { -loss })
        .collect()
}

/// Run `settings.runs` shuffled replays of `backtest`.
///
/// The starting balance defaults to the backtest's initial balance.
/// `cancel` is polled before every run.
pub fn simulate(
    backtest: &BacktestResult,
    settings: &MonteCarloSettings,
    cancel: Option<&AtomicBool>,
) -> Result<MonteCarloResult, MonteCarloError> {
    let have = backtest.trades.len();
    if have < MIN_TRADES {
        return Err(MonteCarloError::InsufficientTrades {
            have,
            need: MIN_TRADES,
        });
    }
    if settings.runs == 0 {
        return Err(MonteCarloError::NoRuns);
    }

    let starting_balance = settings.starting_balance.unwrap_or(backtest.initial_balance);
    let sequence = trade_sequence(backtest);
    let seeds = SeedHierarchy::new(settings.seed);
    info!(runs = settings.runs, trades = have, seed = settings.seed, "monte carlo started");

    let mut results = (0..settings.runs)
        .into_par_iter()
        .map(|i| {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(MonteCarloError::Cancelled);
            }
            let mut order = sequence.clone();
            order.shuffle(&mut seeds.rng_for(STREAM, i as u64));
            Ok(replay(&order, starting_balance))
        })
        .collect::<Result<Vec<_>, _>>()?;

    results.sort_by(|a, b| a.total_return_pct.total_cmp(&b.total_return_pct));
    let result = aggregate(results, starting_balance);
    info!(
        median_return_pct = result.median.total_return_pct,
        probability_of_profit = result.probability_of_profit,
        "monte carlo finished"
    );
    Ok(result)
}

/// Replay one ordering of trade P&L from `starting_balance`.
pub fn replay(pnls: &[f64], starting_balance: f64) -> SimulationResult {
    let mut balance = starting_balance;
    let mut peak = starting_balance;
    let mut max_drawdown_pct = 0.0_f64;
    for pnl in pnls {
        balance += pnl;
        peak = peak.max(balance);
        if peak > 0.0 {
            max_drawdown_pct = max_drawdown_pct.max((peak - balance) / peak * 100.0);
        }
    }
    let total_return_pct = if starting_balance > 0.0 {
        (balance - starting_balance) / starting_balance * 100.0
    } else {
        0.0
    };
    SimulationResult {
        final_balance: balance,
        total_return_pct,
        max_drawdown_pct,
        trade_total: pnls.iter().sum(),
    }
}

/// Index of percentile `p` in a sorted list of `n` values.
pub fn percentile_index(n: usize, p: f64) -> usize {
    if n == 0 {
        return 0;
    }
    ((p * (n - 1) as f64).round() as usize).min(n - 1)
}

/// `sorted` must be non-empty and ordered by total return.
fn aggregate(sorted: Vec<SimulationResult>, starting_balance: f64) -> MonteCarloResult {
    let n = sorted.len();
    let at = |p: f64| sorted[percentile_index(n, p)];

    let mut drawdowns: Vec<f64> = sorted.iter().map(|r| r.max_drawdown_pct).collect();
    drawdowns.sort_by(f64::total_cmp);
    let profitable = sorted.iter().filter(|r| r.total_return_pct > 0.0).count();
    let mean_return_pct = sorted.iter().map(|r| r.total_return_pct).sum::<f64>() / n as f64;
    let (worst, p10, p25, median, p75, p90, best) =
        (at(0.0), at(0.10), at(0.25), at(0.50), at(0.75), at(0.90), at(1.0));

    MonteCarloResult {
        simulations: n,
        starting_balance,
        worst,
        p10,
        p25,
        median,
        p75,
        p90,
        best,
        mean_return_pct,
        probability_of_profit: profitable as f64 / n as f64,
        median_drawdown_pct: drawdowns[percentile_index(n, 0.50)],
        p95_drawdown_pct: drawdowns[percentile_index(n, 0.95)],
        results: sorted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::tests::make_trade;

    fn backtest(pnls: &[f64]) -> BacktestResult {
        let trades = pnls.iter().map(|&p| make_trade(p)).collect();
        BacktestResult::from_trades("mc".into(), 1_000.0, trades, 365.0)
    }

    fn settings(runs: usize) -> MonteCarloSettings {
        MonteCarloSettings {
            runs,
            ..MonteCarloSettings::default()
        }
    }

    fn mixed() -> BacktestResult {
        backtest(&[30.0, -10.0, 20.0, -20.0, 40.0, -10.0, 10.0, -30.0, 50.0, -10.0, 20.0, 10.0])
    }

    #[test]
    fn too_few_trades() {
        let err = simulate(&backtest(&[1.0; 9]), &settings(10), None).unwrap_err();
        assert_eq!(err, MonteCarloError::InsufficientTrades { have: 9, need: 10 });
    }

    #[test]
    fn zero_runs() {
        assert_eq!(simulate(&mixed(), &settings(0), None).unwrap_err(), MonteCarloError::NoRuns);
    }

    #[test]
    fn sequence_uses_averages() {
        let bt = backtest(&[30.0, -10.0, 10.0, -30.0]);
        // Average gain 20, average loss 20
        assert_eq!(trade_sequence(&bt), vec![20.0, -20.0, 20.0, -20.0]);
    }

    #[test]
    fn percentiles_are_ordered() {
        let mc = simulate(&mixed(), &settings(200), None).unwrap();
        let order = [mc.worst, mc.p10, mc.p25, mc.median, mc.p75, mc.p90, mc.best];
        for pair in order.windows(2) {
            assert!(pair[0].total_return_pct <= pair[1].total_return_pct);
        }
        assert_eq!(mc.simulations, 200);
        assert_eq!(mc.results.len(), 200);
        assert!(mc.median_drawdown_pct <= mc.p95_drawdown_pct);
    }

    #[test]
    fn final_balance_is_order_independent() {
        // Shuffling only reorders the same P&L values
        let mc = simulate(&mixed(), &settings(64), None).unwrap();
        let expected = 1_000.0 + trade_sequence(&mixed()).iter().sum::<f64>();
        for run in &mc.results {
            assert!((run.final_balance - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn same_seed_same_distribution() {
        let a = simulate(&mixed(), &settings(100), None).unwrap();
        let b = simulate(&mixed(), &settings(100), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn all_winners_always_profit() {
        let mc = simulate(&backtest(&[5.0; 12]), &settings(50), None).unwrap();
        assert_eq!(mc.probability_of_profit, 1.0);
        assert_eq!(mc.worst.max_drawdown_pct, 0.0);
        assert!((mc.mean_return_pct - 6.0).abs() < 1e-9);
    }

    #[test]
    fn starting_balance_override() {
        let s = MonteCarloSettings {
            runs: 10,
            starting_balance: Some(500.0),
            ..MonteCarloSettings::default()
        };
        let mc = simulate(&mixed(), &s, None).unwrap();
        assert_eq!(mc.starting_balance, 500.0);
    }

    #[test]
    fn cancelled_before_start() {
        let flag = AtomicBool::new(true);
        let err = simulate(&mixed(), &settings(10), Some(&flag)).unwrap_err();
        assert_eq!(err, MonteCarloError::Cancelled);
    }

    #[test]
    fn replay_tracks_drawdown() {
        let run = replay(&[100.0, -220.0, 50.0], 1_000.0);
        assert_eq!(run.final_balance, 930.0);
        assert!((run.max_drawdown_pct - 20.0).abs() < 1e-9);
        assert!((run.total_return_pct - (-7.0)).abs() < 1e-9);
    }

    #[test]
    fn percentile_positions() {
        assert_eq!(percentile_index(1000, 0.0), 0);
        assert_eq!(percentile_index(1000, 0.5), 500); // round(499.5)
        assert_eq!(percentile_index(1000, 1.0), 999);
        assert_eq!(percentile_index(11, 0.1), 1);
    }
}
