//! Performance metrics: pure functions that compute backtest statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in,
//! scalar out. No dependencies on the replay loop or the analysis pipeline.

use serde::{Deserialize, Serialize};

use crate::result::TradeRecord;

const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// Trade-level aggregates of one backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// `winning_trades / total_trades × 100`.
    pub win_percentage: f64,
    pub total_profit: f64,
    pub total_loss: f64,
    pub average_gain: f64,
    pub average_loss: f64,
    pub average_gain_pct: f64,
    pub average_loss_pct: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub expectancy: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    ///
    /// `periods_per_year` annualizes the Sharpe ratio; see
    /// [`periods_per_year`].
    pub fn compute(equity_curve: &[f64], trades: &[TradeRecord], periods_per_year: f64) -> Self {
        let wins: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_winner()).collect();
        let losses: Vec<&TradeRecord> = trades.iter().filter(|t| !t.is_winner()).collect();

        let total_profit: f64 = wins.iter().map(|t| t.pnl).sum();
        let total_loss: f64 = losses.iter().map(|t| t.pnl.abs()).sum();
        let average_gain = mean_f64(&wins.iter().map(|t| t.pnl).collect::<Vec<_>>());
        let average_loss = mean_f64(&losses.iter().map(|t| t.pnl.abs()).collect::<Vec<_>>());

        let returns: Vec<f64> = trades.iter().map(|t| t.return_pct / 100.0).collect();

        Self {
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_percentage: win_percentage(wins.len(), trades.len()),
            total_profit,
            total_loss,
            average_gain,
            average_loss,
            average_gain_pct: mean_f64(&wins.iter().map(|t| t.return_pct).collect::<Vec<_>>()),
            average_loss_pct: mean_f64(
                &losses.iter().map(|t| t.return_pct.abs()).collect::<Vec<_>>(),
            ),
            largest_win: wins.iter().map(|t| t.pnl).fold(0.0, f64::max),
            largest_loss: losses.iter().map(|t| t.pnl.abs()).fold(0.0, f64::max),
            expectancy: expectancy(wins.len(), trades.len(), average_gain, average_loss),
            profit_factor: profit_factor(total_profit, total_loss),
            max_drawdown_pct: max_drawdown_pct(equity_curve),
            sharpe_ratio: sharpe_ratio(&returns, periods_per_year),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return in percent: (final - initial) / initial × 100.
pub fn total_return_pct(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if initial > 0.0 => (last - initial) / initial * 100.0,
        _ => 0.0,
    }
}

/// Largest peak-to-trough decline in percent of the running peak.
///
/// Returns 0.0 if equity never falls below a previous high.
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak * 100.0);
        }
    }
    max_dd
}

/// Annualized Sharpe ratio of per-period fractional returns.
///
/// Sharpe = mean(returns) / std(returns) × sqrt(periods_per_year), with a
/// zero risk-free rate. Returns 0.0 for fewer than 2 returns or zero
/// variance.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std * periods_per_year.max(1.0).sqrt()
}

/// Periods per year for candles spaced `spacing_secs` apart.
///
/// Markets are assumed to trade every day of the year. Daily candles give
/// 365, hourly candles 8760. Non-positive spacing falls back to daily.
pub fn periods_per_year(spacing_secs: i64) -> f64 {
    if spacing_secs <= 0 {
        return 365.0;
    }
    SECONDS_PER_YEAR / spacing_secs as f64
}

/// `wins / total × 100`, 0.0 when there are no trades.
pub fn win_percentage(wins: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    wins as f64 / total as f64 * 100.0
}

/// Total profit / total loss. With no losses the ratio is the total profit
/// itself.
pub fn profit_factor(total_profit: f64, total_loss: f64) -> f64 {
    if total_loss > 0.0 {
        total_profit / total_loss
    } else {
        total_profit
    }
}

/// Expected currency P&L per trade.
pub fn expectancy(wins: usize, total: usize, average_gain: f64, average_loss: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = wins as f64 / total as f64;
    p * average_gain - (1.0 - p) * average_loss
}

/// Longest run of winning (`winners = true`) or losing trades.
pub fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::tests::make_trade;

    fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
        assert!(
            (actual - expected).abs() < epsilon,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn total_return_basic() {
        assert_approx(total_return_pct(&[100.0, 110.0, 120.0]), 20.0, 1e-10);
        assert_eq!(total_return_pct(&[100.0]), 0.0);
        assert_eq!(total_return_pct(&[]), 0.0);
    }

    #[test]
    fn drawdown_from_running_peak() {
        // Peak 120, trough 90 → 25%
        assert_approx(max_drawdown_pct(&[100.0, 120.0, 90.0, 110.0]), 25.0, 1e-10);
        assert_eq!(max_drawdown_pct(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn sharpe_zero_for_constant_returns() {
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 365.0), 0.0);
        assert_eq!(sharpe_ratio(&[0.01], 365.0), 0.0);
    }

    #[test]
    fn sharpe_sign_and_annualization() {
        let returns = [0.02, -0.01, 0.03, 0.00];
        let daily = sharpe_ratio(&returns, 1.0);
        assert!(daily > 0.0);
        assert_approx(sharpe_ratio(&returns, 365.0), daily * 365.0_f64.sqrt(), 1e-10);
    }

    #[test]
    fn periods_from_spacing() {
        assert_approx(periods_per_year(86_400), 365.0, 1e-10);
        assert_approx(periods_per_year(3_600), 8_760.0, 1e-10);
        assert_eq!(periods_per_year(0), 365.0);
    }

    #[test]
    fn profit_factor_without_losses_is_total_profit() {
        assert_approx(profit_factor(250.0, 100.0), 2.5, 1e-10);
        assert_eq!(profit_factor(250.0, 0.0), 250.0);
        assert_eq!(profit_factor(0.0, 0.0), 0.0);
    }

    #[test]
    fn streaks() {
        let trades: Vec<_> = [10.0, 5.0, -3.0, 7.0, 2.0, 1.0, -1.0, -2.0]
            .iter()
            .map(|&pnl| make_trade(pnl))
            .collect();
        assert_eq!(max_consecutive(&trades, true), 3);
        assert_eq!(max_consecutive(&trades, false), 2);
    }

    #[test]
    fn compute_aggregates() {
        let trades: Vec<_> = [100.0, -50.0, 200.0, 0.0]
            .iter()
            .map(|&pnl| make_trade(pnl))
            .collect();
        let m = PerformanceMetrics::compute(&[1000.0, 1100.0, 1050.0, 1250.0, 1250.0], &trades, 365.0);
        assert_eq!(m.total_trades, 4);
        assert_eq!(m.winning_trades, 2);
        // Zero P&L counts as a loss
        assert_eq!(m.losing_trades, 2);
        assert_approx(m.win_percentage, 50.0, 1e-10);
        assert_approx(m.total_profit, 300.0, 1e-10);
        assert_approx(m.total_loss, 50.0, 1e-10);
        assert_approx(m.average_gain, 150.0, 1e-10);
        assert_approx(m.average_loss, 25.0, 1e-10);
        assert_approx(m.largest_win, 200.0, 1e-10);
        assert_approx(m.largest_loss, 50.0, 1e-10);
        assert_approx(m.profit_factor, 6.0, 1e-10);
        assert_approx(m.expectancy, 0.5 * 150.0 - 0.5 * 25.0, 1e-10);
        assert_approx(m.max_drawdown_pct, 50.0 / 1100.0 * 100.0, 1e-10);
    }

    #[test]
    fn empty_trade_list() {
        let m = PerformanceMetrics::compute(&[1000.0], &[], 365.0);
        assert_eq!(m, PerformanceMetrics::default());
    }

    #[test]
    fn std_dev_is_sample() {
        assert_approx(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), (32.0_f64 / 7.0).sqrt(), 1e-10);
    }
}
