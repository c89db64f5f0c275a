//! Backtest trade ledger and aggregate result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use candlecast_core::domain::{Confidence, Direction};
use candlecast_core::regime::RegimeType;

use crate::config::RunId;
use crate::metrics::{self, PerformanceMetrics};

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The next candle traded through the stop loss.
    StopLoss,
    /// The next candle reached the take-profit target.
    TakeProfit,
    /// Closed at the next candle's close.
    NextClose,
}

/// One accepted backtest step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// `Up` for long, `Down` for short.
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    /// P&L as a percentage of the balance before the trade.
    pub return_pct: f64,
    pub regime: RegimeType,
    pub confidence: Confidence,
    pub score: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    /// Break-even trades count as losses.
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

/// Per-regime hit counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeStats {
    pub trades: usize,
    pub wins: usize,
    pub net_pnl: f64,
    /// Percent.
    pub win_rate: f64,
}

/// P&L of all trades closed in one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub trades: usize,
    pub pnl: f64,
    /// Balance before the month's first trade.
    pub opening_balance: f64,
    /// `pnl / opening_balance × 100`.
    pub return_pct: f64,
}

/// Complete result of one backtest replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run_id: RunId,
    /// First and last candle of the replayed history.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub net_profit: f64,
    pub total_return_pct: f64,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    /// Windows scored, traded or not.
    pub predictions_made: usize,
    pub correct_predictions: usize,
    /// Percent of directional predictions whose direction matched the
    /// next close.
    pub prediction_accuracy: f64,
    pub skipped_steps: usize,
    /// Balance after each trade, starting with the initial balance.
    pub equity_curve: Vec<f64>,
    pub regime_stats: BTreeMap<RegimeType, RegimeStats>,
    /// Keyed by `YYYY-MM` of the exit time.
    pub monthly_returns: BTreeMap<String, MonthlyReturn>,
    pub trades: Vec<TradeRecord>,
}

impl BacktestResult {
    /// Rebuild a result from a trade list, as if each trade had been
    /// recorded by a replay in order. Prediction counters stay at zero.
    pub fn from_trades(
        run_id: RunId,
        initial_balance: f64,
        trades: Vec<TradeRecord>,
        periods_per_year: f64,
    ) -> Self {
        let start = trades.first().map(|t| t.entry_time);
        let end = trades.last().map(|t| t.exit_time);
        let mut ledger = Ledger::new(initial_balance);
        for trade in trades {
            ledger.record_trade(trade);
        }
        ledger.finish(run_id, periods_per_year, start, end)
    }

    pub fn total_trades(&self) -> usize {
        self.metrics.total_trades
    }
}

/// Running state of a replay, finalized once into a [`BacktestResult`].
#[derive(Debug, Clone)]
pub(crate) struct Ledger {
    initial_balance: f64,
    balance: f64,
    equity_curve: Vec<f64>,
    trades: Vec<TradeRecord>,
    regime_stats: BTreeMap<RegimeType, RegimeStats>,
    monthly: BTreeMap<String, MonthlyReturn>,
    directional_predictions: usize,
    predictions: usize,
    correct: usize,
    skipped: usize,
}

impl Ledger {
    pub(crate) fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            equity_curve: vec![initial_balance],
            trades: Vec::new(),
            regime_stats: BTreeMap::new(),
            monthly: BTreeMap::new(),
            directional_predictions: 0,
            predictions: 0,
            correct: 0,
            skipped: 0,
        }
    }

    pub(crate) fn balance(&self) -> f64 {
        self.balance
    }

    /// Grade a scored window. Neutral calls are counted but never graded.
    pub(crate) fn record_prediction(&mut self, direction: Direction, was_correct: Option<bool>) {
        self.predictions += 1;
        if direction != Direction::Neutral {
            self.directional_predictions += 1;
            if was_correct == Some(true) {
                self.correct += 1;
            }
        }
    }

    pub(crate) fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn record_trade(&mut self, trade: TradeRecord) {
        let opening = self.balance;
        self.balance += trade.pnl;
        self.equity_curve.push(self.balance);

        let stats = self.regime_stats.entry(trade.regime).or_default();
        stats.trades += 1;
        if trade.is_winner() {
            stats.wins += 1;
        }
        stats.net_pnl += trade.pnl;
        stats.win_rate = metrics::win_percentage(stats.wins, stats.trades);

        let month = self
            .monthly
            .entry(trade.exit_time.format("%Y-%m").to_string())
            .or_insert_with(|| MonthlyReturn {
                opening_balance: opening,
                ..MonthlyReturn::default()
            });
        month.trades += 1;
        month.pnl += trade.pnl;
        if month.opening_balance > 0.0 {
            month.return_pct = month.pnl / month.opening_balance * 100.0;
        }

        self.trades.push(trade);
    }

    pub(crate) fn finish(
        self,
        run_id: RunId,
        periods_per_year: f64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> BacktestResult {
        let metrics = PerformanceMetrics::compute(&self.equity_curve, &self.trades, periods_per_year);
        let prediction_accuracy = if self.directional_predictions > 0 {
            self.correct as f64 / self.directional_predictions as f64 * 100.0
        } else {
            0.0
        };
        BacktestResult {
            run_id,
            start,
            end,
            initial_balance: self.initial_balance,
            final_balance: self.balance,
            net_profit: self.balance - self.initial_balance,
            total_return_pct: metrics::total_return_pct(&self.equity_curve),
            metrics,
            predictions_made: self.predictions,
            correct_predictions: self.correct,
            prediction_accuracy,
            skipped_steps: self.skipped,
            equity_curve: self.equity_curve,
            regime_stats: self.regime_stats,
            monthly_returns: self.monthly,
            trades: self.trades,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Long trade on a notional 1000 balance with the given P&L.
    pub(crate) fn make_trade(pnl: f64) -> TradeRecord {
        make_trade_at(pnl, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
    }

    pub(crate) fn make_trade_at(pnl: f64, exit_time: DateTime<Utc>) -> TradeRecord {
        TradeRecord {
            entry_time: exit_time - chrono::Duration::hours(1),
            exit_time,
            direction: Direction::Up,
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            quantity: 1.0,
            pnl,
            return_pct: pnl / 10.0,
            regime: RegimeType::Trending,
            confidence: Confidence::Medium,
            score: 2.0,
            exit_reason: ExitReason::NextClose,
        }
    }

    #[test]
    fn ledger_tracks_balance_and_buckets() {
        let mut ledger = Ledger::new(1000.0);
        let jan = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap();

        ledger.record_trade(make_trade_at(100.0, jan));
        let mut loser = make_trade_at(-50.0, feb);
        loser.regime = RegimeType::Ranging;
        ledger.record_trade(loser);
        ledger.record_skip();

        let result = ledger.finish("id".into(), 365.0, None, None);
        assert_eq!(result.equity_curve, vec![1000.0, 1100.0, 1050.0]);
        assert_eq!(result.final_balance, 1050.0);
        assert_eq!(result.net_profit, 50.0);
        assert_eq!(result.skipped_steps, 1);

        let trending = &result.regime_stats[&RegimeType::Trending];
        assert_eq!((trending.trades, trending.wins), (1, 1));
        assert_eq!(trending.win_rate, 100.0);
        assert_eq!(result.regime_stats[&RegimeType::Ranging].win_rate, 0.0);

        let feb_stats = &result.monthly_returns["2024-02"];
        assert_eq!(feb_stats.opening_balance, 1100.0);
        assert!((feb_stats.return_pct - (-50.0 / 1100.0 * 100.0)).abs() < 1e-10);
        assert_eq!(result.monthly_returns["2024-01"].pnl, 100.0);
    }

    #[test]
    fn accuracy_ignores_neutral_calls() {
        let mut ledger = Ledger::new(1000.0);
        ledger.record_prediction(Direction::Up, Some(true));
        ledger.record_prediction(Direction::Down, Some(false));
        ledger.record_prediction(Direction::Neutral, Some(true));
        let result = ledger.finish("id".into(), 365.0, None, None);
        assert_eq!(result.predictions_made, 3);
        assert_eq!(result.correct_predictions, 1);
        assert_eq!(result.prediction_accuracy, 50.0);
    }

    #[test]
    fn serializes_with_flattened_metrics() {
        let mut ledger = Ledger::new(1000.0);
        ledger.record_trade(make_trade(10.0));
        let result = ledger.finish("id".into(), 365.0, None, None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["total_trades"], 1);
        assert_eq!(json["regime_stats"]["TRENDING"]["wins"], 1);
    }
}
