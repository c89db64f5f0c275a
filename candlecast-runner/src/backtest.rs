//! Backtest engine: replays the analysis pipeline over history.
//!
//! A fixed-size window slides one candle at a time. Each window is scored
//! by the full pipeline, graded against the next candle, and either
//! skipped or turned into a one-candle trade sized against the running
//! balance. The loop is sequential: every trade changes the balance the
//! next window is sized with.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use candlecast_core::config::AccountParams;
use candlecast_core::domain::{median_spacing_secs, resample, Candle, Confidence, Direction, Interval};
use candlecast_core::regime::{MarketRegime, RegimeType};
use candlecast_core::risk::{TradeAction, TradingSuggestion};
use candlecast_core::scorer::PredictionResult;
use candlecast_core::AnalysisPipeline;

use crate::config::{BacktestSettings, ConfigError, RunConfig};
use crate::metrics::periods_per_year;
use crate::result::{BacktestResult, ExitReason, Ledger, TradeRecord};

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("insufficient historical data: have {have} candles, need {need}")]
    InsufficientData { have: usize, need: usize },
    #[error("backtest cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Why an accepted window produced no trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Neutral,
    WeakScore,
    Choppy,
}

impl SkipReason {
    fn as_str(self) -> &'static str {
        match self {
            SkipReason::Neutral => "neutral prediction",
            SkipReason::WeakScore => "score below threshold",
            SkipReason::Choppy => "strong choppy regime",
        }
    }
}

/// Trade filter applied to every scored window.
pub fn skip_reason(
    result: &PredictionResult,
    regime: &MarketRegime,
    settings: &BacktestSettings,
) -> Option<SkipReason> {
    if result.direction == Direction::Neutral {
        return Some(SkipReason::Neutral);
    }
    if result.confidence != Confidence::High && result.net_score.abs() < settings.min_abs_score {
        return Some(SkipReason::WeakScore);
    }
    if regime.regime_type == RegimeType::Choppy && regime.strength > settings.max_choppy_strength {
        return Some(SkipReason::Choppy);
    }
    None
}

/// Exit price and reason for a trade opened at the window's last close and
/// held through `next`.
///
/// With stops enforced the stop is checked before the target, so a candle
/// that spans both counts as a loss.
pub fn exit_for(suggestion: &TradingSuggestion, next: &Candle, enforce_stops: bool) -> (f64, ExitReason) {
    if enforce_stops {
        match suggestion.action {
            TradeAction::Buy => {
                if next.low <= suggestion.stop_loss {
                    return (suggestion.stop_loss, ExitReason::StopLoss);
                }
                if next.high >= suggestion.take_profit {
                    return (suggestion.take_profit, ExitReason::TakeProfit);
                }
            }
            TradeAction::Sell => {
                if next.high >= suggestion.stop_loss {
                    return (suggestion.stop_loss, ExitReason::StopLoss);
                }
                if next.low <= suggestion.take_profit {
                    return (suggestion.take_profit, ExitReason::TakeProfit);
                }
            }
            TradeAction::NoTrade => {}
        }
    }
    (next.close, ExitReason::NextClose)
}

/// Sequential replay of one candle history.
#[derive(Debug, Clone)]
pub struct Backtest {
    config: RunConfig,
    pipeline: AnalysisPipeline,
}

impl Backtest {
    pub fn new(config: RunConfig) -> Self {
        Self::with_pipeline(config, AnalysisPipeline::default())
    }

    pub fn with_pipeline(config: RunConfig, pipeline: AnalysisPipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Minimum history length: one full window plus the candle it is
    /// graded against.
    pub fn required_candles(&self) -> usize {
        self.config.backtest.window_size + 1
    }

    /// Replay `candles` (oldest first).
    ///
    /// `cancel` is polled before each window; once set the replay stops
    /// with [`BacktestError::Cancelled`].
    pub fn run(
        &self,
        candles: &[Candle],
        cancel: Option<&AtomicBool>,
    ) -> Result<BacktestResult, BacktestError> {
        self.config.validate()?;
        let need = self.required_candles();
        if candles.len() < need {
            return Err(BacktestError::InsufficientData {
                have: candles.len(),
                need,
            });
        }

        let settings = &self.config.backtest;
        let window_size = settings.window_size;
        let base_secs = median_spacing_secs(candles).unwrap_or_else(|| Interval::H1.seconds());
        let timeframes = self.timeframes(base_secs);

        info!(
            candles = candles.len(),
            window = window_size,
            steps = candles.len() - window_size,
            timeframes = timeframes.len(),
            "backtest started"
        );

        let mut ledger = Ledger::new(settings.initial_balance);
        for end in window_size..candles.len() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                info!(step = end - window_size, "backtest cancelled");
                return Err(BacktestError::Cancelled);
            }
            let balance = ledger.balance();
            if balance <= 0.0 {
                warn!(step = end - window_size, balance, "account depleted; stopping replay");
                break;
            }

            let window = &candles[end - window_size..end];
            let next = &candles[end];
            let mtf = higher_timeframes(candles, end, window_size, &timeframes);
            let account = AccountParams {
                account_size: balance,
                risk_per_trade: self.config.account.risk_per_trade,
            };
            let prediction = self.pipeline.predict(window, &mtf, &self.config.indicators, &account);

            let last_close = prediction.suggestion.entry_price;
            let graded = prediction.result.with_outcome(last_close, next.close);
            ledger.record_prediction(graded.direction, graded.was_correct);

            if let Some(reason) = skip_reason(&graded, &prediction.regime, settings) {
                debug!(
                    at = %next.timestamp,
                    reason = reason.as_str(),
                    score = graded.net_score,
                    "step skipped"
                );
                ledger.record_skip();
                continue;
            }
            let suggestion = &prediction.suggestion;
            if suggestion.action == TradeAction::NoTrade || suggestion.position_size <= 0.0 {
                debug!(at = %next.timestamp, "step skipped: no tradable suggestion");
                ledger.record_skip();
                continue;
            }

            let (exit_price, exit_reason) = exit_for(suggestion, next, settings.enforce_stops);
            let pnl = graded.direction.sign() * (exit_price - suggestion.entry_price) * suggestion.position_size;
            ledger.record_trade(TradeRecord {
                entry_time: window[window.len() - 1].timestamp,
                exit_time: next.timestamp,
                direction: graded.direction,
                entry_price: suggestion.entry_price,
                exit_price,
                quantity: suggestion.position_size,
                pnl,
                return_pct: pnl / balance * 100.0,
                regime: prediction.regime.regime_type,
                confidence: graded.confidence,
                score: graded.net_score,
                exit_reason,
            });
        }

        let result = ledger.finish(
            self.config.run_id(),
            periods_per_year(base_secs),
            candles.first().map(|c| c.timestamp),
            candles.last().map(|c| c.timestamp),
        );
        info!(
            trades = result.total_trades(),
            win_pct = result.metrics.win_percentage,
            net_profit = result.net_profit,
            max_drawdown_pct = result.metrics.max_drawdown_pct,
            "backtest finished"
        );
        Ok(result)
    }

    /// Intervals synthesized from the configured resample factors.
    fn timeframes(&self, base_secs: i64) -> Vec<(usize, Interval)> {
        self.config
            .backtest
            .mtf_factors
            .iter()
            .filter_map(|&factor| {
                let interval = Interval::from_seconds(base_secs * factor as i64);
                if interval.is_none() {
                    warn!(factor, base_secs, "resample factor matches no known interval; ignored");
                }
                interval.map(|i| (factor, i))
            })
            .collect()
    }
}

/// Higher-timeframe windows built from history up to (not including)
/// `end`.
fn higher_timeframes(
    candles: &[Candle],
    end: usize,
    window_size: usize,
    timeframes: &[(usize, Interval)],
) -> BTreeMap<Interval, Vec<Candle>> {
    timeframes
        .iter()
        .filter_map(|&(factor, interval)| {
            let history = &candles[end.saturating_sub(window_size * factor)..end];
            let resampled = resample(history, factor);
            (!resampled.is_empty()).then_some((interval, resampled))
        })
        .collect()
}
