//! Risk & position sizing.
//!
//! Turns a predicted direction into a concrete trade: entry at the last
//! close, the most conservative of three stop candidates, a position sized
//! so the stop costs `account_size * risk_per_trade`, and take-profit
//! targets at fixed R-multiples.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AccountParams;
use crate::domain::{Candle, Direction};
use crate::indicators::IndicatorSet;

/// Take-profit targets in multiples of the stop distance.
pub const R_MULTIPLES: [f64; 3] = [1.5, 2.0, 3.0];
/// Index of the default target in [`R_MULTIPLES`].
pub const DEFAULT_TARGET: usize = 1;
/// Buffer placed beyond a support/resistance level.
pub const STRUCTURE_BUFFER: f64 = 0.002;
/// Fallback stop distance as a fraction of price.
pub const PERCENT_STOP: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    NoTrade,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::NoTrade => "NO_TRADE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSuggestion {
    pub action: TradeAction,
    pub entry_price: f64,
    pub stop_loss: f64,
    /// The 2R target.
    pub take_profit: f64,
    /// Every R-multiple target, nearest first.
    pub alternate_targets: Vec<f64>,
    /// Units of the instrument.
    pub position_size: f64,
    pub risk_reward_ratio: f64,
    pub account_risk_percent: f64,
}

impl TradingSuggestion {
    pub fn no_trade(price: f64) -> Self {
        Self {
            action: TradeAction::NoTrade,
            entry_price: price,
            stop_loss: price,
            take_profit: price,
            alternate_targets: Vec::new(),
            position_size: 0.0,
            risk_reward_ratio: 0.0,
            account_risk_percent: 0.0,
        }
    }

    /// Currency lost if the stop is hit.
    pub fn risk_amount(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs() * self.position_size
    }
}

/// ATR multiple for the volatility stop, wider as volatility expands.
pub fn atr_multiplier(volatility_ratio: f64) -> f64 {
    if volatility_ratio > 1.5 {
        2.5
    } else if volatility_ratio > 1.2 {
        2.0
    } else if volatility_ratio < 0.8 {
        1.2
    } else {
        1.5
    }
}

/// Stop candidates for the trade side; the conservative one wins.
fn stop_loss(set: &IndicatorSet, entry: f64, long: bool) -> f64 {
    let atr_distance = set.atr * atr_multiplier(set.volatility_ratio);
    let percent_distance = entry * PERCENT_STOP;
    let mut candidates = Vec::with_capacity(3);
    if long {
        candidates.push(entry - percent_distance);
        if atr_distance > 0.0 {
            candidates.push(entry - atr_distance);
        }
        if let Some(support) = set.levels.nearest_support().filter(|s| *s < entry) {
            candidates.push(support * (1.0 - STRUCTURE_BUFFER));
        }
        candidates.into_iter().fold(f64::NEG_INFINITY, f64::max)
    } else {
        candidates.push(entry + percent_distance);
        if atr_distance > 0.0 {
            candidates.push(entry + atr_distance);
        }
        if let Some(resistance) = set.levels.nearest_resistance().filter(|r| *r > entry) {
            candidates.push(resistance * (1.0 + STRUCTURE_BUFFER));
        }
        candidates.into_iter().fold(f64::INFINITY, f64::min)
    }
}

/// Size a trade for `direction` at the window's last close.
pub fn size(
    window: &[Candle],
    set: &IndicatorSet,
    direction: Direction,
    account: &AccountParams,
) -> TradingSuggestion {
    let entry = window.last().map(|c| c.close).unwrap_or(set.last_close);
    let long = match direction {
        Direction::Up => true,
        Direction::Down => false,
        Direction::Neutral => return TradingSuggestion::no_trade(entry),
    };
    if !(entry.is_finite() && entry > 0.0) {
        return TradingSuggestion::no_trade(entry);
    }

    let mut stop = stop_loss(set, entry, long);
    let mut distance = (entry - stop).abs();
    if !(distance.is_finite() && distance > 0.0) {
        distance = entry * PERCENT_STOP;
        stop = if long { entry - distance } else { entry + distance };
    }
    let side = if long { 1.0 } else { -1.0 };
    let targets: Vec<f64> = R_MULTIPLES
        .iter()
        .map(|r| entry + side * r * distance)
        .collect();

    TradingSuggestion {
        action: if long { TradeAction::Buy } else { TradeAction::Sell },
        entry_price: entry,
        stop_loss: stop,
        take_profit: targets[DEFAULT_TARGET],
        alternate_targets: targets,
        position_size: account.account_size * account.risk_per_trade / distance,
        risk_reward_ratio: R_MULTIPLES[DEFAULT_TARGET],
        account_risk_percent: account.risk_per_trade * 100.0,
    }
}
