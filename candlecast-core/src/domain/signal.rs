//! Directional vocabulary shared by the scorer, risk sizing, and backtest.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Predicted or realized price direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    /// +1 for Up, -1 for Down, 0 for Neutral.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    /// Direction of a realized move from `from` to `to`.
    pub fn of_move(from: f64, to: f64) -> Direction {
        if to > from {
            Direction::Up
        } else if to < from {
            Direction::Down
        } else {
            Direction::Neutral
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// Confidence bucket of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        };
        f.write_str(s)
    }
}

/// Bullish / bearish / neutral lean of a signal, pattern, or regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Bias::Bullish => "BULLISH",
            Bias::Bearish => "BEARISH",
            Bias::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// Discrete vote produced by the indicator engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSignal {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl TradeSignal {
    /// Map an integer vote tally onto the five-step scale.
    pub fn from_votes(votes: i32) -> TradeSignal {
        match votes {
            v if v >= 4 => TradeSignal::StrongBuy,
            v if v >= 2 => TradeSignal::Buy,
            v if v <= -4 => TradeSignal::StrongSell,
            v if v <= -2 => TradeSignal::Sell,
            _ => TradeSignal::Neutral,
        }
    }

    pub fn bias(self) -> Bias {
        match self {
            TradeSignal::StrongBuy | TradeSignal::Buy => Bias::Bullish,
            TradeSignal::StrongSell | TradeSignal::Sell => Bias::Bearish,
            TradeSignal::Neutral => Bias::Neutral,
        }
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeSignal::StrongBuy => "STRONG_BUY",
            TradeSignal::Buy => "BUY",
            TradeSignal::Neutral => "NEUTRAL",
            TradeSignal::Sell => "SELL",
            TradeSignal::StrongSell => "STRONG_SELL",
        };
        f.write_str(s)
    }
}
