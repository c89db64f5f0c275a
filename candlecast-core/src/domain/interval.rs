//! Candle intervals and multi-timeframe weighting.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Candle;

/// Fixed candle bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown interval '{0}' (expected one of 1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w)")]
pub struct ParseIntervalError(pub String);

impl Interval {
    pub const ALL: [Interval; 8] = [
        Interval::M1,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H4,
        Interval::D1,
        Interval::W1,
    ];

    pub fn seconds(self) -> i64 {
        match self {
            Interval::M1 => 60,
            Interval::M5 => 300,
            Interval::M15 => 900,
            Interval::M30 => 1_800,
            Interval::H1 => 3_600,
            Interval::H4 => 14_400,
            Interval::D1 => 86_400,
            Interval::W1 => 604_800,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::seconds(self.seconds())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
        }
    }

    /// Vote weight of this timeframe in multi-timeframe alignment.
    /// Slower timeframes carry more weight.
    pub fn alignment_weight(self) -> f64 {
        match self {
            Interval::M1 => 0.5,
            Interval::M5 => 0.7,
            Interval::M15 => 0.8,
            Interval::M30 => 0.9,
            Interval::H1 => 1.0,
            Interval::H4 => 1.2,
            Interval::D1 => 1.5,
            Interval::W1 => 1.5,
        }
    }

    /// Exact match on bucket length in seconds.
    pub fn from_seconds(secs: i64) -> Option<Interval> {
        Interval::ALL.into_iter().find(|i| i.seconds() == secs)
    }

    /// Infer the interval from the median spacing of a window.
    ///
    /// Returns `None` for windows shorter than 2 candles or spacings that do
    /// not match a known interval.
    pub fn infer(candles: &[Candle]) -> Option<Interval> {
        median_spacing_secs(candles).and_then(Interval::from_seconds)
    }
}

/// Median gap between consecutive candle timestamps, in seconds.
pub fn median_spacing_secs(candles: &[Candle]) -> Option<i64> {
    if candles.len() < 2 {
        return None;
    }
    let mut gaps: Vec<i64> = candles
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
        .filter(|g| *g > 0)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_unstable();
    Some(gaps[gaps.len() / 2])
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseIntervalError(s.to_string()))
    }
}
