//! Candle: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle for a single fixed time bucket.
///
/// Windows are ordered ascending by `timestamp` and never mutated once
/// ingested; every analysis stage borrows them as `&[Candle]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Absolute size of the real body.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// High-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Midpoint of the real body.
    pub fn body_midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }
}

/// True if timestamps are strictly ascending.
pub fn is_ascending(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

/// Merge a contiguous run of candles into one coarser candle.
///
/// Returns `None` for an empty slice.
pub fn aggregate(chunk: &[Candle]) -> Option<Candle> {
    let first = chunk.first()?;
    let last = chunk.last()?;
    let high = chunk.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = chunk.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let volume = chunk.iter().map(|c| c.volume).sum();
    Some(Candle {
        timestamp: last.timestamp,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    })
}

/// Aggregate a window into buckets of `factor` candles.
///
/// Buckets are cut from the newest candle backwards so the final bucket
/// always ends on the window's last candle. A leading partial bucket is
/// dropped. `factor <= 1` returns the window unchanged.
pub fn resample(candles: &[Candle], factor: usize) -> Vec<Candle> {
    if factor <= 1 {
        return candles.to_vec();
    }
    let skip = candles.len() % factor;
    candles[skip..]
        .chunks(factor)
        .filter_map(aggregate)
        .collect()
}
