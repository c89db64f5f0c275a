//! Technical indicators.
//!
//! Every series indicator implements [`Indicator`]: candle window in, a
//! numeric series of the same length out, with `f64::NAN` during warmup.
//! The [`engine`] module folds the latest values into an [`IndicatorSet`]
//! and applies the neutral fallbacks when a window is too short.
//!
//! Multi-line indicators (Bollinger, MACD, Stochastic, ADX) return one
//! struct holding every line's latest value instead of implementing the
//! single-series trait.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cache;
pub mod ema;
pub mod engine;
pub mod levels;
pub mod macd;
pub mod obv;
pub mod roc;
pub mod rsi;
pub mod stochastic;

pub use adx::{directional_index, wilder_smooth, DirectionalIndex};
pub use atr::{average_true_range, mean_true_range, true_range, Atr};
pub use bollinger::{bollinger_bands, BollingerBands};
pub use cache::{CacheKey, IndicatorCache, WindowFingerprint};
pub use ema::{ema_of_series, Ema};
pub use engine::{volatility_ratio, IndicatorEngine, IndicatorSet};
pub use levels::{support_resistance, swing_points, PriceLevels};
pub use macd::{Macd, MacdValues};
pub use obv::Obv;
pub use roc::{pct_change, period_return, Roc};
pub use rsi::{rsi_value, Rsi, NEUTRAL_RSI};
pub use stochastic::{Stochastic, StochasticValues};

use crate::domain::Candle;

/// Trait for series indicators.
///
/// # Look-ahead contamination guard
/// No indicator value at index t may depend on candles after t. Every
/// indicator must give the same value at t on a truncated window as on the
/// full window.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the entire window.
    ///
    /// Returns a `Vec<f64>` of the same length as `candles`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;

    /// Last non-NaN value, if the window is long enough to produce one.
    fn latest(&self, candles: &[Candle]) -> Option<f64> {
        self.compute(candles)
            .last()
            .copied()
            .filter(|v| !v.is_nan())
    }
}

/// Extract close prices from a window.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Create synthetic candles from close prices for testing.
///
/// Generates plausible OHLCV: open = prev_close (or close for the first
/// candle), high = max(open,close) + 1.0, low = min(open,close) - 1.0,
/// volume = 1000, one hour apart.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc
        .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Create candles from explicit (open, high, low, close) tuples for testing.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc
        .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
        .unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            timestamp: base + chrono::Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
