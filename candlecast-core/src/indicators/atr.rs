//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR is the simple mean of the last `period` true ranges. The first
//! candle has no previous close and contributes no true range.
//!
//! Two fallback policies share [`mean_true_range`]:
//!
//! | entry point            | short window                          | used by                     |
//! |------------------------|---------------------------------------|-----------------------------|
//! | [`Atr`]                | NaN until `period` true ranges exist  | `IndicatorSet::atr` (then 0) |
//! | [`average_true_range`] | mean of whatever true ranges exist    | regime, anomaly, volatility |

use crate::domain::Candle;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series.
///
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let n = candles.len();
    let mut tr = vec![f64::NAN; n];

    if n == 0 {
        return tr;
    }

    let first = &candles[0];
    if !(first.high.is_nan() || first.low.is_nan()) {
        tr[0] = first.high - first.low;
    }

    for i in 1..n {
        let h = candles[i].high;
        let l = candles[i].low;
        let pc = candles[i - 1].close;
        if h.is_nan() || l.is_nan() || pc.is_nan() {
            tr[i] = f64::NAN;
        } else {
            tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
        }
    }

    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let tr = true_range(candles);
        for (i, slot) in result.iter_mut().enumerate().skip(self.period) {
            if let Some(mean) = mean_true_range(&tr[(i + 1 - self.period)..=i]) {
                *slot = mean;
            }
        }
        result
    }
}

/// Simple mean of a run of true ranges; `None` when empty or any is NaN.
pub fn mean_true_range(ranges: &[f64]) -> Option<f64> {
    if ranges.is_empty() || ranges.iter().any(|v| v.is_nan()) {
        return None;
    }
    Some(ranges.iter().sum::<f64>() / ranges.len() as f64)
}

/// Mean of the last `period` true ranges, averaging over whatever is
/// available when the window holds fewer than `period` of them.
///
/// Returns 0.0 for windows with fewer than 2 candles or a NaN among the
/// ranges used. The regime and anomaly stages compare short and long ATRs on
/// windows that may not fully cover the long period.
pub fn average_true_range(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < 2 || period == 0 {
        return 0.0;
    }
    let tr = true_range(candles);
    let available = &tr[1..];
    let take = period.min(available.len());
    mean_true_range(&available[available.len() - take..]).unwrap_or(0.0)
}
