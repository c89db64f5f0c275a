//! Rate of Change (ROC).
//!
//! Percentage price change over N candles.
//! ROC[t] = (close[t] - close[t-period]) / close[t-period] * 100
//! Lookback: period.

use crate::domain::Candle;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    name: String,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ROC period must be >= 1");
        Self {
            period,
            name: format!("roc_{period}"),
        }
    }
}

impl Indicator for Roc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        for i in self.period..n {
            let prev = candles[i - self.period].close;
            let curr = candles[i].close;
            if !(prev.is_nan() || curr.is_nan() || prev == 0.0) {
                result[i] = (curr - prev) / prev * 100.0;
            }
        }
        result
    }
}

/// Percent change from `from` to `to`; 0.0 when `from` is zero or either
/// side is not finite.
pub fn pct_change(from: f64, to: f64) -> f64 {
    if from == 0.0 || !from.is_finite() || !to.is_finite() {
        0.0
    } else {
        (to - from) / from * 100.0
    }
}

/// Percent change of the close over the last `period` candles, 0.0 when the
/// window is not long enough.
pub fn period_return(candles: &[Candle], period: usize) -> f64 {
    let n = candles.len();
    if period == 0 || n <= period {
        return 0.0;
    }
    pct_change(candles[n - 1 - period].close, candles[n - 1].close)
}
