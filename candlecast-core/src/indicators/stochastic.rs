//! Stochastic oscillator.
//!
//! %K[t] = 100 * (close[t] - lowest_low) / (highest_high - lowest_low) over
//! the last `k_period` candles, 50 when the range is zero.
//! %D = simple mean of the last `d_period` %K values.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
}

/// Latest %K and %D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticValues {
    pub k: f64,
    pub d: f64,
}

impl Default for StochasticValues {
    fn default() -> Self {
        Self { k: 50.0, d: 50.0 }
    }
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize) -> Self {
        assert!(k_period >= 1 && d_period >= 1, "Stochastic periods must be >= 1");
        Self { k_period, d_period }
    }

    fn k_series(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut k = vec![f64::NAN; n];
        if n < self.k_period {
            return k;
        }
        for (i, slot) in k.iter_mut().enumerate().skip(self.k_period - 1) {
            let window = &candles[(i + 1 - self.k_period)..=i];
            if window.iter().any(|c| c.is_void()) {
                continue;
            }
            let hh = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            let ll = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let range = hh - ll;
            *slot = if range == 0.0 {
                50.0
            } else {
                100.0 * (candles[i].close - ll) / range
            };
        }
        k
    }

    /// Latest %K and %D; 50/50 below `k_period` candles.
    ///
    /// %D averages whatever %K values exist when fewer than `d_period` do.
    pub fn values(&self, candles: &[Candle]) -> StochasticValues {
        let k = self.k_series(candles);
        let valid: Vec<f64> = k.iter().copied().filter(|v| !v.is_nan()).collect();
        let Some(&latest) = valid.last() else {
            return StochasticValues::default();
        };
        let take = self.d_period.min(valid.len());
        let d = valid[valid.len() - take..].iter().sum::<f64>() / take as f64;
        StochasticValues { k: latest, d }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, make_ohlc_candles, DEFAULT_EPSILON};

    #[test]
    fn k_at_top_of_range() {
        let candles = make_ohlc_candles(&[
            (10.0, 12.0, 8.0, 11.0),
            (11.0, 13.0, 9.0, 12.0),
            (12.0, 14.0, 10.0, 14.0),
        ]);
        let k = Stochastic::new(3, 1).k_series(&candles);
        // (14 - 8) / (14 - 8)
        assert_approx(k[2], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn k_mid_range() {
        let candles = make_ohlc_candles(&[
            (10.0, 20.0, 10.0, 15.0),
            (15.0, 20.0, 10.0, 15.0),
        ]);
        assert_approx(Stochastic::new(2, 1).k_series(&candles)[1], 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_range_is_fifty() {
        let candles = make_ohlc_candles(&[(10.0, 10.0, 10.0, 10.0); 5]);
        let v = Stochastic::new(3, 3).values(&candles);
        assert_eq!(v, StochasticValues { k: 50.0, d: 50.0 });
    }

    #[test]
    fn d_is_mean_of_recent_k() {
        let closes: Vec<f64> = vec![10.0, 12.0, 11.0, 14.0, 13.0, 15.0, 12.0];
        let candles = make_candles(&closes);
        let stoch = Stochastic::new(3, 3);
        let k = stoch.k_series(&candles);
        let v = stoch.values(&candles);
        assert_approx(v.k, k[6], DEFAULT_EPSILON);
        assert_approx(v.d, (k[4] + k[5] + k[6]) / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn short_window_is_neutral() {
        let candles = make_candles(&[10.0, 11.0]);
        assert_eq!(Stochastic::new(14, 3).values(&candles), StochasticValues::default());
    }

    #[test]
    fn values_stay_in_bounds() {
        let candles = make_candles(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        for v in Stochastic::new(3, 2).k_series(&candles) {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v));
            }
        }
    }
}
