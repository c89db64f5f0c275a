//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and average losses: the first value is
//! seeded from the mean of the first `period` deltas, then
//! `avg = (avg * (period - 1) + delta) / period`.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: both averages zero (flat tape) → 50; avg_loss == 0 → 100;
//! avg_gain == 0 → 0.

use crate::domain::Candle;
use crate::indicators::Indicator;

/// Value reported when the window is too short or the tape is flat.
pub const NEUTRAL_RSI: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
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

        // Compute price changes
        let mut changes = vec![f64::NAN; n];
        for i in 1..n {
            let curr = candles[i].close;
            let prev = candles[i - 1].close;
            if curr.is_nan() || prev.is_nan() {
                changes[i] = f64::NAN;
            } else {
                changes[i] = curr - prev;
            }
        }

        // Seed: average gain and average loss over first `period` changes
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for &ch in &changes[1..=self.period] {
            if ch.is_nan() {
                return result;
            }
            if ch > 0.0 {
                avg_gain += ch;
            } else {
                avg_loss -= ch;
            }
        }
        avg_gain /= self.period as f64;
        avg_loss /= self.period as f64;

        result[self.period] = compute_rsi(avg_gain, avg_loss);

        let p = self.period as f64;
        for i in (self.period + 1)..n {
            if changes[i].is_nan() {
                for val in result.iter_mut().skip(i) {
                    *val = f64::NAN;
                }
                return result;
            }

            let gain = changes[i].max(0.0);
            let loss = (-changes[i]).max(0.0);

            avg_gain = (avg_gain * (p - 1.0) + gain) / p;
            avg_loss = (avg_loss * (p - 1.0) + loss) / p;

            result[i] = compute_rsi(avg_gain, avg_loss);
        }

        result
    }
}

/// Latest RSI of the window, or [`NEUTRAL_RSI`] below `period + 1` candles.
pub fn rsi_value(candles: &[Candle], period: usize) -> f64 {
    Rsi::new(period.max(1))
        .latest(candles)
        .unwrap_or(NEUTRAL_RSI)
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        NEUTRAL_RSI // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles};

    #[test]
    fn rsi_all_gains() {
        let candles = make_candles(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let result = Rsi::new(3).compute(&candles);
        assert_approx(result[3], 100.0, 1e-6);
        assert_approx(result[5], 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let candles = make_candles(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let result = Rsi::new(3).compute(&candles);
        assert_approx(result[3], 0.0, 1e-6);
    }

    #[test]
    fn rsi_mixed_seed_value() {
        // Changes: +0.34, -0.25, -0.48
        // avg_gain = 0.34/3, avg_loss = 0.73/3
        // RSI[3] = 100 - 100/(1 + 0.34/0.73) = 31.7757...
        let candles = make_candles(&[44.0, 44.34, 44.09, 43.61, 44.33]);
        let result = Rsi::new(3).compute(&candles);

        assert!(result[0].is_nan());
        assert!(result[2].is_nan());
        assert_approx(result[3], 100.0 - 100.0 / (1.0 + 0.34 / 0.73), 1e-9);
    }

    #[test]
    fn rsi_wilder_step() {
        // Seed over +1, -1 → avg_gain 0.5, avg_loss 0.5 (period 2)
        // Next delta +2: avg_gain = (0.5 + 2)/2 = 1.25, avg_loss = 0.25
        // RSI = 100 - 100/(1 + 5) = 83.333...
        let candles = make_candles(&[10.0, 11.0, 10.0, 12.0]);
        let result = Rsi::new(2).compute(&candles);
        assert_approx(result[2], 50.0, 1e-9);
        assert_approx(result[3], 100.0 - 100.0 / 6.0, 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let candles = make_candles(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        let result = Rsi::new(3).compute(&candles);
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "RSI out of bounds at {i}: {v}");
            }
        }
    }

    #[test]
    fn rsi_short_window_is_neutral() {
        let candles = make_candles(&[100.0, 101.0, 102.0]);
        assert_eq!(rsi_value(&candles, 14), NEUTRAL_RSI);
    }

    #[test]
    fn rsi_flat_tape_is_neutral() {
        let candles = make_candles(&[100.0; 20]);
        assert_eq!(rsi_value(&candles, 14), NEUTRAL_RSI);
    }

    #[test]
    fn rsi_nan_propagation() {
        let mut candles = make_candles(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        candles[2].close = f64::NAN;
        let result = Rsi::new(3).compute(&candles);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_lookback() {
        assert_eq!(Rsi::new(14).lookback(), 14);
    }
}
