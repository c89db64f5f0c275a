//! MACD: Moving Average Convergence Divergence.
//!
//! - Line: EMA(close, fast) - EMA(close, slow)
//! - Signal: EMA(line history, signal)
//! - Histogram: line - signal
//!
//! The signal EMA runs over the line history only (starting where the slow
//! EMA is seeded), so the value at t equals a recomputation over the prefix
//! ending at t. The line is valid from index slow - 1, the signal from
//! slow + signal - 2.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;
use crate::indicators::closes;
use crate::indicators::ema::ema_of_series;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

/// Latest MACD line, signal and histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdValues {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

struct MacdSeries {
    line: Vec<f64>,
    signal: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be shorter than slow");
        Self { fast, slow, signal }
    }

    fn series(&self, candles: &[Candle]) -> MacdSeries {
        let n = candles.len();
        let c = closes(candles);
        let fast = ema_of_series(&c, self.fast);
        let slow = ema_of_series(&c, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

        let mut signal = vec![f64::NAN; n];
        if n >= self.slow {
            let start = self.slow - 1;
            let smoothed = ema_of_series(&line[start..], self.signal);
            signal[start..].copy_from_slice(&smoothed);
        }
        MacdSeries { line, signal }
    }

    /// Latest values with neutral fallbacks.
    ///
    /// Below `slow` candles everything is zero. When the line history is
    /// shorter than the signal period the signal is the mean of the
    /// history available.
    pub fn values(&self, candles: &[Candle]) -> MacdValues {
        if candles.len() < self.slow {
            return MacdValues::default();
        }
        let series = self.series(candles);
        let Some(&line) = series.line.last().filter(|v| !v.is_nan()) else {
            return MacdValues::default();
        };
        let signal = match series.signal.last().copied().filter(|v| !v.is_nan()) {
            Some(s) => s,
            None => {
                let history: Vec<f64> = series
                    .line
                    .iter()
                    .copied()
                    .filter(|v| !v.is_nan())
                    .collect();
                history.iter().sum::<f64>() / history.len() as f64
            }
        };
        MacdValues {
            line,
            signal,
            histogram: line - signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 5.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn line_is_fast_minus_slow() {
        let candles = make_candles(&wave(40));
        let c = closes(&candles);
        let fast = ema_of_series(&c, 3);
        let slow = ema_of_series(&c, 6);
        let line = Macd::new(3, 6, 4).series(&candles).line;
        assert!(line[4].is_nan());
        for i in 5..40 {
            assert_approx(line[i], fast[i] - slow[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn signal_matches_recomputation_on_every_prefix() {
        let candles = make_candles(&wave(50));
        let macd = Macd::new(5, 10, 4);
        let full = macd.series(&candles).signal;
        for end in 13..=50 {
            let prefix = macd.series(&candles[..end]).signal;
            assert_approx(prefix[end - 1], full[end - 1], 1e-9);
        }
    }

    #[test]
    fn histogram_is_line_minus_signal() {
        let candles = make_candles(&wave(60));
        let v = Macd::new(12, 26, 9).values(&candles);
        assert_approx(v.histogram, v.line - v.signal, DEFAULT_EPSILON);
    }

    #[test]
    fn short_window_is_zero() {
        let candles = make_candles(&wave(20));
        assert_eq!(Macd::new(12, 26, 9).values(&candles), MacdValues::default());
    }

    #[test]
    fn short_history_signal_is_mean_of_line() {
        // 28 candles → 3 line values, fewer than the signal period of 9
        let candles = make_candles(&wave(28));
        let macd = Macd::new(12, 26, 9);
        let line = macd.series(&candles).line;
        let mean = (line[25] + line[26] + line[27]) / 3.0;
        let v = macd.values(&candles);
        assert_approx(v.signal, mean, 1e-9);
    }

    #[test]
    fn rising_tape_has_positive_line() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let v = Macd::new(12, 26, 9).values(&make_candles(&closes));
        assert!(v.line > 0.0);
    }
}
