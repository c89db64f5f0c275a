//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses population stddev (divide by N). Only the latest bands are
//! computed; below `period` candles they collapse to the last close.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

/// Mean and population stddev of a slice; `None` if any value is NaN.
fn mean_stddev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Latest upper/middle/lower band values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    /// All three bands at one price.
    pub fn collapsed(price: f64) -> Self {
        Self {
            upper: price,
            middle: price,
            lower: price,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Position of `price` within the bands: 0 at the lower band, 1 at the
    /// upper band. 0.5 when the bands have zero width.
    pub fn percent_b(&self, price: f64) -> f64 {
        let width = self.width();
        if width <= 0.0 {
            0.5
        } else {
            (price - self.lower) / width
        }
    }
}

/// Latest bands over the trailing `period` closes.
///
/// Below `period` candles (or on NaN input) the bands collapse to the last
/// close.
pub fn bollinger_bands(candles: &[Candle], period: usize, multiplier: f64) -> BollingerBands {
    let Some(last) = candles.last() else {
        return BollingerBands::collapsed(0.0);
    };
    let period = period.max(1);
    if candles.len() < period {
        return BollingerBands::collapsed(last.close);
    }
    let closes: Vec<f64> = candles[candles.len() - period..]
        .iter()
        .map(|c| c.close)
        .collect();
    match mean_stddev(&closes) {
        Some((mean, stddev)) => BollingerBands {
            upper: mean + multiplier * stddev,
            middle: mean,
            lower: mean - multiplier * stddev,
        },
        None => BollingerBands::collapsed(last.close),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn middle_is_sma_of_trailing_period() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let bands = bollinger_bands(&candles, 3, 2.0);
        assert_approx(bands.middle, 13.0, DEFAULT_EPSILON);
        assert_approx(bands.middle - bands.lower, bands.upper - bands.middle, DEFAULT_EPSILON);
    }

    #[test]
    fn population_stddev_is_used() {
        // closes 2, 4, 4, 4, 5, 5, 7, 9 → mean 5, population stddev 2
        let candles = make_candles(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let bands = bollinger_bands(&candles, 8, 2.0);
        assert_approx(bands.middle, 5.0, DEFAULT_EPSILON);
        assert_approx(bands.upper, 9.0, DEFAULT_EPSILON);
        assert_approx(bands.lower, 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_price_collapses() {
        let candles = make_candles(&[100.0; 25]);
        assert_eq!(
            bollinger_bands(&candles, 20, 2.0),
            BollingerBands::collapsed(100.0)
        );
    }

    #[test]
    fn short_window_collapses_to_last_close() {
        let candles = make_candles(&[10.0, 11.0, 12.5]);
        assert_eq!(
            bollinger_bands(&candles, 20, 2.0),
            BollingerBands::collapsed(12.5)
        );
    }

    #[test]
    fn percent_b_positions() {
        let bands = BollingerBands {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };
        assert_approx(bands.percent_b(90.0), 0.0, DEFAULT_EPSILON);
        assert_approx(bands.percent_b(105.0), 0.75, DEFAULT_EPSILON);
        assert_approx(BollingerBands::collapsed(5.0).percent_b(5.0), 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_close_collapses() {
        let mut candles = make_candles(&[10.0, 11.0, 12.0, 13.0]);
        candles[2].close = f64::NAN;
        assert_eq!(
            bollinger_bands(&candles, 3, 2.0),
            BollingerBands::collapsed(13.0)
        );
    }
}
