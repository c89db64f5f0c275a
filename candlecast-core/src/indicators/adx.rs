//! ADX: Average Directional Index (Wilder).
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive candles
//! 2. Smooth +DM, -DM, and TR using Wilder smoothing (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR)
//! 4. -DI = 100 * smoothed(-DM) / smoothed(TR)
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 6. ADX = Wilder-smoothed DX
//!
//! The DI lines are valid from index `period`, ADX from `2 * period - 1`,
//! so a window needs `2 * period` candles before [`directional_index`]
//! reports anything other than zeros.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;
use crate::indicators::atr::true_range;

/// Latest ADX, +DI and -DI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionalIndex {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

struct DirectionalSeries {
    adx: Vec<f64>,
    plus_di: Vec<f64>,
    minus_di: Vec<f64>,
}

/// Wilder smoothing: seed with the mean of the first `period` valid values,
/// then `s[t] = (s[t-1] * (period - 1) + x[t]) / period`.
///
/// Leading NaNs are skipped when looking for the seed; a NaN after the seed
/// taints every later value.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }

    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    if n - start < period {
        return result;
    }

    let seed_window = &values[start..start + period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    let seed_idx = start + period - 1;
    result[seed_idx] = prev;

    let p = period as f64;
    for i in (seed_idx + 1)..n {
        if values[i].is_nan() {
            break;
        }
        prev = (prev * (p - 1.0) + values[i]) / p;
        result[i] = prev;
    }
    result
}

fn directional_series(candles: &[Candle], period: usize) -> DirectionalSeries {
    let n = candles.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        if up.is_nan() || down.is_nan() {
            continue;
        }
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    // TR[0] has no previous close; keep it out of the smoothing seed.
    let mut tr = true_range(candles);
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }

    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut plus_di = vec![f64::NAN; n];
    let mut minus_di = vec![f64::NAN; n];
    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if smooth_tr[i].is_nan() || smooth_plus[i].is_nan() || smooth_minus[i].is_nan() {
            continue;
        }
        if smooth_tr[i] == 0.0 {
            plus_di[i] = 0.0;
            minus_di[i] = 0.0;
            dx[i] = 0.0;
            continue;
        }
        let pdi = 100.0 * smooth_plus[i] / smooth_tr[i];
        let mdi = 100.0 * smooth_minus[i] / smooth_tr[i];
        plus_di[i] = pdi;
        minus_di[i] = mdi;
        let sum = pdi + mdi;
        dx[i] = if sum == 0.0 {
            0.0
        } else {
            100.0 * (pdi - mdi).abs() / sum
        };
    }

    DirectionalSeries {
        adx: wilder_smooth(&dx, period),
        plus_di,
        minus_di,
    }
}

/// Latest directional values, or all zeros below `2 * period` candles.
pub fn directional_index(candles: &[Candle], period: usize) -> DirectionalIndex {
    let period = period.max(1);
    if candles.len() < 2 * period {
        return DirectionalIndex::default();
    }
    let series = directional_series(candles, period);
    let last = |v: &[f64]| v.last().copied().filter(|x| !x.is_nan()).unwrap_or(0.0);
    DirectionalIndex {
        adx: last(&series.adx),
        plus_di: last(&series.plus_di),
        minus_di: last(&series.minus_di),
    }
}
