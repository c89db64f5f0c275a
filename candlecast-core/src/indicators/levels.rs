//! Support and resistance levels from swing extrema.
//!
//! A swing high (low) is a candle whose high (low) is strictly above (below)
//! the two candles on each side. Swing prices are clustered into buckets of
//! 0.5% of the current price; each cluster scores its touch count plus a
//! recency bonus (index of its latest touch / window length). The five best
//! clusters on each side of the price are kept, then the three nearest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

/// Candles on each side a swing point must dominate.
const SWING_SPAN: usize = 2;
/// Cluster width as a fraction of the current price.
const CLUSTER_TOLERANCE: f64 = 0.005;
const CANDIDATES_PER_SIDE: usize = 5;
const LEVELS_PER_SIDE: usize = 3;

/// Nearest support levels (below price, nearest first) and resistance
/// levels (above price, nearest first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

impl PriceLevels {
    pub fn nearest_support(&self) -> Option<f64> {
        self.support.first().copied()
    }

    pub fn nearest_resistance(&self) -> Option<f64> {
        self.resistance.first().copied()
    }
}

#[derive(Debug, Default)]
struct Cluster {
    sum: f64,
    touches: usize,
    last_index: usize,
}

impl Cluster {
    fn level(&self) -> f64 {
        self.sum / self.touches as f64
    }
}

/// Indices whose value strictly dominates `strength` neighbors on each side.
///
/// `highs` selects swing highs, otherwise swing lows. NaN never qualifies and
/// never lets a neighbor qualify. Shared by the level finder, the divergence
/// detector and the double top/bottom patterns.
pub fn swing_points(values: &[f64], strength: usize, highs: bool) -> Vec<usize> {
    let n = values.len();
    if strength == 0 || n < 2 * strength + 1 {
        return Vec::new();
    }
    (strength..n - strength)
        .filter(|&i| {
            let v = values[i];
            !v.is_nan()
                && (i - strength..=i + strength).filter(|&j| j != i).all(|j| {
                    let o = values[j];
                    !o.is_nan() && if highs { v > o } else { v < o }
                })
        })
        .collect()
}

/// Swing highs and lows of a window as (index, price).
fn swing_prices(candles: &[Candle]) -> Vec<(usize, f64)> {
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    swing_points(&highs, SWING_SPAN, true)
        .into_iter()
        .map(|i| (i, highs[i]))
        .chain(swing_points(&lows, SWING_SPAN, false).into_iter().map(|i| (i, lows[i])))
        .collect()
}

/// Support and resistance around the last close of the window.
pub fn support_resistance(candles: &[Candle]) -> PriceLevels {
    let Some(last) = candles.last() else {
        return PriceLevels::default();
    };
    let price = last.close;
    let tolerance = price * CLUSTER_TOLERANCE;
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return PriceLevels::default();
    }

    let mut clusters: BTreeMap<i64, Cluster> = BTreeMap::new();
    for (idx, level) in swing_prices(candles) {
        let bucket = (level / tolerance).round() as i64;
        let cluster = clusters.entry(bucket).or_default();
        cluster.sum += level;
        cluster.touches += 1;
        cluster.last_index = cluster.last_index.max(idx);
    }

    let n = candles.len() as f64;
    let mut below = Vec::new();
    let mut above = Vec::new();
    for cluster in clusters.values() {
        let level = cluster.level();
        let score = cluster.touches as f64 + cluster.last_index as f64 / n;
        if level < price {
            below.push((level, score));
        } else if level > price {
            above.push((level, score));
        }
    }

    PriceLevels {
        support: nearest(below, price),
        resistance: nearest(above, price),
    }
}

fn nearest(mut candidates: Vec<(f64, f64)>, price: f64) -> Vec<f64> {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    candidates.truncate(CANDIDATES_PER_SIDE);
    candidates.sort_by(|a, b| (a.0 - price).abs().total_cmp(&(b.0 - price).abs()));
    candidates
        .into_iter()
        .take(LEVELS_PER_SIDE)
        .map(|(level, _)| level)
        .collect()
}
