//! Price/oscillator divergence.
//!
//! The two most recent price swing lows (highs) are paired with the
//! oscillator swing lows (highs) nearest to them by index.
//!
//! | price extreme | oscillator extreme | result              |
//! |---------------|--------------------|---------------------|
//! | lower low     | higher low         | regular bullish     |
//! | higher low    | lower low          | hidden bullish      |
//! | higher high   | lower high         | regular bearish     |
//! | lower high    | higher high        | hidden bearish      |
//!
//! Strength is `|price ratio - oscillator ratio|` across the two swings,
//! clamped to [0, 1].

use serde::{Deserialize, Serialize};

use crate::domain::{Bias, Candle};
use crate::indicators::{swing_points, Indicator, Rsi};

/// Candles on each side a swing point must dominate.
pub const DEFAULT_SWING_STRENGTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergenceKind {
    /// Reversal signal.
    Regular,
    /// Continuation signal.
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub kind: DivergenceKind,
    pub bias: Bias,
    pub oscillator: String,
    pub strength: f64,
    /// Older then newer price swing.
    pub price_indices: [usize; 2],
    pub oscillator_indices: [usize; 2],
}

impl Divergence {
    pub fn describe(&self) -> String {
        let kind = match self.kind {
            DivergenceKind::Regular => "regular",
            DivergenceKind::Hidden => "hidden",
        };
        let side = match self.bias {
            Bias::Bullish => "bullish",
            Bias::Bearish => "bearish",
            Bias::Neutral => "neutral",
        };
        format!("{kind} {side} {} divergence", self.oscillator)
    }
}

fn nearest(candidates: &[usize], target: usize) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .min_by_key(|&c| (c as i64 - target as i64).unsigned_abs())
}

fn ratio(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 || !from.is_finite() || !to.is_finite() {
        None
    } else {
        Some((to - from) / from)
    }
}

/// Classify one side given swing points already found.
fn pair_side(
    price: &[f64],
    oscillator: &[f64],
    price_swings: &[usize],
    osc_swings: &[usize],
    bias: Bias,
    name: &str,
) -> Option<Divergence> {
    let [.., p1, p2] = price_swings[..] else {
        return None;
    };
    let o1 = nearest(osc_swings, p1)?;
    let o2 = nearest(osc_swings, p2)?;
    if o1 >= o2 {
        return None;
    }
    let (pa, pb) = (price[p1], price[p2]);
    let (oa, ob) = (oscillator[o1], oscillator[o2]);

    let lows = bias == Bias::Bullish;
    let price_extends = if lows { pb < pa } else { pb > pa };
    let price_retreats = if lows { pb > pa } else { pb < pa };
    let osc_extends = if lows { ob < oa } else { ob > oa };
    let osc_retreats = if lows { ob > oa } else { ob < oa };

    let kind = if price_extends && osc_retreats {
        DivergenceKind::Regular
    } else if price_retreats && osc_extends {
        DivergenceKind::Hidden
    } else {
        return None;
    };
    let strength = (ratio(pa, pb)? - ratio(oa, ob)?).abs().clamp(0.0, 1.0);
    Some(Divergence {
        kind,
        bias,
        oscillator: name.to_string(),
        strength,
        price_indices: [p1, p2],
        oscillator_indices: [o1, o2],
    })
}

/// Divergences between price lows/highs and an oscillator series of the
/// same length.
pub fn find_divergences(
    lows: &[f64],
    highs: &[f64],
    oscillator: &[f64],
    strength: usize,
    name: &str,
) -> Vec<Divergence> {
    let mut found = Vec::new();
    if lows.len() != oscillator.len() || highs.len() != oscillator.len() {
        return found;
    }
    let bullish = pair_side(
        lows,
        oscillator,
        &swing_points(lows, strength, false),
        &swing_points(oscillator, strength, false),
        Bias::Bullish,
        name,
    );
    let bearish = pair_side(
        highs,
        oscillator,
        &swing_points(highs, strength, true),
        &swing_points(oscillator, strength, true),
        Bias::Bearish,
        name,
    );
    found.extend(bullish);
    found.extend(bearish);
    found
}

/// RSI divergences over a candle window.
pub fn rsi_divergences(window: &[Candle], rsi_period: usize, strength: usize) -> Vec<Divergence> {
    let rsi = Rsi::new(rsi_period.max(1)).compute(window);
    let lows: Vec<f64> = window.iter().map(|c| c.low).collect();
    let highs: Vec<f64> = window.iter().map(|c| c.high).collect();
    find_divergences(&lows, &highs, &rsi, strength, "RSI")
}
