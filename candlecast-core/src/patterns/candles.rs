//! Candle pattern recognition on the tail of a window.
//!
//! Every test is a fixed geometric ratio measured against the window's
//! average body size, so the same shapes are found at any price scale.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Bias, Candle};
use crate::indicators::{period_return, swing_points};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    ShootingStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
    Doji,
    BullishMomentum,
    BearishMomentum,
    MorningStar,
    EveningStar,
    DoubleTop,
    DoubleBottom,
}

impl PatternKind {
    pub fn bias(self) -> Bias {
        use PatternKind::*;
        match self {
            BullishEngulfing | Hammer | ThreeWhiteSoldiers | BullishMomentum | MorningStar
            | DoubleBottom => Bias::Bullish,
            BearishEngulfing | ShootingStar | ThreeBlackCrows | BearishMomentum | EveningStar
            | DoubleTop => Bias::Bearish,
            Doji => Bias::Neutral,
        }
    }

    /// Scorer weight of a hit.
    pub fn weight(self) -> f64 {
        use PatternKind::*;
        match self {
            MorningStar | EveningStar => 2.0,
            ThreeWhiteSoldiers | ThreeBlackCrows => 1.8,
            DoubleTop | DoubleBottom => 1.6,
            BullishEngulfing | BearishEngulfing => 1.5,
            BullishMomentum | BearishMomentum => 1.3,
            Hammer | ShootingStar | Doji => 1.2,
        }
    }

    pub fn label(self) -> &'static str {
        use PatternKind::*;
        match self {
            BullishEngulfing => "BULLISH_ENGULFING",
            BearishEngulfing => "BEARISH_ENGULFING",
            Hammer => "HAMMER",
            ShootingStar => "SHOOTING_STAR",
            ThreeWhiteSoldiers => "THREE_WHITE_SOLDIERS",
            ThreeBlackCrows => "THREE_BLACK_CROWS",
            Doji => "DOJI",
            BullishMomentum => "BULLISH_MOMENTUM",
            BearishMomentum => "BEARISH_MOMENTUM",
            MorningStar => "MORNING_STAR",
            EveningStar => "EVENING_STAR",
            DoubleTop => "DOUBLE_TOP",
            DoubleBottom => "DOUBLE_BOTTOM",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One pattern hit: strength in [0, 1] and the window indices that formed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSignal {
    pub kind: PatternKind,
    pub strength: f64,
    pub indices: Vec<usize>,
}

impl PatternSignal {
    fn new(kind: PatternKind, strength: f64, indices: Vec<usize>) -> Self {
        Self {
            kind,
            strength: strength.clamp(0.0, 1.0),
            indices,
        }
    }

    pub fn bias(&self) -> Bias {
        self.kind.bias()
    }
}

/// Candles considered for the average body size.
const BODY_LOOKBACK: usize = 20;
/// Candles searched for double tops and bottoms.
const DOUBLE_LOOKBACK: usize = 20;
/// Peaks (troughs) within this fraction of each other form a double.
const DOUBLE_TOLERANCE: f64 = 0.01;

fn average_body(window: &[Candle]) -> f64 {
    let recent = &window[window.len().saturating_sub(BODY_LOOKBACK)..];
    if recent.is_empty() {
        return 0.0;
    }
    recent.iter().map(Candle::body).sum::<f64>() / recent.len() as f64
}

/// Every candle pattern present at the end of the window.
pub fn detect_patterns(window: &[Candle]) -> Vec<PatternSignal> {
    let mut hits = Vec::new();
    let n = window.len();
    if n < 3 {
        return hits;
    }
    hits.extend(double_top_bottom(window));

    let avg_body = average_body(window);
    if avg_body <= 0.0 {
        return hits;
    }
    hits.extend(engulfing(window, avg_body));
    hits.extend(hammer_or_star(window));
    hits.extend(three_in_a_row(window, avg_body));
    hits.extend(doji(window, avg_body));
    hits.extend(momentum(window, avg_body));
    hits.extend(star(window, avg_body));
    hits
}

fn engulfing(w: &[Candle], avg_body: f64) -> Option<PatternSignal> {
    let l = w.len() - 1;
    let (prev, last) = (&w[l - 1], &w[l]);
    let strength = (last.body() / (2.0 * avg_body)).min(1.0);
    if prev.is_bearish()
        && last.is_bullish()
        && last.open <= prev.close
        && last.close >= prev.open
        && last.body() > prev.body()
    {
        return Some(PatternSignal::new(PatternKind::BullishEngulfing, strength, vec![l - 1, l]));
    }
    if prev.is_bullish()
        && last.is_bearish()
        && last.open >= prev.close
        && last.close <= prev.open
        && last.body() > prev.body()
    {
        return Some(PatternSignal::new(PatternKind::BearishEngulfing, strength, vec![l - 1, l]));
    }
    None
}

/// Long lower (upper) shadow after a decline (advance).
fn hammer_or_star(w: &[Candle]) -> Option<PatternSignal> {
    let l = w.len() - 1;
    let c = &w[l];
    let range = c.range();
    let body = c.body();
    if range <= 0.0 || body <= 0.0 {
        return None;
    }
    let prior = period_return(&w[..l], 5.min(l.saturating_sub(1)).max(1));
    let lower = c.lower_shadow();
    let upper = c.upper_shadow();
    if lower >= 2.0 * body && upper <= 0.3 * range && prior < 0.0 {
        let strength = (lower / body / 4.0).min(1.0);
        return Some(PatternSignal::new(PatternKind::Hammer, strength, vec![l]));
    }
    if upper >= 2.0 * body && lower <= 0.3 * range && prior > 0.0 {
        let strength = (upper / body / 4.0).min(1.0);
        return Some(PatternSignal::new(PatternKind::ShootingStar, strength, vec![l]));
    }
    None
}

/// Three consecutive candles of one color, each closing beyond the last and
/// opening inside the previous body.
fn three_in_a_row(w: &[Candle], avg_body: f64) -> Option<PatternSignal> {
    let l = w.len() - 1;
    let run = &w[l - 2..=l];
    let solid = run.iter().all(|c| c.body() > 0.5 * avg_body);
    if !solid {
        return None;
    }
    let opens_inside = |prev: &Candle, c: &Candle| {
        let (lo, hi) = (prev.open.min(prev.close), prev.open.max(prev.close));
        c.open >= lo && c.open <= hi
    };
    let mean_body = run.iter().map(Candle::body).sum::<f64>() / 3.0;
    let strength = (mean_body / (1.5 * avg_body)).min(1.0);
    let indices = vec![l - 2, l - 1, l];

    let soldiers = run.iter().all(Candle::is_bullish)
        && run.windows(2).all(|p| p[1].close > p[0].close && opens_inside(&p[0], &p[1]));
    if soldiers {
        return Some(PatternSignal::new(PatternKind::ThreeWhiteSoldiers, strength, indices));
    }
    let crows = run.iter().all(Candle::is_bearish)
        && run.windows(2).all(|p| p[1].close < p[0].close && opens_inside(&p[0], &p[1]));
    if crows {
        return Some(PatternSignal::new(PatternKind::ThreeBlackCrows, strength, indices));
    }
    None
}

fn doji(w: &[Candle], avg_body: f64) -> Option<PatternSignal> {
    let l = w.len() - 1;
    let c = &w[l];
    let range = c.range();
    if range > 0.0 && c.body() <= 0.1 * range && range >= avg_body {
        let strength = 1.0 - c.body() / (0.1 * range);
        return Some(PatternSignal::new(PatternKind::Doji, strength, vec![l]));
    }
    None
}

/// Wide-body candle with little shadow.
fn momentum(w: &[Candle], avg_body: f64) -> Option<PatternSignal> {
    let l = w.len() - 1;
    let c = &w[l];
    let body = c.body();
    if body < 2.0 * avg_body || body < 0.7 * c.range() {
        return None;
    }
    let strength = (body / (4.0 * avg_body)).min(1.0);
    let kind = if c.is_bullish() {
        PatternKind::BullishMomentum
    } else {
        PatternKind::BearishMomentum
    };
    Some(PatternSignal::new(kind, strength, vec![l]))
}

/// Large candle, small indecision candle, large candle back through the
/// first one's midpoint.
fn star(w: &[Candle], avg_body: f64) -> Option<PatternSignal> {
    let l = w.len() - 1;
    let (first, middle, last) = (&w[l - 2], &w[l - 1], &w[l]);
    if first.body() < avg_body || middle.body() > 0.5 * avg_body || last.body() < 0.5 * avg_body {
        return None;
    }
    let strength = ((first.body() + last.body()) / (4.0 * avg_body)).min(1.0);
    let indices = vec![l - 2, l - 1, l];
    if first.is_bearish() && last.is_bullish() && last.close > first.body_midpoint() {
        return Some(PatternSignal::new(PatternKind::MorningStar, strength, indices));
    }
    if first.is_bullish() && last.is_bearish() && last.close < first.body_midpoint() {
        return Some(PatternSignal::new(PatternKind::EveningStar, strength, indices));
    }
    None
}

/// Two matching peaks (troughs) in the recent tail with a meaningful valley
/// (ridge) between them, and price already back past the midpoint.
fn double_top_bottom(w: &[Candle]) -> Option<PatternSignal> {
    let start = w.len().saturating_sub(DOUBLE_LOOKBACK);
    let tail = &w[start..];
    let close = tail.last()?.close;

    let highs: Vec<f64> = tail.iter().map(|c| c.high).collect();
    let peaks = swing_points(&highs, 2, true);
    if let [.., a, b] = peaks[..] {
        let (h1, h2) = (highs[a], highs[b]);
        let top = h1.max(h2);
        let valley = tail[a..=b].iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let depth = top - valley;
        if b - a >= 3
            && (h1 - h2).abs() / top <= DOUBLE_TOLERANCE
            && depth / top >= 0.015
            && close < top - depth / 2.0
        {
            let strength = 1.0 - (h1 - h2).abs() / (top * DOUBLE_TOLERANCE);
            return Some(PatternSignal::new(
                PatternKind::DoubleTop,
                strength.max(0.5),
                vec![start + a, start + b],
            ));
        }
    }

    let lows: Vec<f64> = tail.iter().map(|c| c.low).collect();
    let troughs = swing_points(&lows, 2, false);
    if let [.., a, b] = troughs[..] {
        let (l1, l2) = (lows[a], lows[b]);
        let bottom = l1.min(l2);
        let ridge = tail[a..=b].iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let height = ridge - bottom;
        if bottom > 0.0
            && b - a >= 3
            && (l1 - l2).abs() / bottom <= DOUBLE_TOLERANCE
            && height / bottom >= 0.015
            && close > bottom + height / 2.0
        {
            let strength = 1.0 - (l1 - l2).abs() / (bottom * DOUBLE_TOLERANCE);
            return Some(PatternSignal::new(
                PatternKind::DoubleBottom,
                strength.max(0.5),
                vec![start + a, start + b],
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_candles;

    /// Quiet lead-in of small alternating candles with body 1.
    fn lead_in(n: usize, level: f64) -> Vec<(f64, f64, f64, f64)> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    (level, level + 1.5, level - 0.5, level + 1.0)
                } else {
                    (level + 1.0, level + 1.5, level - 0.5, level)
                }
            })
            .collect()
    }

    fn kinds(data: &[(f64, f64, f64, f64)]) -> Vec<PatternKind> {
        detect_patterns(&make_ohlc_candles(data))
            .into_iter()
            .map(|p| p.kind)
            .collect()
    }

    #[test]
    fn bullish_engulfing() {
        let mut data = lead_in(10, 100.0);
        data.push((101.0, 101.2, 99.8, 100.0)); // bearish body 1
        data.push((99.9, 102.6, 99.8, 102.5)); // bullish body 2.6 engulfs
        assert!(kinds(&data).contains(&PatternKind::BullishEngulfing));
    }

    #[test]
    fn bearish_engulfing() {
        let mut data = lead_in(10, 100.0);
        data.push((100.0, 101.2, 99.8, 101.0));
        data.push((101.1, 101.2, 98.4, 98.5));
        assert!(kinds(&data).contains(&PatternKind::BearishEngulfing));
    }

    #[test]
    fn hammer_after_decline() {
        let mut data: Vec<_> = (0..8)
            .map(|i| {
                let top = 110.0 - i as f64;
                (top, top + 0.2, top - 1.2, top - 1.0)
            })
            .collect();
        // body 0.5, lower shadow 3, upper shadow 0.1
        data.push((102.0, 102.6, 99.0, 102.5));
        assert!(kinds(&data).contains(&PatternKind::Hammer));
    }

    #[test]
    fn three_white_soldiers() {
        let mut data = lead_in(10, 100.0);
        data.push((100.0, 101.6, 99.9, 101.5));
        data.push((101.0, 102.6, 100.9, 102.5));
        data.push((102.0, 103.6, 101.9, 103.5));
        let found = detect_patterns(&make_ohlc_candles(&data));
        let soldiers = found
            .iter()
            .find(|p| p.kind == PatternKind::ThreeWhiteSoldiers)
            .map(|p| p.indices.clone());
        assert_eq!(soldiers, Some(vec![10, 11, 12]));
    }

    #[test]
    fn doji_is_neutral() {
        let mut data = lead_in(10, 100.0);
        data.push((100.5, 102.0, 99.0, 100.52));
        let found = detect_patterns(&make_ohlc_candles(&data));
        let doji = found.iter().find(|p| p.kind == PatternKind::Doji);
        assert!(doji.is_some());
        assert_eq!(PatternKind::Doji.bias(), Bias::Neutral);
    }

    #[test]
    fn morning_star() {
        let mut data = lead_in(10, 100.0);
        data.push((103.0, 103.1, 99.9, 100.0)); // large bearish body 3
        data.push((99.8, 100.0, 99.4, 99.7)); // small body 0.1
        data.push((99.9, 102.6, 99.8, 102.5)); // closes above 101.5
        assert!(kinds(&data).contains(&PatternKind::MorningStar));
    }

    #[test]
    fn bearish_momentum_candle() {
        let mut data = lead_in(10, 100.0);
        data.push((101.0, 101.1, 97.9, 98.0));
        assert!(kinds(&data).contains(&PatternKind::BearishMomentum));
    }

    #[test]
    fn double_top() {
        // Two peaks at 110 separated by a 104 valley, price back at 105
        let mids = [
            100.0, 103.0, 106.0, 109.0, 106.0, 104.0, 105.0, 109.0, 106.0, 104.0, 105.0,
        ];
        let data: Vec<_> = mids.iter().map(|&m| (m, m + 1.0, m - 1.0, m)).collect();
        let found = detect_patterns(&make_ohlc_candles(&data));
        let top = found.iter().find(|p| p.kind == PatternKind::DoubleTop);
        assert_eq!(top.map(|p| p.indices.clone()), Some(vec![3, 7]));
    }

    #[test]
    fn strengths_are_normalized_and_weights_in_range() {
        let mut data = lead_in(10, 100.0);
        data.push((103.0, 103.1, 99.9, 100.0));
        data.push((99.8, 100.0, 99.4, 99.7));
        data.push((99.9, 106.6, 99.8, 106.5));
        for hit in detect_patterns(&make_ohlc_candles(&data)) {
            assert!((0.0..=1.0).contains(&hit.strength));
            assert!((1.2..=2.0).contains(&hit.kind.weight()));
        }
    }

    #[test]
    fn flat_window_has_no_patterns() {
        let data = vec![(100.0, 100.0, 100.0, 100.0); 12];
        assert!(kinds(&data).is_empty());
    }
}
