//! Prediction scorer: fuses every analysis stage into one direction,
//! confidence and explanation.
//!
//! Each rule that fires appends a weighted [`Contribution`] to a ledger.
//! The bullish and bearish sums are dampened by the anomaly score, their
//! difference is scaled by the volatility level, and the net score is
//! bucketed into direction and confidence. Explanations are rendered from
//! the same ledger, so a factor is listed only if it actually moved the
//! score toward the chosen direction.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyReport;
use crate::domain::{median_spacing_secs, Bias, Candle, Confidence, Direction, Interval, TradeSignal};
use crate::indicators::{average_true_range, Ema, Indicator, IndicatorSet};
use crate::patterns::{DivergenceKind, ScanResult};
use crate::regime::{Level, MarketRegime, RegimeType};

/// |net score| above which a direction is called.
pub const DIRECTION_THRESHOLD: f64 = 1.5;
/// |net score| above which confidence is HIGH.
pub const HIGH_CONFIDENCE: f64 = 3.0;
/// |net score| below which confidence is LOW.
pub const LOW_CONFIDENCE: f64 = 2.0;
/// Fraction of both scores removed at anomaly score 1.0.
pub const ANOMALY_DAMPING: f64 = 0.3;

const FAST_EMA: usize = 9;
const SLOW_EMA: usize = 21;
const SEQUENCE_LOOKBACK: usize = 5;
const ORDER_FLOW_LOOKBACK: usize = 20;
const EXPECTED_MOVE_PERIOD: usize = 5;

/// Everything the scorer reads for one window.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    pub window: &'a [Candle],
    pub indicators: &'a IndicatorSet,
    pub mtf: &'a BTreeMap<Interval, Vec<Candle>>,
    pub regime: &'a MarketRegime,
    pub anomaly: &'a AnomalyReport,
    pub scan: &'a ScanResult,
}

/// One weighted vote in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub bias: Bias,
    pub weight: f64,
    pub factor: String,
}

/// The full ledger behind a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub contributions: Vec<Contribution>,
    /// After anomaly damping.
    pub bullish: f64,
    pub bearish: f64,
    pub volatility_multiplier: f64,
    pub net_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub direction: Direction,
    pub confidence: Confidence,
    pub net_score: f64,
    pub factors: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub target_timestamp: DateTime<Utc>,
    pub actual_outcome: Option<Direction>,
    pub was_correct: Option<bool>,
}

impl PredictionResult {
    /// Copy of this prediction graded against the close realized at the
    /// target time. A NEUTRAL call is correct only on an unchanged close.
    pub fn with_outcome(&self, reference_close: f64, realized_close: f64) -> PredictionResult {
        let outcome = Direction::of_move(reference_close, realized_close);
        PredictionResult {
            actual_outcome: Some(outcome),
            was_correct: Some(outcome == self.direction),
            ..self.clone()
        }
    }
}

/// Ledger for `inputs` without bucketing.
pub fn breakdown(inputs: &ScoreInputs<'_>) -> ScoreBreakdown {
    let mut ledger = Vec::new();
    regime_votes(inputs, &mut ledger);
    alignment_vote(inputs.mtf, &mut ledger);
    oscillator_votes(inputs.indicators, &mut ledger);
    pattern_votes(inputs.scan, &mut ledger);
    level_votes(inputs.window, inputs.indicators, &mut ledger);
    order_flow_vote(inputs.window, &mut ledger);
    engine_vote(inputs.indicators.signal, &mut ledger);
    divergence_votes(inputs.scan, &mut ledger);

    let damping = if inputs.anomaly.is_anomaly {
        1.0 - inputs.anomaly.score.clamp(0.0, 1.0) * ANOMALY_DAMPING
    } else {
        1.0
    };
    let total = |bias: Bias| -> f64 {
        ledger
            .iter()
            .filter(|c| c.bias == bias)
            .map(|c| c.weight)
            .sum::<f64>()
            * damping
    };
    let bullish = total(Bias::Bullish);
    let bearish = total(Bias::Bearish);
    let volatility_multiplier = match inputs.regime.volatility_level {
        Level::High => 0.8,
        Level::Low => 0.9,
        Level::Normal => 1.0,
    };
    ScoreBreakdown {
        contributions: ledger,
        bullish,
        bearish,
        volatility_multiplier,
        net_score: (bullish - bearish) * volatility_multiplier,
    }
}

/// Score one window.
pub fn score(inputs: &ScoreInputs<'_>) -> PredictionResult {
    let b = breakdown(inputs);
    let direction = if b.net_score > DIRECTION_THRESHOLD {
        Direction::Up
    } else if b.net_score < -DIRECTION_THRESHOLD {
        Direction::Down
    } else {
        Direction::Neutral
    };
    let magnitude = b.net_score.abs();
    let confidence = if magnitude > HIGH_CONFIDENCE {
        Confidence::High
    } else if magnitude < LOW_CONFIDENCE {
        Confidence::Low
    } else {
        Confidence::Medium
    };

    let timestamp = inputs
        .window
        .last()
        .map(|c| c.timestamp)
        .unwrap_or_default();
    let step = median_spacing_secs(inputs.window).unwrap_or(Interval::H1.seconds());

    PredictionResult {
        direction,
        confidence,
        net_score: b.net_score,
        factors: explain(&b, direction, inputs.regime),
        timestamp,
        target_timestamp: timestamp + Duration::seconds(step),
        actual_outcome: None,
        was_correct: None,
    }
}

fn explain(b: &ScoreBreakdown, direction: Direction, regime: &MarketRegime) -> Vec<String> {
    let wanted = match direction {
        Direction::Up => Bias::Bullish,
        Direction::Down => Bias::Bearish,
        Direction::Neutral => {
            return vec![format!(
                "Mixed signals: bullish {:.2} vs bearish {:.2}, net {:+.2}",
                b.bullish, b.bearish, b.net_score
            )];
        }
    };
    let mut agreeing: Vec<&Contribution> =
        b.contributions.iter().filter(|c| c.bias == wanted).collect();
    agreeing.sort_by(|x, y| y.weight.total_cmp(&x.weight));
    let mut factors: Vec<String> = agreeing.into_iter().map(|c| c.factor.clone()).collect();

    let side = if wanted == Bias::Bullish { "bullish" } else { "bearish" };
    let fallbacks = [
        format!("Net score {:+.2} favors the {side} side", b.net_score),
        format!("Market regime: {} ({:.0}% strength)", regime.regime_type, regime.strength * 100.0),
    ];
    for fallback in fallbacks {
        if factors.len() >= 2 {
            break;
        }
        factors.push(fallback);
    }
    factors
}

fn vote(ledger: &mut Vec<Contribution>, bias: Bias, weight: f64, factor: String) {
    if bias != Bias::Neutral && weight > 0.0 && weight.is_finite() {
        ledger.push(Contribution {
            bias,
            weight,
            factor,
        });
    }
}

fn regime_votes(inputs: &ScoreInputs<'_>, ledger: &mut Vec<Contribution>) {
    let regime = inputs.regime;
    match regime.regime_type {
        RegimeType::Trending => vote(
            ledger,
            regime.direction,
            2.0 * regime.strength,
            format!(
                "Trending market with {:?} direction (strength {:.2})",
                regime.direction, regime.strength
            )
            .to_lowercase(),
        ),
        RegimeType::Ranging => {
            let close = inputs.indicators.last_close;
            let percent_b = inputs.indicators.bollinger.percent_b(close);
            if percent_b < 0.2 {
                vote(
                    ledger,
                    Bias::Bullish,
                    0.5,
                    "Ranging market near the lower band favors a bounce".to_string(),
                );
            } else if percent_b > 0.8 {
                vote(
                    ledger,
                    Bias::Bearish,
                    0.5,
                    "Ranging market near the upper band favors a pullback".to_string(),
                );
            }
        }
        RegimeType::Volatile | RegimeType::Choppy | RegimeType::Unknown => {}
    }
}

/// Per-timeframe vote in [-1, 1]: price sequence, fast/slow EMA order and
/// price against the slow EMA, averaged.
fn timeframe_vote(candles: &[Candle]) -> Option<f64> {
    let [.., last] = candles else {
        return None;
    };
    if candles.len() < 2 {
        return None;
    }
    let back = candles.len().saturating_sub(SEQUENCE_LOOKBACK + 1);
    let sequence = sign(last.close - candles[back].close);

    let fast = Ema::new(FAST_EMA).latest(candles);
    let slow = Ema::new(SLOW_EMA).latest(candles);
    let ordering = match (fast, slow) {
        (Some(f), Some(s)) => sign(f - s),
        _ => 0.0,
    };
    let position = slow.map(|s| sign(last.close - s)).unwrap_or(0.0);
    Some((sequence + ordering + position) / 3.0)
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Weighted multi-timeframe trend agreement in [-1, 1]; 0 with no usable
/// timeframes.
pub fn timeframe_alignment(mtf: &BTreeMap<Interval, Vec<Candle>>) -> f64 {
    let (weighted, total) = mtf
        .iter()
        .filter_map(|(interval, candles)| {
            timeframe_vote(candles).map(|v| (v, interval.alignment_weight()))
        })
        .fold((0.0, 0.0), |(sum, weights), (v, w)| (sum + v * w, weights + w));
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

fn alignment_vote(mtf: &BTreeMap<Interval, Vec<Candle>>, ledger: &mut Vec<Contribution>) {
    let alignment = timeframe_alignment(mtf);
    let bias = if alignment > 0.0 {
        Bias::Bullish
    } else if alignment < 0.0 {
        Bias::Bearish
    } else {
        return;
    };
    vote(
        ledger,
        bias,
        1.5 * alignment.abs(),
        format!(
            "Higher timeframes aligned {} ({:.0}%)",
            if alignment > 0.0 { "up" } else { "down" },
            alignment.abs() * 100.0
        ),
    );
}

fn oscillator_votes(set: &IndicatorSet, ledger: &mut Vec<Contribution>) {
    if set.rsi < 30.0 {
        vote(ledger, Bias::Bullish, 1.0, format!("RSI oversold at {:.1}", set.rsi));
    } else if set.rsi > 70.0 {
        vote(ledger, Bias::Bearish, 1.0, format!("RSI overbought at {:.1}", set.rsi));
    }

    let m = set.macd;
    let strong = m.line != 0.0 && m.histogram.abs() > 0.2 * m.line.abs();
    let weight = if strong { 1.2 } else { 0.8 };
    if m.histogram > 0.0 {
        vote(ledger, Bias::Bullish, weight, format!("MACD histogram positive ({:+.4})", m.histogram));
    } else if m.histogram < 0.0 {
        vote(ledger, Bias::Bearish, weight, format!("MACD histogram negative ({:+.4})", m.histogram));
    }

    let s = set.stochastic;
    if s.k < 20.0 && s.k > s.d {
        vote(ledger, Bias::Bullish, 0.7, format!("Stochastic turning up from oversold (%K {:.1})", s.k));
    } else if s.k > 80.0 && s.k < s.d {
        vote(ledger, Bias::Bearish, 0.7, format!("Stochastic turning down from overbought (%K {:.1})", s.k));
    }
}

fn pattern_votes(scan: &ScanResult, ledger: &mut Vec<Contribution>) {
    for p in &scan.patterns {
        vote(
            ledger,
            p.bias(),
            p.kind.weight(),
            format!("{} pattern (strength {:.2})", p.kind, p.strength),
        );
    }
}

/// Proximity to the nearest level, measured in expected moves (ATR-5).
fn level_votes(window: &[Candle], set: &IndicatorSet, ledger: &mut Vec<Contribution>) {
    let expected = average_true_range(window, EXPECTED_MOVE_PERIOD);
    if expected <= 0.0 {
        return;
    }
    let close = set.last_close;
    if let Some(support) = set.levels.nearest_support() {
        let distance = close - support;
        if (0.0..expected).contains(&distance) {
            vote(
                ledger,
                Bias::Bullish,
                1.0 - distance / expected,
                format!("Price holding just above support at {support:.4}"),
            );
        }
    }
    if let Some(resistance) = set.levels.nearest_resistance() {
        let distance = resistance - close;
        if (0.0..expected).contains(&distance) {
            vote(
                ledger,
                Bias::Bearish,
                1.0 - distance / expected,
                format!("Price pressing into resistance at {resistance:.4}"),
            );
        }
    }
}

/// Share of recent volume on up candles; `None` without directional volume.
pub fn order_flow_ratio(window: &[Candle]) -> Option<f64> {
    let recent = &window[window.len().saturating_sub(ORDER_FLOW_LOOKBACK)..];
    let (up, down) = recent.iter().fold((0.0, 0.0), |(up, down), c| {
        let v = c.volume as f64;
        if c.close > c.open {
            (up + v, down)
        } else if c.close < c.open {
            (up, down + v)
        } else {
            (up, down)
        }
    });
    let total = up + down;
    (total > 0.0).then(|| up / total)
}

fn order_flow_vote(window: &[Candle], ledger: &mut Vec<Contribution>) {
    let Some(ratio) = order_flow_ratio(window) else {
        return;
    };
    if ratio > 0.6 {
        vote(ledger, Bias::Bullish, 1.0, format!("Buying volume dominates ({:.0}% up-volume)", ratio * 100.0));
    } else if ratio < 0.4 {
        vote(ledger, Bias::Bearish, 1.0, format!("Selling volume dominates ({:.0}% up-volume)", ratio * 100.0));
    }
}

fn engine_vote(signal: TradeSignal, ledger: &mut Vec<Contribution>) {
    let weight = match signal {
        TradeSignal::StrongBuy | TradeSignal::StrongSell => 1.5,
        TradeSignal::Buy | TradeSignal::Sell => 0.8,
        TradeSignal::Neutral => return,
    };
    vote(ledger, signal.bias(), weight, format!("Indicator consensus: {signal}"));
}

fn divergence_votes(scan: &ScanResult, ledger: &mut Vec<Contribution>) {
    for d in &scan.divergences {
        let base = match d.kind {
            DivergenceKind::Regular => 1.5,
            DivergenceKind::Hidden => 1.0,
        };
        vote(
            ledger,
            d.bias,
            base * (0.5 + 0.5 * d.strength),
            format!("{} (strength {:.2})", capitalize(&d.describe()), d.strength),
        );
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
