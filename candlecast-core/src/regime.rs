//! Market regime classifier.
//!
//! Labels a window TRENDING, RANGING, VOLATILE, CHOPPY or UNKNOWN from its
//! ATR volatility profile, ADX/DI readings and the count of
//! direction flips over the most recent steps. Every call returns a fresh
//! [`MarketRegime`]; nothing is carried between windows.
//!
//! ADX and ATR are recomputed here from raw candles with the periods in
//! [`RegimeConfig`], never with the adapted [`IndicatorConfig`]. The
//! regime therefore picks the adapted parameters for a window but does
//! not see them: a regime-driven period change reaches classification
//! only through the next window's candles, never within the same call.
//!
//! [`IndicatorConfig`]: crate::config::IndicatorConfig

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Bias, Candle};
use crate::indicators::{average_true_range, directional_index, period_return, Atr, Indicator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeType {
    Trending,
    Ranging,
    Volatile,
    Choppy,
    Unknown,
}

impl fmt::Display for RegimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegimeType::Trending => "TRENDING",
            RegimeType::Ranging => "RANGING",
            RegimeType::Volatile => "VOLATILE",
            RegimeType::Choppy => "CHOPPY",
            RegimeType::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Three-step rating used for volatility and liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Low,
    Normal,
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Low => "LOW",
            Level::Normal => "NORMAL",
            Level::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// Swing structure of the last 20 candles, comparing their two halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceStructure {
    HigherHighsHigherLows,
    LowerHighsLowerLows,
    Expanding,
    Contracting,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRegime {
    #[serde(rename = "type")]
    pub regime_type: RegimeType,
    pub direction: Bias,
    /// Normalized to [0, 1].
    pub strength: f64,
    pub volatility_level: Level,
    /// Normalized to [0, 1].
    pub momentum_strength: f64,
    pub liquidity: Level,
    pub price_structure: PriceStructure,
}

impl MarketRegime {
    pub fn unknown() -> Self {
        Self {
            regime_type: RegimeType::Unknown,
            direction: Bias::Neutral,
            strength: 0.0,
            volatility_level: Level::Normal,
            momentum_strength: 0.0,
            liquidity: Level::Normal,
            price_structure: PriceStructure::Undefined,
        }
    }
}

/// Classifier thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub min_candles: usize,
    pub adx_period: usize,
    pub atr_period: usize,
    /// ADX above this is a trend.
    pub trend_adx: f64,
    /// Band width, in standard deviations, around mean volatility.
    pub volatility_k: f64,
    /// Deltas inspected for direction flips.
    pub flip_lookback: usize,
    /// More flips than this is choppy.
    pub choppy_flips: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            adx_period: 14,
            atr_period: 14,
            trend_adx: 25.0,
            volatility_k: 1.5,
            flip_lookback: 19,
            choppy_flips: 8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

/// Current volatility against its in-window baseline.
#[derive(Debug, Clone, Copy)]
struct VolatilityProfile {
    current: f64,
    mean: f64,
    std: f64,
}

impl VolatilityProfile {
    fn has_spread(&self) -> bool {
        self.std > self.mean.abs() * 1e-9
    }

    fn z_score(&self) -> f64 {
        if self.has_spread() {
            (self.current - self.mean) / self.std
        } else {
            0.0
        }
    }
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Classify the window. Below `min_candles` the result is UNKNOWN and
    /// NEUTRAL.
    pub fn classify(&self, window: &[Candle]) -> MarketRegime {
        let cfg = &self.config;
        if window.len() < cfg.min_candles.max(2) {
            return MarketRegime::unknown();
        }
        let Some(profile) = volatility_profile(window, cfg.atr_period.max(1)) else {
            return MarketRegime::unknown();
        };

        let di = directional_index(window, cfg.adx_period);
        let z = profile.z_score();
        let k = cfg.volatility_k;
        let flips = direction_flips(window, cfg.flip_lookback);
        let max_flips = cfg.flip_lookback.saturating_sub(1).max(1) as f64;
        let ranging_strength = ((cfg.trend_adx - di.adx) / cfg.trend_adx).clamp(0.0, 1.0);

        let (regime_type, strength) = if profile.has_spread() && z > k {
            (RegimeType::Volatile, (z / (2.0 * k)).min(1.0))
        } else if di.adx > cfg.trend_adx {
            (RegimeType::Trending, (di.adx / 50.0).min(1.0))
        } else if profile.has_spread() && z < -k {
            (RegimeType::Ranging, ranging_strength)
        } else if flips > cfg.choppy_flips {
            (RegimeType::Choppy, (flips as f64 / max_flips).min(1.0))
        } else {
            (RegimeType::Ranging, ranging_strength)
        };

        let direction = if regime_type == RegimeType::Trending {
            if di.plus_di > di.minus_di {
                Bias::Bullish
            } else if di.minus_di > di.plus_di {
                Bias::Bearish
            } else {
                Bias::Neutral
            }
        } else {
            let ret = period_return(window, 20);
            if ret > 1.0 {
                Bias::Bullish
            } else if ret < -1.0 {
                Bias::Bearish
            } else {
                Bias::Neutral
            }
        };

        let volatility_level = if z > 1.0 {
            Level::High
        } else if z < -1.0 {
            Level::Low
        } else {
            Level::Normal
        };

        MarketRegime {
            regime_type,
            direction,
            strength: strength.clamp(0.0, 1.0),
            volatility_level,
            momentum_strength: momentum_strength(window),
            liquidity: liquidity(window, cfg.atr_period.max(1)),
            price_structure: price_structure(window),
        }
    }
}

/// Latest rolling ATR against the mean and population stddev of every ATR
/// value in the window.
fn volatility_profile(window: &[Candle], atr_period: usize) -> Option<VolatilityProfile> {
    let series: Vec<f64> = Atr::new(atr_period)
        .compute(window)
        .into_iter()
        .filter(|a| !a.is_nan())
        .collect();
    let current = *series.last()?;
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let std = (series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    Some(VolatilityProfile { current, mean, std })
}

/// Sign changes between consecutive non-zero close deltas over the last
/// `lookback` deltas.
pub fn direction_flips(window: &[Candle], lookback: usize) -> usize {
    let start = window.len().saturating_sub(lookback + 1);
    let signs: Vec<f64> = window[start..]
        .windows(2)
        .map(|w| w[1].close - w[0].close)
        .filter(|d| *d != 0.0)
        .map(f64::signum)
        .collect();
    signs.windows(2).filter(|s| s[0] != s[1]).count()
}

/// Blend of 5/10/20-candle returns (0.5/0.3/0.2), scaled so a 5% blended
/// move saturates at 1.
pub fn momentum_strength(window: &[Candle]) -> f64 {
    let blend = 0.5 * period_return(window, 5)
        + 0.3 * period_return(window, 10)
        + 0.2 * period_return(window, 20);
    (blend.abs() / 5.0).min(1.0)
}

fn liquidity(window: &[Candle], atr_period: usize) -> Level {
    let Some(last) = window.last() else {
        return Level::Normal;
    };
    if last.close <= 0.0 {
        return Level::Normal;
    }
    let ratio = average_true_range(window, atr_period) / last.close;
    if ratio < 0.001 {
        Level::Low
    } else if ratio > 0.005 {
        Level::High
    } else {
        Level::Normal
    }
}

fn price_structure(window: &[Candle]) -> PriceStructure {
    if window.len() < 20 {
        return PriceStructure::Undefined;
    }
    let recent = &window[window.len() - 20..];
    let (first, second) = recent.split_at(10);
    let high = |c: &[Candle]| c.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = |c: &[Candle]| c.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let (h1, l1, h2, l2) = (high(first), low(first), high(second), low(second));
    match (h2 > h1, l2 > l1, h2 < h1, l2 < l1) {
        (true, true, _, _) => PriceStructure::HigherHighsHigherLows,
        (_, _, true, true) => PriceStructure::LowerHighsLowerLows,
        (true, _, _, true) => PriceStructure::Expanding,
        (_, true, true, _) => PriceStructure::Contracting,
        _ => PriceStructure::Undefined,
    }
}
