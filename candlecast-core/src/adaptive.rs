//! Adaptive parameter controller.
//!
//! Rewrites an [`IndicatorConfig`] for the current market regime: a fixed
//! lookup keyed by `(regime type, volatility level)` picks the periods, then
//! the short/long ATR ratio nudges RSI and EMA periods once more. The regime
//! is classified once per window from unadapted candles; there is no
//! iteration and no state carried between windows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IndicatorConfig;
use crate::domain::Candle;
use crate::indicators::volatility_ratio;
use crate::regime::{Level, MarketRegime, RegimeClassifier, RegimeType};

/// Ratio above which RSI/EMA periods shrink.
pub const FAST_MARKET_RATIO: f64 = 2.0;
/// Ratio below which RSI/EMA periods widen.
pub const SLOW_MARKET_RATIO: f64 = 0.5;

/// Periods substituted for one table cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub rsi_period: usize,
    pub ema_period: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl ParameterSet {
    fn apply(&self, config: &mut IndicatorConfig) {
        config.rsi_period = self.rsi_period.max(2);
        config.ema_period = self.ema_period.max(2);
        config.bb_period = self.bb_period.max(2);
        config.bb_std_dev = self.bb_std_dev;
        config.macd_fast = self.macd_fast.max(1);
        config.macd_slow = self.macd_slow.max(config.macd_fast + 1);
        config.macd_signal = self.macd_signal.max(1);
    }
}

fn params(
    rsi_period: usize,
    ema_period: usize,
    bb_period: usize,
    bb_std_dev: f64,
    (macd_fast, macd_slow, macd_signal): (usize, usize, usize),
) -> ParameterSet {
    ParameterSet {
        rsi_period,
        ema_period,
        bb_period,
        bb_std_dev,
        macd_fast,
        macd_slow,
        macd_signal,
    }
}

/// Lookup from `(regime, volatility)` to a [`ParameterSet`].
///
/// Cells without an entry leave the base configuration in place. The
/// [`Default`] table is a fixed heuristic; callers may build their own.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    entries: HashMap<(RegimeType, Level), ParameterSet>,
}

impl Default for ParameterTable {
    fn default() -> Self {
        use Level::{High, Low, Normal};
        use RegimeType::{Choppy, Ranging, Trending, Volatile};

        let mut table = Self::empty();
        // Trends: standard periods, faster when volatility expands
        table.insert(Trending, Low, params(14, 21, 20, 2.0, (12, 26, 9)));
        table.insert(Trending, Normal, params(14, 20, 20, 2.0, (12, 26, 9)));
        table.insert(Trending, High, params(10, 13, 20, 2.5, (8, 21, 5)));
        // Ranges: short lookbacks, tighter bands for mean reversion
        table.insert(Ranging, Low, params(9, 10, 20, 1.8, (12, 26, 9)));
        table.insert(Ranging, Normal, params(12, 14, 20, 2.0, (12, 26, 9)));
        table.insert(Ranging, High, params(9, 10, 15, 2.5, (8, 21, 5)));
        // Noise: long lookbacks, wide bands
        for level in [Low, Normal, High] {
            table.insert(Volatile, level, params(21, 30, 20, 2.5, (19, 39, 9)));
            table.insert(Choppy, level, params(21, 34, 25, 2.5, (19, 39, 9)));
        }
        table
    }
}

impl ParameterTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        regime: RegimeType,
        volatility: Level,
        set: ParameterSet,
    ) -> Option<ParameterSet> {
        self.entries.insert((regime, volatility), set)
    }

    pub fn lookup(&self, regime: RegimeType, volatility: Level) -> Option<&ParameterSet> {
        self.entries.get(&(regime, volatility))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdaptiveController {
    classifier: RegimeClassifier,
    table: ParameterTable,
}

impl AdaptiveController {
    pub fn new(classifier: RegimeClassifier, table: ParameterTable) -> Self {
        Self { classifier, table }
    }

    pub fn classifier(&self) -> &RegimeClassifier {
        &self.classifier
    }

    pub fn table(&self) -> &ParameterTable {
        &self.table
    }

    /// Effective configuration for `window`.
    ///
    /// Returns `base` unchanged when adaptation is off or the window is
    /// shorter than the classifier's minimum.
    pub fn adapt(&self, window: &[Candle], base: &IndicatorConfig) -> IndicatorConfig {
        if !self.applies(window, base) {
            return base.clone();
        }
        let regime = self.classifier.classify(window);
        self.adapt_with_regime(window, base, &regime)
    }

    /// As [`adapt`](Self::adapt), reusing a regime the caller already
    /// classified for this window.
    pub fn adapt_with_regime(
        &self,
        window: &[Candle],
        base: &IndicatorConfig,
        regime: &MarketRegime,
    ) -> IndicatorConfig {
        if !self.applies(window, base) {
            return base.clone();
        }
        let mut config = base.clone();
        if let Some(set) = self.table.lookup(regime.regime_type, regime.volatility_level) {
            set.apply(&mut config);
        }

        let ratio = volatility_ratio(window);
        let scale = if ratio > FAST_MARKET_RATIO {
            Some(0.8)
        } else if ratio < SLOW_MARKET_RATIO {
            Some(1.2)
        } else {
            None
        };
        if let Some(scale) = scale {
            config.rsi_period = scale_period(config.rsi_period, scale);
            config.ema_period = scale_period(config.ema_period, scale);
        }

        if config != *base {
            debug!(
                regime = %regime.regime_type,
                volatility = %regime.volatility_level,
                ratio,
                rsi = config.rsi_period,
                ema = config.ema_period,
                bb = config.bb_period,
                "adapted indicator parameters"
            );
        }
        config
    }

    fn applies(&self, window: &[Candle], base: &IndicatorConfig) -> bool {
        base.adaptive_indicators && window.len() >= self.classifier.config().min_candles
    }
}

fn scale_period(period: usize, scale: f64) -> usize {
    ((period as f64 * scale).round() as usize).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_candles, make_ohlc_candles};
    use crate::regime::PriceStructure;
    use crate::domain::Bias;

    fn regime(regime_type: RegimeType, volatility_level: Level) -> MarketRegime {
        MarketRegime {
            regime_type,
            direction: Bias::Neutral,
            strength: 0.5,
            volatility_level,
            momentum_strength: 0.0,
            liquidity: Level::Normal,
            price_structure: PriceStructure::Undefined,
        }
    }

    fn steady(n: usize) -> Vec<Candle> {
        // Constant true range keeps the ATR ratio at 1
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + (i % 2) as f64).collect();
        make_candles(&closes)
    }

    #[test]
    fn disabled_returns_base() {
        let base = IndicatorConfig {
            adaptive_indicators: false,
            ..IndicatorConfig::default()
        };
        let controller = AdaptiveController::default();
        assert_eq!(controller.adapt(&steady(80), &base), base);
    }

    #[test]
    fn short_window_returns_base() {
        let base = IndicatorConfig::default();
        let controller = AdaptiveController::default();
        assert_eq!(controller.adapt(&steady(30), &base), base);
    }

    #[test]
    fn table_cell_is_applied() {
        let base = IndicatorConfig::default();
        let controller = AdaptiveController::default();
        let cfg = controller.adapt_with_regime(
            &steady(80),
            &base,
            &regime(RegimeType::Choppy, Level::Normal),
        );
        assert_eq!(cfg.rsi_period, 21);
        assert_eq!(cfg.ema_period, 34);
        assert_eq!(cfg.bb_period, 25);
        assert_eq!((cfg.macd_fast, cfg.macd_slow), (19, 39));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_regime_keeps_periods() {
        let base = IndicatorConfig::default();
        let controller = AdaptiveController::default();
        let cfg = controller.adapt_with_regime(
            &steady(80),
            &base,
            &regime(RegimeType::Unknown, Level::Normal),
        );
        assert_eq!(cfg, base);
    }

    #[test]
    fn volatility_burst_shrinks_periods() {
        // Tight range, then five very wide candles at the end
        let mut data = vec![(100.0, 100.5, 99.5, 100.0); 75];
        data.extend([(100.0, 115.0, 85.0, 100.0); 5]);
        let window = make_ohlc_candles(&data);
        assert!(volatility_ratio(&window) > FAST_MARKET_RATIO);

        let base = IndicatorConfig::default();
        let controller = AdaptiveController::new(RegimeClassifier::default(), ParameterTable::empty());
        let cfg = controller.adapt_with_regime(&window, &base, &regime(RegimeType::Trending, Level::Normal));
        assert_eq!(cfg.rsi_period, 11); // round(14 * 0.8)
        assert_eq!(cfg.ema_period, 16);
    }

    #[test]
    fn quiet_tape_widens_periods() {
        let mut data = vec![(100.0, 110.0, 90.0, 100.0); 75];
        data.extend([(100.0, 100.5, 99.5, 100.0); 5]);
        let window = make_ohlc_candles(&data);
        assert!(volatility_ratio(&window) < SLOW_MARKET_RATIO);

        let base = IndicatorConfig::default();
        let controller = AdaptiveController::new(RegimeClassifier::default(), ParameterTable::empty());
        let cfg = controller.adapt_with_regime(&window, &base, &regime(RegimeType::Trending, Level::Normal));
        assert_eq!(cfg.rsi_period, 17); // round(14 * 1.2)
        assert_eq!(cfg.ema_period, 24);
    }

    #[test]
    fn scaled_periods_never_drop_below_two() {
        assert_eq!(scale_period(2, 0.8), 2);
        assert_eq!(scale_period(1, 0.8), 2);
    }

    #[test]
    fn adapt_is_pure() {
        let window = steady(80);
        let base = IndicatorConfig::default();
        let controller = AdaptiveController::default();
        assert_eq!(controller.adapt(&window, &base), controller.adapt(&window, &base));
    }
}
