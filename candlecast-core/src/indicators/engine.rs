//! Indicator engine: folds every indicator's latest value into one
//! [`IndicatorSet`] per window.
//!
//! Scalars are memoized in the engine's [`IndicatorCache`]; the cache is an
//! optimization only and never changes a result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::IndicatorConfig;
use crate::domain::{Candle, TradeSignal};
use crate::indicators::adx::directional_index;
use crate::indicators::atr::{average_true_range, Atr};
use crate::indicators::bollinger::{bollinger_bands, BollingerBands};
use crate::indicators::cache::{CacheKey, IndicatorCache, WindowFingerprint};
use crate::indicators::ema::Ema;
use crate::indicators::levels::{support_resistance, PriceLevels};
use crate::indicators::macd::{Macd, MacdValues};
use crate::indicators::obv::Obv;
use crate::indicators::roc::{pct_change, period_return};
use crate::indicators::rsi::rsi_value;
use crate::indicators::stochastic::{Stochastic, StochasticValues};
use crate::indicators::{DirectionalIndex, Indicator};

/// Short and long ATR periods behind the volatility ratio.
pub const VOLATILITY_SHORT: usize = 5;
pub const VOLATILITY_LONG: usize = 20;
/// Lookback of the momentum reading.
pub const MOMENTUM_PERIOD: usize = 10;

/// Latest indicator readings for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub macd: MacdValues,
    pub bollinger: BollingerBands,
    pub ema: f64,
    pub atr: f64,
    pub adx: DirectionalIndex,
    pub stochastic: StochasticValues,
    pub obv: f64,
    pub levels: PriceLevels,
    /// ATR(5) / ATR(20); 1.0 when the long ATR is zero.
    pub volatility_ratio: f64,
    /// Percent change over the last 10 candles.
    pub momentum: f64,
    pub price_change_pct: f64,
    pub volume_change_pct: f64,
    pub signal: TradeSignal,
    pub last_close: f64,
}

impl IndicatorSet {
    /// Readings for a window with no candles.
    pub fn empty() -> Self {
        Self {
            rsi: crate::indicators::rsi::NEUTRAL_RSI,
            macd: MacdValues::default(),
            bollinger: BollingerBands::collapsed(0.0),
            ema: 0.0,
            atr: 0.0,
            adx: DirectionalIndex::default(),
            stochastic: StochasticValues::default(),
            obv: 0.0,
            levels: PriceLevels::default(),
            volatility_ratio: 1.0,
            momentum: 0.0,
            price_change_pct: 0.0,
            volume_change_pct: 0.0,
            signal: TradeSignal::Neutral,
            last_close: 0.0,
        }
    }
}

/// Computes [`IndicatorSet`]s, sharing one cache across calls and threads.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    cache: Arc<IndicatorCache>,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(IndicatorCache::new()))
    }

    pub fn with_cache(cache: Arc<IndicatorCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<IndicatorCache> {
        &self.cache
    }

    fn cached<F>(&self, name: &str, period: usize, window: WindowFingerprint, compute: F) -> Vec<f64>
    where
        F: FnOnce() -> Vec<f64>,
    {
        self.cache
            .get_or_compute(CacheKey::for_window(name, period, window), compute)
    }

    fn cached_scalar<F>(&self, name: &str, period: usize, window: WindowFingerprint, compute: F) -> f64
    where
        F: FnOnce() -> f64,
    {
        let values = self.cached(name, period, window, || vec![compute()]);
        values.first().copied().unwrap_or(f64::NAN)
    }

    /// All indicators for `window` under `config`.
    ///
    /// Never fails: short windows yield the documented neutral values.
    pub fn compute(&self, window: &[Candle], config: &IndicatorConfig) -> IndicatorSet {
        let Some(last) = window.last() else {
            return IndicatorSet::empty();
        };
        let close = last.close;
        let fp = WindowFingerprint::of(window);

        let rsi_period = config.rsi_period.max(1);
        let rsi = self.cached_scalar("rsi", rsi_period, fp, || rsi_value(window, rsi_period));

        let fast = config.macd_fast.max(1);
        let slow = config.macd_slow.max(fast + 1);
        let signal_period = config.macd_signal.max(1);
        let macd_name = format!("macd_{fast}_{slow}_{signal_period}");
        let macd = match self.cached(&macd_name, slow, fp, || {
            let v = Macd::new(fast, slow, signal_period).values(window);
            vec![v.line, v.signal, v.histogram]
        })[..]
        {
            [line, signal, histogram] => MacdValues {
                line,
                signal,
                histogram,
            },
            _ => MacdValues::default(),
        };

        let bb_period = config.bb_period.max(1);
        let bb_name = format!("bollinger_{}", config.bb_std_dev);
        let bollinger = match self.cached(&bb_name, bb_period, fp, || {
            let b = bollinger_bands(window, bb_period, config.bb_std_dev);
            vec![b.upper, b.middle, b.lower]
        })[..]
        {
            [upper, middle, lower] => BollingerBands {
                upper,
                middle,
                lower,
            },
            _ => BollingerBands::collapsed(close),
        };

        let ema_period = config.ema_period.max(1);
        let ema = self.cached_scalar("ema", ema_period, fp, || {
            Ema::new(ema_period).latest(window).unwrap_or(close)
        });

        let atr_period = config.atr_period.max(1);
        let atr = self.cached_scalar("atr", atr_period, fp, || {
            Atr::new(atr_period).latest(window).unwrap_or(0.0)
        });

        let adx_period = config.adx_period.max(1);
        let adx = match self.cached("adx", adx_period, fp, || {
            let d = directional_index(window, adx_period);
            vec![d.adx, d.plus_di, d.minus_di]
        })[..]
        {
            [adx, plus_di, minus_di] => DirectionalIndex {
                adx,
                plus_di,
                minus_di,
            },
            _ => DirectionalIndex::default(),
        };

        let k_period = config.stoch_k_period.max(1);
        let d_period = config.stoch_d_period.max(1);
        let stochastic = match self.cached(&format!("stoch_{d_period}"), k_period, fp, || {
            let s = Stochastic::new(k_period, d_period).values(window);
            vec![s.k, s.d]
        })[..]
        {
            [k, d] => StochasticValues { k, d },
            _ => StochasticValues::default(),
        };

        let obv = self.cached_scalar("obv", 0, fp, || Obv::new().latest(window).unwrap_or(0.0));

        let volatility_ratio = volatility_ratio(window);
        let momentum = period_return(window, MOMENTUM_PERIOD);
        let price_change_pct = period_return(window, 1);
        let volume_change_pct = match window {
            [.., prev, last] => pct_change(prev.volume as f64, last.volume as f64),
            _ => 0.0,
        };

        let mut set = IndicatorSet {
            rsi,
            macd,
            bollinger,
            ema,
            atr,
            adx,
            stochastic,
            obv,
            levels: support_resistance(window),
            volatility_ratio,
            momentum,
            price_change_pct,
            volume_change_pct,
            signal: TradeSignal::Neutral,
            last_close: close,
        };
        set.signal = TradeSignal::from_votes(signal_votes(&set));
        set
    }
}

/// Short over long ATR; 1.0 when the long ATR is zero.
pub fn volatility_ratio(window: &[Candle]) -> f64 {
    let long = average_true_range(window, VOLATILITY_LONG);
    if long <= 0.0 {
        return 1.0;
    }
    average_true_range(window, VOLATILITY_SHORT) / long
}

/// Vote tally behind the engine's discrete trade signal.
fn signal_votes(set: &IndicatorSet) -> i32 {
    let mut votes = 0;

    if set.rsi < 30.0 {
        votes += 2;
    } else if set.rsi < 40.0 {
        votes += 1;
    } else if set.rsi > 70.0 {
        votes -= 2;
    } else if set.rsi > 60.0 {
        votes -= 1;
    }

    if set.macd.histogram > 0.0 {
        votes += 1;
    } else if set.macd.histogram < 0.0 {
        votes -= 1;
    }

    if set.last_close > set.ema {
        votes += 1;
    } else if set.last_close < set.ema {
        votes -= 1;
    }

    if set.last_close < set.bollinger.lower {
        votes += 1;
    } else if set.last_close > set.bollinger.upper {
        votes -= 1;
    }

    let s = set.stochastic;
    if s.k < 20.0 && s.k > s.d {
        votes += 1;
    } else if s.k > 80.0 && s.k < s.d {
        votes -= 1;
    }

    votes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    fn engine() -> IndicatorEngine {
        IndicatorEngine::new()
    }

    #[test]
    fn rising_window_readings() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let set = engine().compute(&make_candles(&closes), &IndicatorConfig::default());
        assert_approx(set.rsi, 100.0, 1e-9);
        assert!(set.atr > 0.0);
        assert_eq!(set.last_close, 119.0);
        // Below 2 * adx_period candles
        assert_eq!(set.adx, DirectionalIndex::default());
        assert!(set.momentum > 0.0);
    }

    #[test]
    fn flat_window_is_neutral() {
        let set = engine().compute(&make_candles(&[100.0; 20]), &IndicatorConfig::default());
        assert_eq!(set.rsi, 50.0);
        assert_eq!(set.bollinger, BollingerBands::collapsed(100.0));
        assert_eq!(set.macd, MacdValues::default());
        assert_eq!(set.price_change_pct, 0.0);
    }

    #[test]
    fn short_window_fallbacks() {
        let set = engine().compute(&make_candles(&[10.0, 11.0, 12.0]), &IndicatorConfig::default());
        assert_eq!(set.rsi, 50.0);
        assert_eq!(set.atr, 0.0);
        assert_eq!(set.ema, 12.0);
        assert_eq!(set.bollinger, BollingerBands::collapsed(12.0));
        assert_eq!(set.stochastic, StochasticValues::default());
    }

    #[test]
    fn empty_window() {
        assert_eq!(engine().compute(&[], &IndicatorConfig::default()), IndicatorSet::empty());
    }

    #[test]
    fn cached_result_is_identical() {
        let engine = engine();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 4.0).collect();
        let window = make_candles(&closes);
        let first = engine.compute(&window, &IndicatorConfig::default());
        assert!(!engine.cache().is_empty());
        let second = engine.compute(&window, &IndicatorConfig::default());
        assert_eq!(first, second);
        engine.cache().clear();
        assert_eq!(engine.compute(&window, &IndicatorConfig::default()), first);
    }

    #[test]
    fn same_timestamps_different_prices_do_not_share_entries() {
        let engine = engine();
        let rising: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let falling: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let up = make_candles(&rising);
        let down = make_candles(&falling);
        assert_eq!(up.last().map(|c| c.timestamp), down.last().map(|c| c.timestamp));

        let first = engine.compute(&up, &IndicatorConfig::default());
        let second = engine.compute(&down, &IndicatorConfig::default());
        assert_eq!(second, IndicatorEngine::new().compute(&down, &IndicatorConfig::default()));
        assert!(first.rsi > 90.0);
        assert!(second.rsi < 10.0);
        assert_ne!(first.ema, second.ema);
    }

    #[test]
    fn volatility_ratio_guards_zero_atr() {
        let candles = make_candles(&[100.0]);
        assert_approx(volatility_ratio(&candles), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn votes_map_onto_signal() {
        let mut set = IndicatorSet::empty();
        set.rsi = 25.0;
        set.macd.histogram = 1.0;
        set.last_close = 101.0;
        set.ema = 100.0;
        set.bollinger = BollingerBands {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };
        assert_eq!(signal_votes(&set), 4);
        set.rsi = 75.0;
        assert_eq!(signal_votes(&set), 0);
    }
}
