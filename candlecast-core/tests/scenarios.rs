//! End-to-end scenarios through the full `predict` pipeline.
//!
//! Tests:
//! 1. Monotonic rise: RSI ~100, regime never bearish, prediction never DOWN
//! 2. Flat tape: RSI 50, zero ATR, no anomaly
//! 3. Higher-timeframe windows feed the scorer without changing indicators
//! 4. Shared pipeline across threads gives identical results

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use candlecast_core::domain::{resample, synthetic_candles, Bias, Candle, Direction, Interval};
use candlecast_core::regime::{RegimeClassifier, RegimeConfig, RegimeType};
use candlecast_core::{predict, AccountParams, AnalysisPipeline, IndicatorConfig};

fn candle(i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
    let base = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
    Candle {
        timestamp: base + Duration::hours(i as i64),
        open,
        high,
        low,
        close,
        volume: 1_000,
    }
}

/// Each close +1 over the prior.
fn rising(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64;
            let open = if i == 0 { close } else { close - 1.0 };
            candle(i, open, close + 0.5, open - 0.5, close)
        })
        .collect()
}

// ──────────────────────────────────────────────
// 1. Monotonic rise
// ──────────────────────────────────────────────

#[test]
fn rising_window_is_bullish_or_neutral() {
    let window = rising(20);
    let p = predict(&window, &BTreeMap::new(), &IndicatorConfig::default(), &AccountParams::default());

    assert!((p.indicators.rsi - 100.0).abs() < 1e-9);
    assert_ne!(p.regime.direction, Bias::Bearish);
    assert_ne!(p.result.direction, Direction::Down);
    assert!(!p.result.factors.is_empty());
}

#[test]
fn rising_window_trends_up_with_short_window_classifier() {
    let classifier = RegimeClassifier::new(RegimeConfig {
        min_candles: 20,
        adx_period: 7,
        ..RegimeConfig::default()
    });
    let regime = classifier.classify(&rising(20));
    assert_eq!(regime.regime_type, RegimeType::Trending);
    assert_eq!(regime.direction, Bias::Bullish);
}

// ──────────────────────────────────────────────
// 2. Flat tape
// ──────────────────────────────────────────────

#[test]
fn flat_window_is_quiet() {
    let window: Vec<Candle> = (0..20).map(|i| candle(i, 50.0, 50.0, 50.0, 50.0)).collect();
    let p = predict(&window, &BTreeMap::new(), &IndicatorConfig::default(), &AccountParams::default());

    assert_eq!(p.indicators.rsi, 50.0);
    assert_eq!(p.indicators.atr, 0.0);
    assert!(!p.anomaly.is_anomaly);
    assert_eq!(p.result.direction, Direction::Neutral);
}

// ──────────────────────────────────────────────
// 3. Multi-timeframe input
// ──────────────────────────────────────────────

#[test]
fn higher_timeframes_only_move_the_score() {
    let base = synthetic_candles("mtf", 400, Interval::H1, 0.002);
    let window = &base[base.len() - 100..];
    let config = IndicatorConfig::default();
    let account = AccountParams::default();
    let pipeline = AnalysisPipeline::default();

    let without = pipeline.predict(window, &BTreeMap::new(), &config, &account);
    let mut mtf = BTreeMap::new();
    mtf.insert(Interval::H4, resample(&base, 4));
    let with = pipeline.predict(window, &mtf, &config, &account);

    assert_eq!(without.indicators, with.indicators);
    assert_eq!(without.regime, with.regime);
}

// ──────────────────────────────────────────────
// 4. Thread safety
// ──────────────────────────────────────────────

#[test]
fn shared_pipeline_is_consistent_across_threads() {
    let pipeline = Arc::new(AnalysisPipeline::default());
    let window = Arc::new(synthetic_candles("threads", 120, Interval::H1, 0.0));
    let expected = pipeline.predict(&window, &BTreeMap::new(), &IndicatorConfig::default(), &AccountParams::default());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let window = Arc::clone(&window);
            std::thread::spawn(move || {
                pipeline.predict(&window, &BTreeMap::new(), &IndicatorConfig::default(), &AccountParams::default())
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
