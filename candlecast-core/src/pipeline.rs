//! Single-pass analysis pipeline behind `predict`.
//!
//! Per window: classify the regime from raw candles, adapt the indicator
//! configuration once, compute indicators with the effective
//! configuration, detect anomalies and patterns, score, and size the trade.
//! Nothing is iterated to convergence and nothing survives the call except
//! the indicator cache.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adaptive::AdaptiveController;
use crate::anomaly::{self, AnomalyReport};
use crate::config::{AccountParams, IndicatorConfig};
use crate::domain::{is_ascending, Candle, Interval};
use crate::indicators::{IndicatorEngine, IndicatorSet};
use crate::patterns::{self, ScanResult};
use crate::regime::MarketRegime;
use crate::risk::{self, TradingSuggestion};
use crate::scorer::{self, PredictionResult, ScoreInputs};

/// Full output of one `predict` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub result: PredictionResult,
    pub suggestion: TradingSuggestion,
    pub regime: MarketRegime,
    pub anomaly: AnomalyReport,
    pub indicators: IndicatorSet,
    pub scan: ScanResult,
    /// Configuration the indicators were computed with.
    pub effective_config: IndicatorConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisPipeline {
    engine: IndicatorEngine,
    adaptive: AdaptiveController,
}

impl AnalysisPipeline {
    pub fn new(engine: IndicatorEngine, adaptive: AdaptiveController) -> Self {
        Self { engine, adaptive }
    }

    pub fn engine(&self) -> &IndicatorEngine {
        &self.engine
    }

    pub fn adaptive(&self) -> &AdaptiveController {
        &self.adaptive
    }

    /// Analyze `candles` (oldest first) with optional higher-timeframe
    /// windows.
    pub fn predict(
        &self,
        candles: &[Candle],
        mtf: &BTreeMap<Interval, Vec<Candle>>,
        config: &IndicatorConfig,
        account: &AccountParams,
    ) -> Prediction {
        check_window(candles);

        let regime = self.adaptive.classifier().classify(candles);
        let effective_config = self.adaptive.adapt_with_regime(candles, config, &regime);
        let indicators = self.engine.compute(candles, &effective_config);
        let anomaly = anomaly::detect(candles);
        let scan = patterns::scan(candles, effective_config.rsi_period);

        let result = scorer::score(&ScoreInputs {
            window: candles,
            indicators: &indicators,
            mtf,
            regime: &regime,
            anomaly: &anomaly,
            scan: &scan,
        });
        let suggestion = risk::size(candles, &indicators, result.direction, account);
        debug!(
            direction = %result.direction,
            confidence = %result.confidence,
            score = result.net_score,
            regime = %regime.regime_type,
            "window scored"
        );

        Prediction {
            result,
            suggestion,
            regime,
            anomaly,
            indicators,
            scan,
            effective_config,
        }
    }
}

/// Log degraded input; the window is still analyzed as given.
fn check_window(candles: &[Candle]) {
    if !is_ascending(candles) {
        warn!(len = candles.len(), "candle timestamps are not strictly ascending");
    }
    let insane = candles.iter().filter(|c| !c.is_sane()).count();
    if insane > 0 {
        warn!(insane, len = candles.len(), "window contains inconsistent OHLC candles");
    }
}

/// Process-wide default pipeline. Its cache and janitor live until exit.
fn shared_pipeline() -> &'static AnalysisPipeline {
    static SHARED: OnceLock<AnalysisPipeline> = OnceLock::new();
    SHARED.get_or_init(AnalysisPipeline::default)
}

/// `predict` on the shared default pipeline.
pub fn predict(
    candles: &[Candle],
    mtf: &BTreeMap<Interval, Vec<Candle>>,
    config: &IndicatorConfig,
    account: &AccountParams,
) -> Prediction {
    shared_pipeline().predict(candles, mtf, config, account)
}
