//! Pattern & divergence detection over a candle window.

pub mod candles;
pub mod divergence;

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

pub use candles::{detect_patterns, PatternKind, PatternSignal};
pub use divergence::{
    find_divergences, rsi_divergences, Divergence, DivergenceKind,
    DEFAULT_SWING_STRENGTH,
};

/// Everything one scan finds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub patterns: Vec<PatternSignal>,
    pub divergences: Vec<Divergence>,
}

/// Candle patterns plus RSI divergences for `window`.
pub fn scan(window: &[Candle], rsi_period: usize) -> ScanResult {
    ScanResult {
        patterns: detect_patterns(window),
        divergences: rsi_divergences(window, rsi_period, DEFAULT_SWING_STRENGTH),
    }
}
