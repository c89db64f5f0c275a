//! Anomaly detector: flags abnormal last-candle or short-window behavior.
//!
//! Independent checks each add to a shared score that saturates at 1.0.
//! Every check that fires contributes its kind, a detail line and advisory
//! flags; two common flags are added once when anything fires.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Candle;
use crate::indicators::{average_true_range, period_return, rsi_value};

/// Minimum window length for detection.
pub const MIN_CANDLES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    PriceSpike,
    VolumeSpike,
    Gap,
    VolatilityBreakout,
    ExtremeRsi,
    RapidMove,
}

impl AnomalyKind {
    fn weight(self) -> f64 {
        match self {
            AnomalyKind::PriceSpike => 0.4,
            AnomalyKind::VolumeSpike => 0.3,
            AnomalyKind::Gap => 0.3,
            AnomalyKind::VolatilityBreakout => 0.3,
            AnomalyKind::ExtremeRsi => 0.2,
            AnomalyKind::RapidMove => 0.3,
        }
    }

    fn flags(self) -> &'static [AdvisoryFlag] {
        use AdvisoryFlag::*;
        match self {
            AnomalyKind::PriceSpike => &[ReducePositionSize, WaitForConfirmation],
            AnomalyKind::VolumeSpike => &[WaitForConfirmation],
            AnomalyKind::Gap => &[WidenStops, WaitForConfirmation],
            AnomalyKind::VolatilityBreakout => &[ReducePositionSize, WidenStops],
            AnomalyKind::ExtremeRsi => &[ExpectReversal],
            AnomalyKind::RapidMove => &[ReducePositionSize, AvoidChasing],
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnomalyKind::PriceSpike => "PRICE_SPIKE",
            AnomalyKind::VolumeSpike => "VOLUME_SPIKE",
            AnomalyKind::Gap => "GAP",
            AnomalyKind::VolatilityBreakout => "VOLATILITY_BREAKOUT",
            AnomalyKind::ExtremeRsi => "EXTREME_RSI",
            AnomalyKind::RapidMove => "RAPID_MOVE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvisoryFlag {
    ReducePositionSize,
    WaitForConfirmation,
    WidenStops,
    ExpectReversal,
    AvoidChasing,
    UseCaution,
    MonitorClosely,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub is_anomaly: bool,
    /// Combined tag, e.g. `PRICE_SPIKE+VOLUME_SPIKE`; `NONE` when clean.
    #[serde(rename = "type")]
    pub label: String,
    pub kinds: Vec<AnomalyKind>,
    /// Saturates at 1.0.
    pub score: f64,
    pub details: String,
    pub recommended_flags: BTreeSet<AdvisoryFlag>,
}

impl AnomalyReport {
    pub fn none() -> Self {
        Self {
            is_anomaly: false,
            label: "NONE".to_string(),
            kinds: Vec::new(),
            score: 0.0,
            details: String::new(),
            recommended_flags: BTreeSet::new(),
        }
    }

    pub fn type_label(&self) -> &str {
        &self.label
    }

    fn record(&mut self, kind: AnomalyKind, detail: String) {
        if self.kinds.is_empty() {
            self.label.clear();
        } else {
            self.label.push('+');
        }
        self.label.push_str(&kind.to_string());
        self.is_anomaly = true;
        self.kinds.push(kind);
        self.score = (self.score + kind.weight()).min(1.0);
        if !self.details.is_empty() {
            self.details.push_str("; ");
        }
        self.details.push_str(&detail);
        self.recommended_flags.extend(kind.flags().iter().copied());
    }
}

/// Run every check over the window. Below [`MIN_CANDLES`] nothing fires.
pub fn detect(window: &[Candle]) -> AnomalyReport {
    let mut report = AnomalyReport::none();
    let n = window.len();
    if n < MIN_CANDLES {
        return report;
    }
    let last = &window[n - 1];
    let prev = &window[n - 2];
    let history = &window[..n - 1];

    let atr10 = average_true_range(history, 10);
    let mv = (last.close - prev.close).abs();
    if atr10 > 0.0 && mv > 3.0 * atr10 {
        report.record(
            AnomalyKind::PriceSpike,
            format!("last move {mv:.4} exceeds 3x ATR(10) {atr10:.4}"),
        );
    }

    let prior: Vec<f64> = history[history.len() - 10..]
        .iter()
        .map(|c| c.volume as f64)
        .collect();
    let avg_volume = prior.iter().sum::<f64>() / prior.len() as f64;
    if avg_volume > 0.0 && last.volume as f64 > 3.0 * avg_volume {
        report.record(
            AnomalyKind::VolumeSpike,
            format!(
                "volume {} exceeds 3x the 10-candle average {avg_volume:.0}",
                last.volume
            ),
        );
    }

    let gap = [last.open, last.low, last.high]
        .iter()
        .map(|p| (p - prev.close).abs())
        .fold(0.0, f64::max);
    if atr10 > 0.0 && gap > atr10 {
        report.record(
            AnomalyKind::Gap,
            format!("price gapped {gap:.4} from prior close, above ATR {atr10:.4}"),
        );
    }

    let atr_long = average_true_range(window, 20);
    if atr_long > 0.0 {
        let ratio = average_true_range(window, 5) / atr_long;
        if ratio > 2.5 {
            report.record(
                AnomalyKind::VolatilityBreakout,
                format!("ATR(5)/ATR(20) at {ratio:.2}"),
            );
        }
    }

    let rsi = rsi_value(window, 14);
    if !(10.0..=90.0).contains(&rsi) {
        report.record(AnomalyKind::ExtremeRsi, format!("RSI at {rsi:.1}"));
    }

    let rapid = period_return(window, 5);
    if rapid.abs() > 5.0 {
        report.record(
            AnomalyKind::RapidMove,
            format!("{rapid:+.2}% over 5 candles"),
        );
    }

    if report.is_anomaly {
        report
            .recommended_flags
            .extend([AdvisoryFlag::UseCaution, AdvisoryFlag::MonitorClosely]);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_candles, make_ohlc_candles};

    fn calm() -> Vec<Candle> {
        // Gentle oscillation: RSI mid-range, constant volume
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + if i % 2 == 0 { 0.0 } else { 0.3 })
            .collect();
        make_candles(&closes)
    }

    #[test]
    fn calm_tape_is_clean() {
        let report = detect(&calm());
        assert_eq!(report, AnomalyReport::none());
        assert_eq!(report.type_label(), "NONE");
    }

    #[test]
    fn short_window_never_fires() {
        let mut candles = make_candles(&[100.0; 10]);
        candles[9].volume = 1_000_000;
        assert!(!detect(&candles).is_anomaly);
    }

    #[test]
    fn flat_identical_candles_are_clean() {
        let candles = make_ohlc_candles(&[(50.0, 50.0, 50.0, 50.0); 20]);
        assert!(!detect(&candles).is_anomaly);
    }

    #[test]
    fn volume_spike_alone() {
        let mut candles = calm();
        let last = candles.len() - 1;
        candles[last].volume = 10_000;
        let report = detect(&candles);
        assert_eq!(report.kinds, vec![AnomalyKind::VolumeSpike]);
        assert!((report.score - 0.3).abs() < 1e-12);
        assert!(report.recommended_flags.contains(&AdvisoryFlag::UseCaution));
        assert!(report.recommended_flags.contains(&AdvisoryFlag::MonitorClosely));
        assert!(report.recommended_flags.contains(&AdvisoryFlag::WaitForConfirmation));
    }

    #[test]
    fn price_spike_concatenates_kinds_and_saturates() {
        let mut closes: Vec<f64> = (0..29)
            .map(|i| 100.0 + if i % 2 == 0 { 0.0 } else { 0.3 })
            .collect();
        closes.push(115.0);
        let mut candles = make_candles(&closes);
        let last = candles.len() - 1;
        candles[last].volume = 50_000;
        let report = detect(&candles);
        assert!(report.kinds.contains(&AnomalyKind::PriceSpike));
        assert!(report.kinds.contains(&AnomalyKind::VolumeSpike));
        assert!(report.kinds.contains(&AnomalyKind::RapidMove));
        assert!((report.score - 1.0).abs() < 1e-9);
        assert!(report.type_label().starts_with("PRICE_SPIKE+VOLUME_SPIKE"));
        assert!(report.details.contains("; "));
    }

    #[test]
    fn gap_open() {
        let mut candles = calm();
        let last = candles.len() - 1;
        let prev_close = candles[last - 1].close;
        candles[last].open = prev_close + 5.0;
        candles[last].high = prev_close + 6.0;
        let report = detect(&candles);
        assert!(report.kinds.contains(&AnomalyKind::Gap));
        assert!(report.recommended_flags.contains(&AdvisoryFlag::WidenStops));
    }

    #[test]
    fn gap_through_the_low_counts() {
        // Opens at the prior close but trades far below it
        let mut candles = calm();
        let last = candles.len() - 1;
        let prev_close = candles[last - 1].close;
        candles[last].open = prev_close;
        candles[last].close = prev_close;
        candles[last].low = prev_close - 5.0;
        let report = detect(&candles);
        assert!(report.kinds.contains(&AnomalyKind::Gap));
    }

    #[test]
    fn label_serializes_as_type() {
        let mut candles = calm();
        let last = candles.len() - 1;
        candles[last].volume = 10_000;
        let json = serde_json::to_value(detect(&candles)).unwrap();
        assert_eq!(json["type"], "VOLUME_SPIKE");
        let clean = serde_json::to_value(AnomalyReport::none()).unwrap();
        assert_eq!(clean["type"], "NONE");
    }
}
