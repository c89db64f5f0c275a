//! Strongly-typed configuration value objects supplied by the caller.
//!
//! The core never loads configuration itself; the runner deserializes these
//! from TOML and hands them in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be >= {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },
    #[error("MACD fast period ({fast}) must be shorter than slow period ({slow})")]
    MacdOrdering { fast: usize, slow: usize },
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("risk per trade must be in (0, 1), got {0}")]
    RiskOutOfRange(f64),
}

/// Indicator periods and flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub ema_period: usize,
    pub adx_period: usize,
    pub atr_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    /// Let the adaptive controller rewrite periods per market regime.
    pub adaptive_indicators: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            ema_period: 20,
            adx_period: 14,
            atr_period: 14,
            stoch_k_period: 14,
            stoch_d_period: 3,
            adaptive_indicators: true,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bb_period", self.bb_period),
            ("ema_period", self.ema_period),
            ("adx_period", self.adx_period),
            ("atr_period", self.atr_period),
            ("stoch_k_period", self.stoch_k_period),
            ("stoch_d_period", self.stoch_d_period),
        ];
        for (field, value) in periods {
            if value < 1 {
                return Err(ConfigError::TooSmall {
                    field,
                    min: 1,
                    value,
                });
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ConfigError::MacdOrdering {
                fast: self.macd_fast,
                slow: self.macd_slow,
            });
        }
        if !(self.bb_std_dev.is_finite() && self.bb_std_dev > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "bb_std_dev",
                value: self.bb_std_dev,
            });
        }
        Ok(())
    }
}

/// Account parameters for position sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountParams {
    pub account_size: f64,
    /// Fraction of the account risked per trade (0.01 = 1%).
    pub risk_per_trade: f64,
}

impl Default for AccountParams {
    fn default() -> Self {
        Self {
            account_size: 10_000.0,
            risk_per_trade: 0.01,
        }
    }
}

impl AccountParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.account_size.is_finite() && self.account_size > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "account_size",
                value: self.account_size,
            });
        }
        if !(self.risk_per_trade > 0.0 && self.risk_per_trade < 1.0) {
            return Err(ConfigError::RiskOutOfRange(self.risk_per_trade));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(IndicatorConfig::default().validate().is_ok());
        assert!(AccountParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_macd() {
        let cfg = IndicatorConfig {
            macd_fast: 26,
            macd_slow: 12,
            ..IndicatorConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::MacdOrdering { fast: 26, slow: 12 })
        );
    }

    #[test]
    fn rejects_zero_period() {
        let cfg = IndicatorConfig {
            rsi_period: 0,
            ..IndicatorConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooSmall {
                field: "rsi_period",
                ..
            })
        ));
    }

    #[test]
    fn rejects_out_of_range_risk() {
        let acct = AccountParams {
            risk_per_trade: 1.5,
            ..AccountParams::default()
        };
        assert_eq!(acct.validate(), Err(ConfigError::RiskOutOfRange(1.5)));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: IndicatorConfig = serde_json::from_str(r#"{"rsi_period": 7}"#).unwrap();
        assert_eq!(cfg.rsi_period, 7);
        assert_eq!(cfg.macd_slow, 26);
    }
}
