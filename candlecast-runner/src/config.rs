//! Run configuration loaded from TOML.
//!
//! Every section is optional and falls back to defaults:
//!
//! ```toml
//! [indicators]
//! rsi_period = 14
//! adaptive_indicators = true
//!
//! [account]
//! account_size = 10000.0
//! risk_per_trade = 0.01
//!
//! [backtest]
//! window_size = 100
//! mtf_factors = [4]
//!
//! [monte_carlo]
//! runs = 1000
//! seed = 42
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use candlecast_core::config::{AccountParams, ConfigError as CoreConfigError, IndicatorConfig};

/// Content hash of a run configuration.
pub type RunId = String;

/// Errors from configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Analysis(#[from] CoreConfigError),
    #[error("backtest window_size must be >= {min}, got {value}")]
    WindowTooSmall { min: usize, value: usize },
    #[error("backtest initial_balance must be positive, got {0}")]
    InitialBalance(f64),
    #[error("mtf factor must be >= 2, got {0}")]
    MtfFactor(usize),
    #[error("monte carlo runs must be >= 1")]
    NoRuns,
}

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Backtest replay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    /// Candles per analysis window.
    pub window_size: usize,
    pub initial_balance: f64,
    /// Higher timeframes synthesized by resampling, as multiples of the
    /// base interval.
    pub mtf_factors: Vec<usize>,
    /// Exit at the suggestion's stop or target when the next candle
    /// reaches it.
    pub enforce_stops: bool,
    /// Non-HIGH predictions below this |score| are skipped.
    pub min_abs_score: f64,
    /// CHOPPY regimes stronger than this are skipped.
    pub max_choppy_strength: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            window_size: 100,
            initial_balance: 10_000.0,
            mtf_factors: vec![4],
            enforce_stops: true,
            min_abs_score: 0.3,
            max_choppy_strength: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub runs: usize,
    pub seed: u64,
    /// Defaults to the backtest's initial balance.
    pub starting_balance: Option<f64>,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            runs: 1000,
            seed: 42,
            starting_balance: None,
        }
    }
}

/// Everything one backtest + simulation run needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub indicators: IndicatorConfig,
    pub account: AccountParams,
    pub backtest: BacktestSettings,
    pub monte_carlo: MonteCarloSettings,
}

/// Smallest window the analysis stages produce meaningful output for.
pub const MIN_WINDOW: usize = 20;

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, LoadError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators.validate()?;
        self.account.validate()?;
        let bt = &self.backtest;
        if bt.window_size < MIN_WINDOW {
            return Err(ConfigError::WindowTooSmall {
                min: MIN_WINDOW,
                value: bt.window_size,
            });
        }
        if !(bt.initial_balance.is_finite() && bt.initial_balance > 0.0) {
            return Err(ConfigError::InitialBalance(bt.initial_balance));
        }
        if let Some(&bad) = bt.mtf_factors.iter().find(|f| **f < 2) {
            return Err(ConfigError::MtfFactor(bad));
        }
        if self.monte_carlo.runs == 0 {
            return Err(ConfigError::NoRuns);
        }
        Ok(())
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.backtest.window_size, 100);
        assert_eq!(config.monte_carlo.runs, 1000);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = RunConfig::from_toml_str(
            r#"
            [indicators]
            rsi_period = 9

            [backtest]
            window_size = 60
            mtf_factors = [4, 24]
            "#,
        )
        .unwrap();
        assert_eq!(config.indicators.rsi_period, 9);
        assert_eq!(config.indicators.macd_slow, 26);
        assert_eq!(config.backtest.window_size, 60);
        assert_eq!(config.backtest.mtf_factors, vec![4, 24]);
        assert!(config.backtest.enforce_stops);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = RunConfig::from_toml_str("[backtest]\nwindow_size = 5").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Invalid(ConfigError::WindowTooSmall { value: 5, .. })
        ));

        let err = RunConfig::from_toml_str("[indicators]\nmacd_fast = 30").unwrap_err();
        assert!(matches!(err, LoadError::Invalid(ConfigError::Analysis(_))));

        let err = RunConfig::from_toml_str("[backtest]\nmtf_factors = [1]").unwrap_err();
        assert!(matches!(err, LoadError::Invalid(ConfigError::MtfFactor(1))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = RunConfig::from_toml_str("[backtest\n").unwrap_err();
        assert!(matches!(err, LoadError::Toml(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[monte_carlo]\nruns = 50\nseed = 7\n").unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.monte_carlo.runs, 50);
        assert_eq!(config.monte_carlo.seed, 7);

        let missing = RunConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, LoadError::Io { .. }));
    }

    #[test]
    fn run_id_is_deterministic_and_sensitive() {
        let a = RunConfig::default();
        let mut b = a.clone();
        assert_eq!(a.run_id(), b.run_id());
        b.indicators.rsi_period = 21;
        assert_ne!(a.run_id(), b.run_id());
    }
}
