//! Candlecast Core: candle analysis pipeline.
//!
//! This crate turns an ordered window of OHLCV candles into a directional
//! prediction with explanations and risk parameters:
//! - Domain types (candles, intervals, directions, trade signals)
//! - Indicator engine with a TTL cache swept by a background janitor
//! - Market regime classifier and anomaly detector
//! - Candle pattern and price/oscillator divergence detection
//! - Regime-adaptive indicator parameters (one explicit feedback pass)
//! - Multi-factor prediction scorer and risk/position sizing
//!
//! Every analysis stage is infallible and performs no I/O.

pub mod adaptive;
pub mod anomaly;
pub mod config;
pub mod domain;
pub mod indicators;
pub mod patterns;
pub mod pipeline;
pub mod regime;
pub mod risk;
pub mod rng;
pub mod scorer;
pub mod source;

pub use config::{AccountParams, ConfigError, IndicatorConfig};
pub use pipeline::{predict, AnalysisPipeline, Prediction};
