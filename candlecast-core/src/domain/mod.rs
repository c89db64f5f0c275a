//! Domain types for candlecast

pub mod candle;
pub mod interval;
pub mod signal;
pub mod synthetic;

pub use candle::{aggregate, is_ascending, resample, Candle};
pub use interval::{median_spacing_secs, Interval, ParseIntervalError};
pub use signal::{Bias, Confidence, Direction, TradeSignal};
pub use synthetic::synthetic_candles;

/// Symbol type alias
pub type Symbol = String;
