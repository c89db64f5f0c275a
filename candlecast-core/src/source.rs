//! Candle source boundary.
//!
//! The core never performs I/O; callers implement [`CandleSource`] over
//! their market-data provider and hand the candles in. Failures propagate
//! unchanged and are never retried here.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{Candle, Interval};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no data for {symbol} at {interval}")]
    NotFound { symbol: String, interval: Interval },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row {row} in {path}: {message}")]
    Malformed {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("provider error: {0}")]
    Provider(String),
}

/// Market-data collaborator. Candles come back oldest first.
pub trait CandleSource {
    /// The most recent `count` candles.
    fn candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, SourceError>;

    /// Every candle within the last `days` days of available history.
    fn historical_candles(
        &self,
        symbol: &str,
        interval: Interval,
        days: u32,
    ) -> Result<Vec<Candle>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Candle>);

    impl CandleSource for Fixed {
        fn candles(&self, _: &str, _: Interval, count: usize) -> Result<Vec<Candle>, SourceError> {
            Ok(self.0[self.0.len().saturating_sub(count)..].to_vec())
        }

        fn historical_candles(&self, symbol: &str, interval: Interval, _: u32) -> Result<Vec<Candle>, SourceError> {
            Err(SourceError::NotFound {
                symbol: symbol.to_string(),
                interval,
            })
        }
    }

    #[test]
    fn trait_object_usable() {
        let source: Box<dyn CandleSource> =
            Box::new(Fixed(crate::indicators::make_candles(&[1.0, 2.0, 3.0])));
        assert_eq!(source.candles("X", Interval::H1, 2).unwrap().len(), 2);
        let err = source.historical_candles("X", Interval::D1, 30).unwrap_err();
        assert_eq!(err.to_string(), "no data for X at 1d");
    }
}
