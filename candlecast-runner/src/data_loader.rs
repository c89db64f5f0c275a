//! CSV candle loading.
//!
//! [`CsvCandleSource`] serves candles from a directory of files named
//! `{SYMBOL}_{interval}.csv` (e.g. `BTCUSDT_1h.csv`). Each file has the
//! header `timestamp,open,high,low,close,volume`; timestamps are RFC 3339
//! strings or epoch milliseconds. Rows are returned sorted oldest first
//! with duplicate timestamps collapsed to the last row read.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use candlecast_core::domain::{Candle, Interval};
use candlecast_core::source::{CandleSource, SourceError};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse an RFC 3339 timestamp or integer epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let millis: i64 = raw.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Read every candle in `path`.
pub fn load_csv(path: &Path) -> Result<Vec<Candle>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut candles = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        // Line 1 is the header
        let line = i + 2;
        let row = row.map_err(|e| SourceError::Malformed {
            path: path.to_path_buf(),
            row: line,
            message: e.to_string(),
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| SourceError::Malformed {
            path: path.to_path_buf(),
            row: line,
            message: format!("unparseable timestamp '{}'", row.timestamp),
        })?;
        let candle = Candle::new(
            timestamp,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume.max(0.0).round() as u64,
        );
        if !candle.is_sane() {
            warn!(path = %path.display(), row = line, "inconsistent OHLC row");
        }
        candles.push(candle);
    }

    candles.sort_by_key(|c| c.timestamp);
    let before = candles.len();
    // Keep the last row for each timestamp
    candles.reverse();
    candles.dedup_by_key(|c| c.timestamp);
    candles.reverse();
    if candles.len() < before {
        debug!(path = %path.display(), dropped = before - candles.len(), "duplicate timestamps collapsed");
    }
    Ok(candles)
}

/// Fingerprint of a candle series (BLAKE3 over every field).
pub fn dataset_hash(candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in candles {
        hasher.update(&c.timestamp.timestamp_millis().to_le_bytes());
        for v in [c.open, c.high, c.low, c.close] {
            hasher.update(&v.to_le_bytes());
        }
        hasher.update(&c.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// File-backed [`CandleSource`].
#[derive(Debug, Clone)]
pub struct CsvCandleSource {
    dir: PathBuf,
}

impl CsvCandleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.dir.join(format!("{}_{}.csv", symbol.to_uppercase(), interval))
    }

    fn load(&self, symbol: &str, interval: Interval) -> Result<Vec<Candle>, SourceError> {
        let path = self.path_for(symbol, interval);
        if !path.exists() {
            return Err(SourceError::NotFound {
                symbol: symbol.to_string(),
                interval,
            });
        }
        load_csv(&path)
    }
}

impl CandleSource for CsvCandleSource {
    fn candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let mut candles = self.load(symbol, interval)?;
        let skip = candles.len().saturating_sub(count);
        candles.drain(..skip);
        Ok(candles)
    }

    fn historical_candles(
        &self,
        symbol: &str,
        interval: Interval,
        days: u32,
    ) -> Result<Vec<Candle>, SourceError> {
        let mut candles = self.load(symbol, interval)?;
        if let Some(last) = candles.last().map(|c| c.timestamp) {
            let cutoff = last - Duration::days(i64::from(days));
            candles.retain(|c| c.timestamp >= cutoff);
        }
        Ok(candles)
    }
}
