//! Deterministic synthetic candles for development, tests, and benches.
//!
//! Produces a random walk from a starting price of 100.0. The walk is seeded
//! from a BLAKE3 hash of the label, so the same label always yields the same
//! series.

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Candle, Interval};

/// Generate `count` synthetic candles spaced by `interval`.
///
/// `drift` is the mean per-candle return (e.g. 0.001 = +0.1%); per-candle
/// noise is uniform in ±2%.
pub fn synthetic_candles(label: &str, count: usize, interval: Interval, drift: f64) -> Vec<Candle> {
    let seed: [u8; 32] = *blake3::hash(label.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let start: DateTime<Utc> = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default();

    let mut candles = Vec::with_capacity(count);
    let mut price = 100.0_f64;

    for i in 0..count {
        let ret: f64 = drift + rng.gen_range(-0.02..0.02);
        let open = price;
        let close = (price * (1.0 + ret)).max(0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        candles.push(Candle {
            timestamp: start + interval.duration() * i as i32,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
    }

    candles
}
