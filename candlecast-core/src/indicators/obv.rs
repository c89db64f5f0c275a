//! On-Balance Volume (OBV).
//!
//! OBV[0] = volume[0]; afterwards volume is added on an up close, subtracted
//! on a down close, and ignored on an unchanged close.

use crate::domain::Candle;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Obv {
    name: String,
}

impl Obv {
    pub fn new() -> Self {
        Self {
            name: "obv".to_string(),
        }
    }
}

impl Default for Obv {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Obv {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut result = Vec::with_capacity(candles.len());
        let Some(first) = candles.first() else {
            return result;
        };
        let mut obv = first.volume as f64;
        result.push(obv);
        for pair in candles.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            if curr.close > prev.close {
                obv += curr.volume as f64;
            } else if curr.close < prev.close {
                obv -= curr.volume as f64;
            }
            result.push(obv);
        }
        result
    }
}
