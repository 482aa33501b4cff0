//! Bar — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single symbol.
///
/// Prices are assumed to be adjusted upstream. Volume is kept as `f64` because
/// providers deliver both share counts and fractional volumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// True when the bar has a non-degenerate intraday range.
    pub fn has_range(&self) -> bool {
        self.high > self.low
    }
}
