//! Deterministic synthetic market for benches, tests and demos.
//!
//! A master seed is expanded into per-symbol sub-seeds via BLAKE3, so each
//! symbol's random walk is identical regardless of generation order or
//! thread count.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::Bar;
use crate::membership::{MembershipError, MembershipFile, MembershipIndex};

#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    master_seed: u64,
    start: NaiveDate,
    days: usize,
}

impl SyntheticMarket {
    pub fn new(master_seed: u64, start: NaiveDate, days: usize) -> Self {
        Self {
            master_seed,
            start,
            days,
        }
    }

    /// Derive a deterministic sub-seed for a symbol.
    pub fn sub_seed(&self, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Weekday trading calendar starting at `start`.
    pub fn trading_days(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(self.days);
        let mut date = self.start;
        while dates.len() < self.days {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(date);
            }
            date += chrono::Duration::days(1);
        }
        dates
    }

    /// Random-walk bars for one symbol over the whole calendar.
    pub fn bars_for(&self, symbol: &str) -> Vec<Bar> {
        let mut rng = StdRng::seed_from_u64(self.sub_seed(symbol));
        let mut close: f64 = rng.gen_range(20.0..200.0);
        let base_volume: f64 = rng.gen_range(100_000.0..2_000_000.0);

        self.trading_days()
            .into_iter()
            .map(|date| {
                let open = close;
                let ret: f64 = rng.gen_range(-0.03..0.03);
                close = (open * (1.0 + ret)).max(1.0);
                let wick_up: f64 = rng.gen_range(0.0..0.01);
                let wick_down: f64 = rng.gen_range(0.0..0.01);
                let high = open.max(close) * (1.0 + wick_up);
                let low = open.min(close) * (1.0 - wick_down);
                let volume = (base_volume * rng.gen_range(0.5..2.0)).round();
                Bar {
                    symbol: symbol.to_string(),
                    date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                }
            })
            .collect()
    }

    /// Symbols `SYN0000..` spread round-robin over `sectors` sectors, with
    /// every third symbol also on a "Watchlist" list and every fifth on
    /// "Momentum".
    pub fn universe(
        symbol_count: usize,
        sectors: usize,
    ) -> Result<(Vec<String>, MembershipIndex), MembershipError> {
        let sectors = sectors.max(1);
        let symbols: Vec<String> = (0..symbol_count).map(|i| format!("SYN{i:04}")).collect();
        let mut file = MembershipFile::default();
        for (i, symbol) in symbols.iter().enumerate() {
            file.sectors
                .entry(format!("Sector{:02}", i % sectors))
                .or_default()
                .push(symbol.clone());
            if i % 3 == 0 {
                file.lists.entry("Watchlist".into()).or_default().push(symbol.clone());
            }
            if i % 5 == 0 {
                file.lists.entry("Momentum".into()).or_default().push(symbol.clone());
            }
        }
        let membership = MembershipIndex::from_parts(&file)?;
        Ok((symbols, membership))
    }
}
