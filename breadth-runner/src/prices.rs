//! Price sources — read-only per-symbol daily bar histories.
//!
//! Three backends share the [`PriceSource`] trait:
//! - a SQLite database with a `prices(symbol, date, open, high, low, close, volume)` table
//! - a directory holding one `<SYMBOL>.csv` per symbol
//! - an in-memory map (tests, synthetic runs)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use breadth_core::domain::Bar;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("price CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("price I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid price source: {0}")]
    InvalidSource(String),
}

/// Read-only access to daily bars.
pub trait PriceSource: Send + Sync {
    /// Every symbol with at least one row, sorted.
    fn symbols(&self) -> Result<Vec<String>, PriceError>;

    /// Bars of one symbol in ascending date order. Unknown symbols yield an
    /// empty vector.
    fn bars(&self, symbol: &str) -> Result<Vec<Bar>, PriceError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

// ─── SQLite ─────────────────────────────────────────────────────────

/// `prices` table in a SQLite database, opened read-only.
pub struct SqlitePrices {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqlitePrices {
    pub fn open(path: &Path) -> Result<Self, PriceError> {
        if !path.exists() {
            return Err(PriceError::InvalidSource(format!(
                "price database {} does not exist",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }
}

impl PriceSource for SqlitePrices {
    fn symbols(&self) -> Result<Vec<String>, PriceError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT symbol FROM prices ORDER BY symbol")?;
        let symbols = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(symbols)
    }

    fn bars(&self, symbol: &str) -> Result<Vec<Bar>, PriceError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date, open, high, low, close, volume
             FROM prices
             WHERE symbol = ?1
             ORDER BY date",
        )?;
        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok((
                    row.get::<_, NaiveDate>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        // Rows without a close carry no information and are dropped.
        Ok(rows
            .into_iter()
            .filter_map(|(date, open, high, low, close, volume)| {
                let close = close?;
                Some(Bar {
                    symbol: symbol.to_string(),
                    date,
                    open: open.unwrap_or(close),
                    high: high.unwrap_or(close),
                    low: low.unwrap_or(close),
                    close,
                    volume: volume.unwrap_or(0.0),
                })
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

// ─── CSV directory ──────────────────────────────────────────────────

/// One CSV row: `date,open,high,low,close,volume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CsvBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Directory of `<SYMBOL>.csv` files.
pub struct CsvPrices {
    dir: PathBuf,
}

impl CsvPrices {
    pub fn open(dir: &Path) -> Result<Self, PriceError> {
        if !dir.is_dir() {
            return Err(PriceError::InvalidSource(format!(
                "price directory {} does not exist",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Write (or overwrite) one symbol's file.
    pub fn write_symbol(dir: &Path, symbol: &str, bars: &[Bar]) -> Result<(), PriceError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{symbol}.csv"));
        let csv_err = |source: csv::Error| PriceError::Csv {
            path: path.clone(),
            source,
        };
        let mut wtr = csv::Writer::from_path(&path).map_err(csv_err)?;
        for bar in bars {
            wtr.serialize(CsvBar {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
            .map_err(csv_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl PriceSource for CsvPrices {
    fn symbols(&self) -> Result<Vec<String>, PriceError> {
        let mut symbols = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    fn bars(&self, symbol: &str) -> Result<Vec<Bar>, PriceError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let csv_err = |source: csv::Error| PriceError::Csv {
            path: path.clone(),
            source,
        };
        let mut rdr = csv::Reader::from_path(&path).map_err(csv_err)?;
        let mut bars = Vec::new();
        for record in rdr.deserialize::<CsvBar>() {
            let r = record.map_err(csv_err)?;
            bars.push(Bar {
                symbol: symbol.to_string(),
                date: r.date,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.dir.display())
    }
}

// ─── Memory ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryPrices {
    bars: BTreeMap<String, Vec<Bar>>,
}

impl MemoryPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a symbol's history. Bars are sorted by date.
    pub fn insert(&mut self, symbol: &str, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.date);
        self.bars.insert(symbol.to_string(), bars);
    }

    /// Keep only bars on or before `date`.
    pub fn truncated(&self, date: NaiveDate) -> Self {
        let bars = self
            .bars
            .iter()
            .map(|(s, bars)| {
                let kept: Vec<Bar> = bars.iter().filter(|b| b.date <= date).cloned().collect();
                (s.clone(), kept)
            })
            .filter(|(_, bars)| !bars.is_empty())
            .collect();
        Self { bars }
    }
}

impl PriceSource for MemoryPrices {
    fn symbols(&self) -> Result<Vec<String>, PriceError> {
        Ok(self
            .bars
            .iter()
            .filter(|(_, bars)| !bars.is_empty())
            .map(|(s, _)| s.clone())
            .collect())
    }

    fn bars(&self, symbol: &str) -> Result<Vec<Bar>, PriceError> {
        Ok(self.bars.get(symbol).cloned().unwrap_or_default())
    }

    fn describe(&self) -> String {
        format!("memory:{} symbols", self.bars.len())
    }
}
