//! Run configuration: where prices, membership and the store live.

use std::path::{Path, PathBuf};

use breadth_core::{BreadthConfig, ConfigError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prices::{CsvPrices, PriceError, PriceSource, SqlitePrices};

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("read run config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse run config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Engine(#[from] ConfigError),
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PriceSourceConfig {
    /// SQLite database with a `prices` table.
    Sqlite { path: PathBuf },
    /// Directory of `<SYMBOL>.csv` files.
    Csv { dir: PathBuf },
}

impl PriceSourceConfig {
    pub fn open(&self) -> Result<Box<dyn PriceSource>, PriceError> {
        Ok(match self {
            PriceSourceConfig::Sqlite { path } => Box::new(SqlitePrices::open(path)?),
            PriceSourceConfig::Csv { dir } => Box::new(CsvPrices::open(dir)?),
        })
    }

    fn rebase(&mut self, base: &Path) {
        match self {
            PriceSourceConfig::Sqlite { path } => *path = rebase(base, path),
            PriceSourceConfig::Csv { dir } => *dir = rebase(base, dir),
        }
    }
}

/// Full job configuration.
///
/// ```toml
/// membership = "membership.toml"
/// store = "breadth.db"
/// threads = 0
///
/// [prices]
/// type = "sqlite"
/// path = "prices.db"
///
/// [engine]
/// ma_windows = [5, 10, 20, 50, 200]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub membership: PathBuf,
    pub store: PathBuf,
    /// Worker threads for aggregation; 0 uses the rayon default.
    #[serde(default)]
    pub threads: usize,
    pub prices: PriceSourceConfig,
    #[serde(default)]
    pub engine: BreadthConfig,
}

impl RunConfig {
    /// Load from a file. Relative paths inside are taken relative to the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, RunConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, RunConfigError> {
        let config: Self = toml::from_str(content)?;
        config.engine.validate()?;
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        self.prices.rebase(base);
        self.membership = rebase(base, &self.membership);
        self.store = rebase(base, &self.store);
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
