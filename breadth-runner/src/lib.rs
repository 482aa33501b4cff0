//! Breadth Runner — price sources, the breadth store, and the run pipeline.
//!
//! This crate builds on `breadth-core` to provide:
//! - Price sources (SQLite `prices` table, CSV directory, in-memory)
//! - The breadth store (SQLite via rusqlite, plus an in-memory twin)
//! - Run configuration loaded from TOML
//! - The pipeline that turns prices and membership into smoothed group rows,
//!   as a full rebuild or an incremental update

pub mod config;
pub mod pipeline;
pub mod prices;
pub mod store;

pub use config::{PriceSourceConfig, RunConfig, RunConfigError};
pub use pipeline::{
    run_with_config, BreadthPipeline, PipelineError, ResumePolicy, RunMode, RunSummary,
};
pub use prices::{CsvPrices, MemoryPrices, PriceError, PriceSource, SqlitePrices};
pub use store::{BreadthStore, MemoryStore, SqliteStore, StoreError};
