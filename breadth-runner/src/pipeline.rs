//! Breadth pipeline — prices and membership in, smoothed group rows out.
//!
//! One code path serves both run modes:
//!
//! 1. Register every sector and list with the store.
//! 2. Read each member symbol's full history up front.
//! 3. Stream symbols in parallel, each worker folding into its own
//!    aggregator; partial aggregators are reduced with `merge`.
//! 4. Pick a checkpoint per group (none for a rebuild, the latest stored
//!    row for an update) and smooth the dates after it, groups in parallel.
//! 5. Write each group's new rows in its own transaction.
//!
//! Windows are always recomputed over the full history, so an update sees
//! exactly the flags a rebuild would; only smoothing and writes are
//! restricted to dates after the checkpoint.

use std::collections::BTreeMap;
use std::time::Instant;

use breadth_core::domain::{Bar, Checkpoint, Group, GroupId, GroupKind, GroupRegistry};
use breadth_core::{
    BreadthConfig, ConfigError, GroupAggregator, MembershipError, MembershipIndex,
    OscillatorEngine, SmoothedSeries,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RunConfig;
use crate::prices::{PriceError, PriceSource};
use crate::store::{BreadthStore, SqliteStore, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Prices(#[from] PriceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error("aggregated group {0} is not registered")]
    UnknownGroup(GroupId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What a run does to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Reset the store and smooth everything from a cold start.
    FullRebuild,
    /// Keep the store and append dates after each group's checkpoint.
    Incremental,
}

/// Where smoothing starts for each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    Cold,
    FromStore,
}

impl RunMode {
    pub fn resume_policy(self) -> ResumePolicy {
        match self {
            RunMode::FullRebuild => ResumePolicy::Cold,
            RunMode::Incremental => ResumePolicy::FromStore,
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub symbols_listed: usize,
    pub symbols_processed: usize,
    pub symbols_skipped: usize,
    pub groups_registered: usize,
    pub groups_written: usize,
    pub rows_written: usize,
    pub latest_date: Option<NaiveDate>,
}

/// A member symbol with its group ids and full bar history.
struct SecurityInput {
    group_ids: Vec<GroupId>,
    bars: Vec<Bar>,
}

pub struct BreadthPipeline<'a> {
    config: &'a BreadthConfig,
    prices: &'a dyn PriceSource,
    membership: &'a MembershipIndex,
    store: &'a dyn BreadthStore,
    threads: usize,
}

impl<'a> BreadthPipeline<'a> {
    pub fn new(
        config: &'a BreadthConfig,
        prices: &'a dyn PriceSource,
        membership: &'a MembershipIndex,
        store: &'a dyn BreadthStore,
    ) -> Self {
        Self {
            config,
            prices,
            membership,
            store,
            threads: 0,
        }
    }

    /// Worker count for the private pool; 0 uses the rayon default.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn run(&self, mode: RunMode) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        self.config.validate()?;
        tracing::info!(?mode, source = %self.prices.describe(), "Starting breadth run");

        if mode == RunMode::FullRebuild {
            self.store.reset()?;
        }

        let registry = self.register_groups()?;
        let (inputs, mut summary) = self.load_inputs(&registry)?;
        summary.groups_registered = registry.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()?;

        let aggregator = pool.install(|| self.aggregate(&inputs));
        tracing::info!(
            securities = aggregator.security_count(),
            groups = aggregator.group_count(),
            cells = aggregator.cell_count(),
            "Aggregated security-days"
        );

        for group in registry.iter() {
            if aggregator.series(group.id).is_none() {
                tracing::warn!(kind = %group.kind, name = %group.name, "Group has no priced members");
            }
        }

        let groups = aggregator.into_groups();
        let checkpoints = self.checkpoints(&registry, &groups, mode.resume_policy())?;

        let engine = OscillatorEngine::from_config(self.config);
        let smoothed: Vec<(GroupId, SmoothedSeries)> = pool.install(|| {
            groups
                .par_iter()
                .map(|(gid, series)| (*gid, engine.smooth(series, checkpoints.get(gid))))
                .collect()
        });

        for (gid, series) in &smoothed {
            if series.is_empty() {
                continue;
            }
            summary.rows_written += self.store.upsert_rows(*gid, &series.rows)?;
            summary.groups_written += 1;
            if let Some(cp) = &series.checkpoint {
                summary.latest_date = summary.latest_date.max(Some(cp.date));
            }
        }

        tracing::info!(
            rows = summary.rows_written,
            groups = summary.groups_written,
            latest = ?summary.latest_date,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Breadth run complete"
        );
        Ok(summary)
    }

    /// Sectors first, then lists, each in name order.
    fn register_groups(&self) -> Result<GroupRegistry, PipelineError> {
        let mut registry = GroupRegistry::new();
        let sectors = self.membership.all_sectors().iter().map(|n| (GroupKind::Sector, n));
        let lists = self.membership.all_lists().iter().map(|n| (GroupKind::List, n));
        for (kind, name) in sectors.chain(lists) {
            let id = self.store.ensure_group(kind, name)?;
            registry.insert(Group {
                id,
                kind,
                name: name.clone(),
            });
        }
        tracing::info!(groups = registry.len(), "Registered groups");
        Ok(registry)
    }

    fn load_inputs(
        &self,
        registry: &GroupRegistry,
    ) -> Result<(Vec<SecurityInput>, RunSummary), PipelineError> {
        let symbols = self.prices.symbols()?;
        let mut summary = RunSummary {
            symbols_listed: symbols.len(),
            ..RunSummary::default()
        };

        let mut inputs = Vec::new();
        for symbol in &symbols {
            let group_ids = self.membership.group_ids(symbol, registry);
            if group_ids.is_empty() {
                tracing::debug!(%symbol, "No membership, skipping");
                summary.symbols_skipped += 1;
                continue;
            }
            let bars = self.prices.bars(symbol)?;
            if bars.is_empty() {
                tracing::debug!(%symbol, "No price history, skipping");
                summary.symbols_skipped += 1;
                continue;
            }
            inputs.push(SecurityInput { group_ids, bars });
        }
        summary.symbols_processed = inputs.len();

        tracing::info!(
            listed = summary.symbols_listed,
            processed = summary.symbols_processed,
            skipped = summary.symbols_skipped,
            "Loaded price histories"
        );
        Ok((inputs, summary))
    }

    fn aggregate(&self, inputs: &[SecurityInput]) -> GroupAggregator {
        let config = self.config;
        inputs
            .par_iter()
            .fold(
                || GroupAggregator::for_config(config),
                |mut agg, input| {
                    agg.add_security(config, &input.group_ids, &input.bars);
                    agg
                },
            )
            .reduce(|| GroupAggregator::for_config(config), GroupAggregator::merge)
    }

    fn checkpoints(
        &self,
        registry: &GroupRegistry,
        groups: &BTreeMap<GroupId, breadth_core::GroupSeries>,
        policy: ResumePolicy,
    ) -> Result<BTreeMap<GroupId, Checkpoint>, PipelineError> {
        let mut checkpoints = BTreeMap::new();
        for gid in groups.keys() {
            if !registry.contains(*gid) {
                return Err(PipelineError::UnknownGroup(*gid));
            }
            if policy == ResumePolicy::FromStore {
                if let Some(cp) = self.store.latest_checkpoint(*gid)? {
                    checkpoints.insert(*gid, cp);
                }
            }
        }
        Ok(checkpoints)
    }
}

/// Open everything a [`RunConfig`] names and run once.
///
/// A full rebuild opens the store without checking its layout and lets the
/// run's reset recreate the tables, so it also succeeds after the configured
/// moving-average windows change.
pub fn run_with_config(config: &RunConfig, mode: RunMode) -> Result<RunSummary, PipelineError> {
    config.engine.validate()?;
    let membership = MembershipIndex::from_file(&config.membership)?;
    let prices = config.prices.open()?;

    if let Some(parent) = config.store.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = match mode {
        RunMode::FullRebuild => {
            SqliteStore::open_for_rebuild(&config.store, &config.engine.ma_windows)?
        }
        RunMode::Incremental => SqliteStore::open(&config.store, &config.engine.ma_windows)?,
    };

    BreadthPipeline::new(&config.engine, prices.as_ref(), &membership, &store)
        .with_threads(config.threads)
        .run(mode)
}
