//! Breadth CLI — build, update and inspect the breadth store.
//!
//! Commands:
//! - `rebuild` — reset the store and recompute every group from scratch
//! - `update` — append dates after each group's latest stored row
//! - `latest` — print every group's row on the most recent date
//! - `series` — print one group's full history
//! - `groups` — list known groups
//! - `synth` — write a synthetic price directory, membership and config

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use breadth_core::domain::{BreadthRow, Group, GroupKind};
use breadth_core::synthetic::SyntheticMarket;
use breadth_core::BreadthConfig;
use breadth_runner::{
    run_with_config, BreadthStore, CsvPrices, PriceSourceConfig, RunConfig, RunMode,
    RunSummary, SqliteStore,
};

#[derive(Parser)]
#[command(name = "breadth", about = "Breadth CLI — market breadth and McClellan oscillator per group")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the run config TOML.
    #[arg(long, default_value = "breadth.toml")]
    config: PathBuf,

    /// Override the store database path.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Override the membership TOML path.
    #[arg(long)]
    membership: Option<PathBuf>,

    /// Read prices from this SQLite database instead.
    #[arg(long, conflicts_with = "prices_csv")]
    prices_sqlite: Option<PathBuf>,

    /// Read prices from this CSV directory instead.
    #[arg(long)]
    prices_csv: Option<PathBuf>,

    /// Worker threads (0 = one per core).
    #[arg(long)]
    threads: Option<usize>,
}

impl ConfigArgs {
    fn load(&self) -> Result<RunConfig> {
        let mut config = RunConfig::from_file(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;
        if let Some(store) = &self.store {
            config.store = store.clone();
        }
        if let Some(membership) = &self.membership {
            config.membership = membership.clone();
        }
        if let Some(path) = &self.prices_sqlite {
            config.prices = PriceSourceConfig::Sqlite { path: path.clone() };
        }
        if let Some(dir) = &self.prices_csv {
            config.prices = PriceSourceConfig::Csv { dir: dir.clone() };
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        Ok(config)
    }

    fn open_store(&self) -> Result<(RunConfig, SqliteStore)> {
        let config = self.load()?;
        if !config.store.exists() {
            bail!("store {} does not exist; run `breadth rebuild` first", config.store.display());
        }
        let store = SqliteStore::open(&config.store, &config.engine.ma_windows)
            .with_context(|| format!("failed to open store {}", config.store.display()))?;
        Ok((config, store))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the store and recompute all groups from the full price history.
    Rebuild {
        #[command(flatten)]
        args: ConfigArgs,
    },
    /// Smooth and store only dates after each group's latest row.
    Update {
        #[command(flatten)]
        args: ConfigArgs,
    },
    /// Print every group's row on the most recent stored date.
    Latest {
        #[command(flatten)]
        args: ConfigArgs,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the stored history of one group.
    Series {
        #[command(flatten)]
        args: ConfigArgs,

        /// Group name.
        #[arg(long)]
        group: String,

        /// Group kind: sector or list.
        #[arg(long, default_value = "sector")]
        kind: GroupKind,

        /// Only the last N rows.
        #[arg(long)]
        tail: Option<usize>,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List groups known to the store.
    Groups {
        #[command(flatten)]
        args: ConfigArgs,
    },
    /// Write a synthetic market: CSV prices, membership and a run config.
    Synth {
        /// Output directory.
        #[arg(long, default_value = "synth")]
        out: PathBuf,

        /// Number of symbols.
        #[arg(long, default_value_t = 200)]
        symbols: usize,

        /// Number of sectors.
        #[arg(long, default_value_t = 11)]
        sectors: usize,

        /// Trading days per symbol.
        #[arg(long, default_value_t = 504)]
        days: usize,

        /// Master seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// First calendar date (YYYY-MM-DD).
        #[arg(long, default_value = "2022-01-03")]
        start: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("breadth=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rebuild { args } => run_pipeline(&args, RunMode::FullRebuild),
        Commands::Update { args } => run_pipeline(&args, RunMode::Incremental),
        Commands::Latest { args, json } => run_latest(&args, json),
        Commands::Series {
            args,
            group,
            kind,
            tail,
            json,
        } => run_series(&args, kind, &group, tail, json),
        Commands::Groups { args } => run_groups(&args),
        Commands::Synth {
            out,
            symbols,
            sectors,
            days,
            seed,
            start,
        } => run_synth(&out, symbols, sectors, days, seed, &start),
    }
}

fn run_pipeline(args: &ConfigArgs, mode: RunMode) -> Result<()> {
    let config = args.load()?;
    let summary = run_with_config(&config, mode).context("breadth run failed")?;
    print_summary(mode, &summary);
    Ok(())
}

fn print_summary(mode: RunMode, summary: &RunSummary) {
    let label = match mode {
        RunMode::FullRebuild => "Rebuild",
        RunMode::Incremental => "Update",
    };
    println!("{label} complete");
    println!(
        "  symbols:  {} listed, {} processed, {} skipped",
        summary.symbols_listed, summary.symbols_processed, summary.symbols_skipped
    );
    println!(
        "  groups:   {} registered, {} written",
        summary.groups_registered, summary.groups_written
    );
    println!("  rows:     {}", summary.rows_written);
    match summary.latest_date {
        Some(date) => println!("  latest:   {date}"),
        None => println!("  latest:   (no new dates)"),
    }
}

fn run_latest(args: &ConfigArgs, json: bool) -> Result<()> {
    let (config, store) = args.open_store()?;
    let snapshot = store.latest_snapshot()?;

    if json {
        let out: Vec<serde_json::Value> = snapshot
            .iter()
            .map(|(group, row)| serde_json::json!({ "group": group, "row": row }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let Some((_, first)) = snapshot.first() else {
        println!("Store is empty.");
        return Ok(());
    };
    println!("Breadth on {}", first.date);
    println!("{}", header(&config.engine, "group"));
    for (group, row) in &snapshot {
        println!("{}", format_row(&format!("{}:{}", group.kind, group.name), row));
    }
    Ok(())
}

fn run_series(
    args: &ConfigArgs,
    kind: GroupKind,
    name: &str,
    tail: Option<usize>,
    json: bool,
) -> Result<()> {
    let (config, store) = args.open_store()?;
    let group = find_group(&store.groups()?, kind, name)?;
    let mut rows = store.rows_for_group(group.id)?;
    if let Some(n) = tail {
        let skip = rows.len().saturating_sub(n);
        rows.drain(..skip);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{} {} ({} rows)", group.kind, group.name, rows.len());
    println!("{}", header(&config.engine, "date"));
    for row in &rows {
        println!("{}", format_row(&row.date.to_string(), row));
    }
    Ok(())
}

fn find_group(groups: &[Group], kind: GroupKind, name: &str) -> Result<Group> {
    match groups.iter().find(|g| g.kind == kind && g.name == name) {
        Some(group) => Ok(group.clone()),
        None => bail!("no {kind} named '{name}' in the store"),
    }
}

fn run_groups(args: &ConfigArgs) -> Result<()> {
    let (_, store) = args.open_store()?;
    for group in store.groups()? {
        println!("{:>4}  {:<6}  {}", group.id.0, group.kind.as_str(), group.name);
    }
    Ok(())
}

fn header(engine: &BreadthConfig, first: &str) -> String {
    let ma: String = engine
        .ma_labels()
        .iter()
        .map(|l| format!(" {:>9}", l.trim_start_matches("above_")))
        .collect();
    format!(
        "{first:<24} {:>6} {:>5} {:>5} {:>5} {:>5}{ma} {:>5} {:>5} {:>6} {:>10}",
        "total", "adv", "dec", "nh", "nl", "spk+", "spk-", "ad", "mcclellan"
    )
}

fn format_row(label: &str, row: &BreadthRow) -> String {
    let c = &row.counters;
    let ma: String = c.above_ma.iter().map(|n| format!(" {n:>9}")).collect();
    let mcclellan = row
        .mcclellan
        .map(|m| format!("{m:.3}"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{label:<24} {:>6} {:>5} {:>5} {:>5} {:>5}{ma} {:>5} {:>5} {:>6} {:>10}",
        c.total, c.adv, c.dec, c.new_high_52w, c.new_low_52w, c.spike_up, c.spike_down,
        row.ad_value, mcclellan
    )
}

fn run_synth(
    out: &Path,
    symbol_count: usize,
    sectors: usize,
    days: usize,
    seed: u64,
    start: &str,
) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("invalid start date '{start}'"))?;
    let market = SyntheticMarket::new(seed, start, days);
    let (symbols, membership) = SyntheticMarket::universe(symbol_count, sectors)
        .context("failed to build synthetic membership")?;

    let price_dir = out.join("prices");
    for symbol in &symbols {
        CsvPrices::write_symbol(&price_dir, symbol, &market.bars_for(symbol))
            .with_context(|| format!("failed to write prices for {symbol}"))?;
    }

    std::fs::write(out.join("membership.toml"), membership.to_toml()?)
        .context("failed to write membership.toml")?;

    let config = RunConfig {
        prices: PriceSourceConfig::Csv {
            dir: PathBuf::from("prices"),
        },
        membership: PathBuf::from("membership.toml"),
        store: PathBuf::from("breadth.db"),
        threads: 0,
        engine: BreadthConfig::default(),
    };
    let config_path = out.join("breadth.toml");
    let content = toml::to_string_pretty(&config).context("failed to serialize run config")?;
    std::fs::write(&config_path, content)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    tracing::info!(symbols = symbols.len(), days, seed, "Wrote synthetic market");
    println!(
        "Wrote {} symbols x {days} days to {}",
        symbols.len(),
        out.display()
    );
    println!("Next: breadth rebuild --config {}", config_path.display());
    Ok(())
}
