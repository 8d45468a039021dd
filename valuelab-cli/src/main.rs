//! ValueLab CLI: run the metrics pipeline and inspect the store.
//!
//! Commands:
//! - `run`: ingest a price CSV (plus optional fundamentals JSON), compute
//!   metrics and crossover events, upsert them into the store, write a report
//! - `store status`: per-instrument row counts, date ranges and sizes

mod config;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{AppConfig, ConfigOrigin};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use valuelab_core::data::{load_fundamentals, read_price_csv, LoadedFundamentals};
use valuelab_core::domain::PriceBar;
use valuelab_core::{
    MetricsPipeline, MetricsStore, ParquetStore, PipelineInput, PipelineOutput, RunReport,
};

#[derive(Parser)]
#[command(
    name = "valuelab",
    about = "ValueLab CLI: fundamentals-aware price metrics and crossover signals"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one instrument.
    Run {
        /// Instrument identifier (e.g., NVDA).
        #[arg(long)]
        instrument: String,

        /// Price history CSV (needs at least `date` and `close` columns).
        #[arg(long)]
        prices: PathBuf,

        /// Fundamentals JSON with quarterly / annual / point_snapshot tiers.
        #[arg(long)]
        fundamentals: Option<PathBuf>,

        /// Store directory. Overrides `[store] dir` from the config.
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Report output path.
        #[arg(long, default_value = "report.json")]
        output: PathBuf,

        /// Skip the store upsert; only print and write the report.
        #[arg(long, default_value_t = false)]
        no_store: bool,
    },
    /// Store management commands.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Report stored instruments, row counts, date ranges and sizes.
    Status {
        /// Store directory. Overrides `[store] dir` from the config.
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (app_config, origin) = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&app_config.logging.level)?;

    match &origin {
        ConfigOrigin::File(path) => info!(path = %path.display(), "config loaded"),
        ConfigOrigin::Missing(path) => {
            warn!(path = %path.display(), "config file not found, using defaults")
        }
        ConfigOrigin::Defaults => {}
    }

    match cli.command {
        Commands::Run {
            instrument,
            prices,
            fundamentals,
            store_dir,
            output,
            no_store,
        } => {
            let store_dir = store_dir.unwrap_or_else(|| app_config.store.dir.clone());
            run_pipeline_cmd(
                &app_config,
                &instrument,
                &prices,
                fundamentals.as_deref(),
                (!no_store).then_some(store_dir.as_path()),
                &output,
            )
        }
        Commands::Store { action } => match action {
            StoreAction::Status { store_dir } => {
                run_store_status(&store_dir.unwrap_or(app_config.store.dir))
            }
        },
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid logging level '{level}'"))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn run_pipeline_cmd(
    app_config: &AppConfig,
    instrument: &str,
    prices_path: &Path,
    fundamentals_path: Option<&Path>,
    store_dir: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let prices = read_price_csv(prices_path)
        .with_context(|| format!("failed to ingest prices for {instrument}"))?;
    if prices.is_empty() {
        bail!("no usable price rows in {}", prices_path.display());
    }
    let prices = trim_history(prices, app_config)?;

    let fundamentals = resolve_fundamentals(instrument, fundamentals_path);

    if is_short_history(prices.len(), app_config) {
        warn!(
            instrument,
            rows = prices.len(),
            min_days = app_config.data.min_trading_days_for_sma,
            "short price history, slow SMA is a partial-window estimate"
        );
    }

    let input = PipelineInput {
        prices,
        snapshots: fundamentals.snapshots,
        fundamentals_source: fundamentals.source,
    };
    let pipeline = MetricsPipeline::new(app_config.pipeline.clone())?;
    let result = pipeline.run(instrument, &input)?;

    print_summary(&result);

    if let Some(dir) = store_dir {
        let store = ParquetStore::new(dir);
        let metrics = store.upsert_metrics(&result.rows)?;
        let events = store.upsert_signal_events(result.instrument_id.as_str(), &result.events)?;
        println!(
            "Store: {} ({} metrics inserted, {} replaced; {} events inserted, {} replaced)",
            dir.display(),
            metrics.inserted,
            metrics.replaced,
            events.inserted,
            events.replaced
        );
    }

    let report = RunReport::build(&input, &result, Utc::now())?;
    report.write(output)?;
    println!("Report saved to: {}", output.display());

    Ok(())
}

/// Fundamentals never stop a run: any failure degrades to source `none`.
fn resolve_fundamentals(instrument: &str, path: Option<&Path>) -> LoadedFundamentals {
    let Some(path) = path else {
        warn!(instrument, "no fundamentals supplied, ratios will be null");
        return LoadedFundamentals::none();
    };
    match load_fundamentals(path) {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!(
                instrument,
                path = %path.display(),
                error = %e,
                "fundamentals unavailable, continuing without them"
            );
            LoadedFundamentals::none()
        }
    }
}

fn is_short_history(rows: usize, app_config: &AppConfig) -> bool {
    rows < app_config.data.min_trading_days_for_sma
}

/// Drop bars older than the configured `historical_period`.
fn trim_history(prices: Vec<PriceBar>, app_config: &AppConfig) -> Result<Vec<PriceBar>> {
    let period = app_config.historical_period()?;
    let Some(latest) = prices.iter().map(|b| b.date).max() else {
        return Ok(prices);
    };
    let Some(start) = period.start_from(latest) else {
        return Ok(prices);
    };
    let before = prices.len();
    let kept: Vec<PriceBar> = prices.into_iter().filter(|b| b.date >= start).collect();
    if kept.len() < before {
        info!(
            dropped = before - kept.len(),
            %start,
            period = app_config.data.historical_period.as_str(),
            "trimmed price history"
        );
    }
    Ok(kept)
}

fn run_store_status(store_dir: &Path) -> Result<()> {
    if !store_dir.exists() {
        println!("Store directory does not exist: {}", store_dir.display());
        return Ok(());
    }

    let statuses = ParquetStore::new(store_dir).status()?;
    if statuses.is_empty() {
        println!("Store is empty: {}", store_dir.display());
        return Ok(());
    }

    let total_size: u64 = statuses.iter().map(|s| s.size_bytes).sum();

    println!("Store: {}", store_dir.display());
    println!("Instruments: {}", statuses.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!(
        "{:<10} {:<25} {:>8} {:>8} {:>10}",
        "Instrument", "Date Range", "Rows", "Events", "Size"
    );
    println!("{}", "-".repeat(65));
    for status in &statuses {
        let (range, rows, events) = match &status.meta {
            Some(meta) => (
                match (meta.start_date, meta.end_date) {
                    (Some(start), Some(end)) => format!("{start} to {end}"),
                    _ => "(no rows)".into(),
                },
                meta.metrics_rows.to_string(),
                meta.signal_events.to_string(),
            ),
            None => ("(no meta)".into(), "-".into(), "-".into()),
        };
        println!(
            "{:<10} {:<25} {:>8} {:>8} {:>10}",
            status.instrument_id,
            range,
            rows,
            events,
            format_size(status.size_bytes)
        );
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.decimals$}"),
        _ => "-".into(),
    }
}

fn print_summary(result: &PipelineOutput) {
    let (Some(first), Some(last)) = (result.rows.first(), result.rows.last()) else {
        return;
    };

    println!();
    println!("=== Pipeline Result ===");
    println!("Instrument:     {}", result.instrument_id);
    println!("Period:         {} to {}", first.date(), last.date());
    println!("Rows:           {}", result.rows.len());
    println!("Fundamentals:   {}", result.fundamentals_source);
    println!();
    println!("--- Latest ({}) ---", last.date());
    println!("Close:          {}", format_opt(Some(last.close()), 2));
    println!("SMA fast:       {}", format_opt(last.sma_fast, 2));
    println!("SMA slow:       {}", format_opt(last.sma_slow, 2));
    println!("Trailing High:  {}", format_opt(last.trailing_high, 2));
    println!("From High:      {}%", format_opt(last.pct_from_high, 2));
    println!(
        "BVPS:           {}",
        last.bvps.map_or_else(|| "-".into(), |v| v.round_dp(4).to_string())
    );
    println!(
        "P/B:            {}",
        last.price_to_book.map_or_else(|| "-".into(), |v| v.round_dp(4).to_string())
    );
    println!(
        "EV:             {}",
        last.enterprise_value.map_or_else(|| "-".into(), |v| v.round_dp(0).to_string())
    );
    println!();
    println!("--- Signals ({}) ---", result.events.len());
    for event in &result.events {
        println!(
            "{}  {:<14} fast={:.2} slow={:.2}",
            event.date, event.kind.as_str(), event.observed_fast_value, event.observed_slow_value
        );
    }
    println!();
}
