//! Metric-Reel main entry point
//!
//! This is the command-line interface for one Metric-Reel shard process.

use anyhow::Context;
use clap::Parser;
use metric_reel::config::{load_config_with_hash, Config, ConfigOverrides};
use metric_reel::orchestrator::{plan_shard, run_shard, shutdown_on_ctrl_c};
use metric_reel::state::CheckpointStore;
use metric_reel::worklist::load_worklist;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Pending items listed by --dry-run
const DRY_RUN_PREVIEW: usize = 5;

/// Metric-Reel: a sharded, resumable metric snapshot scraper
///
/// Each process owns every `step`-th item of the worklist, renders its pages in a
/// headless browser, and writes the extracted values into a spreadsheet in batches.
/// Progress is checkpointed per shard so an interrupted run picks up where it left off.
#[derive(Parser, Debug)]
#[command(name = "metric-reel")]
#[command(version)]
#[command(about = "A sharded, resumable metric snapshot scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Delete this shard's checkpoint and start from the range start
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_failures"])]
    fresh: bool,

    /// Validate config, load the worklist, and show what this shard would process
    #[arg(long, conflicts_with_all = ["stats", "export_failures"])]
    dry_run: bool,

    /// Show run ledger statistics and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_failures"])]
    stats: bool,

    /// Write the markdown report of failed items from the ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_failures: bool,

    /// Index of this shard, in [0, step)
    #[arg(long, env = "SHARD_INDEX")]
    shard_index: Option<u32>,

    /// Total number of shards
    #[arg(long, env = "SHARD_STEP")]
    shard_step: Option<u32>,

    /// First worklist index this shard may process
    #[arg(long, env = "START_INDEX")]
    start_index: Option<usize>,

    /// Last worklist index this shard may process (inclusive)
    #[arg(long, env = "END_INDEX")]
    end_index: Option<usize>,

    /// Checkpoint file for this shard
    #[arg(long = "checkpoint", env = "CHECKPOINT_FILE", value_name = "PATH")]
    checkpoint_path: Option<String>,

    /// Rows buffered before a batch flush
    #[arg(long)]
    batch_capacity: Option<usize>,

    /// Retries per item after the first attempt
    #[arg(long)]
    max_retries: Option<u32>,

    /// Seconds to wait for metric values to appear
    #[arg(long = "fetch-timeout", value_name = "SECS")]
    fetch_timeout_secs: Option<u64>,

    /// Milliseconds to pause between items
    #[arg(long = "item-pause", value_name = "MS")]
    item_pause_ms: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            shard_index: self.shard_index,
            shard_step: self.shard_step,
            start_index: self.start_index,
            end_index: self.end_index,
            checkpoint_path: self.checkpoint_path.clone(),
            batch_capacity: self.batch_capacity,
            max_retries: self.max_retries,
            fetch_timeout_secs: self.fetch_timeout_secs,
            item_pause_ms: self.item_pause_ms,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config, &cli.overrides()) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config).await?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_failures {
        handle_export_failures(&config)?;
    } else {
        handle_run(&config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("metric_reel=info,warn"),
            1 => EnvFilter::new("metric_reel=debug,info"),
            2 => EnvFilter::new("metric_reel=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: loads the worklist and shows this shard's plan
async fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Metric-Reel Dry Run ===\n");

    let worklist = load_worklist(config)
        .await
        .context("worklist could not be loaded")?;
    let plan = plan_shard(config, &worklist)?;

    println!("Shard:");
    println!("  Assignment: {}", plan.assignment);
    println!("  Checkpoint: {}", config.shard.checkpoint_path().display());
    println!("  Resume from index: {}", plan.resume_from);

    println!("\nSession:");
    println!(
        "  Values: <{}> with class containing '{}'",
        config.session.value_element, config.session.value_class
    );
    println!("  Fetch timeout: {}s", config.session.fetch_timeout_secs);
    println!("  Recycle after: {} fetches", config.session.recycle_after);
    println!("  Max retries: {}", config.retry.max_retries);
    println!("  Item pause: {}ms", config.pacing.item_pause_ms);

    println!("\nSink:");
    println!("  Spreadsheet: {}", config.sink.spreadsheet_id);
    println!("  Sheet: {}", config.sink.sheet);
    println!("  Batch capacity: {}", config.batch.capacity);

    println!("\nWorklist ({} items):", plan.worklist_len);
    println!("  Pending for this shard: {}", plan.pending.len());
    for index in plan.pending.iter().take(DRY_RUN_PREVIEW) {
        if let Some(item) = worklist.get(*index) {
            let locator = item.usable_locators().first().copied().unwrap_or("-");
            println!("    [{}] {} ({})", index, item.display_name, locator);
        }
    }
    if plan.pending.len() > DRY_RUN_PREVIEW {
        println!("    ... and {} more", plan.pending.len() - DRY_RUN_PREVIEW);
    }
    if !plan.without_locator.is_empty() {
        println!(
            "  Without a usable locator (will be skipped): {:?}",
            plan.without_locator
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would process {} items",
        plan.pending.len() - plan.without_locator.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the run ledger
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use metric_reel::output::{load_statistics, print_statistics};
    use metric_reel::storage::open_storage;

    println!("Ledger: {}\n", config.output.ledger_path);

    let storage = open_storage(Path::new(&config.output.ledger_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-failures mode: writes the markdown failure report
fn handle_export_failures(config: &Config) -> anyhow::Result<()> {
    use metric_reel::output::write_failure_report;
    use metric_reel::storage::open_storage;

    println!("=== Exporting Failure Report ===\n");
    println!("Ledger: {}", config.output.ledger_path);
    println!("Output: {}", config.output.failures_path);
    println!();

    let storage = open_storage(Path::new(&config.output.ledger_path))?;

    tracing::info!("Collecting failed items from the ledger...");
    let failed = write_failure_report(&storage, Path::new(&config.output.failures_path))
        .with_context(|| format!("failed to write {}", config.output.failures_path))?;

    println!(
        "✓ {} failed items exported to: {}",
        failed, config.output.failures_path
    );

    Ok(())
}

/// Handles the main shard run
async fn handle_run(config: &Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    let checkpoint = config.shard.checkpoint_path();
    if fresh {
        if CheckpointStore::clear(&checkpoint)? {
            tracing::info!("Removed checkpoint {}", checkpoint.display());
        }
        tracing::info!("Starting fresh run (ignoring previous progress)");
    } else {
        tracing::info!(
            "Starting run (will resume from {} if present)",
            checkpoint.display()
        );
    }

    match run_shard(config, config_hash, shutdown_on_ctrl_c()).await {
        Ok(summary) => {
            println!("{}", summary);
            if summary.interrupted {
                tracing::warn!("Run interrupted; restart to resume from the checkpoint");
            } else {
                tracing::info!("Shard completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Shard failed: {}", e);
            Err(e.into())
        }
    }
}
