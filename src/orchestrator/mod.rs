//! Shard orchestration
//!
//! This module wires configuration to the shard loop. It will:
//! 1. Load the worklist (fatal if unreachable)
//! 2. Confirm the sink spreadsheet is reachable (fatal if not)
//! 3. Open the run ledger and the shard checkpoint
//! 4. Run the [`Orchestrator`] loop with the headless Chrome driver
//! 5. Flush, release the browser, and report

mod coordinator;

pub use coordinator::{
    format_run_date, Orchestrator, ShardServices, MAX_CONSECUTIVE_LAUNCH_FAILURES,
};

use crate::browser::{cookie_bootstrap, ChromeFactory, SessionSettings};
use crate::config::Config;
use crate::output::RunSummary;
use crate::pacing::TokioPacer;
use crate::shard::ShardAssignment;
use crate::sink::SheetsSink;
use crate::state::CheckpointStore;
use crate::storage::open_storage;
use crate::worklist::{load_worklist, Worklist};
use crate::ReelError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Returns a shutdown signal that turns true on the first Ctrl-C
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, finishing the current item");
                let _ = tx.send(true);
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
        // Keep the sender alive so the receiver never sees a closed channel
        tx.closed().await;
    });
    rx
}

/// Runs one shard against the production collaborators
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file
/// * `shutdown` - Turns true when the loop should stop early
///
/// # Returns
///
/// * `Ok(RunSummary)` - The shard finished or was interrupted, and every row was written
/// * `Err(ReelError)` - Setup failed, the browser could not be (re)started, or rows
///   were left unwritten
pub async fn run_shard(
    config: &Config,
    config_hash: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<RunSummary, ReelError> {
    let worklist = load_worklist(config).await?;

    let sink = SheetsSink::from_config(&config.sink)?;
    sink.probe().await?;
    tracing::info!(
        "Sink spreadsheet {} sheet {} is reachable",
        config.sink.spreadsheet_id,
        sink.sheet()
    );

    let storage = open_storage(Path::new(&config.output.ledger_path))?;
    let services = ShardServices {
        factory: Arc::new(ChromeFactory::from_config(&config.session)),
        session_settings: SessionSettings::from_config(
            &config.session,
            cookie_bootstrap(&config.session),
        ),
        sink: Arc::new(sink),
        pacer: Arc::new(TokioPacer),
        storage: Box::new(storage),
    };

    Orchestrator::new(config, config_hash, worklist, services)?
        .run(shutdown)
        .await
}

/// What a shard would do if run now
#[derive(Debug, Clone)]
pub struct ShardPlan {
    pub assignment: ShardAssignment,
    pub worklist_len: usize,
    pub resume_from: usize,
    /// Owned indices at or past the checkpoint, ascending
    pub pending: Vec<usize>,
    /// Pending indices that will be skipped for lack of a usable locator
    pub without_locator: Vec<usize>,
}

/// Computes the plan for a shard without touching the browser, sink, or ledger
pub fn plan_shard(config: &Config, worklist: &Worklist) -> Result<ShardPlan, ReelError> {
    let assignment = ShardAssignment::from_config(&config.shard);
    let checkpoint =
        CheckpointStore::load(config.shard.checkpoint_path(), assignment.range_start)?;

    let pending: Vec<usize> = assignment
        .owned_indices(worklist.len())
        .filter(|&index| !checkpoint.is_done(index))
        .collect();
    let without_locator = pending
        .iter()
        .copied()
        .filter(|&index| {
            worklist
                .get(index)
                .map_or(true, |item| !item.has_usable_locator())
        })
        .collect();

    Ok(ShardPlan {
        assignment,
        worklist_len: worklist.len(),
        resume_from: checkpoint.current(),
        pending,
        without_locator,
    })
}
