//! Shard coordinator - the main control loop
//!
//! This module walks the worklist for one shard, including:
//! - Skipping indices outside the range, not owned, or already checkpointed
//! - Running the retry policy for each owned item against the extraction session
//! - Buffering result rows and flushing them in batches
//! - Advancing the checkpoint after every resolved index
//! - Recording every resolution in the run ledger
//! - Relaunching a dead browser before the next item, up to a limit
//! - Guaranteeing the final flush and session release however the loop ends

use crate::browser::{DriverFactory, DriverFault, ExtractionSession, SessionSettings};
use crate::config::Config;
use crate::extract::{ItemResolution, RetryPolicy};
use crate::output::RunSummary;
use crate::pacing::Pacer;
use crate::shard::{destination, ShardAssignment};
use crate::sink::{BatchBuffer, BatchEntry, RejectedEntry, Sink};
use crate::state::CheckpointStore;
use crate::storage::{Resolution, RunStatus, Storage};
use crate::worklist::{WorkItem, Worklist};
use crate::{ConfigError, ReelError};
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Browser launches that may fail back to back before the run aborts
pub const MAX_CONSECUTIVE_LAUNCH_FAILURES: u32 = 3;

/// External collaborators of a shard run
pub struct ShardServices {
    pub factory: Arc<dyn DriverFactory>,
    pub session_settings: SessionSettings,
    pub sink: Arc<dyn Sink>,
    pub pacer: Arc<dyn Pacer>,
    pub storage: Box<dyn Storage>,
}

/// Main shard coordinator structure
pub struct Orchestrator {
    assignment: ShardAssignment,
    worklist: Worklist,
    checkpoint: CheckpointStore,
    retry: RetryPolicy,
    buffer: BatchBuffer,
    factory: Arc<dyn DriverFactory>,
    session_settings: SessionSettings,
    session: Option<ExtractionSession>,
    launch_failures: u32,
    sink: Arc<dyn Sink>,
    pacer: Arc<dyn Pacer>,
    storage: Box<dyn Storage>,
    run_id: i64,
    run_date: String,
    item_pause: Duration,
    summary: RunSummary,
}

/// Formats today's date for the date column of every row in this run
pub fn format_run_date(format: &str) -> Result<String, ConfigError> {
    let mut date = String::new();
    write!(date, "{}", chrono::Local::now().format(format))
        .map_err(|_| ConfigError::Validation(format!("invalid date-format: {}", format)))?;
    Ok(date)
}

impl Orchestrator {
    /// Creates a coordinator for the shard described by `config`
    ///
    /// Loads the checkpoint and opens a new run in the ledger. The browser is not
    /// started until the first item that needs it.
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration file, recorded with the run
    /// * `worklist` - The full worklist, shared by every shard
    /// * `services` - Browser factory, sink, pacer and ledger
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(ReelError)` - Checkpoint unreadable or ledger unavailable
    pub fn new(
        config: &Config,
        config_hash: &str,
        worklist: Worklist,
        services: ShardServices,
    ) -> Result<Self, ReelError> {
        let assignment = ShardAssignment::from_config(&config.shard);
        let checkpoint =
            CheckpointStore::load(config.shard.checkpoint_path(), assignment.range_start)?;
        let run_date = format_run_date(&config.sink.date_format)?;

        let mut storage = services.storage;
        let run_id = storage.create_run(&assignment, config_hash)?;

        let summary = RunSummary {
            owned: assignment.owned_count(worklist.len()),
            resumed_from: checkpoint.current(),
            ..RunSummary::default()
        };

        tracing::info!(
            "Run {} for {} ({} owned of {} items, checkpoint {} at {})",
            run_id,
            assignment,
            summary.owned,
            worklist.len(),
            checkpoint.path().display(),
            checkpoint.current()
        );

        Ok(Self {
            assignment,
            worklist,
            checkpoint,
            retry: RetryPolicy::from_config(&config.retry),
            buffer: BatchBuffer::from_config(&config.batch),
            factory: services.factory,
            session_settings: services.session_settings,
            session: None,
            launch_failures: 0,
            sink: services.sink,
            pacer: services.pacer,
            storage,
            run_id,
            run_date,
            item_pause: Duration::from_millis(config.pacing.item_pause_ms),
            summary,
        })
    }

    /// Overrides the date written into every row
    pub fn with_run_date(mut self, run_date: impl Into<String>) -> Self {
        self.run_date = run_date.into();
        self
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Runs the shard to completion or until `shutdown` turns true
    ///
    /// The final flush and session release happen on every exit path. The run
    /// fails if the loop failed or if any row is still unwritten afterwards.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> Result<RunSummary, ReelError> {
        let loop_result = self.process_all(&shutdown).await;
        if let Err(e) = &loop_result {
            tracing::error!("Shard loop aborted: {}", e);
        }
        self.finish(loop_result).await
    }

    async fn process_all(&mut self, shutdown: &watch::Receiver<bool>) -> Result<(), ReelError> {
        let len = self.worklist.len();
        let end = match self.assignment.range_end {
            Some(end) => end.saturating_add(1).min(len),
            None => len,
        };
        if self.assignment.range_start >= len {
            tracing::warn!(
                "Range start {} is past the end of the worklist ({} items)",
                self.assignment.range_start,
                len
            );
        }

        for index in 0..end {
            if self.checkpoint.is_done(index) || !self.assignment.in_range(index) {
                continue;
            }
            if !self.assignment.owns(index) {
                continue;
            }

            if *shutdown.borrow() {
                tracing::warn!("Shutdown requested, stopping before index {}", index);
                self.summary.interrupted = true;
                break;
            }

            self.process_index(index).await?;
        }

        Ok(())
    }

    async fn process_index(&mut self, index: usize) -> Result<(), ReelError> {
        let Some(item) = self.worklist.get(index).cloned() else {
            return Ok(());
        };
        let location = destination(index);

        if !item.has_usable_locator() {
            tracing::info!(
                index,
                row = %location,
                "Skipping {}: no usable locator",
                item.display_name
            );
            self.summary.skipped += 1;
            self.record(
                index,
                &item.display_name,
                Resolution::Skipped,
                0,
                Some("no usable locator"),
            );
            self.checkpoint.persist(index + 1)?;
            return Ok(());
        }

        tracing::info!(index, row = %location, "Processing {}", item.display_name);
        let resolution = self.resolve(&item).await?;

        match resolution {
            ItemResolution::Succeeded { values, attempts } => {
                tracing::info!(
                    index,
                    attempts,
                    values = values.len(),
                    "Extracted {}",
                    item.display_name
                );
                self.summary.succeeded += 1;
                self.record(
                    index,
                    &item.display_name,
                    Resolution::Succeeded,
                    attempts,
                    None,
                );
                let row = self.row_values(&item, values);
                self.buffer.add(BatchEntry {
                    index,
                    destination: location,
                    values: row,
                });
            }
            ItemResolution::Exhausted { reason, attempts } => {
                tracing::warn!(
                    index,
                    attempts,
                    "Permanently failed {}: {}",
                    item.display_name,
                    reason
                );
                self.summary
                    .record_failure(index, &item.display_name, &reason);
                self.record(
                    index,
                    &item.display_name,
                    Resolution::Failed,
                    attempts,
                    Some(&reason),
                );
            }
        }

        if self.buffer.should_flush() {
            self.flush_batch().await;
        }

        self.checkpoint.persist(index + 1)?;
        self.pacer.pause(self.item_pause).await;
        Ok(())
    }

    /// Runs the retry policy, starting or refreshing the session first
    ///
    /// A browser that cannot be started gives up on this item only. The run
    /// aborts once [`MAX_CONSECUTIVE_LAUNCH_FAILURES`] launches in a row have
    /// failed.
    async fn resolve(&mut self, item: &WorkItem) -> Result<ItemResolution, ReelError> {
        if let Err(fault) = self.ready_session().await {
            self.launch_failures += 1;
            if self.launch_failures >= MAX_CONSECUTIVE_LAUNCH_FAILURES {
                tracing::error!(
                    failures = self.launch_failures,
                    "Browser failed to start {} times in a row",
                    self.launch_failures
                );
                return Err(ReelError::SessionLaunch(fault));
            }
            tracing::warn!(
                failures = self.launch_failures,
                "Browser unavailable, giving up on {}: {}",
                item.display_name,
                fault
            );
            return Ok(ItemResolution::Exhausted {
                reason: format!("browser unavailable: {}", fault),
                attempts: 0,
            });
        }

        let Some(session) = self.session.as_mut() else {
            return Err(ReelError::SessionLaunch(DriverFault::Launch(
                "no extraction session".to_string(),
            )));
        };

        let resolution = self
            .retry
            .resolve(item, session, self.pacer.as_ref())
            .await;

        // A session left without a driver means a relaunch inside the retry failed
        if session.is_live() {
            self.launch_failures = 0;
        } else {
            self.launch_failures += 1;
        }
        Ok(resolution)
    }

    /// Makes sure a live, unworn session exists
    async fn ready_session(&mut self) -> Result<(), DriverFault> {
        match self.session.as_mut() {
            None => {
                let session =
                    ExtractionSession::create(self.factory.clone(), self.session_settings.clone())
                        .await?;
                self.session = Some(session);
            }
            Some(session) if !session.is_live() => {
                tracing::info!("Session has no browser, relaunching");
                session.recycle().await?;
            }
            Some(session) if session.is_worn() => {
                tracing::info!(
                    fetches = session.fetches(),
                    "Session reached its fetch limit, recycling"
                );
                session.recycle().await?;
            }
            Some(_) => {}
        }
        self.launch_failures = 0;
        Ok(())
    }

    /// Writes a resolution to the ledger; a failed write is logged, not fatal
    fn record(
        &mut self,
        index: usize,
        display_name: &str,
        resolution: Resolution,
        attempts: u32,
        detail: Option<&str>,
    ) {
        if let Err(e) = self.storage.record_resolution(
            self.run_id,
            index,
            display_name,
            resolution,
            attempts,
            detail,
        ) {
            tracing::error!(
                index,
                "Failed to record {} for {} in the ledger: {}",
                resolution,
                display_name,
                e
            );
        }
    }

    /// Builds the sink row: name, run date, then the values with gaps left blank
    fn row_values(&self, item: &WorkItem, values: Vec<Option<String>>) -> Vec<String> {
        let mut row = Vec::with_capacity(values.len() + 2);
        row.push(item.display_name.clone());
        row.push(self.run_date.clone());
        row.extend(values.into_iter().map(Option::unwrap_or_default));
        row
    }

    /// Flushes the buffer; on failure the rows stay buffered for the next flush point
    ///
    /// Rows the sink refused on their own turn their items into failures.
    async fn flush_batch(&mut self) -> bool {
        let pending = self.buffer.len();
        let started = Instant::now();

        let result = self
            .buffer
            .flush(self.sink.as_ref(), self.pacer.as_ref())
            .await;
        let rejected = self.buffer.take_rejected();
        let written = pending - self.buffer.len() - rejected.len();
        self.summary.rows_flushed += written as u64;
        for refused in rejected {
            self.fail_rejected_row(refused);
        }

        match result {
            Ok(report) => {
                self.summary.flushes += 1;
                tracing::info!(
                    rows = report.rows,
                    attempts = report.attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Batch flush complete"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Batch flush failed, {} rows stay buffered: {}",
                    self.buffer.len(),
                    e
                );
                false
            }
        }
    }

    /// Moves an extracted item whose row the sink refused over to the failures
    fn fail_rejected_row(&mut self, refused: RejectedEntry) {
        let RejectedEntry { entry, reason } = refused;
        let display_name = self
            .worklist
            .get(entry.index)
            .map(|item| item.display_name.clone())
            .unwrap_or_default();
        let reason = format!("sink rejected row {}: {}", entry.destination, reason);

        self.summary.succeeded = self.summary.succeeded.saturating_sub(1);
        self.summary
            .record_failure(entry.index, &display_name, &reason);
        self.record(entry.index, &display_name, Resolution::Failed, 0, Some(&reason));
    }

    /// Final flush, session release, ledger update
    async fn finish(mut self, loop_result: Result<(), ReelError>) -> Result<RunSummary, ReelError> {
        if self.buffer.is_empty() {
            tracing::info!("Final flush: nothing buffered");
        } else if self.flush_batch().await {
            tracing::info!("Final flush confirmed");
        } else {
            let unflushed = self.buffer.pending_indices();
            tracing::error!(
                "Final flush failed; rows for indices {:?} were not written",
                unflushed
            );
            if let Err(e) = self.storage.mark_unflushed(self.run_id, &unflushed) {
                tracing::error!("Failed to record unflushed rows in the ledger: {}", e);
            }
            self.summary.unflushed = unflushed;
        }

        if let Some(session) = self.session.take() {
            self.summary.recycles = u64::from(session.generation().saturating_sub(1));
            session.release().await;
        }

        let status = if loop_result.is_err() || !self.summary.is_fully_flushed() {
            RunStatus::Failed
        } else if self.summary.interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        let recorded = self
            .storage
            .finish_run(self.run_id, status, &self.summary);
        if let Err(e) = &recorded {
            tracing::error!("Failed to close run {} in the ledger: {}", self.run_id, e);
        }

        self.summary.log();
        tracing::info!("Run {} {}", self.run_id, status);

        loop_result?;
        if !self.summary.is_fully_flushed() {
            return Err(ReelError::UnflushedRows {
                unflushed: self.summary.unflushed.len(),
            });
        }
        recorded?;

        Ok(self.summary)
    }
}
