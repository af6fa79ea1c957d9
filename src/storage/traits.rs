//! Storage traits and error types
//!
//! This module defines the trait interface for the run ledger and associated
//! error types.

use crate::output::RunSummary;
use crate::shard::ShardAssignment;
use crate::storage::{Resolution, ResolutionRecord, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for run ledger backends
///
/// The ledger is a record of what happened; nothing in the shard loop reads it back
/// to decide what to do next. Resume state lives in the checkpoint file.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new run for `assignment`
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, assignment: &ShardAssignment, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Gets the most recent run of every distinct shard (index and step)
    fn latest_run_per_shard(&self) -> StorageResult<Vec<RunRecord>>;

    /// Stamps the finish time, final status and summary counters on a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus, summary: &RunSummary) -> StorageResult<()>;

    // ===== Item Resolutions =====

    /// Records how an item was resolved, replacing any earlier record in the same run
    fn record_resolution(
        &mut self,
        run_id: i64,
        item_index: usize,
        display_name: &str,
        outcome: Resolution,
        attempts: u32,
        detail: Option<&str>,
    ) -> StorageResult<()>;

    /// Re-labels succeeded items whose rows never reached the sink
    ///
    /// # Returns
    ///
    /// The number of records changed
    fn mark_unflushed(&mut self, run_id: i64, item_indices: &[usize]) -> StorageResult<usize>;

    /// Gets the resolutions of a run, optionally filtered by outcome, in index order
    fn get_resolutions(
        &self,
        run_id: i64,
        outcome: Option<Resolution>,
    ) -> StorageResult<Vec<ResolutionRecord>>;

    // ===== Statistics =====

    /// Counts a run's resolutions per outcome
    fn count_resolutions(&self, run_id: i64) -> StorageResult<HashMap<Resolution, u64>>;

    /// Counts runs per status across the whole ledger
    fn count_runs_by_status(&self) -> StorageResult<HashMap<RunStatus, u64>>;
}
