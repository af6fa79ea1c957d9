//! Run summary and output error types

use crate::storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// An item whose retries ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub index: usize,
    pub display_name: String,
    pub reason: String,
}

/// Counters for one shard run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Indices the shard owns within its range
    pub owned: usize,
    /// Checkpoint value the run started from
    pub resumed_from: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub rows_flushed: u64,
    pub flushes: u64,
    pub recycles: u64,
    pub failed_items: Vec<FailedItem>,
    /// Indices whose rows were still buffered when the run ended
    pub unflushed: Vec<usize>,
    pub interrupted: bool,
}

impl RunSummary {
    /// Items resolved in this run, whatever the outcome
    pub fn resolved(&self) -> u64 {
        self.succeeded + self.failed + self.skipped
    }

    pub fn record_failure(&mut self, index: usize, display_name: &str, reason: &str) {
        self.failed += 1;
        self.failed_items.push(FailedItem {
            index,
            display_name: display_name.to_string(),
            reason: reason.to_string(),
        });
    }

    /// True if every succeeded row reached the sink
    pub fn is_fully_flushed(&self) -> bool {
        self.unflushed.is_empty()
    }

    /// Writes the end-of-run report to the log
    pub fn log(&self) {
        tracing::info!("{}", self);

        for item in &self.failed_items {
            tracing::warn!(
                index = item.index,
                "Permanently failed: {} ({})",
                item.display_name,
                item.reason
            );
        }

        if !self.unflushed.is_empty() {
            tracing::error!(
                "{} rows were never written to the sink: indices {:?}",
                self.unflushed.len(),
                self.unflushed
            );
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run {}: {} resolved of {} owned (from index {}); {} succeeded, {} failed, {} skipped; \
             {} rows in {} flushes; {} session recycles",
            if self.interrupted { "interrupted" } else { "finished" },
            self.resolved(),
            self.owned,
            self.resumed_from,
            self.succeeded,
            self.failed,
            self.skipped,
            self.rows_flushed,
            self.flushes,
            self.recycles
        )
    }
}
