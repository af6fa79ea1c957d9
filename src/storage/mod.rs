//! Storage module for the run ledger
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Run tracking per shard, with final summary counters
//! - Per-item resolution records feeding statistics and failure reports

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::ReelError;
use std::fmt;
use std::path::Path;

/// Initializes or opens a ledger database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(ReelError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ReelError> {
    SqliteStorage::new(path)
}

/// Represents a shard run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub shard_index: u32,
    pub shard_step: u32,
    pub range_start: usize,
    pub range_end: Option<usize>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub rows_flushed: u64,
    pub flushes: u64,
    pub recycles: u64,
}

/// Status of a shard run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// How a worklist item ended up in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    /// Values extracted and written (or buffered for writing)
    Succeeded,
    /// Retries exhausted or page rejected
    Failed,
    /// No usable locator
    Skipped,
    /// Values extracted, but the final flush never reached the sink
    Unflushed,
}

impl Resolution {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Unflushed => "unflushed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "unflushed" => Some(Self::Unflushed),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Succeeded, Self::Failed, Self::Skipped, Self::Unflushed]
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Represents one item resolution in the database
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRecord {
    pub run_id: i64,
    pub item_index: usize,
    pub display_name: String,
    pub outcome: Resolution,
    pub attempts: u32,
    pub detail: Option<String>,
    pub recorded_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_resolution_roundtrip() {
        for resolution in Resolution::all() {
            assert_eq!(
                Resolution::from_db_string(resolution.to_db_string()),
                Some(resolution)
            );
        }
        assert_eq!(Resolution::from_db_string("exhausted"), None);
    }
}
