//! Output module for run summaries and reports
//!
//! This module handles:
//! - The end-of-run summary for a shard
//! - Ledger statistics for `--stats`
//! - The markdown report of failed items for `--export-failures`

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{collect_failures, format_failure_report, write_failure_report, ShardFailures};
pub use stats::{load_statistics, print_statistics, LedgerStatistics, ShardStatistics};
pub use summary::{FailedItem, OutputError, OutputResult, RunSummary};
