//! Statistics generation from the run ledger
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::storage::{Resolution, RunRecord, RunStatus, Storage};
use crate::ReelError;
use std::collections::HashMap;

/// Ledger statistics summary
#[derive(Debug, Clone)]
pub struct LedgerStatistics {
    /// Count of runs by status
    pub runs_by_status: HashMap<RunStatus, u64>,

    /// Latest run of each shard, with its resolution counts
    pub shards: Vec<ShardStatistics>,
}

/// Statistics for the latest run of one shard
#[derive(Debug, Clone)]
pub struct ShardStatistics {
    pub run: RunRecord,
    pub resolutions: HashMap<Resolution, u64>,
}

impl ShardStatistics {
    pub fn count(&self, resolution: Resolution) -> u64 {
        self.resolutions.get(&resolution).copied().unwrap_or(0)
    }
}

impl LedgerStatistics {
    pub fn total_runs(&self) -> u64 {
        self.runs_by_status.values().sum()
    }

    /// Sum of one resolution across every shard's latest run
    pub fn total(&self, resolution: Resolution) -> u64 {
        self.shards.iter().map(|shard| shard.count(resolution)).sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(LedgerStatistics)` - Successfully loaded statistics
/// * `Err(ReelError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<LedgerStatistics, ReelError> {
    let runs_by_status = storage.count_runs_by_status()?;

    let mut shards = Vec::new();
    for run in storage.latest_run_per_shard()? {
        let resolutions = storage.count_resolutions(run.id)?;
        shards.push(ShardStatistics { run, resolutions });
    }

    Ok(LedgerStatistics {
        runs_by_status,
        shards,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &LedgerStatistics) {
    println!("=== Metric-Reel Statistics ===\n");

    println!("Runs ({} total):", stats.total_runs());
    let mut status_counts: Vec<_> = stats.runs_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));
    for (status, count) in status_counts {
        println!("  {}: {}", status, count);
    }
    println!();

    if stats.shards.is_empty() {
        println!("No shard runs recorded.");
        return;
    }

    println!("Latest run per shard:");
    for shard in &stats.shards {
        let run = &shard.run;
        let range_end = run
            .range_end
            .map(|end| end.to_string())
            .unwrap_or_else(|| "end".to_string());
        println!(
            "  shard {}/{} [{}..={}] run #{} ({}, started {})",
            run.shard_index,
            run.shard_step,
            run.range_start,
            range_end,
            run.id,
            run.status,
            run.started_at
        );
        println!(
            "    succeeded {}, failed {}, skipped {}, unflushed {}",
            shard.count(Resolution::Succeeded),
            shard.count(Resolution::Failed),
            shard.count(Resolution::Skipped),
            shard.count(Resolution::Unflushed)
        );
        if run.finished_at.is_some() {
            println!(
                "    {} rows in {} flushes, {} session recycles",
                run.rows_flushed, run.flushes, run.recycles
            );
        }
    }
    println!();

    let succeeded = stats.total(Resolution::Succeeded);
    let attempted = succeeded + stats.total(Resolution::Failed) + stats.total(Resolution::Unflushed);
    let success_rate = if attempted > 0 {
        (succeeded as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} items written)",
        success_rate, succeeded, attempted
    );
}
