//! Markdown failure report
//!
//! Lists every item that did not make it into the sink in the latest run of each
//! shard, so operators can re-run them out of band.

use crate::output::summary::OutputResult;
use crate::storage::{Resolution, ResolutionRecord, RunRecord, Storage};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failed and unflushed items of one shard run
#[derive(Debug, Clone)]
pub struct ShardFailures {
    pub run: RunRecord,
    pub items: Vec<ResolutionRecord>,
}

/// Collects failures from the latest run of every shard
pub fn collect_failures(storage: &dyn Storage) -> OutputResult<Vec<ShardFailures>> {
    let mut shards = Vec::new();
    for run in storage.latest_run_per_shard()? {
        let mut items = storage.get_resolutions(run.id, Some(Resolution::Failed))?;
        items.extend(storage.get_resolutions(run.id, Some(Resolution::Unflushed))?);
        items.sort_by_key(|item| item.item_index);
        shards.push(ShardFailures { run, items });
    }
    Ok(shards)
}

/// Writes the failure report for the whole ledger
///
/// # Arguments
///
/// * `storage` - The run ledger
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(usize)` - Number of items listed in the report
/// * `Err(OutputError)` - Failed to query the ledger or write the file
pub fn write_failure_report(storage: &dyn Storage, output_path: &Path) -> OutputResult<usize> {
    let shards = collect_failures(storage)?;
    let markdown = format_failure_report(&shards);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(shards.iter().map(|shard| shard.items.len()).sum())
}

/// Formats the failure report as markdown
pub fn format_failure_report(shards: &[ShardFailures]) -> String {
    let mut md = String::new();

    md.push_str("# Metric-Reel Failed Items\n\n");

    let total: usize = shards.iter().map(|shard| shard.items.len()).sum();
    if total == 0 {
        md.push_str("No failed items in the latest run of any shard.\n");
        return md;
    }
    md.push_str(&format!(
        "{} items across {} shards need a re-run.\n\n",
        total,
        shards.iter().filter(|shard| !shard.items.is_empty()).count()
    ));

    for shard in shards.iter().filter(|shard| !shard.items.is_empty()) {
        let run = &shard.run;
        md.push_str(&format!(
            "## Shard {}/{} (run #{}, {})\n\n",
            run.shard_index, run.shard_step, run.id, run.status
        ));
        md.push_str(&format!("- **Started**: {}\n", run.started_at));
        if let Some(finished) = &run.finished_at {
            md.push_str(&format!("- **Finished**: {}\n", finished));
        }
        md.push('\n');

        md.push_str("| Index | Sink Row | Name | Outcome | Attempts | Detail |\n");
        md.push_str("|-------|----------|------|---------|----------|--------|\n");
        for item in &shard.items {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                item.item_index,
                crate::shard::destination(item.item_index),
                escape_cell(&item.display_name),
                item.outcome,
                item.attempts,
                escape_cell(item.detail.as_deref().unwrap_or(""))
            ));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
