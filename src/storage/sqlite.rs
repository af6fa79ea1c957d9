//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::output::RunSummary;
use crate::shard::ShardAssignment;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Resolution, ResolutionRecord, RunRecord, RunStatus};
use crate::ReelError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, shard_index, shard_step, range_start, range_end, started_at, \
     finished_at, config_hash, status, succeeded, failed, skipped, rows_flushed, flushes, recycles";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ReelError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ReelError> {
        let conn = Connection::open(path)?;

        // Several shards may share one ledger file
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, ReelError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        shard_index: row.get::<_, i64>(1)? as u32,
        shard_step: row.get::<_, i64>(2)? as u32,
        range_start: row.get::<_, i64>(3)? as usize,
        range_end: row.get::<_, Option<i64>>(4)?.map(|end| end as usize),
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
        config_hash: row.get(7)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(8)?).unwrap_or(RunStatus::Running),
        succeeded: row.get::<_, i64>(9)? as u64,
        failed: row.get::<_, i64>(10)? as u64,
        skipped: row.get::<_, i64>(11)? as u64,
        rows_flushed: row.get::<_, i64>(12)? as u64,
        flushes: row.get::<_, i64>(13)? as u64,
        recycles: row.get::<_, i64>(14)? as u64,
    })
}

fn resolution_from_row(row: &Row<'_>) -> rusqlite::Result<ResolutionRecord> {
    Ok(ResolutionRecord {
        run_id: row.get(0)?,
        item_index: row.get::<_, i64>(1)? as usize,
        display_name: row.get(2)?,
        outcome: Resolution::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(Resolution::Failed),
        attempts: row.get::<_, i64>(4)? as u32,
        detail: row.get(5)?,
        recorded_at: row.get(6)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, assignment: &ShardAssignment, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (shard_index, shard_step, range_start, range_end, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                assignment.shard_index as i64,
                assignment.shard_step as i64,
                assignment.range_start as i64,
                assignment.range_end.map(|end| end as i64),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS))?;

        stmt.query_row(params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;

        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn latest_run_per_shard(&self) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs
             WHERE id IN (SELECT MAX(id) FROM runs GROUP BY shard_index, shard_step)
             ORDER BY shard_step, shard_index",
            RUN_COLUMNS
        ))?;

        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, summary: &RunSummary) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, succeeded = ?3, failed = ?4,
                 skipped = ?5, rows_flushed = ?6, flushes = ?7, recycles = ?8
             WHERE id = ?9",
            params![
                status.to_db_string(),
                now,
                summary.succeeded as i64,
                summary.failed as i64,
                summary.skipped as i64,
                summary.rows_flushed as i64,
                summary.flushes as i64,
                summary.recycles as i64,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Item Resolutions =====

    fn record_resolution(
        &mut self,
        run_id: i64,
        item_index: usize,
        display_name: &str,
        outcome: Resolution,
        attempts: u32,
        detail: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO item_resolutions (run_id, item_index, display_name, outcome, attempts, detail, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(run_id, item_index) DO UPDATE SET
                 display_name = excluded.display_name,
                 outcome = excluded.outcome,
                 attempts = excluded.attempts,
                 detail = excluded.detail,
                 recorded_at = excluded.recorded_at",
            params![
                run_id,
                item_index as i64,
                display_name,
                outcome.to_db_string(),
                attempts as i64,
                detail,
                now
            ],
        )?;
        Ok(())
    }

    fn mark_unflushed(&mut self, run_id: i64, item_indices: &[usize]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE item_resolutions SET outcome = ?1, detail = ?2
                 WHERE run_id = ?3 AND item_index = ?4 AND outcome = ?5",
            )?;
            for &index in item_indices {
                changed += stmt.execute(params![
                    Resolution::Unflushed.to_db_string(),
                    "row not written to sink",
                    run_id,
                    index as i64,
                    Resolution::Succeeded.to_db_string()
                ])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn get_resolutions(
        &self,
        run_id: i64,
        outcome: Option<Resolution>,
    ) -> StorageResult<Vec<ResolutionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, item_index, display_name, outcome, attempts, detail, recorded_at
             FROM item_resolutions
             WHERE run_id = ?1 AND (?2 IS NULL OR outcome = ?2)
             ORDER BY item_index",
        )?;

        let records = stmt
            .query_map(
                params![run_id, outcome.map(|o| o.to_db_string())],
                resolution_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ===== Statistics =====

    fn count_resolutions(&self, run_id: i64) -> StorageResult<HashMap<Resolution, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT outcome, COUNT(*) FROM item_resolutions WHERE run_id = ?1 GROUP BY outcome",
        )?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (outcome, count) = row?;
            if let Some(outcome) = Resolution::from_db_string(&outcome) {
                counts.insert(outcome, count as u64);
            }
        }

        Ok(counts)
    }

    fn count_runs_by_status(&self) -> StorageResult<HashMap<RunStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM runs GROUP BY status")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            if let Some(status) = RunStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }
}
