//! Database schema definitions
//!
//! This module contains the SQL schema for the Metric-Reel run ledger.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per shard run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    shard_index INTEGER NOT NULL,
    shard_step INTEGER NOT NULL,
    range_start INTEGER NOT NULL,
    range_end INTEGER,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    succeeded INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    rows_flushed INTEGER NOT NULL DEFAULT 0,
    flushes INTEGER NOT NULL DEFAULT 0,
    recycles INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_runs_shard ON runs(shard_index, shard_step);

-- How each worklist item was resolved within a run
CREATE TABLE IF NOT EXISTS item_resolutions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    item_index INTEGER NOT NULL,
    display_name TEXT NOT NULL,
    outcome TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    detail TEXT,
    recorded_at TEXT NOT NULL,
    UNIQUE(run_id, item_index)
);

CREATE INDEX IF NOT EXISTS idx_item_resolutions_run ON item_resolutions(run_id);
CREATE INDEX IF NOT EXISTS idx_item_resolutions_outcome ON item_resolutions(outcome);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
