//! Metric-Reel: a sharded, resumable metric snapshot scraper
//!
//! This crate walks an ordered worklist of entities, renders each entity's page in a
//! headless browser, extracts its metric values, and writes them as rows into a
//! spreadsheet. Work is split across independent shard processes, progress survives
//! restarts through per-shard checkpoints, and both the browser and the sink are
//! treated as unreliable collaborators.

pub mod browser;
pub mod config;
pub mod extract;
pub mod orchestrator;
pub mod output;
pub mod pacing;
pub mod shard;
pub mod sink;
pub mod state;
pub mod storage;
pub mod worklist;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Metric-Reel operations
///
/// Everything that reaches this type aborts the shard. Per-item extraction faults
/// never do; they are carried as [`extract::ExtractionOutcome`] values instead.
#[derive(Debug, Error)]
pub enum ReelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worklist error: {0}")]
    Worklist(#[from] WorklistError),

    #[error("Failed to access checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Checkpoint {path} holds an invalid value: {content:?}")]
    CorruptCheckpoint { path: PathBuf, content: String },

    #[error("Failed to launch extraction session: {0}")]
    SessionLaunch(#[from] browser::DriverFault),

    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("Final flush left {unflushed} rows unwritten")]
    UnflushedRows { unflushed: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),
}

/// Worklist loading errors
#[derive(Debug, Error)]
pub enum WorklistError {
    #[error("Failed to read worklist file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode worklist rows: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Worklist source unreachable: {0}")]
    Unreachable(#[from] sink::SinkError),

    #[error("Worklist is empty")]
    Empty,
}

/// Result type alias for Metric-Reel operations
pub type Result<T> = std::result::Result<T, ReelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use shard::{ShardAssignment, SinkLocation};
pub use state::{CheckpointStore, ItemState};
pub use worklist::WorkItem;
