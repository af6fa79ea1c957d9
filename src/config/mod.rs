//! Configuration module for Metric-Reel
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and layering process-level overrides (CLI flags, environment) over them.
//!
//! # Example
//!
//! ```no_run
//! use metric_reel::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("reel.toml")).unwrap();
//! println!("Batch capacity: {}", config.batch.capacity);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BatchConfig, Config, ConfigOverrides, DelaySchedule, FileSource, OutputConfig,
    PacingConfig, RetryConfig, SessionConfig, ShardConfig, SheetSource, SinkConfig,
    WorklistConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_config_with_overrides,
};
pub use validation::validate;
