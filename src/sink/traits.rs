//! Sink traits and error types
//!
//! This module defines the interface the shard writes results through and the
//! error classification every sink implementation must produce.

use crate::shard::SinkLocation;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors a sink can report
///
/// The classification decides what the batch buffer does next; none of these
/// variants ever causes buffered rows to be dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// Backpressure from the sink; back off and resend the same batch
    #[error("Rate limited by sink (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Network trouble or a server-side failure; retry after a short backoff
    #[error("Transient sink error: {0}")]
    Transient(String),

    /// The sink refused the request itself; resending unchanged will not help
    #[error("Sink rejected request: {0}")]
    Rejected(String),
}

impl SinkError {
    /// Returns true if resending the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// One result row waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Worklist index the row belongs to
    pub index: usize,
    pub destination: SinkLocation,
    pub values: Vec<String>,
}

/// Trait for tabular sinks
///
/// Each call is a single request; implementations do not retry on their own.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Writes one row starting at `location`
    async fn update_range(&self, location: &SinkLocation, row: &[String]) -> Result<(), SinkError>;

    /// Appends one row after the last populated row
    async fn append_row(&self, row: &[String]) -> Result<(), SinkError>;

    /// Writes every entry in a single request
    async fn batch_update(&self, entries: &[BatchEntry]) -> Result<(), SinkError>;
}
