//! Batched sink writes
//!
//! Result rows accumulate in a [`BatchBuffer`] and go out in one `batch_update`
//! call once the buffer reaches capacity (and once more at shutdown). A failed
//! flush never drops rows: a row leaves the buffer only once the sink has
//! accepted it, or once the sink has refused that row on its own. A rejected
//! batch is split into single-row writes so one bad row cannot hold back the
//! rest.

use crate::config::BatchConfig;
use crate::pacing::{Backoff, Pacer};
use crate::sink::traits::{BatchEntry, Sink, SinkError};
use std::time::Duration;

/// Backoff schedule for sink errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkBackoff {
    rate_limited: Backoff,
    transient: Backoff,
}

impl SinkBackoff {
    pub fn from_config(config: &BatchConfig) -> Self {
        let max = Duration::from_millis(config.max_backoff_ms);
        Self {
            rate_limited: Backoff::Exponential {
                base: Duration::from_millis(config.rate_limit_backoff_ms),
                max,
            },
            transient: Backoff::Exponential {
                base: Duration::from_millis(config.transient_backoff_ms),
                max,
            },
        }
    }

    /// Delay before resending after `error` on flush attempt `attempt` (1-based)
    ///
    /// A server-provided retry-after wins when it is longer than the schedule.
    pub fn delay_for(&self, error: &SinkError, attempt: u32) -> Duration {
        match error {
            SinkError::RateLimited { retry_after } => {
                let scheduled = self.rate_limited.delay_for(attempt);
                match retry_after {
                    Some(hint) => scheduled.max(*hint),
                    None => scheduled,
                }
            }
            SinkError::Transient(_) => self.transient.delay_for(attempt),
            SinkError::Rejected(_) => Duration::ZERO,
        }
    }
}

/// Outcome of a successful flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Rows written
    pub rows: usize,
    /// Sink calls it took
    pub attempts: u32,
}

/// A row the sink refused when written on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub entry: BatchEntry,
    pub reason: String,
}

/// Ordered buffer of pending result rows
#[derive(Debug)]
pub struct BatchBuffer {
    entries: Vec<BatchEntry>,
    rejected: Vec<RejectedEntry>,
    capacity: usize,
    max_attempts: u32,
    backoff: SinkBackoff,
}

impl BatchBuffer {
    pub fn new(capacity: usize, max_attempts: u32, backoff: SinkBackoff) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.max(1)),
            rejected: Vec::new(),
            capacity: capacity.max(1),
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(
            config.capacity,
            config.max_flush_attempts,
            SinkBackoff::from_config(config),
        )
    }

    pub fn add(&mut self, entry: BatchEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the buffer holds at least `capacity` rows
    pub fn should_flush(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Worklist indices of every buffered row, in insertion order
    pub fn pending_indices(&self) -> Vec<usize> {
        self.entries.iter().map(|entry| entry.index).collect()
    }

    /// Drains the rows the sink refused individually since the last call
    pub fn take_rejected(&mut self) -> Vec<RejectedEntry> {
        std::mem::take(&mut self.rejected)
    }

    /// Sends the buffer in a single sink call
    ///
    /// On success the buffer is emptied and the row count returned. On error the
    /// buffer is left exactly as it was.
    pub async fn flush_once(&mut self, sink: &dyn Sink) -> Result<usize, SinkError> {
        if self.entries.is_empty() {
            return Ok(0);
        }

        sink.batch_update(&self.entries).await?;
        let rows = self.entries.len();
        self.entries.clear();
        Ok(rows)
    }

    /// Writes buffered rows one sink call each
    ///
    /// Accepted rows leave the buffer and are counted in `written`. Refused rows
    /// move to the rejected list. The first retryable error stops the pass and
    /// leaves that row and every row after it buffered, in order.
    async fn write_individually(
        &mut self,
        sink: &dyn Sink,
        written: &mut usize,
    ) -> Result<(), SinkError> {
        let mut pending = std::mem::take(&mut self.entries).into_iter();
        while let Some(entry) = pending.next() {
            match sink.update_range(&entry.destination, &entry.values).await {
                Ok(()) => *written += 1,
                Err(SinkError::Rejected(reason)) => {
                    tracing::error!(
                        index = entry.index,
                        row = %entry.destination,
                        "Sink rejected row: {}",
                        reason
                    );
                    self.rejected.push(RejectedEntry { entry, reason });
                }
                Err(e) => {
                    self.entries.push(entry);
                    self.entries.extend(pending);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Sends the buffer, backing off and resending on retryable errors
    ///
    /// A rejected batch falls back to one write per row; rows the sink refuses
    /// on their own are handed out by [`BatchBuffer::take_rejected`]. Gives up
    /// after `max_attempts` rounds, leaving the unwritten rows buffered for a
    /// later flush.
    pub async fn flush(
        &mut self,
        sink: &dyn Sink,
        pacer: &dyn Pacer,
    ) -> Result<FlushReport, SinkError> {
        if self.entries.is_empty() {
            return Ok(FlushReport {
                rows: 0,
                attempts: 0,
            });
        }

        let mut written = 0;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.flush_once(sink).await {
                Ok(rows) => {
                    tracing::info!(rows, attempt, "Flushed batch to sink");
                    return Ok(FlushReport {
                        rows: written + rows,
                        attempts: attempt,
                    });
                }
                Err(SinkError::Rejected(reason)) => {
                    tracing::warn!(
                        rows = self.entries.len(),
                        "Sink rejected batch, writing rows one at a time: {}",
                        reason
                    );
                    match self.write_individually(sink, &mut written).await {
                        Ok(()) => {
                            return Ok(FlushReport {
                                rows: written,
                                attempts: attempt,
                            })
                        }
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            if attempt >= self.max_attempts {
                tracing::warn!(
                    rows = self.entries.len(),
                    attempt,
                    "Flush still failing after {} attempts: {}",
                    attempt,
                    error
                );
                return Err(error);
            }

            let delay = self.backoff.delay_for(&error, attempt);
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Flush failed, backing off: {}",
                error
            );
            pacer.pause(delay).await;
        }
    }
}
