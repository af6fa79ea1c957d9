//! Pacing and backoff
//!
//! Every wait in a shard (retry delays, sink backoff, the politeness pause between
//! items) goes through a [`Pacer`], so the schedule can be checked without sleeping.

mod backoff;

pub use backoff::Backoff;

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Time source used for every deliberate wait
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Waits for `delay`
    async fn pause(&self, delay: Duration);
}

/// Real wall-clock waits on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Records requested waits and returns immediately
///
/// Lets tests assert on pacing without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every wait requested so far, in order
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .map(|pauses| pauses.clone())
            .unwrap_or_default()
    }

    /// Sum of every wait requested so far
    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, delay: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(delay);
        }
    }
}
