//! Delay schedules

use crate::config::{DelaySchedule, RetryConfig};
use std::time::Duration;

/// A delay schedule indexed by retry number
///
/// `delay_for(n)` is the wait before retry `n`, where `n` starts at 1 for the first
/// retry after the initial attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay every time
    Fixed { delay: Duration },

    /// `base * n`, capped
    Linear { base: Duration, max: Duration },

    /// `base * 2^(n-1)`, capped
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Builds the schedule separating extraction attempts of one item
    pub fn for_retries(config: &RetryConfig) -> Self {
        let base = Duration::from_millis(config.delay_ms);
        match config.schedule {
            DelaySchedule::Fixed => Self::Fixed { delay: base },
            DelaySchedule::Linear => Self::Linear {
                base,
                max: base.saturating_mul(config.max_retries.max(1)),
            },
        }
    }

    /// Returns the delay before retry `retry` (1-based; 0 is treated as 1)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        match *self {
            Self::Fixed { delay } => delay,
            Self::Linear { base, max } => base.saturating_mul(retry).min(max),
            Self::Exponential { base, max } => {
                let factor = 1u32 << (retry - 1).min(16);
                base.saturating_mul(factor).min(max)
            }
        }
    }
}
