//! Per-attempt extraction outcomes

use crate::browser::DriverFault;
use std::fmt;

/// Result of one extraction attempt
///
/// Produced per attempt and consumed by the retry policy; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The page yielded at least one value slot
    Success(Vec<Option<String>>),

    /// The page rendered but no values were found
    EmptyTransient,

    /// Waiting for the values exceeded the fetch timeout
    Timeout,

    /// The browser process is unusable
    SessionCrashed,

    /// The page cannot be loaded at all; retrying will not help
    PermanentFailure(String),
}

impl ExtractionOutcome {
    /// Classifies extracted values; an empty sequence is not a success
    pub fn from_values(values: Vec<Option<String>>) -> Self {
        if values.is_empty() {
            Self::EmptyTransient
        } else {
            Self::Success(values)
        }
    }

    pub fn from_fault(fault: &DriverFault) -> Self {
        match fault {
            DriverFault::Timeout => Self::Timeout,
            DriverFault::Backend(_) | DriverFault::Launch(_) => Self::SessionCrashed,
            DriverFault::Rejected(reason) => Self::PermanentFailure(reason.clone()),
        }
    }

    /// True for outcomes that consume a retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmptyTransient | Self::Timeout)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::EmptyTransient => "empty",
            Self::Timeout => "timeout",
            Self::SessionCrashed => "session-crashed",
            Self::PermanentFailure(_) => "permanent-failure",
        }
    }
}

impl fmt::Display for ExtractionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(values) => write!(f, "success ({} values)", values.len()),
            Self::PermanentFailure(reason) => write!(f, "permanent failure: {}", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}
