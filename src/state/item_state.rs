/// Item state definitions for tracking extraction progress
///
/// This module defines the states a single worklist item moves through while its
/// extraction attempts run.
use std::fmt;

/// Represents the current state of a worklist item during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Item has not been attempted yet
    Pending,

    /// An extraction attempt is in flight
    Attempting,

    /// The last attempt timed out or came back empty; another attempt follows
    Retrying,

    /// The last attempt took the browser down; the session is being recycled
    Crashed,

    // ===== Terminal States =====
    /// Values were extracted
    Succeeded,

    /// All attempts used up, or the page was rejected outright
    Exhausted,
}

impl ItemState {
    /// Returns true if this is a terminal state (no further attempts)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    ///
    /// ```text
    /// Pending -> Attempting -> { Succeeded, Retrying, Crashed, Exhausted }
    /// Retrying -> Attempting
    /// Crashed -> { Attempting, Exhausted }
    /// ```
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Attempting)
                | (Self::Attempting, Self::Succeeded)
                | (Self::Attempting, Self::Retrying)
                | (Self::Attempting, Self::Crashed)
                | (Self::Attempting, Self::Exhausted)
                | (Self::Retrying, Self::Attempting)
                | (Self::Crashed, Self::Attempting)
                | (Self::Crashed, Self::Exhausted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Attempting => "attempting",
            Self::Retrying => "retrying",
            Self::Crashed => "crashed",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        }
    }

    /// Returns all possible item states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Attempting,
            Self::Retrying,
            Self::Crashed,
            Self::Succeeded,
            Self::Exhausted,
        ]
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
