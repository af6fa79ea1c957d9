//! Retry policy for a single worklist item
//!
//! Drives one item through the [`ItemState`] machine until it is `Succeeded` or
//! `Exhausted`:
//!
//! | Outcome | Next step |
//! |---------|-----------|
//! | `Success` | done |
//! | `Timeout`, `EmptyTransient` | wait, then retry while retries remain |
//! | `SessionCrashed` | recycle the session and retry; a second crash in a row, or a failed relaunch, exhausts the item |
//! | `PermanentFailure` | exhausted immediately |

use crate::browser::ExtractionSession;
use crate::config::RetryConfig;
use crate::extract::ExtractionOutcome;
use crate::pacing::{Backoff, Pacer};
use crate::state::ItemState;
use crate::worklist::WorkItem;

/// Terminal result for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResolution {
    Succeeded {
        values: Vec<Option<String>>,
        attempts: u32,
    },
    Exhausted {
        reason: String,
        attempts: u32,
    },
}

impl ItemResolution {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Bounded retry with session recycling on crash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Backoff::for_retries(config))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs attempts for `item` until it reaches a terminal state
    ///
    /// Attempts rotate through the item's usable locators. If the session cannot
    /// be relaunched after a crash the item is exhausted and the session is left
    /// without a browser for the caller to relaunch.
    pub async fn resolve(
        &self,
        item: &WorkItem,
        session: &mut ExtractionSession,
        pacer: &dyn Pacer,
    ) -> ItemResolution {
        let locators = item.usable_locators();
        if locators.is_empty() {
            return ItemResolution::Exhausted {
                reason: "no usable locator".to_string(),
                attempts: 0,
            };
        }

        let mut state = ItemState::Pending;
        let mut attempts: u32 = 0;
        let mut retries: u32 = 0;
        let mut last_crashed = false;

        loop {
            state = advance(state, ItemState::Attempting);
            let locator = locators[attempts as usize % locators.len()];
            attempts += 1;

            let outcome = session.fetch(locator).await;
            tracing::debug!(
                index = item.index,
                attempt = attempts,
                outcome = outcome.label(),
                "Extraction attempt finished"
            );

            match outcome {
                ExtractionOutcome::Success(values) => {
                    advance(state, ItemState::Succeeded);
                    return ItemResolution::Succeeded { values, attempts };
                }
                ExtractionOutcome::EmptyTransient | ExtractionOutcome::Timeout => {
                    last_crashed = false;
                    if retries >= self.max_retries {
                        advance(state, ItemState::Exhausted);
                        return ItemResolution::Exhausted {
                            reason: format!("{} after {} attempts", outcome.label(), attempts),
                            attempts,
                        };
                    }

                    retries += 1;
                    state = advance(state, ItemState::Retrying);
                    let delay = self.backoff.delay_for(retries);
                    tracing::warn!(
                        index = item.index,
                        attempt = attempts,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed ({}), retrying",
                        outcome.label()
                    );
                    pacer.pause(delay).await;
                }
                ExtractionOutcome::SessionCrashed => {
                    state = advance(state, ItemState::Crashed);
                    if last_crashed {
                        advance(state, ItemState::Exhausted);
                        return ItemResolution::Exhausted {
                            reason: "session crashed twice in a row".to_string(),
                            attempts,
                        };
                    }

                    tracing::warn!(
                        index = item.index,
                        attempt = attempts,
                        "Browser session crashed, recycling"
                    );
                    last_crashed = true;
                    if let Err(fault) = session.recycle().await {
                        tracing::error!(
                            index = item.index,
                            "Browser relaunch failed: {}",
                            fault
                        );
                        advance(state, ItemState::Exhausted);
                        return ItemResolution::Exhausted {
                            reason: format!("browser relaunch failed: {}", fault),
                            attempts,
                        };
                    }
                }
                ExtractionOutcome::PermanentFailure(reason) => {
                    advance(state, ItemState::Exhausted);
                    return ItemResolution::Exhausted { reason, attempts };
                }
            }
        }
    }
}

fn advance(from: ItemState, to: ItemState) -> ItemState {
    debug_assert!(
        from.can_transition_to(to),
        "invalid item transition {} -> {}",
        from,
        to
    );
    to
}
