//! Value extraction and per-item retry
//!
//! # Components
//!
//! - `ValueExtractor`: pulls metric values out of rendered markup
//! - `ExtractionOutcome`: classification of a single attempt
//! - `RetryPolicy`: drives one item to `Succeeded` or `Exhausted`

mod outcome;
mod parser;
mod retry;

pub use outcome::ExtractionOutcome;
pub use parser::{normalize_value, ValueExtractor};
pub use retry::{ItemResolution, RetryPolicy};
