//! Result sink
//!
//! Rows are written to a spreadsheet through the [`Sink`] trait. The production
//! implementation talks to the Google Sheets values API; tests substitute their own.

mod batch;
mod sheets;
mod traits;

pub use batch::{BatchBuffer, FlushReport, RejectedEntry, SinkBackoff};
pub use sheets::{batch_update_body, build_http_client, SheetsApi, SheetsSink};
pub use traits::{BatchEntry, Sink, SinkError};
