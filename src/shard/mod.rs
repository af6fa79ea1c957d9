//! Shard partitioning
//!
//! Pure functions deciding which worklist indices a shard owns and which sheet row
//! each index's result is written to.

mod assignment;
mod destination;

pub use assignment::ShardAssignment;
pub use destination::{
    destination, quote_sheet_name, SinkLocation, DATA_ROW_OFFSET, FIRST_COLUMN,
    SINK_HEADER_ROWS,
};
