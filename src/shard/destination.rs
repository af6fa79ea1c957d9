//! Sink locations for worklist indices

use std::fmt;

/// Rows at the top of the destination sheet that are never written
pub const SINK_HEADER_ROWS: u64 = 1;

/// Difference between a worklist index and its 1-based sheet row
pub const DATA_ROW_OFFSET: u64 = SINK_HEADER_ROWS + 1;

/// Column every result row starts in
pub const FIRST_COLUMN: &str = "A";

/// A row anchor in the destination sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkLocation {
    /// 1-based sheet row
    pub row: u64,
    pub column: &'static str,
}

impl SinkLocation {
    /// Renders this location as an A1 range on `sheet`, e.g. `Sheet5!A12`
    pub fn a1(&self, sheet: &str) -> String {
        format!("{}!{}{}", quote_sheet_name(sheet), self.column, self.row)
    }
}

impl fmt::Display for SinkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// Maps a worklist index to its destination row
///
/// Depends on nothing but the index, so shards with disjoint indices can never
/// write to the same row.
pub fn destination(index: usize) -> SinkLocation {
    SinkLocation {
        row: index as u64 + DATA_ROW_OFFSET,
        column: FIRST_COLUMN,
    }
}

/// Quotes a sheet name for A1 notation when it holds anything but word characters
pub fn quote_sheet_name(sheet: &str) -> String {
    if !sheet.is_empty() && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}
