//! Worklist loading
//!
//! The worklist is an ordered table read once at startup. After the header rows are
//! dropped, row `n` becomes the [`WorkItem`] with index `n`; that index is the item's
//! only identity and drives both shard ownership and the destination row.

use crate::config::{Config, WorklistConfig};
use crate::sink::SheetsApi;
use crate::{ReelError, WorklistError};
use std::path::Path;
use url::Url;

/// One entity to scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Position in the worklist after header rows
    pub index: usize,

    pub display_name: String,

    /// Candidate page locations, in preference order, as read from the source
    pub locators: Vec<String>,
}

impl WorkItem {
    /// Locators that are absolute http(s) URLs
    pub fn usable_locators(&self) -> Vec<&str> {
        self.locators
            .iter()
            .map(|locator| locator.trim())
            .filter(|locator| is_usable_locator(locator))
            .collect()
    }

    pub fn has_usable_locator(&self) -> bool {
        self.locators
            .iter()
            .any(|locator| is_usable_locator(locator.trim()))
    }
}

fn is_usable_locator(locator: &str) -> bool {
    match Url::parse(locator) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// The full, read-only worklist for a run
#[derive(Debug, Clone, Default)]
pub struct Worklist {
    items: Vec<WorkItem>,
}

impl Worklist {
    /// Builds the worklist from raw table rows
    ///
    /// Missing cells (short rows) read as empty strings, so a row without a locator
    /// still occupies its index.
    pub fn from_rows(rows: Vec<Vec<String>>, layout: &WorklistConfig) -> Self {
        let items = rows
            .into_iter()
            .skip(layout.header_rows)
            .enumerate()
            .map(|(index, row)| {
                let cell = |column: usize| row.get(column).cloned().unwrap_or_default();
                WorkItem {
                    index,
                    display_name: cell(layout.name_column).trim().to_string(),
                    locators: layout.locator_columns.iter().map(|&c| cell(c)).collect(),
                }
            })
            .collect();

        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WorkItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
    }
}

/// Reads rows from a local JSON file shaped like a spreadsheet values payload
///
/// The file holds an array of rows, each an array of strings:
/// `[["Name", "", "", "", "Url"], ["Acme", "", "", "", "https://..."]]`.
pub fn read_rows_file(path: &Path) -> Result<Vec<Vec<String>>, WorklistError> {
    let content = std::fs::read_to_string(path)?;
    let rows: Vec<Vec<String>> = serde_json::from_str(&content)?;
    Ok(rows)
}

/// Loads the worklist from whichever source the configuration names
///
/// Any failure here is fatal for the shard: there is nothing to process without it.
pub async fn load_worklist(config: &Config) -> Result<Worklist, ReelError> {
    let layout = &config.worklist;

    let rows = if let Some(sheet) = &layout.sheet {
        tracing::info!(
            "Reading worklist from spreadsheet {} range {}",
            sheet.spreadsheet_id,
            sheet.range
        );
        let api = SheetsApi::from_config(&config.sink)?;
        api.read_values(&sheet.spreadsheet_id, &sheet.range)
            .await
            .map_err(WorklistError::Unreachable)?
    } else if let Some(file) = &layout.file {
        tracing::info!("Reading worklist from {}", file.path);
        read_rows_file(Path::new(&file.path))?
    } else {
        return Err(crate::ConfigError::Validation("worklist has no source".to_string()).into());
    };

    let worklist = Worklist::from_rows(rows, layout);
    if worklist.is_empty() {
        return Err(WorklistError::Empty.into());
    }

    tracing::info!("Loaded {} worklist items", worklist.len());
    Ok(worklist)
}
