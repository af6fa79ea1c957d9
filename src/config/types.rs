use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Metric-Reel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub shard: ShardConfig,
    pub worklist: WorklistConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which slice of the worklist this process owns
#[derive(Debug, Clone, Deserialize)]
pub struct ShardConfig {
    /// This shard's residue class, in `[0, step)`
    #[serde(default)]
    pub index: u32,

    /// Total number of shards the worklist is split across
    #[serde(default = "default_shard_step")]
    pub step: u32,

    /// First worklist index considered (inclusive)
    #[serde(rename = "start-index", default)]
    pub start_index: usize,

    /// Last worklist index considered (inclusive); whole worklist when absent
    #[serde(rename = "end-index", default)]
    pub end_index: Option<usize>,

    /// Checkpoint file; defaults to `checkpoint_shard_{index}.txt`
    #[serde(rename = "checkpoint-path", default)]
    pub checkpoint_path: Option<String>,
}

impl ShardConfig {
    /// Resolves the checkpoint file path for this shard
    pub fn checkpoint_path(&self) -> PathBuf {
        match &self.checkpoint_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(format!("checkpoint_shard_{}.txt", self.index)),
        }
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            index: 0,
            step: default_shard_step(),
            start_index: 0,
            end_index: None,
            checkpoint_path: None,
        }
    }
}

/// Where the worklist comes from and how its columns are read
#[derive(Debug, Clone, Deserialize)]
pub struct WorklistConfig {
    /// Number of leading header rows to drop
    #[serde(rename = "header-rows", default = "default_header_rows")]
    pub header_rows: usize,

    /// Zero-based column holding the display name
    #[serde(rename = "name-column", default)]
    pub name_column: usize,

    /// Zero-based columns holding locators, in preference order
    #[serde(rename = "locator-columns", default = "default_locator_columns")]
    pub locator_columns: Vec<usize>,

    /// Read the worklist from a spreadsheet range
    #[serde(default)]
    pub sheet: Option<SheetSource>,

    /// Read the worklist from a JSON file of rows
    #[serde(default)]
    pub file: Option<FileSource>,
}

/// Worklist stored in a spreadsheet
#[derive(Debug, Clone, Deserialize)]
pub struct SheetSource {
    #[serde(rename = "spreadsheet-id")]
    pub spreadsheet_id: String,

    /// A1 range to read, e.g. `Sheet1` or `Sheet1!A1:E`
    pub range: String,
}

/// Worklist stored locally as a JSON array of string rows
#[derive(Debug, Clone, Deserialize)]
pub struct FileSource {
    pub path: String,
}

/// Browser session behavior
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Class fragment identifying value elements (also the wait selector)
    #[serde(rename = "value-class", default = "default_value_class")]
    pub value_class: String,

    /// Tag name of value elements
    #[serde(rename = "value-element", default = "default_value_element")]
    pub value_element: String,

    /// Maximum wait for value elements to appear (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Recreate the browser after this many fetches
    #[serde(rename = "recycle-after", default = "default_recycle_after")]
    pub recycle_after: u32,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default)]
    pub sandbox: bool,

    #[serde(rename = "window-width", default = "default_window_width")]
    pub window_width: u32,

    #[serde(rename = "window-height", default = "default_window_height")]
    pub window_height: u32,

    /// Optional Chrome/Chromium binary; auto-detected when absent
    #[serde(rename = "chrome-path", default)]
    pub chrome_path: Option<String>,

    /// Optional JSON cookie file applied on every session creation
    #[serde(rename = "cookie-file", default)]
    pub cookie_file: Option<String>,

    /// Page visited before cookies are injected
    #[serde(rename = "cookie-domain", default = "default_cookie_domain")]
    pub cookie_domain: String,
}

impl SessionConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            value_class: default_value_class(),
            value_element: default_value_element(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            recycle_after: default_recycle_after(),
            headless: true,
            sandbox: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            chrome_path: None,
            cookie_file: None,
            cookie_domain: default_cookie_domain(),
        }
    }
}

/// Shape of the delay between extraction attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelaySchedule {
    /// Same delay before every retry
    Fixed,
    /// Delay grows by the base delay with each retry
    Linear,
}

/// Per-item retry behavior
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt for timeouts and empty pages
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts (milliseconds)
    #[serde(rename = "delay-ms", default = "default_retry_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_schedule")]
    pub schedule: DelaySchedule,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_retry_delay_ms(),
            schedule: default_schedule(),
        }
    }
}

/// Result batching and sink backoff
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Rows buffered before a bulk write
    #[serde(default = "default_batch_capacity")]
    pub capacity: usize,

    /// First backoff after a rate-limit response (milliseconds)
    #[serde(rename = "rate-limit-backoff-ms", default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Backoff after any other transient sink error (milliseconds)
    #[serde(rename = "transient-backoff-ms", default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,

    /// Upper bound on any single sink backoff (milliseconds)
    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Write attempts per flush call before giving the batch back
    #[serde(rename = "max-flush-attempts", default = "default_max_flush_attempts")]
    pub max_flush_attempts: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            capacity: default_batch_capacity(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            transient_backoff_ms: default_transient_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_flush_attempts: default_max_flush_attempts(),
        }
    }
}

/// Destination spreadsheet
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(rename = "spreadsheet-id")]
    pub spreadsheet_id: String,

    /// Sheet (tab) name rows are written into
    pub sheet: String,

    #[serde(rename = "base-url", default = "default_sink_base_url")]
    pub base_url: String,

    /// Environment variable holding the bearer token
    #[serde(rename = "token-env", default = "default_token_env")]
    pub token_env: String,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// chrono format of the run date written into every row
    #[serde(rename = "date-format", default = "default_date_format")]
    pub date_format: String,

    #[serde(rename = "value-input-option", default = "default_value_input_option")]
    pub value_input_option: String,
}

/// Politeness pacing
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Pause after every resolved item (milliseconds)
    #[serde(rename = "item-pause-ms", default = "default_item_pause_ms")]
    pub item_pause_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            item_pause_ms: default_item_pause_ms(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite run ledger
    #[serde(rename = "ledger-path", default = "default_ledger_path")]
    pub ledger_path: String,

    /// Path of the markdown report of permanently failed items
    #[serde(rename = "failures-path", default = "default_failures_path")]
    pub failures_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            failures_path: default_failures_path(),
        }
    }
}

/// Process-level overrides layered over the file, typically from the CLI or environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub shard_index: Option<u32>,
    pub shard_step: Option<u32>,
    pub start_index: Option<usize>,
    pub end_index: Option<usize>,
    pub checkpoint_path: Option<String>,
    pub batch_capacity: Option<usize>,
    pub max_retries: Option<u32>,
    pub fetch_timeout_secs: Option<u64>,
    pub item_pause_ms: Option<u64>,
}

impl Config {
    /// Applies every override that is set
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(index) = overrides.shard_index {
            self.shard.index = index;
        }
        if let Some(step) = overrides.shard_step {
            self.shard.step = step;
        }
        if let Some(start) = overrides.start_index {
            self.shard.start_index = start;
        }
        if let Some(end) = overrides.end_index {
            self.shard.end_index = Some(end);
        }
        if let Some(path) = &overrides.checkpoint_path {
            self.shard.checkpoint_path = Some(path.clone());
        }
        if let Some(capacity) = overrides.batch_capacity {
            self.batch.capacity = capacity;
        }
        if let Some(retries) = overrides.max_retries {
            self.retry.max_retries = retries;
        }
        if let Some(timeout) = overrides.fetch_timeout_secs {
            self.session.fetch_timeout_secs = timeout;
        }
        if let Some(pause) = overrides.item_pause_ms {
            self.pacing.item_pause_ms = pause;
        }
    }
}

fn default_shard_step() -> u32 {
    1
}

fn default_header_rows() -> usize {
    1
}

fn default_locator_columns() -> Vec<usize> {
    vec![4]
}

fn default_value_class() -> String {
    "valueValue-l31H9iuA".to_string()
}

fn default_value_element() -> String {
    "div".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_recycle_after() -> u32 {
    250
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_cookie_domain() -> String {
    "https://www.tradingview.com/".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_schedule() -> DelaySchedule {
    DelaySchedule::Fixed
}

fn default_batch_capacity() -> usize {
    20
}

fn default_rate_limit_backoff_ms() -> u64 {
    5000
}

fn default_transient_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_max_flush_attempts() -> u32 {
    8
}

fn default_sink_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_token_env() -> String {
    "SHEETS_ACCESS_TOKEN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_date_format() -> String {
    "%m/%d/%Y".to_string()
}

fn default_value_input_option() -> String {
    "USER_ENTERED".to_string()
}

fn default_item_pause_ms() -> u64 {
    500
}

fn default_ledger_path() -> String {
    "./metric-reel.db".to_string()
}

fn default_failures_path() -> String {
    "./failed_items.md".to_string()
}
