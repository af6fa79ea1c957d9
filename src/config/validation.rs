use crate::config::types::{
    BatchConfig, Config, OutputConfig, RetryConfig, SessionConfig, ShardConfig, SinkConfig,
    WorklistConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_shard_config(&config.shard)?;
    validate_worklist_config(&config.worklist)?;
    validate_session_config(&config.session)?;
    validate_retry_config(&config.retry)?;
    validate_batch_config(&config.batch)?;
    validate_sink_config(&config.sink)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the shard assignment
fn validate_shard_config(config: &ShardConfig) -> Result<(), ConfigError> {
    if config.step < 1 {
        return Err(ConfigError::Validation(format!(
            "shard step must be >= 1, got {}",
            config.step
        )));
    }

    if config.index >= config.step {
        return Err(ConfigError::Validation(format!(
            "shard index must be in [0, {}), got {}",
            config.step, config.index
        )));
    }

    if let Some(end) = config.end_index {
        if end < config.start_index {
            return Err(ConfigError::Validation(format!(
                "end-index ({}) must not be below start-index ({})",
                end, config.start_index
            )));
        }
    }

    if let Some(path) = &config.checkpoint_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "checkpoint-path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates the worklist source and column layout
fn validate_worklist_config(config: &WorklistConfig) -> Result<(), ConfigError> {
    match (&config.sheet, &config.file) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::Validation(
                "worklist must have exactly one source, found both [worklist.sheet] and [worklist.file]"
                    .to_string(),
            ))
        }
        (None, None) => {
            return Err(ConfigError::Validation(
                "worklist needs a [worklist.sheet] or [worklist.file] source".to_string(),
            ))
        }
        (Some(sheet), None) => {
            if sheet.spreadsheet_id.is_empty() || sheet.range.is_empty() {
                return Err(ConfigError::Validation(
                    "worklist sheet needs a spreadsheet-id and a range".to_string(),
                ));
            }
        }
        (None, Some(file)) => {
            if file.path.is_empty() {
                return Err(ConfigError::Validation(
                    "worklist file path cannot be empty".to_string(),
                ));
            }
        }
    }

    if config.locator_columns.is_empty() {
        return Err(ConfigError::Validation(
            "locator-columns must name at least one column".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser session settings
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.value_class.trim().is_empty() {
        return Err(ConfigError::Validation(
            "value-class cannot be empty".to_string(),
        ));
    }

    if config.value_class.contains(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "value-class must be a single class fragment, got '{}'",
            config.value_class
        )));
    }

    if !config
        .value_element
        .chars()
        .all(|c| c.is_ascii_alphanumeric())
        || config.value_element.is_empty()
    {
        return Err(ConfigError::Validation(format!(
            "value-element must be a plain tag name, got '{}'",
            config.value_element
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.recycle_after < 1 {
        return Err(ConfigError::Validation(
            "recycle-after must be >= 1".to_string(),
        ));
    }

    if config.window_width == 0 || config.window_height == 0 {
        return Err(ConfigError::Validation(
            "window dimensions must be non-zero".to_string(),
        ));
    }

    if config.cookie_file.is_some() {
        Url::parse(&config.cookie_domain)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid cookie-domain: {}", e)))?;
    }

    Ok(())
}

/// Validates the retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates batching and backoff
fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.capacity < 1 {
        return Err(ConfigError::Validation(
            "batch capacity must be >= 1".to_string(),
        ));
    }

    if config.max_flush_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-flush-attempts must be >= 1".to_string(),
        ));
    }

    if config.max_backoff_ms < config.rate_limit_backoff_ms
        || config.max_backoff_ms < config.transient_backoff_ms
    {
        return Err(ConfigError::Validation(format!(
            "max-backoff-ms ({}) must not be below the base backoffs",
            config.max_backoff_ms
        )));
    }

    Ok(())
}

/// Validates the destination spreadsheet
fn validate_sink_config(config: &SinkConfig) -> Result<(), ConfigError> {
    if config.spreadsheet_id.is_empty() {
        return Err(ConfigError::Validation(
            "sink spreadsheet-id cannot be empty".to_string(),
        ));
    }

    if config.sheet.is_empty() {
        return Err(ConfigError::Validation(
            "sink sheet cannot be empty".to_string(),
        ));
    }

    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid sink base-url: {}", e)))?;
    if base.scheme() != "https" && base.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "sink base-url must be http(s), got '{}'",
            config.base_url
        )));
    }

    if config.token_env.is_empty() {
        return Err(ConfigError::Validation(
            "token-env cannot be empty".to_string(),
        ));
    }

    if config.date_format.is_empty() {
        return Err(ConfigError::Validation(
            "date-format cannot be empty".to_string(),
        ));
    }

    if chrono::format::StrftimeItems::new(&config.date_format)
        .any(|item| matches!(item, chrono::format::Item::Error))
    {
        return Err(ConfigError::Validation(format!(
            "date-format is not a valid strftime pattern: {}",
            config.date_format
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.ledger_path.is_empty() {
        return Err(ConfigError::Validation(
            "ledger-path cannot be empty".to_string(),
        ));
    }

    if config.failures_path.is_empty() {
        return Err(ConfigError::Validation(
            "failures-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
