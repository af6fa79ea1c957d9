//! Google Sheets v4 values API client
//!
//! Only the handful of `spreadsheets.values` calls the shard needs:
//! - `GET values/{range}` to read the worklist
//! - `PUT values/{range}` for a single row
//! - `POST values/{range}:append` to append a row
//! - `POST values:batchUpdate` for a flushed batch
//!
//! The bearer token is taken as given; obtaining one is the operator's job.

use crate::config::SinkConfig;
use crate::shard::{quote_sheet_name, SinkLocation};
use crate::sink::traits::{BatchEntry, Sink, SinkError};
use crate::{ConfigError, ReelError};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Values range payload returned by `values.get`
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Authenticated access to the Sheets values API
#[derive(Debug, Clone)]
pub struct SheetsApi {
    client: Client,
    base_url: Url,
    token: String,
}

/// Builds the HTTP client used for every Sheets request
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("metric-reel/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

impl SheetsApi {
    /// Creates a client against `base_url` (normally `https://sheets.googleapis.com`)
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, ReelError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid sink base-url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(format!(
                "sink base-url cannot carry a path: {}",
                base_url
            ))
            .into());
        }

        Ok(Self {
            client: build_http_client(timeout)?,
            base_url,
            token: token.into(),
        })
    }

    /// Creates a client from the `[sink]` section, reading the token from the environment
    pub fn from_config(config: &SinkConfig) -> Result<Self, ReelError> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| ConfigError::MissingEnv(config.token_env.clone()))?;
        Self::new(
            &config.base_url,
            token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Builds `{base}/v4/spreadsheets/{id}/{segments...}` with each segment escaped
    fn spreadsheet_url(&self, spreadsheet_id: &str, segments: &[&str]) -> Result<Url, SinkError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SinkError::Rejected(format!("unusable base url {}", self.base_url)))?;
            path.pop_if_empty()
                .extend(["v4", "spreadsheets", spreadsheet_id])
                .extend(segments);
        }
        Ok(url)
    }

    /// Reads every row of `range` as strings
    pub async fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SinkError> {
        let url = self.spreadsheet_url(spreadsheet_id, &["values", range])?;
        let response = self.send(self.client.get(url)).await?;

        let payload: ValueRange = response.json().await.map_err(classify_reqwest_error)?;
        Ok(payload
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SinkError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        classify_response(response).await
    }
}

/// Writes result rows into one sheet of one spreadsheet
#[derive(Debug, Clone)]
pub struct SheetsSink {
    api: SheetsApi,
    spreadsheet_id: String,
    sheet: String,
    value_input_option: String,
}

impl SheetsSink {
    pub fn new(
        api: SheetsApi,
        spreadsheet_id: impl Into<String>,
        sheet: impl Into<String>,
        value_input_option: impl Into<String>,
    ) -> Self {
        Self {
            api,
            spreadsheet_id: spreadsheet_id.into(),
            sheet: sheet.into(),
            value_input_option: value_input_option.into(),
        }
    }

    /// Creates the sink described by the `[sink]` section
    pub fn from_config(config: &SinkConfig) -> Result<Self, ReelError> {
        Ok(Self::new(
            SheetsApi::from_config(config)?,
            config.spreadsheet_id.clone(),
            config.sheet.clone(),
            config.value_input_option.clone(),
        ))
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Reads the sheet's first cell to confirm the spreadsheet is reachable
    pub async fn probe(&self) -> Result<(), SinkError> {
        let range = format!("{}!A1", quote_sheet_name(&self.sheet));
        self.api
            .read_values(&self.spreadsheet_id, &range)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Sink for SheetsSink {
    async fn update_range(&self, location: &SinkLocation, row: &[String]) -> Result<(), SinkError> {
        let range = location.a1(&self.sheet);
        let mut url = self
            .api
            .spreadsheet_url(&self.spreadsheet_id, &["values", &range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", &self.value_input_option);

        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [row],
        });
        self.api.send(self.api.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn append_row(&self, row: &[String]) -> Result<(), SinkError> {
        let range = format!("{}!A1", quote_sheet_name(&self.sheet));
        let mut url = self.api.spreadsheet_url(
            &self.spreadsheet_id,
            &["values", &format!("{}:append", range)],
        )?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", &self.value_input_option)
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = json!({
            "majorDimension": "ROWS",
            "values": [row],
        });
        self.api.send(self.api.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn batch_update(&self, entries: &[BatchEntry]) -> Result<(), SinkError> {
        if entries.is_empty() {
            return Ok(());
        }

        let url = self
            .api
            .spreadsheet_url(&self.spreadsheet_id, &["values:batchUpdate"])?;
        let body = batch_update_body(&self.sheet, &self.value_input_option, entries);
        self.api.send(self.api.client.post(url).json(&body)).await?;
        Ok(())
    }
}

/// Builds the `values:batchUpdate` request body
pub fn batch_update_body(sheet: &str, value_input_option: &str, entries: &[BatchEntry]) -> Value {
    let data: Vec<Value> = entries
        .iter()
        .map(|entry| {
            json!({
                "range": entry.destination.a1(sheet),
                "majorDimension": "ROWS",
                "values": [entry.values],
            })
        })
        .collect();

    json!({
        "valueInputOption": value_input_option,
        "data": data,
    })
}

/// Maps a non-success response onto the sink error taxonomy
///
/// | Response | Error |
/// |----------|-------|
/// | 2xx | none |
/// | 429 | RateLimited |
/// | 403 with a rate-limit reason | RateLimited |
/// | 408, 5xx | Transient |
/// | other 4xx | Rejected |
async fn classify_response(response: Response) -> Result<Response, SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && is_rate_limit_body(&body))
    {
        return Err(SinkError::RateLimited { retry_after });
    }

    let detail = format!("HTTP {}: {}", status.as_u16(), snippet(&body));
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Err(SinkError::Transient(detail))
    } else {
        Err(SinkError::Rejected(detail))
    }
}

fn is_rate_limit_body(body: &str) -> bool {
    body.contains("RATE_LIMIT_EXCEEDED")
        || body.contains("rateLimitExceeded")
        || body.contains("userRateLimitExceeded")
}

fn classify_reqwest_error(error: reqwest::Error) -> SinkError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        SinkError::Transient(error.to_string())
    } else {
        SinkError::Rejected(error.to_string())
    }
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
