//! Sheets client tests against a mock HTTP server

use metric_reel::config::BatchConfig;
use metric_reel::pacing::RecordingPacer;
use metric_reel::shard::destination;
use metric_reel::sink::{BatchBuffer, BatchEntry, SheetsApi, SheetsSink, Sink, SinkBackoff, SinkError};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SPREADSHEET: &str = "sheet-123";
const BATCH_PATH: &str = "/v4/spreadsheets/sheet-123/values:batchUpdate";

fn sink_for(server: &MockServer) -> SheetsSink {
    let api = SheetsApi::new(&server.uri(), "test-token", Duration::from_secs(5))
        .expect("Failed to build Sheets client");
    SheetsSink::new(api, SPREADSHEET, "Sheet5", "USER_ENTERED")
}

fn entry(index: usize, name: &str) -> BatchEntry {
    BatchEntry {
        index,
        destination: destination(index),
        values: vec![name.to_string(), "10/16/2026".to_string(), "1.5".to_string()],
    }
}

fn batch_config() -> BatchConfig {
    BatchConfig {
        capacity: 2,
        rate_limit_backoff_ms: 100,
        transient_backoff_ms: 50,
        max_backoff_ms: 10_000,
        max_flush_attempts: 3,
    }
}

#[tokio::test]
async fn test_batch_update_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"totalUpdatedRows": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    sink.batch_update(&[entry(0, "Acme"), entry(7, "Globex")])
        .await
        .expect("batch update should succeed");

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();

    assert_eq!(body["valueInputOption"], "USER_ENTERED");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["range"], "Sheet5!A2");
    assert_eq!(data[0]["values"], json!([["Acme", "10/16/2026", "1.5"]]));
    assert_eq!(data[1]["range"], "Sheet5!A9");
}

#[tokio::test]
async fn test_flush_backs_off_on_rate_limit_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    let pacer = RecordingPacer::new();
    let mut buffer = BatchBuffer::from_config(&batch_config());
    buffer.add(entry(0, "Acme"));
    buffer.add(entry(2, "Initech"));
    assert!(buffer.should_flush());

    let report = buffer.flush(&sink, &pacer).await.expect("flush should recover");

    assert_eq!(report.rows, 2);
    assert_eq!(report.attempts, 2);
    assert!(buffer.is_empty());
    // The server's retry-after outweighs the 100ms schedule
    assert_eq!(pacer.pauses(), vec![Duration::from_secs(7)]);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 2);
}

#[tokio::test]
async fn test_flush_keeps_rows_when_attempts_run_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    let pacer = RecordingPacer::new();
    let mut buffer = BatchBuffer::new(2, 3, SinkBackoff::from_config(&batch_config()));
    buffer.add(entry(4, "Umbrella"));

    let err = buffer.flush(&sink, &pacer).await.unwrap_err();

    assert!(matches!(err, SinkError::Transient(_)));
    assert_eq!(buffer.pending_indices(), vec![4]);
    assert_eq!(pacer.pauses().len(), 2);
}

#[tokio::test]
async fn test_rejected_batch_is_split_into_single_row_writes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("Range exceeds grid limits"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/v4/spreadsheets/sheet-123/values/Sheet5!A3"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Range exceeds grid limits"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/v4/spreadsheets/sheet-123/values/Sheet5!A4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updatedRows": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    let pacer = RecordingPacer::new();
    let mut buffer = BatchBuffer::from_config(&batch_config());
    buffer.add(entry(1, "Hooli"));
    buffer.add(entry(2, "Initech"));

    let report = buffer.flush(&sink, &pacer).await.expect("flush should settle");

    assert_eq!(report.rows, 1);
    assert_eq!(report.attempts, 1);
    assert!(buffer.is_empty());
    assert!(pacer.pauses().is_empty());

    let rejected = buffer.take_rejected();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].entry.index, 1);
    assert!(rejected[0].reason.contains("400"));
}

#[tokio::test]
async fn test_quota_403_counts_as_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "status": "PERMISSION_DENIED",
                "details": [{"reason": "RATE_LIMIT_EXCEEDED"}]
            }
        })))
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    let err = sink.batch_update(&[entry(0, "Acme")]).await.unwrap_err();
    assert_eq!(err, SinkError::RateLimited { retry_after: None });
}

#[tokio::test]
async fn test_update_range_and_append_row() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v4/spreadsheets/sheet-123/values/Sheet5!A12"))
        .and(query_param("valueInputOption", "USER_ENTERED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet-123/values/Sheet5!A1:append"))
        .and(query_param("insertDataOption", "INSERT_ROWS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    let row = vec!["Acme".to_string(), "10/16/2026".to_string()];
    sink.update_range(&destination(10), &row)
        .await
        .expect("update should succeed");
    sink.append_row(&row).await.expect("append should succeed");
}

#[tokio::test]
async fn test_read_values_and_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/source-1/values/Sheet1!A1:E"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Sheet1!A1:E3",
            "majorDimension": "ROWS",
            "values": [
                ["Name", "", "", "", "Url"],
                ["Acme", "", "", "", "https://example.com/acme"],
                ["Globex", 42]
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-123/values/Sheet5!A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"range": "Sheet5!A1"})))
        .expect(1)
        .mount(&server)
        .await;

    let api = SheetsApi::new(&server.uri(), "test-token", Duration::from_secs(5)).unwrap();
    let rows = api.read_values("source-1", "Sheet1!A1:E").await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][4], "https://example.com/acme");
    assert_eq!(rows[2], vec!["Globex".to_string(), "42".to_string()]);

    sink_for(&server).probe().await.expect("probe should succeed");
}

#[tokio::test]
async fn test_probe_reports_missing_spreadsheet() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Requested entity was not found."))
        .mount(&server)
        .await;

    let err = sink_for(&server).probe().await.unwrap_err();
    assert!(matches!(err, SinkError::Rejected(_)));
}
