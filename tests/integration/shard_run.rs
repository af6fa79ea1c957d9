//! End-to-end shard runs against a scripted browser and a recording sink

use async_trait::async_trait;
use metric_reel::browser::{
    BrowserDriver, CookieRecord, DriverFactory, DriverFault, SessionSettings,
};
use metric_reel::config::{Config, WorklistConfig};
use metric_reel::orchestrator::{Orchestrator, ShardServices};
use metric_reel::output::RunSummary;
use metric_reel::pacing::RecordingPacer;
use metric_reel::shard::SinkLocation;
use metric_reel::sink::{BatchEntry, Sink, SinkError};
use metric_reel::storage::{Resolution, RunStatus, SqliteStorage, Storage};
use metric_reel::worklist::Worklist;
use metric_reel::ReelError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::sync::watch;

const RUN_DATE: &str = "10/16/2026";

/// How a scripted page behaves when loaded
#[derive(Debug, Clone)]
enum Page {
    /// Renders these values
    Values(Vec<&'static str>),
    /// Never renders a value element
    Timeout,
    /// Takes the whole browser down the first `n` times it is loaded
    CrashTimes(usize),
}

/// Shared script for every browser the factory launches
#[derive(Default)]
struct Script {
    pages: HashMap<String, Page>,
    launches: AtomicUsize,
    visits: Mutex<Vec<String>>,
    crashes: Mutex<HashMap<String, usize>>,
    /// Loading this url requests shutdown
    trip_on: Option<(String, watch::Sender<bool>)>,
    /// 1-based launch numbers that fail
    failed_launches: HashSet<usize>,
}

impl Script {
    fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

struct ScriptedFactory {
    script: Arc<Script>,
}

#[async_trait]
impl DriverFactory for ScriptedFactory {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverFault> {
        let launch = self.script.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.script.failed_launches.contains(&launch) {
            return Err(DriverFault::Launch("devtools port busy".to_string()));
        }
        Ok(Box::new(ScriptedDriver {
            script: self.script.clone(),
            current: None,
        }))
    }
}

struct ScriptedDriver {
    script: Arc<Script>,
    current: Option<String>,
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverFault> {
        self.script.visits.lock().unwrap().push(url.to_string());
        if let Some((trip_url, tx)) = &self.script.trip_on {
            if trip_url == url {
                tx.send(true).unwrap();
            }
        }

        if let Some(Page::CrashTimes(limit)) = self.script.pages.get(url) {
            let mut crashes = self.script.crashes.lock().unwrap();
            let seen = crashes.entry(url.to_string()).or_insert(0);
            if *seen < *limit {
                *seen += 1;
                return Err(DriverFault::Backend("chrome exited".to_string()));
            }
        }

        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_until_present(
        &mut self,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<(), DriverFault> {
        match self.current.as_deref().and_then(|url| self.script.pages.get(url)) {
            Some(Page::Timeout) => Err(DriverFault::Timeout),
            _ => Ok(()),
        }
    }

    async fn current_markup(&mut self) -> Result<String, DriverFault> {
        let url = self.current.clone().unwrap_or_default();
        let values: Vec<String> = match self.script.pages.get(&url) {
            Some(Page::Values(values)) => values.iter().map(|v| v.to_string()).collect(),
            // Unscripted pages render their own path as the value
            _ => vec![url.rsplit('/').next().unwrap_or_default().to_string()],
        };

        let cells: String = values
            .iter()
            .map(|v| format!(r#"<div class="valueValue-l31H9iuA apply-common">{}</div>"#, v))
            .collect();
        Ok(format!("<html><body>{}</body></html>", cells))
    }

    async fn inject_cookie(&mut self, _cookie: &CookieRecord) -> Result<(), DriverFault> {
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), DriverFault> {
        Ok(())
    }

    async fn terminate(&mut self) {
        self.current = None;
    }
}

/// Sink that records every batch and can be told to fail
///
/// Any write that includes the `refused` index is rejected, the way Sheets
/// rejects a row wider than the grid.
#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<BatchEntry>>>,
    calls: AtomicUsize,
    failure: Option<SinkError>,
    refused: Option<usize>,
}

impl RecordingSink {
    fn failing(error: SinkError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    fn refusing(index: usize) -> Self {
        Self {
            refused: Some(index),
            ..Self::default()
        }
    }

    fn batches(&self) -> Vec<Vec<BatchEntry>> {
        self.batches.lock().unwrap().clone()
    }

    fn written(&self) -> Vec<BatchEntry> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn update_range(&self, location: &SinkLocation, row: &[String]) -> Result<(), SinkError> {
        self.batch_update(&[BatchEntry {
            index: (location.row - 2) as usize,
            destination: location.clone(),
            values: row.to_vec(),
        }])
        .await
    }

    async fn append_row(&self, _row: &[String]) -> Result<(), SinkError> {
        Err(SinkError::Rejected("append is not used by shards".to_string()))
    }

    async fn batch_update(&self, entries: &[BatchEntry]) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if let Some(refused) = self.refused {
            if entries.iter().any(|entry| entry.index == refused) {
                return Err(SinkError::Rejected(
                    "HTTP 400: Range exceeds grid limits".to_string(),
                ));
            }
        }
        self.batches.lock().unwrap().push(entries.to_vec());
        Ok(())
    }
}

fn url(index: usize) -> String {
    format!("https://charts.example.com/{}", index)
}

/// Worklist of `len` items; indices in `missing` have no locator
fn worklist(len: usize, missing: &[usize]) -> Worklist {
    let mut rows = vec![vec!["Name".to_string(), "Locator".to_string()]];
    for i in 0..len {
        let locator = if missing.contains(&i) {
            String::new()
        } else {
            url(i)
        };
        rows.push(vec![format!("Entity {}", i), locator]);
    }
    Worklist::from_rows(
        rows,
        &WorklistConfig {
            header_rows: 1,
            name_column: 0,
            locator_columns: vec![1],
            sheet: None,
            file: None,
        },
    )
}

struct Harness {
    dir: TempDir,
    config: Config,
}

impl Harness {
    fn new(index: u32, step: u32, capacity: usize, extra: &str) -> Self {
        let dir = tempdir().unwrap();
        let checkpoint = dir.path().join(format!("checkpoint-{}.txt", index));
        let ledger = dir.path().join("ledger.db");
        let config: Config = toml::from_str(&format!(
            r#"
[shard]
index = {index}
step = {step}
checkpoint-path = "{checkpoint}"

[worklist.file]
path = "unused.json"

[retry]
max-retries = 1
delay-ms = 250

[batch]
capacity = {capacity}
max-flush-attempts = 2

[sink]
spreadsheet-id = "sheet-123"
sheet = "Sheet5"

[pacing]
item-pause-ms = 0

[output]
ledger-path = "{ledger}"
{extra}
"#,
            index = index,
            step = step,
            capacity = capacity,
            checkpoint = checkpoint.display(),
            ledger = ledger.display(),
            extra = extra,
        ))
        .unwrap();

        Self { dir, config }
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.config.shard.checkpoint_path()
    }

    fn checkpoint(&self) -> String {
        std::fs::read_to_string(self.checkpoint_path()).unwrap()
    }

    fn ledger(&self) -> SqliteStorage {
        SqliteStorage::new(Path::new(&self.config.output.ledger_path)).unwrap()
    }

    fn orchestrator(
        &self,
        worklist: Worklist,
        script: Arc<Script>,
        sink: Arc<RecordingSink>,
        pacer: Arc<RecordingPacer>,
    ) -> Orchestrator {
        assert!(self.dir.path().exists());
        let services = ShardServices {
            factory: Arc::new(ScriptedFactory { script }),
            session_settings: SessionSettings::from_config(&self.config.session, None),
            sink,
            pacer,
            storage: Box::new(self.ledger()),
        };
        Orchestrator::new(&self.config, "test-hash", worklist, services)
            .unwrap()
            .with_run_date(RUN_DATE)
    }

    async fn run(
        &self,
        worklist: Worklist,
        script: Arc<Script>,
        sink: Arc<RecordingSink>,
    ) -> (i64, Result<RunSummary, ReelError>) {
        let orchestrator =
            self.orchestrator(worklist, script, sink, Arc::new(RecordingPacer::new()));
        let run_id = orchestrator.run_id();
        let (_tx, rx) = watch::channel(false);
        (run_id, orchestrator.run(rx).await)
    }
}

#[tokio::test]
async fn test_shard_writes_owned_items_in_batches() {
    // 10 items, step 2, shard 0, capacity 3
    let harness = Harness::new(0, 2, 3, "");
    let script = Arc::new(Script::default());
    let sink = Arc::new(RecordingSink::default());

    let (run_id, result) = harness.run(worklist(10, &[]), script.clone(), sink.clone()).await;
    let summary = result.expect("shard should complete");

    assert_eq!(summary.owned, 5);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.rows_flushed, 5);
    assert_eq!(summary.flushes, 2);
    assert!(summary.unflushed.is_empty());

    // One browser, only owned pages visited, in order
    assert_eq!(script.launches(), 1);
    assert_eq!(
        script.visits(),
        [0, 2, 4, 6, 8].iter().map(|&i| url(i)).collect::<Vec<_>>()
    );

    // First flush after index 4; 6 and 8 go out at the final flush
    let batches = sink.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(
        batches[0].iter().map(|e| e.index).collect::<Vec<_>>(),
        vec![0, 2, 4]
    );
    assert_eq!(
        batches[1].iter().map(|e| e.index).collect::<Vec<_>>(),
        vec![6, 8]
    );

    let first = &batches[0][0];
    assert_eq!(first.destination.to_string(), "A2");
    assert_eq!(
        first.values,
        vec!["Entity 0".to_string(), RUN_DATE.to_string(), "0".to_string()]
    );

    assert_eq!(harness.checkpoint(), "9");

    let ledger = harness.ledger();
    let run = ledger.get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.succeeded, 5);
    assert_eq!(run.shard_index, 0);
    assert_eq!(run.shard_step, 2);
}

#[tokio::test]
async fn test_shards_write_disjoint_rows() {
    let worklist_len = 9;
    let mut rows = HashSet::new();

    for index in 0..3 {
        let harness = Harness::new(index, 3, 2, "");
        let sink = Arc::new(RecordingSink::default());
        let (_, result) = harness
            .run(worklist(worklist_len, &[]), Arc::new(Script::default()), sink.clone())
            .await;
        result.unwrap();

        for entry in sink.written() {
            assert_eq!(entry.index % 3, index as usize);
            assert!(rows.insert(entry.destination.row), "row written twice");
        }
    }

    assert_eq!(rows.len(), worklist_len);
}

#[tokio::test]
async fn test_resume_skips_checkpointed_items() {
    let harness = Harness::new(0, 2, 5, "");
    std::fs::write(harness.checkpoint_path(), "6").unwrap();
    let script = Arc::new(Script::default());
    let sink = Arc::new(RecordingSink::default());

    let (_, result) = harness.run(worklist(10, &[]), script.clone(), sink.clone()).await;
    let summary = result.unwrap();

    assert_eq!(summary.resumed_from, 6);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(script.visits(), vec![url(6), url(8)]);
    assert_eq!(
        sink.written().iter().map(|e| e.index).collect::<Vec<_>>(),
        vec![6, 8]
    );
    assert_eq!(harness.checkpoint(), "9");
}

#[tokio::test]
async fn test_end_index_bounds_the_shard() {
    let harness = Harness::new(0, 1, 10, "");
    let mut config = harness.config.clone();
    config.shard.start_index = 2;
    config.shard.end_index = Some(4);
    let harness = Harness { config, ..harness };
    let script = Arc::new(Script::default());

    let (_, result) = harness
        .run(worklist(10, &[]), script.clone(), Arc::new(RecordingSink::default()))
        .await;
    let summary = result.unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(script.visits(), vec![url(2), url(3), url(4)]);
    assert_eq!(harness.checkpoint(), "5");
}

#[tokio::test]
async fn test_always_timing_out_item_is_recorded_and_passed() {
    let harness = Harness::new(0, 1, 10, "");
    let script = Arc::new(Script {
        pages: HashMap::from([(url(3), Page::Timeout)]),
        ..Script::default()
    });
    let sink = Arc::new(RecordingSink::default());
    let pacer = Arc::new(RecordingPacer::new());

    let orchestrator = harness.orchestrator(worklist(5, &[]), script.clone(), sink.clone(), pacer.clone());
    let run_id = orchestrator.run_id();
    let (_tx, rx) = watch::channel(false);
    let summary = orchestrator.run(rx).await.unwrap();

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_items[0].index, 3);

    // First attempt plus one retry, with the retry delay in between
    assert_eq!(script.visits().iter().filter(|v| **v == url(3)).count(), 2);
    assert!(pacer.pauses().contains(&Duration::from_millis(250)));

    // No row for the failed item; the checkpoint moved past it
    let indices: Vec<usize> = sink.written().iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 4]);
    assert_eq!(harness.checkpoint(), "5");

    let failed = harness
        .ledger()
        .get_resolutions(run_id, Some(Resolution::Failed))
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].item_index, 3);
    assert_eq!(failed[0].attempts, 2);
}

#[tokio::test]
async fn test_missing_locator_is_skipped_without_browser() {
    let harness = Harness::new(0, 1, 10, "");
    let script = Arc::new(Script::default());
    let sink = Arc::new(RecordingSink::default());

    let (run_id, result) = harness.run(worklist(3, &[0, 1, 2]), script.clone(), sink.clone()).await;
    let summary = result.unwrap();

    assert_eq!(summary.skipped, 3);
    assert_eq!(script.launches(), 0);
    assert!(sink.batches().is_empty());
    assert_eq!(harness.checkpoint(), "3");

    let skipped = harness
        .ledger()
        .get_resolutions(run_id, Some(Resolution::Skipped))
        .unwrap();
    assert_eq!(skipped.len(), 3);
}

#[tokio::test]
async fn test_crash_recycles_the_browser_and_retries() {
    let harness = Harness::new(0, 1, 10, "");
    let script = Arc::new(Script {
        pages: HashMap::from([
            (url(1), Page::CrashTimes(1)),
            (url(2), Page::CrashTimes(5)),
            (url(3), Page::Values(vec!["1.25", "\u{2212}0.5", "\u{2205}"])),
        ]),
        ..Script::default()
    });
    let sink = Arc::new(RecordingSink::default());

    let (_, result) = harness.run(worklist(4, &[]), script.clone(), sink.clone()).await;
    let summary = result.unwrap();

    // Index 1 recovers after one recycle; index 2 crashes twice in a row and is given up
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_items[0].index, 2);
    // Initial launch plus one recycle per first crash; a second crash is not recycled
    assert_eq!(script.launches(), 3);
    assert_eq!(summary.recycles, 2);

    let written = sink.written();
    let last = written.iter().find(|e| e.index == 3).unwrap();
    assert_eq!(
        last.values,
        vec![
            "Entity 3".to_string(),
            RUN_DATE.to_string(),
            "1.25".to_string(),
            "-0.5".to_string(),
            String::new(),
        ]
    );
}

#[tokio::test]
async fn test_session_recycles_after_fetch_limit() {
    let harness = Harness::new(0, 1, 10, "\n[session]\nrecycle-after = 2\n");
    let script = Arc::new(Script::default());

    let (_, result) = harness
        .run(worklist(5, &[]), script.clone(), Arc::new(RecordingSink::default()))
        .await;
    let summary = result.unwrap();

    assert_eq!(summary.succeeded, 5);
    assert_eq!(script.launches(), 3);
    assert_eq!(summary.recycles, 2);
}

#[tokio::test]
async fn test_final_flush_failure_fails_the_run() {
    let harness = Harness::new(0, 1, 10, "");
    let sink = Arc::new(RecordingSink::failing(SinkError::Transient(
        "HTTP 503: backend unavailable".to_string(),
    )));

    let (run_id, result) = harness
        .run(worklist(3, &[]), Arc::new(Script::default()), sink.clone())
        .await;

    match result {
        Err(ReelError::UnflushedRows { unflushed }) => assert_eq!(unflushed, 3),
        other => panic!("expected unflushed rows, got {:?}", other),
    }
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);

    let ledger = harness.ledger();
    assert_eq!(ledger.get_run(run_id).unwrap().status, RunStatus::Failed);
    let unflushed = ledger
        .get_resolutions(run_id, Some(Resolution::Unflushed))
        .unwrap();
    assert_eq!(
        unflushed.iter().map(|r| r.item_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn test_failed_flush_keeps_rows_for_the_next_flush_point() {
    // Two flush attempts per flush point: the first point gives up on 0 and 1, the next carries them
    let harness = Harness::new(0, 1, 2, "");
    let sink = Arc::new(RecordingSink::default());
    let flaky = Arc::new(FlakySink {
        inner: sink.clone(),
        failures_left: AtomicUsize::new(2),
    });

    let worklist = worklist(4, &[]);
    let services = ShardServices {
        factory: Arc::new(ScriptedFactory {
            script: Arc::new(Script::default()),
        }),
        session_settings: SessionSettings::from_config(&harness.config.session, None),
        sink: flaky,
        pacer: Arc::new(RecordingPacer::new()),
        storage: Box::new(harness.ledger()),
    };
    let orchestrator = Orchestrator::new(&harness.config, "test-hash", worklist, services)
        .unwrap()
        .with_run_date(RUN_DATE);
    let (_tx, rx) = watch::channel(false);
    let summary = orchestrator.run(rx).await.unwrap();

    assert_eq!(summary.rows_flushed, 4);
    assert_eq!(summary.flushes, 2);
    assert_eq!(
        sink.batches()
            .iter()
            .map(|batch| batch.iter().map(|e| e.index).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
        vec![vec![0, 1, 2], vec![3]]
    );
    assert!(summary.unflushed.is_empty());
}

/// Fails the first few writes with a 503, then passes through
struct FlakySink {
    inner: Arc<RecordingSink>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl Sink for FlakySink {
    async fn update_range(&self, location: &SinkLocation, row: &[String]) -> Result<(), SinkError> {
        self.inner.update_range(location, row).await
    }

    async fn append_row(&self, row: &[String]) -> Result<(), SinkError> {
        self.inner.append_row(row).await
    }

    async fn batch_update(&self, entries: &[BatchEntry]) -> Result<(), SinkError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(SinkError::Transient("HTTP 503".to_string()));
        }
        self.inner.batch_update(entries).await
    }
}

#[tokio::test]
async fn test_rejected_row_fails_its_item_and_neighbours_are_written() {
    let harness = Harness::new(0, 1, 2, "");
    let sink = Arc::new(RecordingSink::refusing(1));

    let (run_id, result) = harness
        .run(worklist(8, &[]), Arc::new(Script::default()), sink.clone())
        .await;
    let summary = result.expect("a refused row should not fail the run");

    let written: Vec<usize> = sink.written().iter().map(|e| e.index).collect();
    assert_eq!(written, vec![0, 2, 3, 4, 5, 6, 7]);
    assert_eq!(summary.succeeded, 7);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rows_flushed, 7);
    assert_eq!(summary.failed_items[0].index, 1);
    assert!(summary.failed_items[0].reason.contains("A3"));
    assert!(summary.unflushed.is_empty());
    assert_eq!(harness.checkpoint(), "8");

    let ledger = harness.ledger();
    let failed = ledger
        .get_resolutions(run_id, Some(Resolution::Failed))
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].item_index, 1);
    assert!(failed[0].detail.as_deref().unwrap_or_default().contains("400"));

    let run = ledger.get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.succeeded, 7);
}

#[tokio::test]
async fn test_failed_relaunch_fails_one_item_and_the_shard_continues() {
    let harness = Harness::new(0, 1, 10, "");
    let script = Arc::new(Script {
        pages: HashMap::from([(url(1), Page::CrashTimes(1))]),
        failed_launches: HashSet::from([2]),
        ..Script::default()
    });
    let sink = Arc::new(RecordingSink::default());

    let (run_id, result) = harness.run(worklist(6, &[]), script.clone(), sink.clone()).await;
    let summary = result.expect("one failed relaunch should not abort the shard");

    assert_eq!(script.visits(), (0..6).map(url).collect::<Vec<_>>());
    // The crash triggers launch 2, which fails; item 2 gets launch 3
    assert_eq!(script.launches(), 3);
    assert_eq!(summary.recycles, 1);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_items[0].index, 1);
    assert!(summary.failed_items[0].reason.contains("devtools port busy"));
    assert_eq!(
        sink.written().iter().map(|e| e.index).collect::<Vec<_>>(),
        vec![0, 2, 3, 4, 5]
    );
    assert_eq!(harness.checkpoint(), "6");
    assert_eq!(
        harness.ledger().get_run(run_id).unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_browser_that_never_starts_aborts_after_repeated_failures() {
    let harness = Harness::new(0, 1, 10, "");
    let script = Arc::new(Script {
        failed_launches: (1..=10).collect(),
        ..Script::default()
    });

    let (run_id, result) = harness
        .run(worklist(5, &[]), script.clone(), Arc::new(RecordingSink::default()))
        .await;

    match result {
        Err(ReelError::SessionLaunch(DriverFault::Launch(detail))) => {
            assert_eq!(detail, "devtools port busy")
        }
        other => panic!("expected a launch failure, got {:?}", other),
    }
    assert_eq!(
        script.launches(),
        metric_reel::orchestrator::MAX_CONSECUTIVE_LAUNCH_FAILURES as usize
    );
    assert!(script.visits().is_empty());
    // Items given up before the limit are checkpointed; the aborting one is not
    assert_eq!(harness.checkpoint(), "2");

    let ledger = harness.ledger();
    assert_eq!(ledger.get_run(run_id).unwrap().status, RunStatus::Failed);
    let failed = ledger
        .get_resolutions(run_id, Some(Resolution::Failed))
        .unwrap();
    assert_eq!(
        failed.iter().map(|r| r.item_index).collect::<Vec<_>>(),
        vec![0, 1]
    );
}

#[tokio::test]
async fn test_ledger_write_failures_do_not_stop_the_shard() {
    let harness = Harness::new(0, 1, 10, "");
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = harness.orchestrator(
        worklist(3, &[]),
        Arc::new(Script::default()),
        sink.clone(),
        Arc::new(RecordingPacer::new()),
    );

    // Break per-item writes after the run row exists
    rusqlite::Connection::open(&harness.config.output.ledger_path)
        .unwrap()
        .execute("DROP TABLE item_resolutions", [])
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    let summary = orchestrator.run(rx).await.expect("ledger errors are not fatal");

    assert_eq!(summary.succeeded, 3);
    assert_eq!(sink.written().len(), 3);
    assert_eq!(harness.checkpoint(), "3");
}

#[tokio::test]
async fn test_shutdown_stops_between_items_and_flushes() {
    let harness = Harness::new(0, 1, 10, "");
    let (tx, rx) = watch::channel(false);
    let script = Arc::new(Script {
        trip_on: Some((url(1), tx)),
        ..Script::default()
    });
    let sink = Arc::new(RecordingSink::default());

    let orchestrator = harness.orchestrator(
        worklist(6, &[]),
        script.clone(),
        sink.clone(),
        Arc::new(RecordingPacer::new()),
    );
    let run_id = orchestrator.run_id();
    let summary = orchestrator.run(rx).await.unwrap();

    // The item in flight when shutdown arrived still completes
    assert!(summary.interrupted);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(script.visits(), vec![url(0), url(1)]);
    assert_eq!(sink.written().len(), 2);
    assert_eq!(harness.checkpoint(), "2");

    assert_eq!(
        harness.ledger().get_run(run_id).unwrap().status,
        RunStatus::Interrupted
    );
}
