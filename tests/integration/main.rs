//! Integration tests for Metric-Reel
//!
//! `sheets` drives the Sheets client against a wiremock server; `shard_run` runs
//! whole shards against a scripted browser, a recording sink, and a real ledger.

mod shard_run;
mod sheets;
