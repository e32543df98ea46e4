// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::run_log::TaskLogEntry;
use chrono::Utc;
use serde_json::json;

#[tokio::test]
async fn new_ids_are_sequential_and_distinct() {
    let backend = InMemoryBackend::new();
    let a = backend.get_new_job_id().await;
    let b = backend.get_new_job_id().await;
    assert_ne!(a, b);
}

#[tokio::test]
async fn commit_and_fetch_dagobah_json_roundtrips() {
    let backend = InMemoryBackend::new();
    let id = DagobahId::new("d1");
    assert!(backend.get_dagobah_json(&id).await.is_none());

    backend.commit_dagobah(id.clone(), json!({"name": "root"})).await.unwrap();
    assert_eq!(backend.get_dagobah_json(&id).await, Some(json!({"name": "root"})));

    backend.delete_dagobah(&id).await.unwrap();
    assert!(backend.get_dagobah_json(&id).await.is_none());
}

#[tokio::test]
async fn get_known_dagobah_ids_lists_every_commit() {
    let backend = InMemoryBackend::new();
    backend.commit_dagobah(DagobahId::new("d1"), json!({})).await.unwrap();
    backend.commit_dagobah(DagobahId::new("d2"), json!({})).await.unwrap();
    let mut ids = backend.get_known_dagobah_ids().await;
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(ids, vec![DagobahId::new("d1"), DagobahId::new("d2")]);
}

#[tokio::test]
async fn commit_log_updates_latest_and_history() {
    let backend = InMemoryBackend::new();
    let job_id = JobId::new("j1");

    let mut first = RunLog::new(LogId::new("l1"), job_id.clone(), "job", DagobahId::new("d1"), Utc::now());
    first.tasks.insert("t".to_string(), TaskLogEntry::started("echo 1", Utc::now()));
    backend.commit_log(first.clone()).await.unwrap();

    let mut second = RunLog::new(LogId::new("l2"), job_id.clone(), "job", DagobahId::new("d1"), Utc::now());
    second.tasks.insert("t".to_string(), TaskLogEntry::started("echo 2", Utc::now()));
    backend.commit_log(second.clone()).await.unwrap();

    let latest = backend.get_latest_run_log(&job_id, "t").await.unwrap();
    assert_eq!(latest.log_id, second.log_id);

    let history = backend.get_run_log_history(&job_id, "t").await;
    assert_eq!(history, vec![LogId::new("l1"), LogId::new("l2")]);

    assert_eq!(backend.get_run_log(&LogId::new("l1")).await, Some(first));
}

#[tokio::test]
async fn get_latest_run_log_is_none_for_unknown_task() {
    let backend = InMemoryBackend::new();
    assert!(backend.get_latest_run_log(&JobId::new("j1"), "missing").await.is_none());
}

#[tokio::test]
async fn acquire_then_release_lock_does_not_deadlock_on_reuse() {
    let backend = InMemoryBackend::new();
    backend.acquire_lock().await;
    backend.release_lock().await;
    backend.acquire_lock().await;
    backend.release_lock().await;
}

#[test]
fn decode_import_json_parses_a_document() {
    let backend = InMemoryBackend::new();
    let value = backend.decode_import_json(r#"{"name":"root"}"#).unwrap();
    assert_eq!(value, json!({"name": "root"}));
}

#[test]
fn default_stream_truncation_limit_is_500_kib() {
    let backend = InMemoryBackend::new();
    assert_eq!(backend.stream_truncation_limit(), 500 * 1024);
}

#[test]
fn stream_truncation_limit_can_be_overridden() {
    let backend = InMemoryBackend::new().with_stream_truncation_limit(64);
    assert_eq!(backend.stream_truncation_limit(), 64);
}
