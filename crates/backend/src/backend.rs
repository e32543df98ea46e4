// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence seam (`BaseBackend` in the original). Deliberately a
//! thin upsert contract, not an event-sourced store: every commit method
//! takes the caller's already-serialized JSON document and replaces
//! whatever was there. Nothing here transacts across documents — a job
//! commit and its owning dagobah's commit are two separate calls, cascaded
//! by the caller (see `dagobah-engine`'s commit delegator), not by the
//! backend.

use crate::error::BackendResult;
use crate::run_log::RunLog;
use async_trait::async_trait;
use dagobah_core::{DagobahId, JobId, LogId};
use serde_json::Value;

/// Default stream-capture truncation threshold: 500 KiB, matching the
/// document-store backend the original shipped with.
pub const DEFAULT_STREAM_TRUNCATION_LIMIT: usize = 500 * 1024;

/// Storage contract a `Dagobah` root and its jobs commit through.
///
/// Implementors only need to persist and retrieve opaque JSON documents
/// and `RunLog` records; they never interpret job or task semantics.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_new_dagobah_id(&self) -> DagobahId;
    async fn get_new_job_id(&self) -> JobId;
    async fn get_new_log_id(&self) -> LogId;

    async fn get_known_dagobah_ids(&self) -> Vec<DagobahId>;
    async fn get_dagobah_json(&self, dagobah_id: &DagobahId) -> Option<Value>;

    async fn commit_dagobah(&self, dagobah_id: DagobahId, doc: Value) -> BackendResult<()>;
    async fn delete_dagobah(&self, dagobah_id: &DagobahId) -> BackendResult<()>;

    async fn commit_job(&self, job_id: JobId, doc: Value) -> BackendResult<()>;
    async fn delete_job(&self, job_id: &JobId) -> BackendResult<()>;

    async fn commit_log(&self, log: RunLog) -> BackendResult<()>;
    async fn get_latest_run_log(&self, job_id: &JobId, task_name: &str) -> Option<RunLog>;
    async fn get_run_log_history(&self, job_id: &JobId, task_name: &str) -> Vec<LogId>;
    async fn get_run_log(&self, log_id: &LogId) -> Option<RunLog>;

    /// Advisory lock spanning the mutate-then-commit sequence a `Job`
    /// performs in `_complete_task`. An in-process backend can implement
    /// this with a plain mutex; a networked backend would use a real
    /// distributed lock.
    async fn acquire_lock(&self);
    async fn release_lock(&self);

    /// Parses a previously-exported document. The original's
    /// `decode_import_json` additionally ran a list of caller-supplied
    /// value transformers over every leaf; Rust's static `Job`/`Dagobah`
    /// deserialization targets make that unnecessary; this just parses.
    fn decode_import_json(&self, raw: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Byte ceiling applied to captured stdout/stderr before a commit.
    fn stream_truncation_limit(&self) -> usize {
        DEFAULT_STREAM_TRUNCATION_LIMIT
    }
}
