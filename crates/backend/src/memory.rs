// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference `Backend` implementation backed by in-process `HashMap`s.
//! This is the `BaseBackend` default: calls proceed normally but nothing
//! survives a restart. Suitable for embedding and for tests; a durable
//! backend is an application concern (persistence driver choice is a
//! non-goal here).

use crate::backend::{Backend, DEFAULT_STREAM_TRUNCATION_LIMIT};
use crate::error::BackendResult;
use crate::run_log::RunLog;
use async_trait::async_trait;
use dagobah_core::{DagobahId, IdGen, JobId, LogId, SequentialIdGen};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Default)]
struct Store {
    dagobahs: HashMap<DagobahId, Value>,
    jobs: HashMap<JobId, Value>,
    logs: HashMap<LogId, RunLog>,
    /// log ids in commit order, per (job_id, task_name), most recent last.
    history: HashMap<(JobId, String), Vec<LogId>>,
}

/// In-memory `Backend`. IDs are generated with a `SequentialIdGen` by
/// default so tests can assert on predictable ids; swap in
/// `InMemoryBackend::with_id_gen` for production-shaped random ids.
pub struct InMemoryBackend {
    store: Mutex<Store>,
    /// Single-permit semaphore standing in for the original's explicit
    /// `acquire_lock`/`release_lock` pair, which brackets a non-lexical
    /// critical section rather than a single guard's lifetime.
    commit_lock: Semaphore,
    dagobah_ids: Box<dyn IdGen>,
    job_ids: Box<dyn IdGen>,
    log_ids: Box<dyn IdGen>,
    stream_truncation_limit: usize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            commit_lock: Semaphore::new(1),
            dagobah_ids: Box::new(SequentialIdGen::new("dagobah")),
            job_ids: Box::new(SequentialIdGen::new("job")),
            log_ids: Box::new(SequentialIdGen::new("log")),
            stream_truncation_limit: DEFAULT_STREAM_TRUNCATION_LIMIT,
        }
    }

    pub fn with_id_gens(
        dagobah_ids: impl IdGen + 'static,
        job_ids: impl IdGen + 'static,
        log_ids: impl IdGen + 'static,
    ) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            commit_lock: Semaphore::new(1),
            dagobah_ids: Box::new(dagobah_ids),
            job_ids: Box::new(job_ids),
            log_ids: Box::new(log_ids),
            stream_truncation_limit: DEFAULT_STREAM_TRUNCATION_LIMIT,
        }
    }

    /// Overrides the default 500 KiB stream-truncation budget — used by
    /// tests that need a small limit to exercise truncation without
    /// generating hundreds of kilobytes of fixture output.
    pub fn with_stream_truncation_limit(mut self, limit: usize) -> Self {
        self.stream_truncation_limit = limit;
        self
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn get_new_dagobah_id(&self) -> DagobahId {
        DagobahId::new(self.dagobah_ids.next())
    }

    async fn get_new_job_id(&self) -> JobId {
        JobId::new(self.job_ids.next())
    }

    async fn get_new_log_id(&self) -> LogId {
        LogId::new(self.log_ids.next())
    }

    async fn get_known_dagobah_ids(&self) -> Vec<DagobahId> {
        self.store.lock().dagobahs.keys().cloned().collect()
    }

    async fn get_dagobah_json(&self, dagobah_id: &DagobahId) -> Option<Value> {
        self.store.lock().dagobahs.get(dagobah_id).cloned()
    }

    async fn commit_dagobah(&self, dagobah_id: DagobahId, doc: Value) -> BackendResult<()> {
        self.store.lock().dagobahs.insert(dagobah_id, doc);
        Ok(())
    }

    async fn delete_dagobah(&self, dagobah_id: &DagobahId) -> BackendResult<()> {
        self.store.lock().dagobahs.remove(dagobah_id);
        Ok(())
    }

    async fn commit_job(&self, job_id: JobId, doc: Value) -> BackendResult<()> {
        self.store.lock().jobs.insert(job_id, doc);
        Ok(())
    }

    async fn delete_job(&self, job_id: &JobId) -> BackendResult<()> {
        self.store.lock().jobs.remove(job_id);
        Ok(())
    }

    async fn commit_log(&self, log: RunLog) -> BackendResult<()> {
        let mut store = self.store.lock();
        for task_name in log.tasks.keys() {
            store
                .history
                .entry((log.job_id.clone(), task_name.clone()))
                .or_default()
                .push(log.log_id.clone());
        }
        store.logs.insert(log.log_id.clone(), log);
        Ok(())
    }

    async fn get_latest_run_log(&self, job_id: &JobId, task_name: &str) -> Option<RunLog> {
        let store = self.store.lock();
        let ids = store.history.get(&(job_id.clone(), task_name.to_string()))?;
        let latest = ids.last()?;
        store.logs.get(latest).cloned()
    }

    async fn get_run_log_history(&self, job_id: &JobId, task_name: &str) -> Vec<LogId> {
        self.store
            .lock()
            .history
            .get(&(job_id.clone(), task_name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    async fn get_run_log(&self, log_id: &LogId) -> Option<RunLog> {
        self.store.lock().logs.get(log_id).cloned()
    }

    async fn acquire_lock(&self) {
        // acquire_many_owned(1) would also work; forgetting the permit
        // here is deliberate, matching the explicit acquire/release pair
        // the caller expects instead of an RAII guard.
        if let Ok(permit) = self.commit_lock.acquire().await {
            permit.forget();
        }
    }

    async fn release_lock(&self) {
        self.commit_lock.add_permits(1);
    }

    fn stream_truncation_limit(&self) -> usize {
        self.stream_truncation_limit
    }
}

/// Shareable handle, the shape every crate that takes "a backend" expects.
pub type SharedBackend = Arc<dyn Backend>;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
