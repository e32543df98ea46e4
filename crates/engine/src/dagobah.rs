// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The root controller (`Dagobah` in the original): owns every `Job` in
//! one scheduling domain, the backend they persist through, the event
//! registry they emit into, and SSH host configuration.
//!
//! The original held `self.jobs` as a plain list mutated directly by
//! whichever thread called in — itself, the `Scheduler` thread, and any
//! caller's own threads all raced on it. Here each job lives behind its
//! own `tokio::sync::Mutex` (an async mutex, not `parking_lot`'s, because
//! `Job::start`/`retry`/`poll_once` hold the lock across `.await` points
//! the way the original's `_complete_task` held its implicit GIL-backed
//! critical section for the whole mutate-then-commit sequence), and the
//! job directory itself lives behind a plain `parking_lot::Mutex` since
//! nothing ever awaits while touching just the directory.

use crate::event::EventHandler;
use crate::host::SshConfig;
use crate::job::{Job, JobContext};
use crate::jobtask::{JobBody, JobResolver};
use crate::schema::{DagobahDoc, JobDoc};
use crate::task::{HostResolver, StreamName};
use chrono::{DateTime, Utc};
use dagobah_backend::SharedBackend;
use dagobah_core::{Clock, DagobahError, DagobahId, DagobahResult};
use dagobah_shell::HostSpec;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

struct DagobahState {
    jobs: HashMap<String, Arc<AsyncMutex<Job>>>,
    created_jobs: u64,
}

pub struct Dagobah {
    id: DagobahId,
    backend: SharedBackend,
    clock: Arc<dyn Clock>,
    events: EventHandler,
    ssh_config_path: Option<PathBuf>,
    state: SyncMutex<DagobahState>,
}

impl Dagobah {
    /// Constructs a fresh `Dagobah`, mints its id from `backend`, and
    /// commits the (empty) document immediately — mirroring the
    /// original's constructor, which commits itself before returning.
    pub async fn new(backend: SharedBackend, clock: Arc<dyn Clock>, ssh_config_path: Option<PathBuf>) -> DagobahResult<Self> {
        let id = backend.get_new_dagobah_id().await;
        let dagobah = Self {
            id,
            backend,
            clock,
            events: EventHandler::new(),
            ssh_config_path,
            state: SyncMutex::new(DagobahState { jobs: HashMap::new(), created_jobs: 0 }),
        };
        dagobah.commit_dagobah(false).await?;
        Ok(dagobah)
    }

    /// Reconstructs a `Dagobah` from a previously committed document.
    pub async fn from_backend(backend: SharedBackend, clock: Arc<dyn Clock>, dagobah_id: DagobahId, ssh_config_path: Option<PathBuf>) -> DagobahResult<Self> {
        let raw = self_backend_lookup(&backend, &dagobah_id).await?;
        let doc: DagobahDoc = serde_json::from_value(raw).map_err(|e| DagobahError::InvalidArgument(e.to_string()))?;

        let now = clock.now();
        let mut jobs = HashMap::new();
        for job_doc in doc.jobs {
            let job_id = job_doc.job_id.clone();
            let name = job_doc.name.clone();
            let job = Job::from_doc(job_id, dagobah_id.clone(), job_doc, now)?;
            jobs.insert(name, Arc::new(AsyncMutex::new(job)));
        }

        Ok(Self {
            id: dagobah_id,
            backend,
            clock,
            events: EventHandler::new(),
            ssh_config_path,
            state: SyncMutex::new(DagobahState { jobs, created_jobs: doc.created_jobs }),
        })
    }

    pub fn id(&self) -> &DagobahId {
        &self.id
    }

    pub fn events(&self) -> &EventHandler {
        &self.events
    }

    fn context(&self) -> JobContext<'_> {
        JobContext { clock: self.clock.as_ref(), backend: &self.backend, jobs: self, hosts: self, events: &self.events }
    }

    // ---- job directory ----

    pub async fn add_job(&self, name: impl Into<String>) -> DagobahResult<()> {
        let name = name.into();
        if self.state.lock().jobs.contains_key(&name) {
            return Err(DagobahError::name_taken("job", name));
        }
        let job_id = self.backend.get_new_job_id().await;
        let job = Arc::new(AsyncMutex::new(Job::new(job_id, self.id.clone(), name.clone())));
        {
            let mut state = self.state.lock();
            state.jobs.insert(name.clone(), job);
            state.created_jobs += 1;
        }
        self.commit_job(&name).await
    }

    pub fn get_job(&self, name: &str) -> Option<Arc<AsyncMutex<Job>>> {
        self.state.lock().jobs.get(name).cloned()
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().jobs.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn delete_job(&self, name: &str) -> DagobahResult<()> {
        let job = self.get_job(name).ok_or_else(|| DagobahError::not_found("job", name))?;
        let job_id = job.lock().await.id().clone();
        self.state.lock().jobs.remove(name);
        self.backend.delete_job(&job_id).await.map_err(|e| DagobahError::Backend(e.to_string()))?;
        self.commit_dagobah(false).await
    }

    pub async fn delete(&self) -> DagobahResult<()> {
        {
            let mut state = self.state.lock();
            state.jobs.clear();
            state.created_jobs = 0;
        }
        self.backend.delete_dagobah(&self.id).await.map_err(|e| DagobahError::Backend(e.to_string()))
    }

    // ---- per-job edits, routed through the directory so every edit
    // commits the owning job afterward ----

    pub async fn add_task_to_job(&self, job_name: &str, command: impl Into<String>, task_name: impl Into<String>, soft_timeout: Duration, hard_timeout: Duration, hostname: Option<String>) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.add_task(command, task_name, soft_timeout, hard_timeout, hostname)?;
        self.commit_job(job_name).await
    }

    pub async fn add_jobtask_to_job(&self, job_name: &str, target_job_name: &str, task_name: impl Into<String>) -> DagobahResult<()> {
        if self.get_job(target_job_name).is_none() {
            return Err(DagobahError::not_found("job", target_job_name));
        }
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.add_jobtask(target_job_name, task_name)?;
        self.commit_job(job_name).await
    }

    pub async fn delete_task_from_job(&self, job_name: &str, task_name: &str) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.delete_task(task_name)?;
        self.commit_job(job_name).await
    }

    pub async fn add_dependency_to_job(&self, job_name: &str, from: &str, to: &str) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.add_dependency(from, to)?;
        self.commit_job(job_name).await
    }

    pub async fn delete_dependency_from_job(&self, job_name: &str, from: &str, to: &str) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.delete_dependency(from, to)?;
        self.commit_job(job_name).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn edit_task_in_job(
        &self,
        job_name: &str,
        task_name: &str,
        new_name: Option<String>,
        command: Option<String>,
        soft_timeout: Option<Duration>,
        hard_timeout: Option<Duration>,
        hostname: Option<Option<String>>,
    ) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.edit_task(task_name, new_name, command, soft_timeout, hard_timeout, hostname)?;
        self.commit_job(job_name).await
    }

    pub async fn rename_job(&self, job_name: &str, new_name: impl Into<String>) -> DagobahResult<()> {
        let new_name = new_name.into();
        if self.get_job(&new_name).is_some() {
            return Err(DagobahError::name_taken("job", new_name));
        }
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.rename(new_name.clone())?;
        {
            let mut state = self.state.lock();
            state.jobs.remove(job_name);
            state.jobs.insert(new_name.clone(), job);
        }
        self.commit_job(&new_name).await
    }

    pub async fn update_job_notes(&self, job_name: &str, notes: Option<String>) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.update_notes(notes)?;
        self.commit_job(job_name).await
    }

    pub async fn schedule_job(&self, job_name: &str, cron_expression: Option<String>) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        let now = self.clock.now();
        job.lock().await.schedule(cron_expression, now)?;
        self.commit_job(job_name).await
    }

    // ---- running ----

    pub async fn start_job(&self, job_name: &str) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        let ctx = self.context();
        job.lock().await.start(&ctx).await
    }

    pub async fn retry_job(&self, job_name: &str) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        let ctx = self.context();
        job.lock().await.retry(&ctx).await
    }

    pub async fn terminate_job(&self, job_name: &str) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.terminate_all().await;
        Ok(())
    }

    pub async fn kill_job(&self, job_name: &str) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        job.lock().await.kill_all().await;
        Ok(())
    }

    /// First `n` lines of `task_name`'s `stream`: the live capture
    /// buffer if the task is currently running, else its own job's
    /// in-memory run log, else the latest run the backend has
    /// persisted for this (job, task) pair (`Task.head`'s "no current
    /// run" branch).
    pub async fn task_head(&self, job_name: &str, task_name: &str, stream: StreamName, n: usize) -> DagobahResult<Vec<String>> {
        self.task_lines(job_name, task_name, stream, n, dagobah_shell::head_lines).await
    }

    /// Last `n` lines of `task_name`'s `stream`, with the same
    /// live-then-logged-then-persisted fallback order as `task_head`.
    pub async fn task_tail(&self, job_name: &str, task_name: &str, stream: StreamName, n: usize) -> DagobahResult<Vec<String>> {
        self.task_lines(job_name, task_name, stream, n, |text, n| dagobah_shell::tail_lines(text, n, 10_000)).await
    }

    /// Every log id previously committed for `task_name` within
    /// `job_name`, oldest first — a convenience pass-through over
    /// `Backend::get_run_log_history` (task.py's own
    /// `get_run_log_history` method in the original).
    pub async fn task_run_log_history(&self, job_name: &str, task_name: &str) -> DagobahResult<Vec<dagobah_core::LogId>> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        let job_id = job.lock().await.id().clone();
        Ok(self.backend.get_run_log_history(&job_id, task_name).await)
    }

    /// Fetches one historical run log by id — a convenience
    /// pass-through over `Backend::get_run_log` (task.py's own
    /// `get_run_log` method in the original).
    pub async fn task_run_log(&self, log_id: &dagobah_core::LogId) -> Option<dagobah_backend::RunLog> {
        self.backend.get_run_log(log_id).await
    }

    async fn task_lines(&self, job_name: &str, task_name: &str, stream: StreamName, n: usize, extract: impl Fn(&str, usize) -> Vec<String>) -> DagobahResult<Vec<String>> {
        let job_arc = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        let job_id = {
            let job = job_arc.lock().await;
            if let Some(buffer) = job.live_stream(task_name, stream) {
                return Ok(extract(&buffer.snapshot(), n));
            }
            if let Some(text) = job.logged_stream(task_name, stream) {
                return Ok(extract(text, n));
            }
            job.id().clone()
        };

        let log = self.backend.get_latest_run_log(&job_id, task_name).await.ok_or_else(|| DagobahError::not_found("task", task_name))?;
        let entry = log.tasks.get(task_name).ok_or_else(|| DagobahError::not_found("task", task_name))?;
        let text = match stream {
            StreamName::Stdout => &entry.stdout,
            StreamName::Stderr => &entry.stderr,
        };
        Ok(extract(text, n))
    }

    /// Advances one job's in-flight run by a single tick (used by the
    /// scheduler's sweep and directly by callers that want synchronous
    /// control over polling cadence, e.g. tests).
    pub async fn poll_job_once(&self, job_name: &str) -> DagobahResult<Vec<String>> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        let ctx = self.context();
        job.lock().await.poll_once(&ctx).await
    }

    /// `Scheduler.run`'s per-tick check, with `job.start()`'s own
    /// business of deciding run-ability left inside `Job` — this just
    /// drives the "due and startable, else skip to the next firing"
    /// branch for one job by name.
    pub async fn maybe_fire_scheduled_run(&self, job_name: &str, last_check: DateTime<Utc>, now: DateTime<Utc>) -> DagobahResult<bool> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        let due = {
            let job = job.lock().await;
            matches!(job.next_run(), Some(next_run) if next_run >= last_check && next_run <= now)
        };
        if !due {
            return Ok(false);
        }

        let startable = job.lock().await.state().allows_start();
        if startable {
            self.start_job(job_name).await?;
            Ok(true)
        } else {
            job.lock().await.skip_scheduled_run(now);
            Ok(false)
        }
    }

    // ---- SSH hosts ----

    fn load_ssh_config(&self) -> SshConfig {
        match &self.ssh_config_path {
            Some(path) => SshConfig::load(path),
            None => SshConfig::parse(""),
        }
    }

    pub fn get_hosts(&self) -> Vec<String> {
        self.load_ssh_config().get_hosts()
    }

    pub fn get_host(&self, hostname: &str) -> Option<HostSpec> {
        self.load_ssh_config().get_host(hostname)
    }

    // ---- persistence ----

    pub async fn serialize(&self, include_run_logs: bool) -> DagobahDoc {
        let (names, created_jobs) = {
            let state = self.state.lock();
            (state.jobs.keys().cloned().collect::<Vec<_>>(), state.created_jobs)
        };

        let mut jobs: Vec<JobDoc> = Vec::with_capacity(names.len());
        for name in names {
            if let Some(job) = self.get_job(&name) {
                jobs.push(job.lock().await.serialize(include_run_logs));
            }
        }
        jobs.sort_by(|a, b| a.name.cmp(&b.name));

        DagobahDoc { dagobah_id: self.id.clone(), created_jobs, jobs }
    }

    async fn persist_dagobah(&self) -> DagobahResult<()> {
        let doc = self.serialize(false).await;
        let value = serde_json::to_value(&doc).map_err(|e| DagobahError::InvalidArgument(e.to_string()))?;
        self.backend.commit_dagobah(self.id.clone(), value).await.map_err(|e| DagobahError::Backend(e.to_string()))
    }

    /// Commits this `Dagobah`'s document. With `cascade`, every child
    /// job is committed too — which (faithfully, matching the original's
    /// `CommitDelegator`) re-persists the `Dagobah` document once per
    /// job, since `commit_job` always commits its parent non-cascading.
    pub async fn commit_dagobah(&self, cascade: bool) -> DagobahResult<()> {
        self.persist_dagobah().await?;
        if cascade {
            for name in self.job_names() {
                self.commit_job(&name).await?;
            }
        }
        Ok(())
    }

    pub async fn commit_job(&self, job_name: &str) -> DagobahResult<()> {
        let job = self.get_job(job_name).ok_or_else(|| DagobahError::not_found("job", job_name))?;
        let (job_id, doc) = {
            let job = job.lock().await;
            (job.id().clone(), job.serialize(false))
        };
        let value = serde_json::to_value(&doc).map_err(|e| DagobahError::InvalidArgument(e.to_string()))?;
        self.backend.commit_job(job_id, value).await.map_err(|e| DagobahError::Backend(e.to_string()))?;
        debug!(dagobah = %self.id, job = %job_name, "committed job");
        self.persist_dagobah().await
    }

    /// Imports a previously exported job document, optionally replacing
    /// any existing job of the same name first (`destructive`).
    pub async fn add_job_from_json(&self, raw: &str, destructive: bool) -> DagobahResult<()> {
        let value = self.backend.decode_import_json(raw).map_err(|e| DagobahError::InvalidArgument(e.to_string()))?;
        let doc: JobDoc = serde_json::from_value(value).map_err(|e| DagobahError::InvalidArgument(e.to_string()))?;

        if destructive {
            let _ = self.delete_job(&doc.name).await;
        }

        let job_id = self.backend.get_new_job_id().await;
        let now = self.clock.now();
        let name = doc.name.clone();
        let job = Job::from_doc(job_id, self.id.clone(), doc, now)?;
        {
            let mut state = self.state.lock();
            state.jobs.insert(name, Arc::new(AsyncMutex::new(job)));
            state.created_jobs += 1;
        }
        self.commit_dagobah(true).await
    }
}

async fn self_backend_lookup(backend: &SharedBackend, dagobah_id: &DagobahId) -> DagobahResult<serde_json::Value> {
    backend.get_dagobah_json(dagobah_id).await.ok_or_else(|| DagobahError::not_found("dagobah", dagobah_id.to_string()))
}

impl JobResolver for Dagobah {
    /// Resolves a job's static body (graph shape and idle task
    /// configuration) for job-of-jobs expansion. Uses `try_lock` since
    /// this is a synchronous trait method: a target job that is itself
    /// mid-run is, for this one lookup, treated as unresolvable rather
    /// than blocking — a nested `JobTask` whose target is concurrently
    /// running will see `UnknownJob` and should be retried rather than
    /// silently waiting.
    fn resolve(&self, job_name: &str) -> Option<JobBody> {
        let job = self.state.lock().jobs.get(job_name)?.clone();
        let job = job.try_lock().ok()?;
        Some(JobBody { graph: job.graph().clone(), tasks: job.tasks().iter().map(|(name, node)| (name.clone(), node.clone_idle())).collect() })
    }
}

impl HostResolver for Dagobah {
    fn resolve(&self, hostname: &str) -> Option<HostSpec> {
        self.get_host(hostname)
    }
}

#[cfg(test)]
#[path = "dagobah_tests.rs"]
mod tests;
