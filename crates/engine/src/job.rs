// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job controller (`Job` in the original): owns one DAG of tasks,
//! drives a run from its independent nodes through to completion, and
//! persists a [`RunLog`] as it goes.
//!
//! The original threaded a live back-reference to its owning `Dagobah`
//! through every method (`self.parent`) so it could resolve SSH hosts,
//! expand nested jobs, emit events, and commit to the backend. Here all
//! of that is bundled into a borrowed [`JobContext`] passed to whichever
//! method needs it, so `Job` itself stays a plain, ownable value — the
//! same collaborator-passing shape `dagobah-engine`'s `task` and
//! `jobtask` modules already establish.

use crate::cron::CronIter;
use crate::event::EventHandler;
use crate::jobtask::{expand_job_body, verify_acyclic, JobResolver, JobTask, TaskNode};
use crate::schema::{dependencies_from_graph, JobDoc, TaskDoc};
use crate::task::{HostResolver, StreamName, Task};
use chrono::{DateTime, Utc};
use dagobah_backend::{RunLog, SharedBackend, TaskLogEntry};
use dagobah_core::dag::{self, Dag, Graph};
use dagobah_core::{Clock, DagobahError, DagobahId, DagobahResult, JobId, JobState};
use dagobah_shell::CaptureBuffer;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::warn;

/// Everything a `Job` method needs to reach outside of its own fields,
/// borrowed for the duration of one call. `Dagobah` is the only
/// assembler of this in the workspace.
pub struct JobContext<'a> {
    pub clock: &'a dyn Clock,
    pub backend: &'a SharedBackend,
    pub jobs: &'a dyn JobResolver,
    pub hosts: &'a dyn HostResolver,
    pub events: &'a EventHandler,
}

/// One job: a named DAG of tasks, a lifecycle state, and (while running
/// or failed) the [`RunLog`] of its most recent attempt.
pub struct Job {
    id: JobId,
    dagobah_id: DagobahId,
    name: String,
    state: JobState,
    dag: Dag,
    tasks: HashMap<String, TaskNode>,
    cron_schedule: Option<String>,
    cron_iter: Option<CronIter>,
    next_run: Option<DateTime<Utc>>,
    notes: Option<String>,
    run_log: Option<RunLog>,

    /// Taken at `start`/`retry` time: the expanded (job-of-jobs
    /// flattened), validated graph and task set a run actually executes
    /// against. The live `dag`/`tasks` above stay untouched by job-of-jobs
    /// expansion so graph-mutation methods keep editing the authored
    /// shape, not a prior run's flattened one.
    snapshot: Option<Graph>,
    tasks_snapshot: Option<HashMap<String, TaskNode>>,
}

impl Job {
    pub fn new(id: JobId, dagobah_id: DagobahId, name: impl Into<String>) -> Self {
        Self {
            id,
            dagobah_id,
            name: name.into(),
            state: JobState::Waiting,
            dag: Dag::new(),
            tasks: HashMap::new(),
            cron_schedule: None,
            cron_iter: None,
            next_run: None,
            notes: None,
            run_log: None,
            snapshot: None,
            tasks_snapshot: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn dagobah_id(&self) -> &DagobahId {
        &self.dagobah_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn cron_schedule(&self) -> Option<&str> {
        self.cron_schedule.as_deref()
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.next_run
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn graph(&self) -> &Graph {
        &self.dag.graph
    }

    pub fn tasks(&self) -> &HashMap<String, TaskNode> {
        &self.tasks
    }

    pub fn run_log(&self) -> Option<&RunLog> {
        self.run_log.as_ref()
    }

    /// The live capture buffer for `task_name`'s `stream`, if that task
    /// currently has a process in flight in this job's snapshot. `None`
    /// covers both "no such task" and "task isn't running right now" —
    /// callers (`Dagobah::task_head`/`task_tail`) fall back to the
    /// latest persisted run log in either case, matching `Task.head`/
    /// `Task.tail`'s "no current run" branch.
    pub fn live_stream(&self, task_name: &str, stream: StreamName) -> Option<&CaptureBuffer> {
        let task = self.tasks_snapshot.as_ref()?.get(task_name)?.as_task()?;
        task.live_buffer(stream)
    }

    /// The persisted text for `task_name`'s `stream` in this job's own
    /// in-memory run log, if one is in flight or was left behind by a
    /// failed run. Returns `None` once the run log has been cleared
    /// (clean completion) — the caller should fall back to the
    /// backend's latest persisted run log at that point.
    pub fn logged_stream(&self, task_name: &str, stream: StreamName) -> Option<&str> {
        let entry = self.run_log.as_ref()?.tasks.get(task_name)?;
        Some(match stream {
            StreamName::Stdout => entry.stdout.as_str(),
            StreamName::Stderr => entry.stderr.as_str(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    fn require_graph_mutable(&self, action: &'static str) -> DagobahResult<()> {
        if !self.state.allows_graph_mutation() {
            return Err(DagobahError::immutable(self.state.as_str(), action));
        }
        Ok(())
    }

    // ---- graph mutation (§4.2) ----
    //
    // `allow_change_graph`, `allow_edit_job`, and `allow_edit_task` are
    // all {waiting, failed} in the permission table, so one guard
    // (`require_graph_mutable`) covers all three kinds of edit below.

    pub fn add_task(&mut self, command: impl Into<String>, name: impl Into<String>, soft_timeout: Duration, hard_timeout: Duration, hostname: Option<String>) -> DagobahResult<()> {
        self.require_graph_mutable("add_task")?;
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(DagobahError::name_taken("task", name));
        }
        self.dag.add_node(&name)?;
        self.tasks.insert(name.clone(), TaskNode::Task(Task::new(command, name, soft_timeout, hard_timeout, hostname)));
        Ok(())
    }

    pub fn add_jobtask(&mut self, target_job_name: impl Into<String>, name: impl Into<String>) -> DagobahResult<()> {
        self.require_graph_mutable("add_jobtask")?;
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(DagobahError::name_taken("task", name));
        }
        self.dag.add_node(&name)?;
        self.tasks.insert(name.clone(), TaskNode::JobTask(JobTask::new(target_job_name, name)));
        Ok(())
    }

    pub fn delete_task(&mut self, name: &str) -> DagobahResult<()> {
        self.require_graph_mutable("delete_task")?;
        if !self.tasks.contains_key(name) {
            return Err(DagobahError::not_found("task", name));
        }
        self.dag.delete_node(name)?;
        self.tasks.remove(name);
        Ok(())
    }

    pub fn add_dependency(&mut self, from: &str, to: &str) -> DagobahResult<()> {
        self.require_graph_mutable("add_dependency")?;
        self.dag.add_edge(from, to)?;
        Ok(())
    }

    pub fn delete_dependency(&mut self, from: &str, to: &str) -> DagobahResult<()> {
        self.require_graph_mutable("delete_dependency")?;
        self.dag.delete_edge(from, to)?;
        Ok(())
    }

    /// Renames a task and/or reconfigures a runnable one in place. A
    /// `JobTask` node only ever takes the rename half of this — it has
    /// no command, timeouts, or hostname to reconfigure.
    ///
    /// A rename severs lookups against any run log committed under the
    /// old name: the backend keys run-log history by `(job_id,
    /// task_name)`, so `task_run_log_history`/`get_latest_run_log` for
    /// the new name start empty. Intentional, not a bug — the original
    /// has the same behavior.
    #[allow(clippy::too_many_arguments)]
    pub fn edit_task(
        &mut self,
        task_name: &str,
        new_name: Option<String>,
        command: Option<String>,
        soft_timeout: Option<Duration>,
        hard_timeout: Option<Duration>,
        hostname: Option<Option<String>>,
    ) -> DagobahResult<()> {
        self.require_graph_mutable("edit_task")?;
        if !self.tasks.contains_key(task_name) {
            return Err(DagobahError::not_found("task", task_name));
        }
        if let Some(candidate) = &new_name {
            if candidate != task_name && self.tasks.contains_key(candidate) {
                return Err(DagobahError::name_taken("task", candidate.clone()));
            }
        }

        {
            let node = self.tasks.get_mut(task_name).expect("presence checked above");
            if let Some(task) = node.as_task_mut() {
                if let Some(command) = command {
                    task.set_command(command);
                }
                if let Some(soft) = soft_timeout {
                    task.set_soft_timeout(soft);
                }
                if let Some(hard) = hard_timeout {
                    task.set_hard_timeout(hard);
                }
                if let Some(hostname) = hostname {
                    task.set_hostname(hostname);
                }
            }
        }

        if let Some(new_name) = new_name {
            if new_name != task_name {
                self.dag.rename_edges(task_name, &new_name)?;
                let mut node = self.tasks.remove(task_name).expect("presence checked above");
                match &mut node {
                    TaskNode::Task(t) => t.set_name(new_name.clone()),
                    TaskNode::JobTask(j) => j.set_name(new_name.clone()),
                }
                self.tasks.insert(new_name, node);
            }
        }

        Ok(())
    }

    pub fn rename(&mut self, new_name: impl Into<String>) -> DagobahResult<()> {
        self.require_graph_mutable("rename")?;
        self.name = new_name.into();
        Ok(())
    }

    pub fn update_notes(&mut self, notes: Option<String>) -> DagobahResult<()> {
        self.require_graph_mutable("update_notes")?;
        self.notes = notes;
        Ok(())
    }

    // ---- scheduling (§4.4) ----

    /// Sets or clears the job's cron schedule and recomputes `next_run`
    /// relative to `now`. Schedule changes are always permitted,
    /// regardless of job state.
    pub fn schedule(&mut self, expression: Option<String>, now: DateTime<Utc>) -> DagobahResult<()> {
        match expression {
            None => {
                self.cron_schedule = None;
                self.cron_iter = None;
                self.next_run = None;
            }
            Some(expression) => {
                let iter = CronIter::parse(&expression)?;
                self.next_run = iter.next_after(now);
                self.cron_schedule = Some(expression);
                self.cron_iter = Some(iter);
            }
        }
        Ok(())
    }

    /// Advances `next_run` without starting a run; used by the scheduler
    /// when a job's cron fires while `allow_start` is false (another run
    /// is already in flight), so the missed firing isn't retried a
    /// second later.
    pub fn skip_scheduled_run(&mut self, now: DateTime<Utc>) {
        if let Some(iter) = &self.cron_iter {
            self.next_run = iter.next_after(now);
        }
    }

    // ---- snapshotting (job-of-jobs expansion, §4.5) ----

    /// Validates the live graph, recursively expands every `JobTask`
    /// node into the target job's body, and stashes the result as
    /// `snapshot`/`tasks_snapshot` for `start`/`retry` to run against.
    fn initialize_snapshot(&mut self, ctx: &JobContext<'_>) -> DagobahResult<()> {
        if self.snapshot.is_some() {
            warn!(job = %self.name, "overwriting an existing snapshot");
        }

        let (valid, reason) = dag::validate(&self.dag.graph);
        if !valid {
            return Err(DagobahError::InvalidDag(reason.to_string()));
        }

        let mut seen = BTreeSet::new();
        if !verify_acyclic(&self.name, &self.dag.graph, &self.tasks, ctx.jobs, &mut seen)? {
            return Err(DagobahError::Cyclic);
        }

        let idle_tasks: HashMap<String, TaskNode> = self.tasks.iter().map(|(name, node)| (name.clone(), node.clone_idle())).collect();
        let expanded = expand_job_body(self.dag.graph.clone(), idle_tasks, ctx.jobs)?;

        self.snapshot = Some(expanded.graph);
        self.tasks_snapshot = Some(expanded.tasks);
        Ok(())
    }

    fn destroy_snapshot(&mut self) {
        self.snapshot = None;
        self.tasks_snapshot = None;
    }

    // ---- running (§4.3) ----

    pub async fn start(&mut self, ctx: &JobContext<'_>) -> DagobahResult<()> {
        if !self.state.allows_start() {
            return Err(DagobahError::immutable(self.state.as_str(), "start"));
        }

        self.initialize_snapshot(ctx)?;

        let now = ctx.clock.now();

        // §4.3 step 3: if cron is armed and this start has carried us
        // past the scheduled firing, advance to the next one so a
        // manual start (or the scheduler's own start) doesn't pin
        // `next_run` to the instant that just fired. Strictly `>`, not
        // `>=` — a start landing exactly on `next_run` leaves it alone
        // (§9 Open Questions).
        if let Some(iter) = &self.cron_iter {
            if let Some(next_run) = self.next_run {
                if now > next_run {
                    self.next_run = iter.next_after(now);
                }
            }
        }

        let log_id = ctx.backend.get_new_log_id().await;
        self.run_log = Some(RunLog::new(log_id, self.id.clone(), self.name.clone(), self.dagobah_id.clone(), now));
        self.state = JobState::Running;

        let snapshot = self.snapshot.clone().expect("initialize_snapshot just populated it");
        for task_name in dag::ind_nodes(&snapshot) {
            self.put_task_in_run_log(&task_name, now);
            self.start_task(&task_name, ctx).await?;
        }

        self.persist_run_log(ctx).await;
        Ok(())
    }

    /// Re-runs only the tasks that failed in the most recent run log.
    /// The rest of the graph is left exactly as the previous run left
    /// it: earlier successes aren't replayed, and nodes downstream of a
    /// retried task start the normal way once it succeeds again.
    pub async fn retry(&mut self, ctx: &JobContext<'_>) -> DagobahResult<()> {
        if !self.state.allows_retry() {
            return Err(DagobahError::immutable(self.state.as_str(), "retry"));
        }

        self.initialize_snapshot(ctx)?;

        let failed: Vec<String> = self
            .run_log
            .as_ref()
            .map(|log| log.tasks.iter().filter(|(_, entry)| entry.success == Some(false)).map(|(name, _)| name.clone()).collect())
            .unwrap_or_default();
        if failed.is_empty() {
            return Err(DagobahError::NothingToRetry);
        }

        let now = ctx.clock.now();
        if let Some(log) = self.run_log.as_mut() {
            log.last_retry_time = Some(now);
        }
        self.state = JobState::Running;

        for task_name in failed {
            self.put_task_in_run_log(&task_name, now);
            self.start_task(&task_name, ctx).await?;
        }

        self.persist_run_log(ctx).await;
        Ok(())
    }

    /// Sends `SIGTERM` (locally) or its remote equivalent to every
    /// currently running task in the snapshot. Best-effort: a task that
    /// fails to receive the signal is logged and skipped rather than
    /// aborting the sweep.
    pub async fn terminate_all(&mut self) {
        let Some(tasks) = self.tasks_snapshot.as_mut() else { return };
        for node in tasks.values_mut() {
            if let Some(task) = node.as_task_mut() {
                if task.is_running() {
                    if let Err(error) = task.terminate().await {
                        warn!(job = %self.name, task = %task.name(), %error, "terminate failed");
                    }
                }
            }
        }
    }

    pub async fn kill_all(&mut self) {
        let Some(tasks) = self.tasks_snapshot.as_mut() else { return };
        for node in tasks.values_mut() {
            if let Some(task) = node.as_task_mut() {
                if task.is_running() {
                    if let Err(error) = task.kill().await {
                        warn!(job = %self.name, task = %task.name(), %error, "kill failed");
                    }
                }
            }
        }
    }

    async fn start_task(&mut self, task_name: &str, ctx: &JobContext<'_>) -> DagobahResult<()> {
        let tasks_snapshot = self.tasks_snapshot.as_mut().ok_or_else(|| DagobahError::InvalidArgument("no snapshot to start a task against".to_string()))?;
        let node = tasks_snapshot.get_mut(task_name).ok_or_else(|| DagobahError::not_found("task", task_name))?;
        let task = node
            .as_task_mut()
            .ok_or_else(|| DagobahError::InvalidArgument(format!("{task_name} is an unexpanded job reference")))?;
        task.start(ctx.hosts, ctx.clock).await
    }

    fn put_task_in_run_log(&mut self, task_name: &str, now: DateTime<Utc>) {
        let command = self
            .tasks_snapshot
            .as_ref()
            .and_then(|tasks| tasks.get(task_name))
            .and_then(TaskNode::as_task)
            .map(|task| task.command().to_string())
            .unwrap_or_default();
        if let Some(log) = self.run_log.as_mut() {
            log.tasks.insert(task_name.to_string(), TaskLogEntry::started(command, now));
        }
    }

    async fn persist_run_log(&self, ctx: &JobContext<'_>) {
        let Some(log) = self.run_log.clone() else { return };
        ctx.backend.acquire_lock().await;
        let result = ctx.backend.commit_log(log).await;
        ctx.backend.release_lock().await;
        if let Err(error) = result {
            warn!(job = %self.name, %error, "failed to persist run log");
        }
    }

    /// Advances a single running task one tick: checks every task the
    /// snapshot has in flight and, for any that have finished, runs the
    /// full completion sequence (record outcome, start anything now
    /// ready, persist, emit events, check for job completion).
    ///
    /// The original re-armed `check_complete` on its own 2.5 second
    /// timer per task; this crate has the scheduler's sweep own that
    /// cadence uniformly instead, matching `task.rs`'s own design note.
    pub async fn poll_once(&mut self, ctx: &JobContext<'_>) -> DagobahResult<Vec<String>> {
        let Some(tasks_snapshot) = self.tasks_snapshot.as_ref() else {
            return Ok(Vec::new());
        };
        let running: Vec<String> = tasks_snapshot
            .iter()
            .filter_map(|(name, node)| node.as_task().filter(|t| t.is_running()).map(|_| name.clone()))
            .collect();

        let mut completed = Vec::new();
        for task_name in running {
            let outcome = {
                let tasks_snapshot = self.tasks_snapshot.as_mut().expect("checked non-empty above");
                let task = tasks_snapshot.get_mut(&task_name).and_then(TaskNode::as_task_mut).expect("name came from a Task variant");
                task.check_complete(ctx.clock).await?
            };
            if let Some(outcome) = outcome {
                if let Some(log) = self.run_log.as_mut() {
                    if let Some(entry) = log.tasks.get_mut(&task_name) {
                        entry.complete_time = Some(outcome.complete_time);
                        entry.return_code = Some(outcome.return_code);
                        entry.success = Some(outcome.success);
                        let limit = ctx.backend.stream_truncation_limit();
                        entry.stdout = dagobah_shell::truncate_stream(&outcome.stdout, limit);
                        entry.stderr = dagobah_shell::truncate_stream(&outcome.stderr, limit);
                    }
                }
                self.complete_task(&task_name, outcome.success, ctx).await?;
                completed.push(task_name);
            }
        }
        Ok(completed)
    }

    /// `_complete_task`: starts every downstream node whose predecessors
    /// have all now succeeded, persists the run log, emits `task_failed`
    /// if this task didn't succeed, then checks whether the whole run
    /// has finished (`_on_completion`).
    async fn complete_task(&mut self, task_name: &str, success: bool, ctx: &JobContext<'_>) -> DagobahResult<()> {
        if let Some(snapshot) = self.snapshot.clone() {
            if let Ok(downstream) = dag::downstream(&snapshot, task_name) {
                for next in downstream {
                    self.start_if_ready(&next, &snapshot, ctx).await?;
                }
            }
        }

        self.persist_run_log(ctx).await;

        if !success {
            if let Some(node) = self.tasks_snapshot.as_ref().and_then(|tasks| tasks.get(task_name)) {
                let doc = TaskDoc::from_node(node);
                let run_log_entry = self.run_log.as_ref().and_then(|log| log.tasks.get(task_name)).cloned();
                let payload = serde_json::json!({ "job_name": self.name, "task": doc, "run_log_entry": run_log_entry });
                ctx.events.emit("task_failed", &payload);
            }
        }

        self.on_completion(ctx);
        Ok(())
    }

    /// Starts `task_name` once every predecessor in `snapshot` has
    /// recorded a success in the run log. Idempotent: a node already
    /// present in the run log (either an independent node started at
    /// `start`/`retry` time, or a downstream node a sibling completion
    /// already triggered) is left alone.
    async fn start_if_ready(&mut self, task_name: &str, snapshot: &Graph, ctx: &JobContext<'_>) -> DagobahResult<()> {
        let already_started = self.run_log.as_ref().map(|log| log.tasks.contains_key(task_name)).unwrap_or(false);
        if already_started {
            return Ok(());
        }

        let predecessors = dag::predecessors(snapshot, task_name);
        let all_succeeded = !predecessors.is_empty()
            && predecessors
                .iter()
                .all(|pred| self.run_log.as_ref().and_then(|log| log.tasks.get(pred)).map(|entry| entry.success == Some(true)).unwrap_or(false));
        if !all_succeeded {
            return Ok(());
        }

        let now = ctx.clock.now();
        self.put_task_in_run_log(task_name, now);
        self.start_task(task_name, ctx).await
    }

    /// `_on_completion`: once every task the run log knows about has
    /// finished, flips the job to `failed` or back to `waiting` and
    /// emits the matching event.
    ///
    /// Faithfully reproduces an original quirk: on a clean run, the
    /// original clears `self.run_log` *before* building the
    /// `job_complete` event payload, so that event's `run_log` field is
    /// always empty. A failed run keeps its run log intact (so an
    /// operator can inspect it, and so `retry` has something to work
    /// from), and `job_failed` carries it in full.
    fn on_completion(&mut self, ctx: &JobContext<'_>) {
        if self.state != JobState::Running {
            return;
        }
        let Some(log) = self.run_log.as_ref() else { return };
        if !log.all_tasks_complete() {
            return;
        }

        if log.any_task_failed() {
            self.state = JobState::Failed;
            let payload = self.event_payload();
            ctx.events.emit("job_failed", &payload);
        } else {
            self.state = JobState::Waiting;
            self.run_log = None;
            let payload = self.event_payload();
            ctx.events.emit("job_complete", &payload);
        }
        self.destroy_snapshot();
    }

    fn event_payload(&self) -> Value {
        serde_json::to_value(self.serialize(true)).unwrap_or(Value::Null)
    }

    // ---- serialization (§6) ----

    pub fn serialize(&self, include_run_log: bool) -> JobDoc {
        let order = dag::topological_sort(&self.dag.graph).unwrap_or_else(|_| self.tasks.keys().cloned().collect());
        let tasks = order.iter().filter_map(|name| self.tasks.get(name)).map(TaskDoc::from_node).collect();

        JobDoc {
            job_id: self.id.clone(),
            name: self.name.clone(),
            parent_id: self.dagobah_id.clone(),
            status: self.state.as_str().to_string(),
            cron_schedule: self.cron_schedule.clone(),
            next_run: self.next_run,
            notes: self.notes.clone(),
            tasks,
            dependencies: dependencies_from_graph(&self.dag.graph),
            run_log: if include_run_log { self.run_log.clone() } else { None },
        }
    }

    /// Rebuilds a `Job` from a previously exported [`JobDoc`]. The
    /// caller (`Dagobah::from_backend`) is responsible for resolving
    /// `job_id`/`parent_id`; this only restores graph shape and task
    /// configuration.
    pub fn from_doc(id: JobId, dagobah_id: DagobahId, doc: JobDoc, now: DateTime<Utc>) -> DagobahResult<Self> {
        let mut job = Job::new(id, dagobah_id, doc.name);
        job.state = match doc.status.as_str() {
            "running" => JobState::Running,
            "failed" => JobState::Failed,
            _ => JobState::Waiting,
        };
        job.notes = doc.notes;
        job.run_log = doc.run_log;

        for task_doc in doc.tasks {
            let name = task_doc.name().to_string();
            job.dag.add_node(&name)?;
            job.tasks.insert(name, task_doc.into_node());
        }
        for (from, tos) in doc.dependencies {
            for to in tos {
                job.dag.add_edge(&from, &to)?;
            }
        }
        if let Some(expression) = doc.cron_schedule {
            job.schedule(Some(expression), now)?;
        }
        Ok(job)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
