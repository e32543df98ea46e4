// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The exported JSON document shapes (§6 Exported JSON schema): one job,
//! round-trippable, plus the `Dagobah`-level document `from_backend` and
//! `add_job_from_json` consume. Timestamps always serialize through
//! [`dagobah_core::strict_json`] (ISO-8601, UTC, second precision) —
//! the original's `strict_json=True` path — since that is the only shape
//! a typed Rust struct can produce; there is no separate "loose" Python
//! `repr()` mode to preserve.

use crate::jobtask::{JobTask, TaskNode};
use crate::task::Task;
use chrono::{DateTime, Utc};
use dagobah_backend::RunLog;
use dagobah_core::{dag::Graph, strict_json, DagobahId, JobId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One node of a job's `tasks` array: either a runnable [`Task`] or a
/// [`JobTask`] reference to another job. Serializes untagged, matching
/// §6's schema where the two shapes are told apart by field presence
/// (`job_name` vs. `command`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TaskDoc {
    Task {
        name: String,
        command: String,
        #[serde(default)]
        hostname: Option<String>,
        #[serde(default)]
        soft_timeout: u64,
        #[serde(default)]
        hard_timeout: u64,
        #[serde(with = "strict_json::option", default)]
        started_at: Option<DateTime<Utc>>,
        #[serde(with = "strict_json::option", default)]
        completed_at: Option<DateTime<Utc>>,
        #[serde(default)]
        success: Option<bool>,
    },
    JobTask { name: String, job_name: String },
}

impl TaskDoc {
    pub fn name(&self) -> &str {
        match self {
            TaskDoc::Task { name, .. } => name,
            TaskDoc::JobTask { name, .. } => name,
        }
    }

    pub fn from_node(node: &TaskNode) -> Self {
        match node {
            TaskNode::Task(task) => Self::from_task(task),
            TaskNode::JobTask(jobtask) => Self::from_jobtask(jobtask),
        }
    }

    pub fn from_task(task: &Task) -> Self {
        TaskDoc::Task {
            name: task.name().to_string(),
            command: task.command().to_string(),
            hostname: task.hostname().map(str::to_string),
            soft_timeout: task.soft_timeout().as_secs(),
            hard_timeout: task.hard_timeout().as_secs(),
            started_at: task.started_at(),
            completed_at: task.completed_at(),
            success: task.successful(),
        }
    }

    pub fn from_jobtask(jobtask: &JobTask) -> Self {
        TaskDoc::JobTask { name: jobtask.name().to_string(), job_name: jobtask.target_job_name().to_string() }
    }

    pub fn into_node(self) -> TaskNode {
        match self {
            TaskDoc::Task { name, command, hostname, soft_timeout, hard_timeout, .. } => {
                TaskNode::Task(Task::new(command, name, Duration::from_secs(soft_timeout), Duration::from_secs(hard_timeout), hostname))
            }
            TaskDoc::JobTask { name, job_name } => TaskNode::JobTask(JobTask::new(job_name, name)),
        }
    }
}

/// One job, exported in full (§6). `dependencies` mirrors the live
/// graph; `run_log` is only populated when the caller asked for
/// `include_run_logs` (event payloads do, a plain export does not).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDoc {
    pub job_id: JobId,
    pub name: String,
    pub parent_id: DagobahId,
    pub status: String,
    pub cron_schedule: Option<String>,
    #[serde(with = "strict_json::option", default)]
    pub next_run: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub tasks: Vec<TaskDoc>,
    pub dependencies: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_log: Option<RunLog>,
}

pub fn dependencies_from_graph(graph: &Graph) -> BTreeMap<String, Vec<String>> {
    graph.iter().map(|(node, edges)| (node.clone(), edges.iter().cloned().collect())).collect()
}

/// The root document `Dagobah::from_backend`/`Dagobah::export` exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagobahDoc {
    pub dagobah_id: DagobahId,
    pub created_jobs: u64,
    pub jobs: Vec<JobDoc>,
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
