// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The record of one job run: per-task start/complete timestamps, the
//! command that was executed, and captured output. Mirrors the shape the
//! original persisted as `run_log` documents (job.py `_put_task_in_run_log`,
//! task.py `_task_complete`).

use chrono::{DateTime, Utc};
use dagobah_core::{strict_json, DagobahId, JobId, LogId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One task's contribution to a [`RunLog`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskLogEntry {
    #[serde(with = "strict_json")]
    pub start_time: DateTime<Utc>,
    pub command: String,
    #[serde(with = "strict_json::option", default)]
    pub complete_time: Option<DateTime<Utc>>,
    pub return_code: Option<i32>,
    pub success: Option<bool>,
    pub stdout: String,
    pub stderr: String,
}

impl TaskLogEntry {
    pub fn started(command: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            command: command.into(),
            complete_time: None,
            return_code: None,
            success: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.success.is_some()
    }
}

/// The durable record of a single job run, keyed by [`LogId`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunLog {
    pub log_id: LogId,
    pub job_id: JobId,
    pub job_name: String,
    pub dagobah_id: DagobahId,
    #[serde(with = "strict_json")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "strict_json::option", default)]
    pub last_retry_time: Option<DateTime<Utc>>,
    pub tasks: BTreeMap<String, TaskLogEntry>,
}

impl RunLog {
    pub fn new(
        log_id: LogId,
        job_id: JobId,
        job_name: impl Into<String>,
        dagobah_id: DagobahId,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            log_id,
            job_id,
            job_name: job_name.into(),
            dagobah_id,
            start_time,
            last_retry_time: None,
            tasks: BTreeMap::new(),
        }
    }

    /// True once every task present has recorded a `success` outcome.
    pub fn all_tasks_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.values().all(TaskLogEntry::is_complete)
    }

    pub fn any_task_failed(&self) -> bool {
        self.tasks.values().any(|t| t.success == Some(false))
    }
}

#[cfg(test)]
#[path = "run_log_tests.rs"]
mod tests;
