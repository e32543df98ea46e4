// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle status and the mutation permissions it grants.
//!
//! A job is only ever in one of three states. Which mutating operations
//! are legal depends entirely on the current state; see the `allows_*`
//! methods below for the full permission table.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Running,
    Failed,
}

impl JobState {
    /// add/delete task, add/delete dependency, edit: only while idle.
    pub fn allows_graph_mutation(self) -> bool {
        matches!(self, JobState::Waiting | JobState::Failed)
    }

    /// start(): only from waiting or a prior failure.
    pub fn allows_start(self) -> bool {
        matches!(self, JobState::Waiting | JobState::Failed)
    }

    /// retry(): only after a failure.
    pub fn allows_retry(self) -> bool {
        matches!(self, JobState::Failed)
    }

    /// terminate_all/kill_all: only while a run is in flight.
    pub fn allows_terminate(self) -> bool {
        matches!(self, JobState::Running)
    }

    /// schedule(): cron changes are always allowed.
    pub fn allows_schedule_change(self) -> bool {
        true
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Running => "running",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Waiting
    }
}

#[cfg(test)]
#[path = "job_state_tests.rs"]
mod tests;
