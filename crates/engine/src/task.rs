// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task runtime (`Task` in the original): owns execution of a single
//! command, local or over SSH, with a soft/hard timeout ladder and
//! incremental stdout/stderr capture.
//!
//! The original `Task` held a back-reference to its parent `Job` (and,
//! transitively, to the owning `Dagobah`) so it could look up SSH host
//! config and call back into the job on completion. Rust's ownership
//! model doesn't accommodate that cycle cheaply, so `Task` here is
//! self-contained: hostname resolution is the caller's job (literally
//! `Job::start_task`, which asks a [`HostResolver`] for the `HostSpec`
//! before calling [`Task::start`]), and completion is reported back by
//! value from [`Task::check_complete`] rather than through a callback.

use dagobah_core::{Clock, DagobahError, DagobahResult};
use dagobah_shell::{connect, spawn_local, spawn_remote, CaptureBuffer, HostSpec, PollResult, RunningTask, TimeoutLadder};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;

/// Which of a task's two captured streams `head`/`tail` should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamName {
    Stdout,
    Stderr,
}

impl FromStr for StreamName {
    type Err = DagobahError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(StreamName::Stdout),
            "stderr" => Ok(StreamName::Stderr),
            other => Err(DagobahError::InvalidArgument(format!("unknown stream name: {other}"))),
        }
    }
}

/// Resolves a task's configured hostname to connection details, or
/// `None` if no such host is known (mirrors `Dagobah.get_host`
/// returning `None` and the task recording a `remote_failure`).
pub trait HostResolver: Send + Sync {
    fn resolve(&self, hostname: &str) -> Option<HostSpec>;
}

/// Outcome of a task run, handed to `Job::_complete_task` once
/// `check_complete` observes the process has exited.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub start_time: DateTime<Utc>,
    pub complete_time: DateTime<Utc>,
}

pub struct Task {
    command: String,
    name: String,
    hostname: Option<String>,
    timeouts: TimeoutLadder,

    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    successful: Option<bool>,

    terminate_sent: bool,
    kill_sent: bool,
    remote_failure: bool,
    remote_failure_detail: Option<String>,

    running: Option<Box<dyn RunningTask>>,
}

impl Task {
    pub fn new(
        command: impl Into<String>,
        name: impl Into<String>,
        soft_timeout: Duration,
        hard_timeout: Duration,
        hostname: Option<String>,
    ) -> Self {
        Self {
            command: command.into(),
            name: name.into(),
            hostname,
            timeouts: TimeoutLadder::new(soft_timeout, hard_timeout),
            started_at: None,
            completed_at: None,
            successful: None,
            terminate_sent: false,
            kill_sent: false,
            remote_failure: false,
            remote_failure_detail: None,
            running: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn soft_timeout(&self) -> Duration {
        self.timeouts.soft()
    }

    pub fn hard_timeout(&self) -> Duration {
        self.timeouts.hard()
    }

    pub fn set_soft_timeout(&mut self, timeout: Duration) {
        self.timeouts = TimeoutLadder::new(timeout, self.timeouts.hard());
    }

    pub fn set_hard_timeout(&mut self, timeout: Duration) {
        self.timeouts = TimeoutLadder::new(self.timeouts.soft(), timeout);
    }

    pub fn set_hostname(&mut self, hostname: Option<String>) {
        self.hostname = hostname;
    }

    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = command.into();
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn successful(&self) -> Option<bool> {
        self.successful
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.completed_at.is_none()
    }

    /// A fresh, idle copy of this task's configuration — no in-flight
    /// process, no run history. Mirrors `Task.clone()`.
    pub fn clone_idle(&self) -> Task {
        Task::new(self.command.clone(), self.name.clone(), self.timeouts.soft(), self.timeouts.hard(), self.hostname.clone())
    }

    /// Resets runtime state prior to a new execution (`Task.reset`).
    fn reset(&mut self) {
        self.started_at = None;
        self.completed_at = None;
        self.successful = None;
        self.terminate_sent = false;
        self.kill_sent = false;
        self.remote_failure = false;
        self.remote_failure_detail = None;
        self.running = None;
    }

    /// Builds the structured diagnostic `remote_ssh` wrote into `stderr`
    /// on failure: which host config fields were examined, so an
    /// operator can tell a bad hostname from a bad key from a dead box.
    fn describe_remote_failure(reason: &str, host: Option<&HostSpec>) -> String {
        let mut detail = format!("Exception when trying to SSH: {reason}\n");
        match host {
            Some(host) => {
                detail.push_str(&format!("hostname: \"{}\"\n", host.hostname));
                detail.push_str(&format!("user: \"{}\"\n", host.user));
                detail.push_str(&format!("identity file: \"{}\"\n", host.identity_file.display()));
            }
            None => detail.push_str("host not found in configuration\n"),
        }
        detail
    }

    /// Begins execution, local or remote depending on `hostname`. When
    /// a hostname is set but `resolver` can't find it, the task is
    /// marked `remote_failure` immediately rather than erroring, so
    /// `check_complete` reports it as a normal (failed) completion —
    /// matching `Task.start`'s behavior when `get_host` returns `None`.
    pub async fn start(&mut self, resolver: &dyn HostResolver, clock: &dyn Clock) -> DagobahResult<()> {
        self.reset();

        match self.hostname.clone() {
            Some(hostname) => match resolver.resolve(&hostname) {
                Some(host) => match connect(&host).await {
                    Ok(session) => match spawn_remote(session, &self.command).await {
                        Ok(task) => self.running = Some(Box::new(task)),
                        Err(e) => {
                            self.remote_failure = true;
                            self.remote_failure_detail = Some(Self::describe_remote_failure(&e.to_string(), Some(&host)));
                        }
                    },
                    Err(e) => {
                        self.remote_failure = true;
                        self.remote_failure_detail = Some(Self::describe_remote_failure(&e.to_string(), Some(&host)));
                    }
                },
                None => {
                    self.remote_failure = true;
                    self.remote_failure_detail = Some(Self::describe_remote_failure(&format!("no host named \"{hostname}\""), None));
                }
            },
            None => {
                let task = spawn_local(&self.command).map_err(|e| DagobahError::TransportFailure(e.to_string()))?;
                self.running = Some(Box::new(task));
            }
        }

        self.started_at = Some(clock.now());
        Ok(())
    }

    /// Non-blocking completion check (`Task.check_complete`, originally
    /// re-armed on a 2.5 second timer; the engine's poll loop owns that
    /// cadence here instead). Applies the timeout ladder while still
    /// running; finalizes capture and return code once the process has
    /// exited.
    pub async fn check_complete(&mut self, clock: &dyn Clock) -> DagobahResult<Option<TaskOutcome>> {
        let Some(started_at) = self.started_at else {
            return Ok(None);
        };

        if self.remote_failure && self.running.is_none() {
            let now = clock.now();
            self.completed_at = Some(now);
            self.successful = Some(false);
            let stderr = self.remote_failure_detail.clone().unwrap_or_else(|| "An error occurred with the remote machine.\n".to_string());
            return Ok(Some(TaskOutcome {
                success: false,
                return_code: -1,
                stdout: String::new(),
                stderr,
                start_time: started_at,
                complete_time: now,
            }));
        }

        let Some(running) = self.running.as_mut() else {
            return Ok(None);
        };

        let elapsed = (clock.now() - started_at).to_std().unwrap_or(Duration::ZERO);
        let due = self.timeouts.check(elapsed, self.terminate_sent, self.kill_sent);
        if due.terminate {
            running.terminate().await.map_err(|e| DagobahError::TransportFailure(e.to_string()))?;
            self.terminate_sent = true;
        }
        if due.kill {
            running.kill().await.map_err(|e| DagobahError::TransportFailure(e.to_string()))?;
            self.kill_sent = true;
        }

        match running.poll().await.map_err(|e| DagobahError::TransportFailure(e.to_string()))? {
            PollResult::Running => Ok(None),
            PollResult::Exited(outcome) => {
                let complete_time = clock.now();
                let stdout = running.stdout().snapshot();
                let mut stderr = running.stderr().snapshot();

                if self.terminate_sent {
                    stderr.push_str("\nDAGOBAH SENT SIGTERM TO THIS PROCESS\n");
                }
                if self.kill_sent {
                    stderr.push_str("\nDAGOBAH SENT SIGKILL TO THIS PROCESS\n");
                }

                let return_code = if outcome.remote_failure || self.remote_failure {
                    stderr.push('\n');
                    stderr.push_str(self.remote_failure_detail.as_deref().unwrap_or("An error occurred with the remote machine.\n"));
                    -1
                } else {
                    outcome.return_code
                };

                self.completed_at = Some(complete_time);
                self.successful = Some(return_code == 0);
                self.running = None;

                Ok(Some(TaskOutcome {
                    success: return_code == 0,
                    return_code,
                    stdout,
                    stderr,
                    start_time: started_at,
                    complete_time,
                }))
            }
        }
    }

    pub fn stdout(&self) -> Option<&CaptureBuffer> {
        self.running.as_ref().map(|r| r.stdout())
    }

    pub fn stderr(&self) -> Option<&CaptureBuffer> {
        self.running.as_ref().map(|r| r.stderr())
    }

    /// The live capture buffer for `stream`, if this task currently has
    /// a process in flight. `None` means the caller should fall back to
    /// the latest persisted run log (`Task.head`/`Task.tail`'s
    /// "no current run" branch) rather than the temp sinks.
    pub fn live_buffer(&self, stream: StreamName) -> Option<&CaptureBuffer> {
        self.running.as_ref().map(|r| match stream {
            StreamName::Stdout => r.stdout(),
            StreamName::Stderr => r.stderr(),
        })
    }

    pub async fn terminate(&mut self) -> DagobahResult<()> {
        let running = self.running.as_mut().ok_or_else(|| DagobahError::InvalidArgument("task does not have a running process".to_string()))?;
        running.terminate().await.map_err(|e| DagobahError::TransportFailure(e.to_string()))?;
        self.terminate_sent = true;
        Ok(())
    }

    pub async fn kill(&mut self) -> DagobahResult<()> {
        let running = self.running.as_mut().ok_or_else(|| DagobahError::InvalidArgument("task does not have a running process".to_string()))?;
        running.kill().await.map_err(|e| DagobahError::TransportFailure(e.to_string()))?;
        self.kill_sent = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
