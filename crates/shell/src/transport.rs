// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared shape local and SSH-backed task execution both present to
//! `dagobah-engine`'s `Task` state machine.

use crate::capture::CaptureBuffer;
use crate::error::ShellError;
use async_trait::async_trait;

/// The outcome of a task process that has finished running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub return_code: i32,
    /// Set when the transport itself failed (e.g. the SSH connection
    /// could not be established) rather than the command running and
    /// exiting non-zero. Mirrors `Task.remote_failure` forcing
    /// `return_code = -1` in the original.
    pub remote_failure: bool,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        !self.remote_failure && self.return_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Running,
    Exited(ExitOutcome),
}

/// A command in flight, local or remote. Implementors own the
/// transport-specific plumbing; `dagobah-engine::Task` only calls
/// through this trait.
#[async_trait]
pub trait RunningTask: Send {
    fn stdout(&self) -> &CaptureBuffer;
    fn stderr(&self) -> &CaptureBuffer;

    /// Non-blocking check for completion. Drains any buffered output
    /// before reporting `Exited` so callers see the full capture.
    async fn poll(&mut self) -> Result<PollResult, ShellError>;

    async fn terminate(&mut self) -> Result<(), ShellError>;
    async fn kill(&mut self) -> Result<(), ShellError>;
}
