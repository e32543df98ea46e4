// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("timeouts must be non-negative")]
    InvalidTimeout,
    #[error("task has no running process")]
    NotRunning,
    #[error("failed to spawn local process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ssh connection failed: {0}")]
    Ssh(String),
    #[error("stream must be stdout or stderr, got {0}")]
    UnknownStream(String),
    #[error("child process pipe was not available")]
    PipeUnavailable,
    #[error("failed to send signal to process: {0}")]
    Signal(String),
}
