// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local task execution: `sh -c <command>` with the parent's environment
//! inherited, matching `subprocess.Popen(shell=True, env=os.environ.copy())`
//! in the original. Output is captured incrementally by a pair of reader
//! tasks rather than an OS temp file, so `head`/`tail` can still observe
//! partial output from a task that is still running.

use crate::capture::CaptureBuffer;
use crate::error::ShellError;
use crate::transport::{ExitOutcome, PollResult, RunningTask};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::task::JoinHandle;

const READ_CHUNK_BYTES: usize = 1024;

pub struct LocalTask {
    child: Child,
    stdout: CaptureBuffer,
    stderr: CaptureBuffer,
    stdout_reader: Option<JoinHandle<()>>,
    stderr_reader: Option<JoinHandle<()>>,
}

/// Spawns `command` through the system shell, piping stdout/stderr into
/// fresh [`CaptureBuffer`]s.
pub fn spawn_local(command: &str) -> Result<LocalTask, ShellError> {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    let stdout_pipe = child.stdout.take().ok_or(ShellError::PipeUnavailable)?;
    let stderr_pipe = child.stderr.take().ok_or(ShellError::PipeUnavailable)?;

    let stdout = CaptureBuffer::new();
    let stderr = CaptureBuffer::new();

    let stdout_reader = Some(spawn_drain(stdout_pipe, stdout.clone()));
    let stderr_reader = Some(spawn_drain(stderr_pipe, stderr.clone()));

    Ok(LocalTask { child, stdout, stderr, stdout_reader, stderr_reader })
}

fn spawn_drain(mut pipe: impl AsyncReadExt + Unpin + Send + 'static, into: CaptureBuffer) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => into.append(&buf[..n]),
            }
        }
    })
}

#[async_trait]
impl RunningTask for LocalTask {
    fn stdout(&self) -> &CaptureBuffer {
        &self.stdout
    }

    fn stderr(&self) -> &CaptureBuffer {
        &self.stderr
    }

    async fn poll(&mut self) -> Result<PollResult, ShellError> {
        match self.child.try_wait()? {
            None => Ok(PollResult::Running),
            Some(status) => {
                if let Some(handle) = self.stdout_reader.take() {
                    let _ = handle.await;
                }
                if let Some(handle) = self.stderr_reader.take() {
                    let _ = handle.await;
                }
                Ok(PollResult::Exited(ExitOutcome {
                    return_code: status.code().unwrap_or(-1),
                    remote_failure: false,
                }))
            }
        }
    }

    async fn terminate(&mut self) -> Result<(), ShellError> {
        let pid = self.child.id().ok_or(ShellError::NotRunning)?;
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| ShellError::Signal(e.to_string()))
    }

    async fn kill(&mut self) -> Result<(), ShellError> {
        self.child.start_kill()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
