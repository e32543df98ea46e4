// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH-backed task execution (`Task.remote_ssh` in the original, which
//! used paramiko with `AutoAddPolicy`, a keepalive of 10 seconds, and a
//! PTY-backed `exec_command`). `openssh` shells out to the system `ssh`
//! binary under a control master, so connection setup and keepalive are
//! configured the same way an operator would on the command line rather
//! than through a bespoke protocol implementation.

use crate::capture::CaptureBuffer;
use crate::error::ShellError;
use crate::transport::{ExitOutcome, PollResult, RunningTask};
use async_trait::async_trait;
use openssh::{KnownHosts, Session, SessionBuilder, Stdio as SshStdio};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;

/// Matches paramiko's 82800-second (23 hour) connect timeout and
/// `transport.set_keepalive(10)`.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(82_800);
const KEEPALIVE: Duration = Duration::from_secs(10);
const READ_CHUNK_BYTES: usize = 1024;

/// The subset of an operator's `~/.ssh/config` `Host` stanza the engine
/// needs: hostname, login user, and private key. Hosts whose name
/// contains a glob (`*`) are excluded by `Dagobah::get_hosts` before
/// reaching here (`base.py`'s wildcard filter).
#[derive(Debug, Clone)]
pub struct HostSpec {
    pub hostname: String,
    pub user: String,
    pub identity_file: PathBuf,
}

pub async fn connect(host: &HostSpec) -> Result<Session, ShellError> {
    let mut builder = SessionBuilder::default();
    builder
        .user(host.user.clone())
        .keyfile(host.identity_file.clone())
        .known_hosts_check(KnownHosts::Accept)
        .connect_timeout(CONNECT_TIMEOUT)
        .server_alive_interval(KEEPALIVE);

    builder
        .connect(&host.hostname)
        .await
        .map_err(|e| ShellError::Ssh(format!("{e}: host {:?}", host)))
}

pub struct RemoteTask {
    stdout: CaptureBuffer,
    stderr: CaptureBuffer,
    done_rx: oneshot::Receiver<ExitOutcome>,
    cancel_tx: Option<oneshot::Sender<()>>,
    cached: Option<ExitOutcome>,
}

/// Runs `command` on an already-connected session. The session is moved
/// into the background task that drives the child to completion so the
/// returned [`RemoteTask`] can be polled without holding a borrow across
/// awaits.
pub async fn spawn_remote(session: Session, command: &str) -> Result<RemoteTask, ShellError> {
    let session = std::sync::Arc::new(session);
    let (done_tx, done_rx) = oneshot::channel();
    let (cancel_tx, mut cancel_rx) = oneshot::channel();

    let stdout = CaptureBuffer::new();
    let stderr = CaptureBuffer::new();
    let stdout_for_task = stdout.clone();
    let stderr_for_task = stderr.clone();
    let command = command.to_string();

    let mut child = session
        .shell(&command)
        .stdout(SshStdio::piped())
        .stderr(SshStdio::piped())
        .spawn()
        .await
        .map_err(|e| ShellError::Ssh(e.to_string()))?;

    let stdout_pipe = child.stdout().take().ok_or(ShellError::PipeUnavailable)?;
    let stderr_pipe = child.stderr().take().ok_or(ShellError::PipeUnavailable)?;

    tokio::spawn(drain(stdout_pipe, stdout_for_task));
    tokio::spawn(drain(stderr_pipe, stderr_for_task));

    tokio::spawn(async move {
        let _session = session;
        tokio::select! {
            result = child.wait() => {
                let outcome = match result {
                    Ok(status) => ExitOutcome {
                        return_code: status.code().unwrap_or(-1),
                        remote_failure: false,
                    },
                    Err(_) => ExitOutcome { return_code: -1, remote_failure: true },
                };
                let _ = done_tx.send(outcome);
            }
            _ = &mut cancel_rx => {
                drop(child);
                let _ = done_tx.send(ExitOutcome { return_code: -1, remote_failure: true });
            }
        }
    });

    Ok(RemoteTask { stdout, stderr, done_rx, cancel_tx: Some(cancel_tx), cached: None })
}

async fn drain(mut pipe: impl AsyncReadExt + Unpin, into: CaptureBuffer) {
    let mut buf = [0u8; READ_CHUNK_BYTES];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => into.append(&buf[..n]),
        }
    }
}

#[async_trait]
impl RunningTask for RemoteTask {
    fn stdout(&self) -> &CaptureBuffer {
        &self.stdout
    }

    fn stderr(&self) -> &CaptureBuffer {
        &self.stderr
    }

    async fn poll(&mut self) -> Result<PollResult, ShellError> {
        if let Some(outcome) = self.cached {
            return Ok(PollResult::Exited(outcome));
        }
        match self.done_rx.try_recv() {
            Ok(outcome) => {
                self.cached = Some(outcome);
                Ok(PollResult::Exited(outcome))
            }
            Err(oneshot::error::TryRecvError::Empty) => Ok(PollResult::Running),
            Err(oneshot::error::TryRecvError::Closed) => {
                let outcome = ExitOutcome { return_code: -1, remote_failure: true };
                self.cached = Some(outcome);
                Ok(PollResult::Exited(outcome))
            }
        }
    }

    async fn terminate(&mut self) -> Result<(), ShellError> {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        Ok(())
    }

    async fn kill(&mut self) -> Result<(), ShellError> {
        self.terminate().await
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
