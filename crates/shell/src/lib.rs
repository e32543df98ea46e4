// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dagobah-shell: task transport. Local processes run through the
//! system shell (`sh -c`, inheriting the parent environment); remote
//! processes run the same way over SSH. Both report through the same
//! [`RunningTask`] trait so `dagobah-engine`'s `Task` state machine
//! doesn't need to know which one it's driving.

pub mod capture;
pub mod error;
pub mod local;
pub mod remote;
pub mod timeout;
pub mod transport;

pub use capture::{head_lines, tail_lines, truncate_stream, CaptureBuffer};
pub use error::ShellError;
pub use local::{spawn_local, LocalTask};
pub use remote::{connect, spawn_remote, HostSpec, RemoteTask};
pub use timeout::{DueSignals, TimeoutLadder};
pub use transport::{ExitOutcome, PollResult, RunningTask};
