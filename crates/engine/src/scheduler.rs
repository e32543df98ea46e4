// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduling sweep (`Scheduler` in the original, a daemon thread
//! polling once a second). Here it's an async loop over a shared
//! `Dagobah`, started and stopped explicitly rather than tied to a
//! thread's lifetime, since an embedder may want to run it on whatever
//! executor they already have.

use crate::dagobah::Dagobah;
use dagobah_core::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// How often the sweep checks every job's `next_run` (`time.sleep(1)` in
/// the original).
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Drives `Dagobah`'s cron-scheduled job starts. Owns no state of its
/// own beyond a stop flag and `last_check`; `restart` resets both.
pub struct Scheduler {
    dagobah: Arc<Dagobah>,
    clock: Arc<dyn Clock>,
    stopped: Arc<AtomicBool>,
    last_check: parking_lot::Mutex<chrono::DateTime<chrono::Utc>>,
}

impl Scheduler {
    pub fn new(dagobah: Arc<Dagobah>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self { dagobah, clock, stopped: Arc::new(AtomicBool::new(false)), last_check: parking_lot::Mutex::new(now) }
    }

    /// Stops the monitoring loop without tearing down the `Scheduler`
    /// itself — `run` observes the flag and returns.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Resets `last_check` to now and clears the stop flag, so a
    /// subsequent `run` doesn't treat everything scheduled while it was
    /// stopped as due all at once.
    pub fn restart(&self) {
        *self.last_check.lock() = self.clock.now();
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// Runs the sweep loop until `stop` is called. Intended to be
    /// spawned onto its own task (`tokio::spawn(scheduler.run())`); it
    /// never returns early on a single job's error, since one
    /// misbehaving job shouldn't stop every other job's schedule.
    pub async fn run(&self) {
        while !self.stopped.load(Ordering::SeqCst) {
            self.sweep_once().await;
            tokio::time::sleep(SWEEP_INTERVAL).await;
        }
    }

    /// One pass over every job: jobs whose `next_run` falls in
    /// `(last_check, now]` either start (if the job's state allows it)
    /// or have their `next_run` advanced to the following firing (if a
    /// prior run is still in flight). `last_check` always advances to
    /// `now` at the end of the sweep, matching the original
    /// unconditionally setting `self.last_checked = now` regardless of
    /// how many jobs fired.
    pub async fn sweep_once(&self) {
        let now = self.clock.now();
        let last_check = *self.last_check.lock();

        for job_name in self.dagobah.job_names() {
            if let Err(error) = self.dagobah.maybe_fire_scheduled_run(&job_name, last_check, now).await {
                warn!(job = %job_name, %error, "scheduled run failed to start");
            }
        }

        *self.last_check.lock() = now;
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
