// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dagobah_core::FakeClock;
use std::time::Duration;

struct NoHosts;
impl HostResolver for NoHosts {
    fn resolve(&self, _hostname: &str) -> Option<HostSpec> {
        None
    }
}

async fn run_to_completion(task: &mut Task, clock: &FakeClock) -> TaskOutcome {
    loop {
        if let Some(outcome) = task.check_complete(clock).await.unwrap() {
            return outcome;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn local_task_runs_to_successful_completion() {
    let clock = FakeClock::new();
    let mut task = Task::new("echo hello", "t1", Duration::ZERO, Duration::ZERO, None);
    task.start(&NoHosts, &clock).await.unwrap();
    let outcome = run_to_completion(&mut task, &clock).await;
    assert!(outcome.success);
    assert_eq!(outcome.stdout.trim(), "hello");
    assert_eq!(task.successful(), Some(true));
}

#[tokio::test]
async fn local_task_reports_nonzero_exit_as_failure() {
    let clock = FakeClock::new();
    let mut task = Task::new("exit 7", "t1", Duration::ZERO, Duration::ZERO, None);
    task.start(&NoHosts, &clock).await.unwrap();
    let outcome = run_to_completion(&mut task, &clock).await;
    assert!(!outcome.success);
    assert_eq!(outcome.return_code, 7);
}

#[tokio::test]
async fn unresolvable_hostname_is_a_remote_failure() {
    let clock = FakeClock::new();
    let mut task = Task::new("echo hi", "t1", Duration::ZERO, Duration::ZERO, Some("ghost".to_string()));
    task.start(&NoHosts, &clock).await.unwrap();
    let outcome = run_to_completion(&mut task, &clock).await;
    assert!(!outcome.success);
    assert_eq!(outcome.return_code, -1);
    assert!(outcome.stderr.contains("ghost"), "names the hostname that couldn't be resolved: {}", outcome.stderr);
    assert!(outcome.stderr.contains("host not found in configuration"));
}

#[tokio::test]
async fn soft_timeout_sends_sigterm_once_elapsed() {
    let clock = FakeClock::new();
    let mut task = Task::new("sleep 30", "t1", Duration::from_secs(5), Duration::ZERO, None);
    task.start(&NoHosts, &clock).await.unwrap();

    clock.advance(chrono::Duration::seconds(10));
    assert!(task.check_complete(&clock).await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let outcome = run_to_completion(&mut task, &clock).await;
    assert!(!outcome.success);
    assert!(outcome.stderr.contains("SIGTERM"));
}

#[tokio::test]
async fn terminate_without_a_running_process_is_an_error() {
    let mut task = Task::new("echo hi", "t1", Duration::ZERO, Duration::ZERO, None);
    assert!(task.terminate().await.is_err());
}

#[test]
fn clone_idle_preserves_configuration_but_drops_history() {
    let mut task = Task::new("echo hi", "t1", Duration::from_secs(1), Duration::from_secs(2), Some("h".to_string()));
    task.successful = Some(true);
    task.started_at = Some(chrono::Utc::now());

    let cloned = task.clone_idle();
    assert_eq!(cloned.command(), "echo hi");
    assert_eq!(cloned.soft_timeout(), Duration::from_secs(1));
    assert_eq!(cloned.hostname(), Some("h"));
    assert!(cloned.started_at().is_none());
    assert!(cloned.successful().is_none());
}
