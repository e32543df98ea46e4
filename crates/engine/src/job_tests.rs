// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::jobtask::JobBody;
use dagobah_backend::InMemoryBackend;
use dagobah_core::FakeClock;
use dagobah_shell::HostSpec;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct NoJobs;
impl JobResolver for NoJobs {
    fn resolve(&self, _job_name: &str) -> Option<JobBody> {
        None
    }
}

struct NoHosts;
impl HostResolver for NoHosts {
    fn resolve(&self, _hostname: &str) -> Option<HostSpec> {
        None
    }
}

fn harness() -> (SharedBackend, FakeClock, NoJobs, NoHosts, EventHandler) {
    (Arc::new(InMemoryBackend::new()), FakeClock::new(), NoJobs, NoHosts, EventHandler::new())
}

async fn run_until_idle(job: &mut Job, ctx: &JobContext<'_>) {
    for _ in 0..200 {
        if job.state() != JobState::Running {
            return;
        }
        job.poll_once(ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job never left the running state");
}

#[tokio::test]
async fn linear_pipeline_runs_to_completion_and_emits_job_complete() {
    let (backend, clock, jobs, hosts, events) = harness();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        events.register("job_complete", Arc::new(move |_| seen.lock().unwrap().push("job_complete".to_string())));
    }
    let ctx = JobContext { clock: &clock, backend: &backend, jobs: &jobs, hosts: &hosts, events: &events };

    let mut job = Job::new(JobId::new("job-1"), DagobahId::new("d-1"), "pipeline");
    job.add_task("echo a", "a", Duration::ZERO, Duration::ZERO, None).unwrap();
    job.add_task("echo b", "b", Duration::ZERO, Duration::ZERO, None).unwrap();
    job.add_dependency("a", "b").unwrap();

    job.start(&ctx).await.unwrap();
    assert_eq!(job.state(), JobState::Running);

    run_until_idle(&mut job, &ctx).await;

    assert_eq!(job.state(), JobState::Waiting);
    assert!(job.run_log().is_none(), "run log is cleared on a clean completion");
    assert_eq!(*seen.lock().unwrap(), vec!["job_complete".to_string()]);
}

#[tokio::test]
async fn mid_pipeline_failure_fails_the_job_and_never_starts_downstream() {
    let (backend, clock, jobs, hosts, events) = harness();
    let ctx = JobContext { clock: &clock, backend: &backend, jobs: &jobs, hosts: &hosts, events: &events };

    let mut job = Job::new(JobId::new("job-2"), DagobahId::new("d-1"), "pipeline");
    job.add_task("exit 1", "a", Duration::ZERO, Duration::ZERO, None).unwrap();
    job.add_task("echo never", "b", Duration::ZERO, Duration::ZERO, None).unwrap();
    job.add_dependency("a", "b").unwrap();

    job.start(&ctx).await.unwrap();
    run_until_idle(&mut job, &ctx).await;

    assert_eq!(job.state(), JobState::Failed);
    let log = job.run_log().unwrap();
    assert_eq!(log.tasks.get("a").unwrap().success, Some(false));
    assert!(!log.tasks.contains_key("b"), "a downstream of a failed task never starts");
}

#[tokio::test]
async fn retry_reruns_only_the_failed_task_and_can_then_succeed() {
    let (backend, clock, jobs, hosts, events) = harness();
    let ctx = JobContext { clock: &clock, backend: &backend, jobs: &jobs, hosts: &hosts, events: &events };

    let mut job = Job::new(JobId::new("job-3"), DagobahId::new("d-1"), "pipeline");
    job.add_task("exit 1", "a", Duration::ZERO, Duration::ZERO, None).unwrap();
    job.add_task("echo b", "b", Duration::ZERO, Duration::ZERO, None).unwrap();
    job.add_dependency("a", "b").unwrap();

    job.start(&ctx).await.unwrap();
    run_until_idle(&mut job, &ctx).await;
    assert_eq!(job.state(), JobState::Failed);

    job.edit_task("a", None, Some("echo recovered".to_string()), None, None, None).unwrap();
    job.retry(&ctx).await.unwrap();
    assert_eq!(job.state(), JobState::Running);

    run_until_idle(&mut job, &ctx).await;

    assert_eq!(job.state(), JobState::Waiting);
}

#[tokio::test]
async fn retry_with_nothing_failed_is_rejected() {
    let (backend, clock, jobs, hosts, events) = harness();
    let ctx = JobContext { clock: &clock, backend: &backend, jobs: &jobs, hosts: &hosts, events: &events };

    let mut job = Job::new(JobId::new("job-4"), DagobahId::new("d-1"), "pipeline");
    job.add_task("echo a", "a", Duration::ZERO, Duration::ZERO, None).unwrap();

    assert!(matches!(job.retry(&ctx).await, Err(DagobahError::ImmutableInState { .. })));

    job.start(&ctx).await.unwrap();
    run_until_idle(&mut job, &ctx).await;
    assert_eq!(job.state(), JobState::Waiting);
    assert!(matches!(job.retry(&ctx).await, Err(DagobahError::ImmutableInState { .. })));
}

#[tokio::test]
async fn graph_mutation_is_rejected_while_a_run_is_in_flight() {
    let (backend, clock, jobs, hosts, events) = harness();
    let ctx = JobContext { clock: &clock, backend: &backend, jobs: &jobs, hosts: &hosts, events: &events };

    let mut job = Job::new(JobId::new("job-5"), DagobahId::new("d-1"), "pipeline");
    job.add_task("sleep 30", "a", Duration::ZERO, Duration::ZERO, None).unwrap();
    job.start(&ctx).await.unwrap();

    let err = job.add_task("echo b", "b", Duration::ZERO, Duration::ZERO, None).unwrap_err();
    assert!(matches!(err, DagobahError::ImmutableInState { state: "running", action: "add_task" }));

    job.terminate_all().await;
}

#[test]
fn schedule_computes_next_run_from_a_cron_expression() {
    let mut job = Job::new(JobId::new("job-6"), DagobahId::new("d-1"), "scheduled");
    let now = chrono::Utc::now();
    job.schedule(Some("0 0 * * *".to_string()), now).unwrap();
    assert!(job.next_run().is_some());
    assert!(job.next_run().unwrap() > now);

    job.schedule(None, now).unwrap();
    assert!(job.next_run().is_none());
    assert!(job.cron_schedule().is_none());
}

#[test]
fn serialize_round_trips_through_from_doc() {
    let mut job = Job::new(JobId::new("job-7"), DagobahId::new("d-1"), "pipeline");
    job.add_task("echo a", "a", Duration::from_secs(5), Duration::from_secs(30), None).unwrap();
    job.add_task("echo b", "b", Duration::ZERO, Duration::ZERO, None).unwrap();
    job.add_dependency("a", "b").unwrap();
    job.update_notes(Some("test note".to_string())).unwrap();

    let doc = job.serialize(false);
    let restored = Job::from_doc(JobId::new("job-7"), DagobahId::new("d-1"), doc, chrono::Utc::now()).unwrap();

    assert_eq!(restored.name(), "pipeline");
    assert_eq!(restored.notes(), Some("test note"));
    assert_eq!(restored.graph().get("a").unwrap().iter().next().unwrap(), "b");
}
