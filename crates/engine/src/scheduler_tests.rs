// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dagobah_backend::{InMemoryBackend, SharedBackend};
use dagobah_core::{FakeClock, JobState};

async fn test_dagobah(clock: Arc<dyn Clock>) -> Arc<Dagobah> {
    let backend: SharedBackend = Arc::new(InMemoryBackend::new());
    Arc::new(Dagobah::new(backend, clock, None).await.unwrap())
}

#[tokio::test]
async fn sweep_starts_a_job_whose_schedule_has_come_due() {
    let clock = Arc::new(FakeClock::new());
    let dagobah = test_dagobah(clock.clone() as Arc<dyn Clock>).await;
    dagobah.add_job("scheduled").await.unwrap();
    dagobah.add_task_to_job("scheduled", "echo hi", "t", std::time::Duration::ZERO, std::time::Duration::ZERO, None).await.unwrap();
    dagobah.schedule_job("scheduled", Some("* * * * *".to_string())).await.unwrap();

    let next_run = dagobah.get_job("scheduled").unwrap().lock().await.next_run().unwrap();
    clock.set(next_run);

    let scheduler = Scheduler::new(dagobah.clone(), clock.clone() as Arc<dyn Clock>);
    scheduler.sweep_once().await;

    let job = dagobah.get_job("scheduled").unwrap();
    assert_eq!(job.lock().await.state(), JobState::Running);
}

#[tokio::test]
async fn sweep_advances_next_run_instead_of_starting_when_already_running() {
    let clock = Arc::new(FakeClock::new());
    let dagobah = test_dagobah(clock.clone() as Arc<dyn Clock>).await;
    dagobah.add_job("scheduled").await.unwrap();
    dagobah.add_task_to_job("scheduled", "sleep 30", "t", std::time::Duration::ZERO, std::time::Duration::ZERO, None).await.unwrap();
    dagobah.schedule_job("scheduled", Some("* * * * *".to_string())).await.unwrap();
    dagobah.start_job("scheduled").await.unwrap();

    let first_next_run = dagobah.get_job("scheduled").unwrap().lock().await.next_run().unwrap();
    clock.set(first_next_run);

    let scheduler = Scheduler::new(dagobah.clone(), clock.clone() as Arc<dyn Clock>);
    scheduler.sweep_once().await;

    let job = dagobah.get_job("scheduled").unwrap();
    let job = job.lock().await;
    assert_eq!(job.state(), JobState::Running, "still running the original attempt, not a fresh one");
    assert!(job.next_run().unwrap() > first_next_run, "next_run advanced past the missed firing");

    drop(job);
    dagobah.terminate_job("scheduled").await.unwrap();
}

#[tokio::test]
async fn sweep_fires_a_second_time_after_the_job_completes_its_first_run() {
    let clock = Arc::new(FakeClock::new());
    let dagobah = test_dagobah(clock.clone() as Arc<dyn Clock>).await;
    dagobah.add_job("scheduled").await.unwrap();
    dagobah.add_task_to_job("scheduled", "true", "t", std::time::Duration::ZERO, std::time::Duration::ZERO, None).await.unwrap();
    dagobah.schedule_job("scheduled", Some("* * * * *".to_string())).await.unwrap();

    let scheduler = Scheduler::new(dagobah.clone(), clock.clone() as Arc<dyn Clock>);
    let first_next_run = dagobah.get_job("scheduled").unwrap().lock().await.next_run().unwrap();

    // Land strictly past the first firing, the way a real sweep loop
    // landing sub-second after a cron boundary would, so `start`
    // advances `next_run` instead of leaving it pinned.
    clock.set(first_next_run + chrono::Duration::seconds(1));
    scheduler.sweep_once().await;

    let job = dagobah.get_job("scheduled").unwrap();
    assert_eq!(job.lock().await.state(), JobState::Running);
    let second_next_run = job.lock().await.next_run().unwrap();
    assert!(second_next_run > first_next_run, "next_run advanced past the first firing");

    for _ in 0..200 {
        if job.lock().await.state() != JobState::Running {
            break;
        }
        dagobah.poll_job_once("scheduled").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(job.lock().await.state(), JobState::Waiting, "first run completed");

    clock.set(second_next_run + chrono::Duration::seconds(1));
    scheduler.sweep_once().await;

    assert_eq!(job.lock().await.state(), JobState::Running, "the job fires again on its next scheduled tick");
}

#[tokio::test(start_paused = true)]
async fn stop_ends_the_sweep_loop() {
    let clock = Arc::new(FakeClock::new());
    let dagobah = test_dagobah(clock.clone() as Arc<dyn Clock>).await;
    let scheduler = Arc::new(Scheduler::new(dagobah, clock as Arc<dyn Clock>));

    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    scheduler.stop();
    tokio::time::advance(SWEEP_INTERVAL * 2).await;
    tokio::time::timeout(std::time::Duration::from_secs(5), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn restart_resets_last_check_to_now() {
    let clock = Arc::new(FakeClock::new());
    let dagobah = test_dagobah(clock.clone() as Arc<dyn Clock>).await;
    let scheduler = Scheduler::new(dagobah, clock.clone() as Arc<dyn Clock>);

    scheduler.stop();
    clock.advance(chrono::Duration::hours(1));
    scheduler.restart();

    assert_eq!(*scheduler.last_check.lock(), clock.now());
}
