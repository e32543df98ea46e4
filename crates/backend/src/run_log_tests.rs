// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn at(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 28, h, 0, 0).unwrap()
}

#[test]
fn all_tasks_complete_is_false_when_empty() {
    let log = RunLog::new(LogId::new("l1"), JobId::new("j1"), "job", DagobahId::new("d1"), at(0));
    assert!(!log.all_tasks_complete());
}

#[test]
fn all_tasks_complete_requires_every_task_to_have_succeeded_or_failed() {
    let mut log = RunLog::new(LogId::new("l1"), JobId::new("j1"), "job", DagobahId::new("d1"), at(0));
    let mut a = TaskLogEntry::started("echo a", at(0));
    a.success = Some(true);
    let b = TaskLogEntry::started("echo b", at(0));
    log.tasks.insert("a".to_string(), a);
    log.tasks.insert("b".to_string(), b);
    assert!(!log.all_tasks_complete());

    log.tasks.get_mut("b").unwrap().success = Some(true);
    assert!(log.all_tasks_complete());
}

#[test]
fn any_task_failed_detects_a_single_failure() {
    let mut log = RunLog::new(LogId::new("l1"), JobId::new("j1"), "job", DagobahId::new("d1"), at(0));
    let mut a = TaskLogEntry::started("echo a", at(0));
    a.success = Some(false);
    log.tasks.insert("a".to_string(), a);
    assert!(log.any_task_failed());
}

#[test]
fn strict_json_roundtrip_preserves_fields() {
    let mut log = RunLog::new(LogId::new("l1"), JobId::new("j1"), "job", DagobahId::new("d1"), at(0));
    let mut t = TaskLogEntry::started("echo hi", at(0));
    t.complete_time = Some(at(1));
    t.return_code = Some(0);
    t.success = Some(true);
    t.stdout = "hi\n".to_string();
    log.tasks.insert("t".to_string(), t);

    let json = serde_json::to_string(&log).unwrap();
    assert!(json.contains("2026-07-28T00:00:00"));
    assert!(!json.contains('.'), "strict json must drop fractional seconds");

    let back: RunLog = serde_json::from_str(&json).unwrap();
    assert_eq!(back, log);
}
