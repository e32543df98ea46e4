// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn task_doc_round_trips_through_json() {
    let task = Task::new("echo hi", "greet", Duration::from_secs(5), Duration::from_secs(30), Some("box1".to_string()));
    let doc = TaskDoc::from_task(&task);

    let json = serde_json::to_string(&doc).unwrap();
    let parsed: TaskDoc = serde_json::from_str(&json).unwrap();

    assert_eq!(doc, parsed);
    match parsed {
        TaskDoc::Task { soft_timeout, hard_timeout, hostname, .. } => {
            assert_eq!(soft_timeout, 5);
            assert_eq!(hard_timeout, 30);
            assert_eq!(hostname.as_deref(), Some("box1"));
        }
        TaskDoc::JobTask { .. } => panic!("expected Task variant"),
    }
}

#[test]
fn jobtask_doc_round_trips_through_json() {
    let jobtask = JobTask::new("inner-job", "expand-step");
    let doc = TaskDoc::from_jobtask(&jobtask);

    let json = serde_json::to_string(&doc).unwrap();
    let parsed: TaskDoc = serde_json::from_str(&json).unwrap();

    assert_eq!(doc, parsed);
    assert_eq!(parsed.name(), "expand-step");
}

#[test]
fn task_doc_into_node_preserves_static_config() {
    let task = Task::new("true", "t", Duration::from_secs(1), Duration::from_secs(2), None);
    let node = TaskDoc::from_task(&task).into_node();
    let restored = node.as_task().unwrap();
    assert_eq!(restored.command(), "true");
    assert_eq!(restored.soft_timeout(), Duration::from_secs(1));
}

#[test]
fn dependencies_from_graph_reflects_every_edge_set() {
    use std::collections::{BTreeSet, HashMap};
    let mut graph: Graph = HashMap::new();
    graph.insert("a".to_string(), BTreeSet::from(["b".to_string()]));
    graph.insert("b".to_string(), BTreeSet::new());

    let deps = dependencies_from_graph(&graph);
    assert_eq!(deps.get("a").unwrap(), &vec!["b".to_string()]);
    assert_eq!(deps.get("b").unwrap(), &Vec::<String>::new());
}
