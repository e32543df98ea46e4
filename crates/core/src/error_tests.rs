// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn dag_error_messages_name_the_offending_node() {
    let err = DagError::DuplicateNode("a".to_string());
    assert_eq!(err.to_string(), "node a already exists");
}

#[test]
fn dagobah_error_wraps_dag_error_via_from() {
    let err: DagobahError = DagError::Cyclic.into();
    assert!(matches!(err, DagobahError::Dag(DagError::Cyclic)));
}

#[test]
fn not_found_and_name_taken_constructors_carry_kind_and_name() {
    let err = DagobahError::not_found("job", "alpha");
    assert_eq!(err.to_string(), "job not found: alpha");
    let err = DagobahError::name_taken("task", "beta");
    assert_eq!(err.to_string(), "task name already taken: beta");
}

#[test]
fn immutable_in_state_message_names_state_and_action() {
    let err = DagobahError::immutable("running", "change_graph");
    assert_eq!(
        err.to_string(),
        "change_graph is not allowed while job is running"
    );
}
