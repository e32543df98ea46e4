// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn linear_dag() -> Dag {
    let mut dag = Dag::new();
    dag.add_node("a").unwrap();
    dag.add_node("b").unwrap();
    dag.add_node("c").unwrap();
    dag.add_edge("a", "b").unwrap();
    dag.add_edge("b", "c").unwrap();
    dag
}

#[test]
fn add_node_rejects_duplicates() {
    let mut dag = Dag::new();
    dag.add_node("a").unwrap();
    assert_eq!(dag.add_node("a"), Err(DagError::DuplicateNode("a".into())));
}

#[test]
fn delete_node_removes_it_from_other_edge_sets() {
    let mut dag = linear_dag();
    dag.delete_node("b").unwrap();
    assert!(dag.downstream("a").unwrap().is_empty());
    assert_eq!(dag.delete_node("b"), Err(DagError::MissingNode("b".into())));
}

#[test]
fn add_edge_rejects_missing_nodes() {
    let mut dag = Dag::new();
    dag.add_node("a").unwrap();
    assert_eq!(dag.add_edge("a", "ghost"), Err(DagError::MissingNode("ghost".into())));
}

#[test]
fn add_edge_rejects_cycles_and_leaves_graph_unchanged() {
    let mut dag = linear_dag();
    let before = dag.graph.clone();
    let err = dag.add_edge("c", "a");
    assert_eq!(err, Err(DagError::CycleDetected));
    assert_eq!(dag.graph, before);
}

#[test]
fn add_edge_rejects_self_loop() {
    let mut dag = Dag::new();
    dag.add_node("a").unwrap();
    assert_eq!(dag.add_edge("a", "a"), Err(DagError::CycleDetected));
}

#[test]
fn delete_edge_rejects_missing_edge() {
    let mut dag = linear_dag();
    assert_eq!(
        dag.delete_edge("a", "c"),
        Err(DagError::MissingEdge { from: "a".into(), to: "c".into() })
    );
}

#[test]
fn rename_edges_updates_key_and_references() {
    let mut dag = linear_dag();
    dag.rename_edges("b", "bee").unwrap();
    assert!(dag.graph.contains_key("bee"));
    assert!(!dag.graph.contains_key("b"));
    assert_eq!(dag.downstream("a").unwrap(), vec!["bee".to_string()]);
    assert_eq!(dag.downstream("bee").unwrap(), vec!["c".to_string()]);
}

#[test]
fn downstream_and_predecessors_are_inverses() {
    let dag = linear_dag();
    assert_eq!(dag.downstream("a").unwrap(), vec!["b".to_string()]);
    assert_eq!(dag.predecessors("b"), vec!["a".to_string()]);
}

#[test]
fn ind_nodes_returns_roots_only() {
    let dag = linear_dag();
    assert_eq!(dag.ind_nodes(), vec!["a".to_string()]);
}

#[test]
fn all_leaves_returns_sinks_only() {
    let dag = linear_dag();
    assert_eq!(dag.all_leaves(), vec!["c".to_string()]);
}

#[test]
fn all_leaves_handles_diamond_shape() {
    let mut dag = Dag::new();
    for n in ["a", "b", "c", "d"] {
        dag.add_node(n).unwrap();
    }
    dag.add_edge("a", "b").unwrap();
    dag.add_edge("a", "c").unwrap();
    dag.add_edge("b", "d").unwrap();
    dag.add_edge("c", "d").unwrap();
    assert_eq!(dag.all_leaves(), vec!["d".to_string()]);
    let mut ind = dag.ind_nodes();
    ind.sort();
    assert_eq!(ind, vec!["a".to_string()]);
}

#[test]
fn topological_sort_orders_dependencies_before_dependents() {
    let dag = linear_dag();
    let order = dag.topological_sort().unwrap();
    assert_eq!(order, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
}

#[test]
fn topological_sort_fails_on_disconnected_cycle() {
    // Build a graph with a cycle by bypassing add_edge's validation.
    let mut graph: Graph = Graph::new();
    graph.insert("a".to_string(), ["b".to_string()].into_iter().collect());
    graph.insert("b".to_string(), ["a".to_string()].into_iter().collect());
    assert_eq!(topological_sort(&graph), Err(DagError::Cyclic));
}

#[test]
fn validate_reports_reason_for_empty_ind_nodes() {
    let mut graph: Graph = Graph::new();
    graph.insert("a".to_string(), ["b".to_string()].into_iter().collect());
    graph.insert("b".to_string(), ["a".to_string()].into_iter().collect());
    let (ok, reason) = validate(&graph);
    assert!(!ok);
    assert_eq!(reason, "no independent nodes detected");
}

#[test]
fn from_edges_builds_nodes_then_edges() {
    let mut edges = std::collections::HashMap::new();
    edges.insert("a".to_string(), vec!["b".to_string()]);
    edges.insert("b".to_string(), vec![]);
    let dag = Dag::from_edges(edges).unwrap();
    assert_eq!(dag.downstream("a").unwrap(), vec!["b".to_string()]);
}
