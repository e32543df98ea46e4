// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutable directed acyclic graph of opaque node names.
//!
//! The DAG never owns tasks; it carries only node names and the edges
//! between them. All graph-consuming operations take an explicit `&Graph`
//! so a caller can pass in a cloned snapshot instead of the live graph.

use crate::error::DagError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// `graph[node]` is the set of nodes `node` has an edge towards
/// (its downstream dependents).
pub type Graph = HashMap<String, BTreeSet<String>>;

/// A mutable DAG. Thin wrapper around [`Graph`] with validated mutators;
/// all read-only traversal helpers are free functions so they can run
/// against any `&Graph`, including an unowned snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dag {
    pub graph: Graph,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a DAG from a `{node: [downstream nodes]}` mapping, adding
    /// every node first and then every edge. Mirrors the original
    /// `DAG.from_dict`.
    pub fn from_edges(edges: HashMap<String, Vec<String>>) -> Result<Self, DagError> {
        let mut dag = Self::new();
        for node in edges.keys() {
            dag.add_node(node)?;
        }
        for (from, tos) in &edges {
            for to in tos {
                dag.add_edge(from, to)?;
            }
        }
        Ok(dag)
    }

    pub fn add_node(&mut self, name: &str) -> Result<(), DagError> {
        if self.graph.contains_key(name) {
            return Err(DagError::DuplicateNode(name.to_string()));
        }
        self.graph.insert(name.to_string(), BTreeSet::new());
        Ok(())
    }

    /// Removes `name` and strips it from every other node's edge set.
    pub fn delete_node(&mut self, name: &str) -> Result<(), DagError> {
        if self.graph.remove(name).is_none() {
            return Err(DagError::MissingNode(name.to_string()));
        }
        for edges in self.graph.values_mut() {
            edges.remove(name);
        }
        Ok(())
    }

    /// Adds an edge only if doing so keeps the graph acyclic. Validates on
    /// a trial copy and commits only on success, so a rejected edge leaves
    /// the graph byte-for-byte unchanged.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), DagError> {
        if !self.graph.contains_key(from) || !self.graph.contains_key(to) {
            return Err(DagError::MissingNode(
                if !self.graph.contains_key(from) { from } else { to }.to_string(),
            ));
        }
        let mut trial = self.graph.clone();
        trial.get_mut(from).expect("checked above").insert(to.to_string());
        if !validate(&trial).0 {
            return Err(DagError::CycleDetected);
        }
        self.graph = trial;
        Ok(())
    }

    pub fn delete_edge(&mut self, from: &str, to: &str) -> Result<(), DagError> {
        let edges = self
            .graph
            .get_mut(from)
            .ok_or_else(|| DagError::MissingEdge { from: from.to_string(), to: to.to_string() })?;
        if !edges.remove(to) {
            return Err(DagError::MissingEdge { from: from.to_string(), to: to.to_string() });
        }
        Ok(())
    }

    /// Renames `old` to `new` everywhere it appears: as a node key and as
    /// a downstream reference inside every other node's edge set.
    pub fn rename_edges(&mut self, old: &str, new: &str) -> Result<(), DagError> {
        let edges = self
            .graph
            .remove(old)
            .ok_or_else(|| DagError::MissingNode(old.to_string()))?;
        self.graph.insert(new.to_string(), edges);
        for (node, node_edges) in self.graph.iter_mut() {
            if node == new {
                continue;
            }
            if node_edges.remove(old) {
                node_edges.insert(new.to_string());
            }
        }
        Ok(())
    }

    pub fn downstream(&self, node: &str) -> Result<Vec<String>, DagError> {
        downstream(&self.graph, node)
    }

    pub fn predecessors(&self, node: &str) -> Vec<String> {
        predecessors(&self.graph, node)
    }

    pub fn ind_nodes(&self) -> Vec<String> {
        ind_nodes(&self.graph)
    }

    pub fn all_leaves(&self) -> Vec<String> {
        all_leaves(&self.graph)
    }

    pub fn topological_sort(&self) -> Result<Vec<String>, DagError> {
        topological_sort(&self.graph)
    }

    pub fn validate(&self) -> (bool, &'static str) {
        validate(&self.graph)
    }
}

/// Nodes `node` has an edge towards.
pub fn downstream(graph: &Graph, node: &str) -> Result<Vec<String>, DagError> {
    graph
        .get(node)
        .map(|edges| edges.iter().cloned().collect())
        .ok_or_else(|| DagError::MissingNode(node.to_string()))
}

/// Nodes with an outgoing edge to `node` (a.k.a. `_dependencies` in the
/// original).
pub fn predecessors(graph: &Graph, node: &str) -> Vec<String> {
    graph
        .iter()
        .filter(|(_, edges)| edges.contains(node))
        .map(|(n, _)| n.clone())
        .collect()
}

/// Nodes with no predecessors — the run's starting set.
pub fn ind_nodes(graph: &Graph) -> Vec<String> {
    let all: BTreeSet<&String> = graph.keys().collect();
    let dependent: BTreeSet<&String> = graph.values().flatten().collect();
    all.difference(&dependent).map(|s| (*s).clone()).collect()
}

/// Nodes with no successors.
pub fn all_leaves(graph: &Graph) -> Vec<String> {
    graph
        .iter()
        .filter(|(_, edges)| edges.is_empty())
        .map(|(n, _)| n.clone())
        .collect()
}

/// Kahn's algorithm. Fails [`DagError::Cyclic`] if any node remains
/// unvisited once the queue drains.
pub fn topological_sort(graph: &Graph) -> Result<Vec<String>, DagError> {
    let mut remaining: Graph = graph.clone();
    let mut order = Vec::with_capacity(graph.len());
    let mut queue: VecDeque<String> = ind_nodes(graph).into_iter().collect();

    while let Some(n) = queue.pop_front() {
        order.push(n.clone());
        let outgoing: Vec<String> = remaining.get(&n).cloned().unwrap_or_default().into_iter().collect();
        for m in outgoing {
            if let Some(edges) = remaining.get_mut(&n) {
                edges.remove(&m);
            }
            if predecessors(&remaining, &m).is_empty() {
                queue.push_back(m);
            }
        }
    }

    if order.len() != graph.len() {
        return Err(DagError::Cyclic);
    }
    Ok(order)
}

/// True iff there is at least one independent node and a topological sort
/// exists. Returns a human-readable reason on failure.
pub fn validate(graph: &Graph) -> (bool, &'static str) {
    if ind_nodes(graph).is_empty() {
        return (false, "no independent nodes detected");
    }
    match topological_sort(graph) {
        Ok(_) => (true, "valid"),
        Err(_) => (false, "failed topological sort"),
    }
}

#[cfg(test)]
#[path = "dag_tests.rs"]
mod tests;
