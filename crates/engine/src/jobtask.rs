// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-of-jobs expansion (`JobTask` in the original): a task-shaped node
//! in one job's DAG whose body is another job's entire graph, spliced in
//! at snapshot time.
//!
//! The original gave `JobTask` a back-reference to its parent `Job` (and,
//! through it, to the owning `Dagobah`) so `expand()` could look up the
//! target job by name. Here that lookup is an explicit [`JobResolver`]
//! collaborator instead, avoiding the reference cycle; `Dagobah` is the
//! only implementor in this workspace.

use crate::task::Task;
use dagobah_core::dag::{all_leaves, ind_nodes, predecessors};
use dagobah_core::{DagError, DagobahError, DagobahResult, Graph};
use std::collections::{BTreeSet, HashMap};

/// Separator the original used when flattening an expanded job's task
/// names into the parent job's namespace: `"{outer}{JIJ_DELIM}{inner}"`.
pub const JIJ_DELIM: &str = "%_|JIJ_DELIMITER|_%";

#[derive(Debug, Clone)]
pub struct JobTask {
    target_job_name: String,
    name: String,
}

/// Either flavor of DAG node a job's `tasks` map can hold. Deliberately
/// not `Clone`: a running `Task` owns a live process handle that can't
/// be duplicated. Use [`TaskNode::clone_idle`] to snapshot configuration
/// without any in-flight run state.
pub enum TaskNode {
    Task(Task),
    JobTask(JobTask),
}

impl TaskNode {
    pub fn name(&self) -> &str {
        match self {
            TaskNode::Task(t) => t.name(),
            TaskNode::JobTask(j) => j.name(),
        }
    }

    /// A fresh copy with no run-in-progress state, used to build
    /// `tasks_snapshot` (mirrors calling `.clone()` on every task in the
    /// original's `initialize_snapshot`).
    pub fn clone_idle(&self) -> TaskNode {
        match self {
            TaskNode::Task(t) => TaskNode::Task(t.clone_idle()),
            TaskNode::JobTask(j) => TaskNode::JobTask(j.clone()),
        }
    }

    pub fn as_jobtask(&self) -> Option<&JobTask> {
        match self {
            TaskNode::JobTask(j) => Some(j),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            TaskNode::Task(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_task_mut(&mut self) -> Option<&mut Task> {
        match self {
            TaskNode::Task(t) => Some(t),
            _ => None,
        }
    }
}

/// The graph and task map belonging to one job, detached from the `Job`
/// struct that owns it so it can cross a job-of-jobs expansion without
/// dragging along backend handles or run state.
pub struct JobBody {
    pub graph: Graph,
    pub tasks: HashMap<String, TaskNode>,
}

impl JobBody {
    /// An idle copy: fresh `Task`s with no run-in-progress state, same
    /// as the original's `copy.deepcopy(target_job.graph)` paired with a
    /// per-task `.clone()`.
    pub fn clone_idle(&self) -> JobBody {
        JobBody {
            graph: self.graph.clone(),
            tasks: self.tasks.iter().map(|(name, node)| (name.clone(), node.clone_idle())).collect(),
        }
    }
}

/// Looks a job up by name for `JobTask` expansion and cross-job cycle
/// verification. `Dagobah` is the only implementor.
pub trait JobResolver: Send + Sync {
    fn resolve(&self, job_name: &str) -> Option<JobBody>;
}

impl JobTask {
    pub fn new(target_job_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self { target_job_name: target_job_name.into(), name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_job_name(&self) -> &str {
        &self.target_job_name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

/// Flattens a job-of-jobs graph: every `JobTask` node is replaced, in
/// place, by the fully-expanded body of the job it targets (mirrors
/// `Job.expand`). Nodes are visited off a LIFO stack, not a true FIFO
/// queue, matching the original's `traversal_queue.pop()`.
///
/// A `JobTask` whose target job has an empty graph is simply removed,
/// reconnecting its predecessors directly to its downstream children.
/// Otherwise every node of the target's expanded body is renamed
/// `"{task_name}{JIJ_DELIM}{inner_name}"` before being spliced in, and a
/// name collision with an existing node is a naming-conflict error.
pub fn expand_job_body(graph: Graph, tasks: HashMap<String, TaskNode>, resolver: &dyn JobResolver) -> DagobahResult<JobBody> {
    let mut graph = graph;
    let mut tasks = tasks;
    let mut traversal_queue: Vec<String> = graph.keys().cloned().collect();

    while let Some(task_name) = traversal_queue.pop() {
        let Some(node) = tasks.get(&task_name) else { continue };
        let Some(jobtask) = node.as_jobtask() else { continue };

        let target_body = resolver
            .resolve(jobtask.target_job_name())
            .ok_or_else(|| DagobahError::UnknownJob(jobtask.target_job_name().to_string()))?;
        let expanded = expand_job_body(target_body.graph, target_body.tasks, resolver)?;

        let children: BTreeSet<String> = graph.get(&task_name).cloned().unwrap_or_default();
        let preds = predecessors(&graph, &task_name);

        if expanded.graph.is_empty() {
            for pred in &preds {
                if let Some(edges) = graph.get_mut(pred) {
                    edges.extend(children.iter().cloned());
                }
            }
        } else {
            let rename = |n: &str| format!("{task_name}{JIJ_DELIM}{n}");

            let mut renamed_graph: Graph = HashMap::new();
            for (node_name, edges) in &expanded.graph {
                let renamed_edges: BTreeSet<String> = edges.iter().map(|e| rename(e)).collect();
                renamed_graph.insert(rename(node_name), renamed_edges);
            }

            for key in renamed_graph.keys() {
                if graph.contains_key(key) {
                    return Err(DagobahError::NamingConflict(key.clone()));
                }
            }

            let ind = ind_nodes(&renamed_graph);
            let leaves = all_leaves(&renamed_graph);

            for (node_name, edges) in renamed_graph {
                graph.insert(node_name, edges);
            }
            for (inner_name, node) in expanded.tasks {
                tasks.insert(rename(&inner_name), node);
            }

            for pred in &preds {
                if let Some(edges) = graph.get_mut(pred) {
                    edges.extend(ind.iter().cloned());
                }
            }
            for leaf in &leaves {
                if let Some(edges) = graph.get_mut(leaf) {
                    edges.extend(children.iter().cloned());
                }
            }

            for child in &children {
                traversal_queue.push(child.clone());
            }
        }

        graph.remove(&task_name);
        tasks.remove(&task_name);
    }

    Ok(JobBody { graph, tasks })
}

/// Recursive cross-job cycle check (`Job.verify`): a job-of-jobs graph
/// is only acyclic if no job, directly or through nested `JobTask`s,
/// ends up referencing itself.
pub fn verify_acyclic(job_name: &str, graph: &Graph, tasks: &HashMap<String, TaskNode>, resolver: &dyn JobResolver, context: &mut BTreeSet<String>) -> DagobahResult<bool> {
    if context.contains(job_name) {
        return Ok(false);
    }
    context.insert(job_name.to_string());

    let order = match dagobah_core::dag::topological_sort(graph) {
        Ok(order) => order,
        Err(DagError::Cyclic) => return Ok(false),
        Err(other) => return Err(DagobahError::Dag(other)),
    };

    for node_name in order {
        let Some(node) = tasks.get(&node_name) else { continue };
        let Some(jobtask) = node.as_jobtask() else { continue };

        let target_name = jobtask.target_job_name();
        let target_body = resolver.resolve(target_name).ok_or_else(|| DagobahError::UnknownJob(target_name.to_string()))?;
        if context.contains(target_name) {
            return Ok(false);
        }
        if !verify_acyclic(target_name, &target_body.graph, &target_body.tasks, resolver, context)? {
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
#[path = "jobtask_tests.rs"]
mod tests;
