// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error types for the engine, used by `dagobah-core`,
//! `dagobah-backend`, `dagobah-shell`, and `dagobah-engine` alike so that
//! callers see one coherent error surface regardless of which layer raised.

use thiserror::Error;

/// Errors raised by [`crate::dag::Dag`] graph operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DagError {
    #[error("node {0} already exists")]
    DuplicateNode(String),
    #[error("node {0} does not exist in graph")]
    MissingNode(String),
    #[error("edge from {from} to {to} does not exist in graph")]
    MissingEdge { from: String, to: String },
    #[error("adding this edge would introduce a cycle")]
    CycleDetected,
    #[error("graph is not acyclic")]
    Cyclic,
}

/// Top-level error type for the scheduling engine (§7 of the design).
#[derive(Debug, Error)]
pub enum DagobahError {
    #[error("graph error: {0}")]
    Dag(#[from] DagError),
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },
    #[error("{kind} name already taken: {name}")]
    NameTaken { kind: &'static str, name: String },
    #[error("{action} is not allowed while job is {state}")]
    ImmutableInState { state: &'static str, action: &'static str },
    #[error("invalid DAG: {0}")]
    InvalidDag(String),
    #[error("job has a cycle, possibly through another job reference")]
    Cyclic,
    #[error("jobtask references unknown job: {0}")]
    UnknownJob(String),
    #[error("naming conflict during job expansion: {0}")]
    NamingConflict(String),
    #[error("no failed tasks to retry")]
    NothingToRetry,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl DagobahError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    pub fn name_taken(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NameTaken { kind, name: name.into() }
    }

    pub fn immutable(state: &'static str, action: &'static str) -> Self {
        Self::ImmutableInState { state, action }
    }
}

pub type DagobahResult<T> = Result<T, DagobahError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
