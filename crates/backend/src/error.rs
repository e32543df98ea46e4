// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("dagobah {0} not found")]
    UnknownDagobah(String),
    #[error("job {0} not found")]
    UnknownJob(String),
    #[error("run log {0} not found")]
    UnknownLog(String),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("backend I/O error: {0}")]
    Io(String),
}

pub type BackendResult<T> = Result<T, BackendError>;
