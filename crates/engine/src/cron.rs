// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron iterator (`croniter` in the original): successive UTC wall-clock
//! fire times for a standard 5-field cron expression (minute, hour,
//! day-of-month, month, day-of-week).
//!
//! The `cron` crate this wraps speaks the 6-field Quartz dialect (with a
//! leading seconds field), so a 5-field expression is parsed by pinning
//! seconds to `0` before handing it to [`cron::Schedule`]. Arbitrary
//! precision cron (seconds-level scheduling) is explicitly out of scope
//! (spec.md §1 Non-goals); this adapter exists purely to reuse a
//! well-tested parser for the subset this engine actually supports.

use chrono::{DateTime, Utc};
use cron::Schedule;
use dagobah_core::{DagobahError, DagobahResult};
use std::str::FromStr;

/// A parsed 5-field cron expression that can compute successive UTC fire
/// times.
#[derive(Clone)]
pub struct CronIter {
    expression: String,
    schedule: Schedule,
}

impl std::fmt::Debug for CronIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronIter").field("expression", &self.expression).finish()
    }
}

impl CronIter {
    /// Parses a standard 5-field cron expression. Rejects anything with
    /// a different field count rather than silently accepting a 6- or
    /// 7-field Quartz expression, since seconds/year precision is out of
    /// scope here.
    pub fn parse(expression: &str) -> DagobahResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(DagobahError::InvalidArgument(format!(
                "cron expression must have 5 fields (minute hour day-of-month month day-of-week), got {}: {expression:?}",
                fields.len()
            )));
        }

        let with_seconds = format!("0 {expression}");
        let schedule = Schedule::from_str(&with_seconds)
            .map_err(|e| DagobahError::InvalidArgument(format!("invalid cron expression {expression:?}: {e}")))?;

        Ok(Self { expression: expression.to_string(), schedule })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The first fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
