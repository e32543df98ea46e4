// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event handler (`EventHandler` in the original `components.py`): a
//! registry of named hooks invoked on `job_complete`, `job_failed`, and
//! `task_failed`.
//!
//! The original kept `(method, args, kwargs)` tuples and used Python
//! introspection to decide whether a registered callback wanted the
//! `event_params` keyword. Rust callbacks are plain closures, so bound
//! arguments are simply whatever the closure captured; there is no
//! introspection step. `deregister` needed a way to find "the same
//! callback" again without relying on closure identity, so `register`
//! returns a [`HandlerId`] instead of taking the callback as its own key.

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A callback registered against a named event. Invoked with the event's
/// strict-JSON payload.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Opaque handle returned by [`EventHandler::register`], used to
/// [`EventHandler::deregister`] that specific registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    callback: EventCallback,
}

/// Registry of named hooks. Cheaply cloneable; every clone shares the
/// same underlying registrations, so a `Dagobah` and every `Job` it owns
/// can each hold a copy without wrapping it in an `Arc` themselves.
#[derive(Clone, Default)]
pub struct EventHandler {
    handlers: Arc<Mutex<HashMap<String, Vec<Registration>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` against `event`, returning a handle that can
    /// later be passed to [`deregister`](Self::deregister).
    pub fn register(&self, event: impl Into<String>, callback: EventCallback) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.entry(event.into()).or_default().push(Registration { id, callback });
        id
    }

    /// Removes a specific registration. No-op if `id` is unknown or was
    /// already deregistered.
    pub fn deregister(&self, id: HandlerId) {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        for registrations in handlers.values_mut() {
            registrations.retain(|r| r.id != id);
        }
    }

    /// Invokes every callback registered against `event` with `params`.
    /// `params` is shared across callbacks, never mutated. A callback
    /// that panics is caught and logged; it never prevents the remaining
    /// callbacks from running, matching the original's blanket
    /// `except Exception: logging.exception(...)`.
    pub fn emit(&self, event: &str, params: &Value) {
        let callbacks: Vec<EventCallback> = {
            let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
            handlers.get(event).map(|regs| regs.iter().map(|r| r.callback.clone()).collect()).unwrap_or_default()
        };

        for callback in callbacks {
            let result = catch_unwind(AssertUnwindSafe(|| callback(params)));
            if result.is_err() {
                tracing::error!(event, "exception emitting event");
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
