// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH host configuration (`Dagobah.get_hosts`/`get_host` in the
//! original, which parsed `~/.ssh/config` with `paramiko.SSHConfig`).
//!
//! Only the handful of keys the engine actually consumes are recognized:
//! `Host`, `HostName`, `User`, `IdentityFile`. A `Host` stanza may list
//! several whitespace-separated patterns; each becomes a lookup key.
//! Patterns containing `*` are excluded from the enumerable host list
//! (`get_hosts`) but are not specially handled by `get_host` — Dagobah
//! doesn't support wildcard matching for a task's target host, so an
//! exact name match against a wildcard pattern would never succeed
//! anyway.

use dagobah_shell::HostSpec;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
struct HostEntry {
    hostname: Option<String>,
    user: Option<String>,
    identity_file: Option<PathBuf>,
}

/// Parsed view of an OpenSSH client config file, re-read fresh on every
/// query (mirrors the original's `load_ssh_conf` being called anew by
/// both `get_hosts` and `get_host`, so on-disk edits take effect without
/// restarting the engine).
#[derive(Debug, Clone)]
pub struct SshConfig {
    entries: HashMap<String, HostEntry>,
}

impl SshConfig {
    /// Parses the file at `path`. A missing file yields an empty config
    /// rather than an error, matching the original's `IOError` ->
    /// `return None` fallback.
    pub fn load(path: impl AsRef<Path>) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::parse(&contents),
            Err(_) => Self { entries: HashMap::new() },
        }
    }

    pub fn parse(contents: &str) -> Self {
        let mut entries: HashMap<String, HostEntry> = HashMap::new();
        let mut current_patterns: Vec<String> = Vec::new();

        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let Some(keyword) = parts.next() else { continue };
            let rest = parts.next().unwrap_or("").trim();

            match keyword.to_ascii_lowercase().as_str() {
                "host" => {
                    current_patterns = rest.split_whitespace().map(|s| s.to_string()).collect();
                    for pattern in &current_patterns {
                        entries.entry(pattern.clone()).or_default();
                    }
                }
                "hostname" => {
                    for pattern in &current_patterns {
                        entries.entry(pattern.clone()).or_default().hostname = Some(rest.to_string());
                    }
                }
                "user" => {
                    for pattern in &current_patterns {
                        entries.entry(pattern.clone()).or_default().user = Some(rest.to_string());
                    }
                }
                "identityfile" => {
                    for pattern in &current_patterns {
                        entries.entry(pattern.clone()).or_default().identity_file = Some(expand_home(rest));
                    }
                }
                _ => {}
            }
        }

        Self { entries }
    }

    /// Host patterns with no `*` wildcard, in source order isn't
    /// preserved (the original built this from a dict too); callers
    /// that need a stable order should sort the result themselves.
    pub fn get_hosts(&self) -> Vec<String> {
        self.entries.keys().filter(|name| !name.contains('*')).cloned().collect()
    }

    /// Resolves `hostname` to connection details, or `None` if it is not
    /// among [`get_hosts`](Self::get_hosts) (exact match only; wildcard
    /// patterns are never matched here).
    pub fn get_host(&self, hostname: &str) -> Option<HostSpec> {
        if hostname.contains('*') {
            return None;
        }
        let entry = self.entries.get(hostname)?;
        Some(HostSpec {
            hostname: entry.hostname.clone().unwrap_or_else(|| hostname.to_string()),
            user: entry.user.clone().unwrap_or_default(),
            identity_file: entry.identity_file.clone().unwrap_or_default(),
        })
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
