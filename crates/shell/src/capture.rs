// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live, growable capture of a running task's stdout/stderr.
//!
//! The original spooled local output into an OS temp file written to by
//! the child process directly, and tailed it with a seek-back-then-scan
//! algorithm (seek `seek_offset` bytes from the end, then scan lines
//! forward, keeping only the last `num_lines`). A background reader task
//! fills the same role here without a temp file: chunks arrive as they're
//! read from the child's pipe (or the SSH channel) and are appended to a
//! shared buffer that `head`/`tail` can inspect at any time, including
//! mid-run.
//!
//! `tail` deliberately mirrors the original's documented limitation: it
//! may return fewer than `num_lines` even if the buffer holds more, since
//! it only scans the last `seek_offset` bytes rather than the whole
//! buffer.

use parking_lot::Mutex;
use std::sync::Arc;

const DEFAULT_SEEK_OFFSET: usize = 10_000;

#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, chunk: &[u8]) {
        self.0.lock().extend_from_slice(chunk);
    }

    pub fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn head(&self, num_lines: usize) -> Vec<String> {
        head_lines(&self.snapshot(), num_lines)
    }

    pub fn tail(&self, num_lines: usize) -> Vec<String> {
        tail_lines(&self.snapshot(), num_lines, DEFAULT_SEEK_OFFSET)
    }
}

const SPLIT_MARKER: &str = "\nDAGOBAH STREAM SPLIT\n";

/// Truncates a captured stream to `limit` bytes by cutting out its
/// middle and splicing the head and tail halves back together around
/// [`SPLIT_MARKER`], the way the original truncates a stream on
/// persistence rather than refusing to store it. A no-op if `text` is
/// already within budget.
pub fn truncate_stream(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }

    let half = limit / 2;
    let mut head_end = half.min(text.len());
    while head_end > 0 && !text.is_char_boundary(head_end) {
        head_end -= 1;
    }
    let mut tail_start = text.len().saturating_sub(half);
    while tail_start < text.len() && !text.is_char_boundary(tail_start) {
        tail_start += 1;
    }

    format!("{}{}{}", &text[..head_end], SPLIT_MARKER, &text[tail_start..])
}

pub fn head_lines(text: &str, num_lines: usize) -> Vec<String> {
    text.split('\n').take(num_lines).map(|l| l.trim_end_matches('\r').to_string()).collect()
}

/// Seeks back `seek_offset` bytes from the end before scanning, so a
/// huge buffer is never fully materialized into lines just to keep the
/// last handful.
pub fn tail_lines(text: &str, num_lines: usize, seek_offset: usize) -> Vec<String> {
    let bytes = text.as_bytes();
    let start = bytes.len().saturating_sub(seek_offset);
    // Avoid splitting a multi-byte UTF-8 sequence: walk forward to the
    // next char boundary.
    let mut start = start;
    while start < bytes.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    let window = &text[start..];

    let mut result: Vec<String> = Vec::new();
    for line in window.split('\n') {
        result.push(line.trim_end_matches('\r').to_string());
        if result.len() > num_lines {
            result.remove(0);
        }
    }
    result
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
