// crates/core/src/jobs/log_buffer.rs
//! Append-only output log for a single job.

use std::sync::RwLock;

/// An append-only, growable record of output lines for one job.
///
/// Exactly one writer (the process output reader) appends; any number of
/// readers take tail snapshots concurrently. A line is visible to readers
/// only once fully appended, and no line is ever mutated or removed.
pub struct LogBuffer {
    lines: RwLock<Vec<String>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            lines: RwLock::new(Vec::new()),
        }
    }

    /// Append one line, making it visible to subsequent reads.
    pub fn append(&self, line: impl Into<String>) {
        match self.lines.write() {
            Ok(mut guard) => guard.push(line.into()),
            Err(e) => tracing::error!("RwLock poisoned appending log line: {e}"),
        }
    }

    /// The last `n` lines in append order, or the full log when `n == 0`.
    /// Returns fewer than `n` lines only when fewer exist.
    pub fn tail(&self, n: usize) -> Vec<String> {
        match self.lines.read() {
            Ok(guard) => {
                let start = if n == 0 { 0 } else { guard.len().saturating_sub(n) };
                guard[start..].to_vec()
            }
            Err(e) => {
                tracing::error!("RwLock poisoned reading log: {e}");
                Vec::new()
            }
        }
    }

    /// Total lines appended so far.
    pub fn len(&self) -> usize {
        match self.lines.read() {
            Ok(guard) => guard.len(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading log length: {e}");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}
