//! Transcript of commands run in an interactive session, shown by `:history`.

use std::collections::VecDeque;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Oldest entries are dropped beyond this.
pub const DEFAULT_CAPACITY: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub at: DateTime<Utc>,
    pub command: String,
    pub cwd: Option<String>,
    pub exit_code: i64,
    pub stdout_bytes: usize,
    pub stderr_bytes: usize,
}

#[derive(Debug)]
pub struct Transcript {
    capacity: usize,
    entries: VecDeque<TranscriptEntry>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Transcript {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn record(
        &mut self,
        command: &str,
        cwd: Option<&str>,
        exit_code: i64,
        stdout: &str,
        stderr: &str,
    ) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(TranscriptEntry {
            at: Utc::now(),
            command: command.to_string(),
            cwd: cwd.map(str::to_string),
            exit_code,
            stdout_bytes: stdout.len(),
            stderr_bytes: stderr.len(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    /// One line per entry: `  3  [exit 1]  /remote_root$ make test`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, e) in self.entries.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>3}  [exit {}]  {}$ {}",
                i + 1,
                e.exit_code,
                e.cwd.as_deref().unwrap_or(""),
                e.command
            );
        }
        out
    }
}
