//! Captured program output.
//!
//! Every `print` call appends one line. Tests compare the captured lines
//! against golden traces; [`OutputTrace::digest`] gives a fixed-size
//! fingerprint for determinism checks.

use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputTrace {
    lines: Vec<String>,
}

impl OutputTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::trace!(%line, "print");
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Drain the captured lines, leaving the trace empty.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// The lines joined with `\n`, as a script's stdout would read.
    pub fn to_golden(&self) -> String {
        self.lines.join("\n")
    }

    /// Lowercase hex SHA-256 of [`to_golden`](Self::to_golden).
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.to_golden().as_bytes());
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}
