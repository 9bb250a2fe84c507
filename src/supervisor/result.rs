//! Run results.

use serde::{Deserialize, Serialize};

/// Outcome of one run: exit code and the child's stderr, line by line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub exit_code: i32,
    /// Stderr lines in output order, each trimmed.
    pub stderr_lines: Vec<String>,
}

impl RunResult {
    /// Exit code zero and nothing on stderr.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.stderr_lines.is_empty()
    }
}
