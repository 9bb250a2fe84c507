//! Run state machine.

use serde::{Deserialize, Serialize};

/// Phase of a single run. Phases only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    NotStarted,
    /// The child is running and stdout is being drained.
    Running,
    /// Stdout is closed; waiting on stderr and the exit status.
    Draining,
    Terminated,
}

/// Tracks the phase and line counters of the current run.
#[derive(Debug, Clone, Default)]
pub struct RunStateMachine {
    state: RunState,
    lines_logged: usize,
    lines_failed: usize,
    lines_undecodable: usize,
}

impl RunStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Move to `new_state`. Returns false, leaving the state unchanged, if
    /// that would move backwards or stay put.
    pub fn transition(&mut self, new_state: RunState) -> bool {
        if new_state <= self.state {
            tracing::warn!(from = ?self.state, to = ?new_state, "Rejected run state transition");
            return false;
        }
        tracing::debug!(from = ?self.state, to = ?new_state, "Run state transition");
        self.state = new_state;
        true
    }

    pub fn record_logged(&mut self) {
        self.lines_logged = self.lines_logged.saturating_add(1);
    }

    pub fn record_failed(&mut self) {
        self.lines_failed = self.lines_failed.saturating_add(1);
    }

    pub fn record_undecodable(&mut self) {
        self.record_undecodable_lines(1);
    }

    pub fn record_undecodable_lines(&mut self, count: usize) {
        self.lines_undecodable = self.lines_undecodable.saturating_add(count);
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        RunStats {
            lines_logged: self.lines_logged,
            lines_failed: self.lines_failed,
            lines_undecodable: self.lines_undecodable,
        }
    }
}

/// Line counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Stdout lines written to the child logger.
    pub lines_logged: usize,
    /// Stdout lines that could not be classified or logged.
    pub lines_failed: usize,
    /// Stdout or stderr lines that contained bytes invalid in the configured
    /// charset.
    pub lines_undecodable: usize,
}
