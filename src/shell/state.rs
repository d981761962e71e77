//! Session lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`Session`](super::Session).
///
/// `Open` loops on every successful command. `Closed` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Open,
    Closed,
}

/// Tracks the session state and per-session counters.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    commands: usize,
    completed: usize,
    failed: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Open,
            commands: 0,
            completed: 0,
            failed: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `new_state`. Leaving `Closed` is ignored.
    pub fn transition(&mut self, new_state: SessionState) {
        if self.state == SessionState::Closed && new_state != SessionState::Closed {
            tracing::warn!(to = ?new_state, "Ignoring transition out of closed state");
            return;
        }
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    pub fn record_command(&mut self) {
        self.commands = self.commands.saturating_add(1);
    }

    pub fn record_completed(&mut self) {
        self.completed = self.completed.saturating_add(1);
    }

    pub fn record_failed(&mut self) {
        self.failed = self.failed.saturating_add(1);
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            commands: self.commands,
            completed: self.completed,
            failed: self.failed,
        }
    }
}

/// Session statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Commands written to the interpreter.
    pub commands: usize,
    /// Commands whose both boundaries arrived.
    pub completed: usize,
    /// Commands that failed after being written.
    pub failed: usize,
}
