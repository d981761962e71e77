//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interpreter started when no program is configured.
pub const DEFAULT_PROGRAM: &str = "powershell.exe";

/// Line terminator used for everything written to the interpreter.
pub const NEWLINE: &str = "\r\n";

/// Default grace period before a forced close kills the interpreter.
pub const DEFAULT_EXIT_TIMEOUT_MS: u64 = 5_000;

/// Default capacity of each output channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 1;

/// Configuration for a [`Session`](crate::shell::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interpreter binary.
    pub program: String,
    /// Interpreter arguments. The defaults disable the prompt and read
    /// commands from standard input.
    pub args: Vec<String>,
    /// Per-command deadline in milliseconds. Unset means wait forever.
    pub command_timeout_ms: Option<u64>,
    /// Grace period before a forced close kills the interpreter.
    pub exit_timeout_ms: u64,
    /// Capacity of each output channel.
    pub channel_buffer: usize,
}

fn default_args() -> Vec<String> {
    ["-NoExit", "-Command", "-"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: default_args(),
            command_timeout_ms: None,
            exit_timeout_ms: DEFAULT_EXIT_TIMEOUT_MS,
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }

    /// Channel capacity, never zero.
    #[must_use]
    pub fn channel_buffer(&self) -> usize {
        self.channel_buffer.max(1)
    }

    /// Set the interpreter binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the per-command deadline.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }
}
