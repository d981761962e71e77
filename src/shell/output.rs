//! Conduits and collected results delivered to callers.

use std::fmt;

use tokio::sync::mpsc;

/// One of the interpreter's two output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// An item on the error conduit.
///
/// The error conduit carries the interpreter's own diagnostics and, when a
/// command could not be run at all, a session-level failure. Both render as
/// plain text through [`Display`](fmt::Display).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLine {
    /// A line the interpreter wrote to stderr.
    Diagnostic(String),
    /// The session could not run the command.
    SessionFailure(String),
}

impl ErrorLine {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Diagnostic(text) | Self::SessionFailure(text) => text,
        }
    }

    #[must_use]
    pub fn is_session_failure(&self) -> bool {
        matches!(self, Self::SessionFailure(_))
    }
}

impl fmt::Display for ErrorLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Sending halves handed to [`Session::execute_into`](super::Session::execute_into).
///
/// Each conduit is closed (its sender dropped) exactly once per command.
#[derive(Debug)]
pub struct Conduits {
    pub stdout: mpsc::Sender<String>,
    pub stderr: mpsc::Sender<ErrorLine>,
}

/// Receiving halves matching a [`Conduits`] pair.
#[derive(Debug)]
pub struct ConduitReceivers {
    pub stdout: mpsc::Receiver<String>,
    pub stderr: mpsc::Receiver<ErrorLine>,
}

impl Conduits {
    /// Report a session failure on the error conduit, then close both.
    pub(crate) async fn fail(self, reason: String) {
        let _ = self.stderr.send(ErrorLine::SessionFailure(reason)).await;
    }
}

/// Create a conduit pair with the given per-stream capacity.
///
/// # Panics
///
/// Panics if `buffer` is zero, like [`mpsc::channel`].
#[must_use]
pub fn conduits(buffer: usize) -> (Conduits, ConduitReceivers) {
    let (stdout_tx, stdout_rx) = mpsc::channel(buffer);
    let (stderr_tx, stderr_rx) = mpsc::channel(buffer);
    (
        Conduits {
            stdout: stdout_tx,
            stderr: stderr_tx,
        },
        ConduitReceivers {
            stdout: stdout_rx,
            stderr: stderr_rx,
        },
    )
}

/// Everything one command produced, collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<ErrorLine>,
}

impl CommandOutput {
    /// Stdout lines joined with `\n`.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }

    /// Stderr lines joined with `\n`.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        self.stderr
            .iter()
            .map(ErrorLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.stderr.is_empty()
    }

    /// Drain both receivers to completion, concurrently.
    pub async fn collect(receivers: ConduitReceivers) -> Self {
        let ConduitReceivers {
            stdout: mut stdout_rx,
            stderr: mut stderr_rx,
        } = receivers;

        let stdout = async {
            let mut lines = Vec::new();
            while let Some(line) = stdout_rx.recv().await {
                lines.push(line);
            }
            lines
        };
        let stderr = async {
            let mut lines = Vec::new();
            while let Some(line) = stderr_rx.recv().await {
                lines.push(line);
            }
            lines
        };

        let (stdout, stderr) = tokio::join!(stdout, stderr);
        Self { stdout, stderr }
    }
}
