//! Error types for scanning and session operations.

use std::time::Duration;

use super::output::StreamKind;

/// Terminal condition of a [`LineScanner`](super::LineScanner).
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The stream reached end of file.
    #[error("Stream closed")]
    Eof,
    /// Reading from the stream failed.
    #[error("Read failed: {0}")]
    Io(#[source] std::io::Error),
}

impl ScanError {
    /// Classify a read error, folding unexpected EOF into [`ScanError::Eof`].
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::Eof,
            _ => Self::Io(err),
        }
    }
}

/// Errors returned by [`Session`](super::Session) operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The session has already exited.
    #[error("cannot execute on closed shells: {command}")]
    Closed {
        /// Command that was rejected.
        command: String,
    },
    /// The command could not be written to the interpreter.
    #[error("Could not send PowerShell command: {command}\nError: {source}")]
    Write {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// A stream ended before its boundary was seen.
    #[error("{stream} closed before the command finished")]
    Truncated {
        /// Stream that ended early.
        stream: StreamKind,
    },
    /// The command did not finish within the configured deadline.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),
    /// The command was aborted through the session's cancellation token.
    #[error("Command cancelled")]
    Cancelled,
    /// Waiting for the interpreter to exit failed.
    #[error("Failed to wait for interpreter exit: {0}")]
    Wait(#[source] std::io::Error),
    /// A drain task panicked or was aborted.
    #[error("Drain task failed: {0}")]
    Drain(#[from] tokio::task::JoinError),
}

impl SessionError {
    /// Whether the error left the session permanently closed.
    #[must_use]
    pub fn closes_session(&self) -> bool {
        matches!(
            self,
            Self::Closed { .. }
                | Self::Truncated { .. }
                | Self::Timeout(_)
                | Self::Cancelled
                | Self::Wait(_)
                | Self::Drain(_)
        )
    }
}
