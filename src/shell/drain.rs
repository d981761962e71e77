//! Draining one output stream up to its boundary.

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::boundary::Boundary;
use super::error::ScanError;
use super::output::StreamKind;
use super::scanner::LineScanner;

/// Why a drain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The boundary line was read; the command is done on this stream.
    BoundaryReached,
    /// The stream ended or failed before the boundary arrived.
    StreamClosed,
    /// The cancellation token fired first.
    Cancelled,
}

impl DrainOutcome {
    #[must_use]
    pub fn is_complete(self) -> bool {
        self == Self::BoundaryReached
    }
}

/// Read lines from `scanner` and forward them to `sink` until `boundary`.
///
/// The boundary itself is never forwarded. Lines are sent as soon as they
/// are read. If the receiving side of `sink` goes away the drain keeps
/// reading, so the stream is still consumed up to the boundary.
pub async fn drain<R>(
    scanner: &mut LineScanner<R>,
    boundary: &Boundary,
    kind: StreamKind,
    sink: &mpsc::Sender<String>,
    cancel: &CancellationToken,
) -> DrainOutcome
where
    R: AsyncRead + Unpin,
{
    let mut forwarding = true;
    let mut forwarded = 0usize;

    loop {
        let line = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::debug!(stream = %kind, forwarded, "Drain cancelled");
                return DrainOutcome::Cancelled;
            }
            line = scanner.next_line() => line,
        };

        let line = match line {
            Ok(line) => line,
            Err(ScanError::Eof) => {
                tracing::debug!(stream = %kind, forwarded, "Stream closed before boundary");
                return DrainOutcome::StreamClosed;
            }
            Err(ScanError::Io(e)) => {
                tracing::debug!(stream = %kind, forwarded, error = %e, "Stream read failed");
                return DrainOutcome::StreamClosed;
            }
        };

        if boundary.matches(&line) {
            tracing::trace!(stream = %kind, forwarded, "Boundary reached");
            return DrainOutcome::BoundaryReached;
        }

        if forwarding {
            tracing::trace!(stream = %kind, line = %line, "Forwarding line");
            if sink.send(line).await.is_err() {
                tracing::debug!(stream = %kind, "Receiver dropped, discarding remaining lines");
                forwarding = false;
            } else {
                forwarded += 1;
            }
        }
    }
}

/// Owned form of [`drain`] for running on its own task.
///
/// Hands the scanner back so the next command can keep reading the same
/// pipe. Dropping `sink` on return closes the channel.
pub async fn drain_owned<R>(
    mut scanner: LineScanner<R>,
    boundary: Boundary,
    kind: StreamKind,
    sink: mpsc::Sender<String>,
    cancel: CancellationToken,
) -> (LineScanner<R>, DrainOutcome)
where
    R: AsyncRead + Unpin,
{
    let outcome = drain(&mut scanner, &boundary, kind, &sink, &cancel).await;
    (scanner, outcome)
}
