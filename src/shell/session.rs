//! A long-lived interpreter session.
//!
//! Every command is followed by two sentinel writes, one per output stream:
//!
//! ```text
//! <cmd>; echo '<out-boundary>'; [Console]::Error.WriteLine('<err-boundary>')\r\n
//! ```
//!
//! Two drain tasks then read stdout and stderr until they see their own
//! boundary. The interpreter runs input lines one at a time, so a boundary
//! only appears after everything the command printed on that stream.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::{BoxedReader, BoxedWriter, ProcessBackend, ProcessWaiter};
use crate::config::{SessionConfig, NEWLINE};

use super::boundary::{Boundary, BoundaryGenerator};
use super::drain::{drain_owned, DrainOutcome};
use super::error::SessionError;
use super::output::{conduits, CommandOutput, Conduits, ErrorLine, StreamKind};
use super::scanner::LineScanner;
use super::state::{SessionState, SessionStateMachine, SessionStats};
use super::token::TokenSource;

/// Everything the session owns while the interpreter is alive.
struct Pipes {
    waiter: Box<dyn ProcessWaiter>,
    stdin: BoxedWriter,
    stdout: LineScanner<BoxedReader>,
    stderr: LineScanner<BoxedReader>,
}

impl Pipes {
    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await
    }
}

/// Build the line written to the interpreter for `cmd`.
#[must_use]
pub fn wrap_command(cmd: &str, out_boundary: &Boundary, err_boundary: &Boundary) -> String {
    format!(
        "{cmd}; echo '{out_boundary}'; [Console]::Error.WriteLine('{err_boundary}'){NEWLINE}"
    )
}

/// An interactive interpreter driven over its standard pipes.
///
/// Commands run one at a time: every operation takes `&mut self`. Once
/// [`exit`](Self::exit) has run, or a command left the output streams in an
/// unknown position, the session is closed for good and every further
/// command is rejected without touching the process.
pub struct Session {
    pipes: Option<Pipes>,
    boundaries: BoundaryGenerator,
    config: SessionConfig,
    state: SessionStateMachine,
    cancel: CancellationToken,
}

impl Session {
    /// Start the default interpreter through `backend`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the process cannot be started.
    pub async fn new<B>(backend: &B) -> Result<Self, crate::backend::BackendError>
    where
        B: ProcessBackend + ?Sized,
    {
        Self::with_config(backend, SessionConfig::default()).await
    }

    /// Start the interpreter described by `config` through `backend`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the process cannot be started.
    pub async fn with_config<B>(
        backend: &B,
        config: SessionConfig,
    ) -> Result<Self, crate::backend::BackendError>
    where
        B: ProcessBackend + ?Sized,
    {
        let started = backend
            .start_process(&config.program, &config.args)
            .await?;

        tracing::info!(
            program = %config.program,
            pid = ?started.waiter.id(),
            "Interpreter session started"
        );

        Ok(Self {
            pipes: Some(Pipes {
                waiter: started.waiter,
                stdin: started.stdin,
                stdout: LineScanner::new(started.stdout),
                stderr: LineScanner::new(started.stderr),
            }),
            boundaries: BoundaryGenerator::default(),
            config,
            state: SessionStateMachine::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Use `source` for boundary tokens instead of the thread RNG.
    #[must_use]
    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.boundaries = BoundaryGenerator::new(source);
        self
    }

    /// Abort in-flight commands when `cancel` fires.
    ///
    /// A cancelled command closes the session.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Closed once the session no longer holds the interpreter's pipes.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.pipes.is_none() {
            SessionState::Closed
        } else {
            self.state.state()
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pipes.is_none()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.state.stats()
    }

    /// Process id of the interpreter, while the session is open.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pipes.as_ref().and_then(|p| p.waiter.id())
    }

    /// Run `cmd` and collect everything it printed.
    ///
    /// # Errors
    ///
    /// See [`execute_into`](Self::execute_into). Lines delivered before a
    /// failure are discarded.
    pub async fn execute(&mut self, cmd: &str) -> Result<CommandOutput, SessionError> {
        let (tx, rx) = conduits(self.config.channel_buffer());
        let (result, output) = tokio::join!(self.execute_into(cmd, tx), CommandOutput::collect(rx));
        result.map(|()| output)
    }

    /// Run `cmd`, streaming its output into caller-supplied conduits.
    ///
    /// Stdout lines go to `conduits.stdout`. Stderr lines go to
    /// `conduits.stderr` as [`ErrorLine::Diagnostic`]. Each conduit is closed
    /// when its stream's boundary arrives, and this call returns only once
    /// both are closed. The receivers must be consumed concurrently with
    /// this call; a dropped receiver only discards its lines.
    ///
    /// If the session is closed, or the command cannot be written, a single
    /// [`ErrorLine::SessionFailure`] is sent on the error conduit and both
    /// conduits close without output.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Closed`] if the session already exited.
    /// - [`SessionError::Write`] if the interpreter's input rejected the command.
    /// - [`SessionError::Truncated`] if a stream ended before its boundary.
    /// - [`SessionError::Timeout`] if the configured deadline passed.
    /// - [`SessionError::Cancelled`] if the session's token fired.
    ///
    /// The last three close the session.
    pub async fn execute_into(&mut self, cmd: &str, conduits: Conduits) -> Result<(), SessionError> {
        let Some(mut pipes) = self.pipes.take() else {
            let err = SessionError::Closed {
                command: cmd.to_string(),
            };
            tracing::warn!(command = %cmd, "Execute on closed session");
            conduits.fail(err.to_string()).await;
            return Err(err);
        };

        let out_boundary = self.boundaries.create_boundary();
        let err_boundary = self.boundaries.create_boundary();
        let wire = wrap_command(cmd, &out_boundary, &err_boundary);

        // Dropping this future mid-command cancels the drains; the waiter
        // and stdin are dropped with it.
        let cancel = self.cancel.child_token();
        let _abort_on_drop = cancel.clone().drop_guard();
        let deadline = self.config.command_timeout();
        let expires = deadline.map(|limit| Instant::now() + limit);

        match bounded(pipes.write_line(&wire), expires, &cancel).await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                self.pipes = Some(pipes);
                let err = SessionError::Write {
                    command: cmd.to_string(),
                    source,
                };
                tracing::warn!(command = %cmd, error = %err, "Failed to write command");
                conduits.fail(err.to_string()).await;
                return Err(err);
            }
            Err(interrupt) => {
                let err = interrupt.into_error(deadline);
                tracing::warn!(command = %cmd, error = %err, "Command write interrupted, closing session");
                self.state.record_command();
                self.state.record_failed();
                self.force_close(pipes.waiter, pipes.stdin).await;
                return Err(err);
            }
        }

        self.state.record_command();
        tracing::debug!(command = %cmd, "Command written");

        let Pipes {
            waiter,
            stdin,
            stdout,
            stderr,
        } = pipes;

        let buffer = self.config.channel_buffer();
        let (out_tx, out_rx) = mpsc::channel(buffer);
        let (err_tx, err_rx) = mpsc::channel(buffer);

        let out_task = tokio::spawn(drain_owned(
            stdout,
            out_boundary,
            StreamKind::Stdout,
            out_tx,
            cancel.clone(),
        ));
        let err_task = tokio::spawn(drain_owned(
            stderr,
            err_boundary,
            StreamKind::Stderr,
            err_tx,
            cancel.clone(),
        ));

        let Conduits {
            stdout: out_conduit,
            stderr: err_conduit,
        } = conduits;
        let forwarders = async {
            tokio::join!(
                forward(out_rx, out_conduit, std::convert::identity),
                forward(err_rx, err_conduit, ErrorLine::Diagnostic),
            );
        };

        let timed_out = match expires {
            Some(at) => tokio::time::timeout_at(at, forwarders).await.is_err(),
            None => {
                forwarders.await;
                false
            }
        };
        if timed_out {
            cancel.cancel();
        }

        let (out_joined, err_joined) = tokio::join!(out_task, err_task);

        let failure = match (out_joined, err_joined) {
            (Ok((stdout, out_outcome)), Ok((stderr, err_outcome))) => {
                match resolve(timed_out, deadline, out_outcome, err_outcome) {
                    None => {
                        self.pipes = Some(Pipes {
                            waiter,
                            stdin,
                            stdout,
                            stderr,
                        });
                        self.state.record_completed();
                        return Ok(());
                    }
                    Some(err) => err,
                }
            }
            (Err(e), _) | (_, Err(e)) => SessionError::Drain(e),
        };

        tracing::warn!(command = %cmd, error = %failure, "Command did not complete, closing session");
        self.state.record_failed();
        self.force_close(waiter, stdin).await;
        Err(failure)
    }

    /// Ask the interpreter to exit and wait for it.
    ///
    /// Returns the interpreter's exit code when one is reported.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session was already closed and
    /// [`SessionError::Wait`] if waiting for the process failed. The session
    /// is closed afterwards either way.
    pub async fn exit(&mut self) -> Result<Option<i32>, SessionError> {
        let Some(mut pipes) = self.pipes.take() else {
            return Err(SessionError::Closed {
                command: "exit".to_string(),
            });
        };
        self.state.transition(SessionState::Closed);

        if let Err(e) = pipes.write_line(&format!("exit{NEWLINE}")).await {
            tracing::debug!(error = %e, "Failed to write exit command");
        }

        let Pipes {
            mut waiter,
            mut stdin,
            stdout,
            stderr,
        } = pipes;

        if let Err(e) = stdin.shutdown().await {
            tracing::debug!(error = %e, "Failed to close interpreter input");
        }
        drop(stdin);

        let code = waiter.wait().await.map_err(SessionError::Wait)?;
        drop((stdout, stderr));

        tracing::info!(exit_code = ?code, stats = ?self.state.stats(), "Interpreter session exited");
        Ok(code)
    }

    /// Close the session after its streams lost sync.
    async fn force_close(&mut self, mut waiter: Box<dyn ProcessWaiter>, stdin: BoxedWriter) {
        self.state.transition(SessionState::Closed);
        drop(stdin);

        if let Err(e) = waiter.terminate(self.config.exit_timeout()).await {
            tracing::warn!(error = %e, "Failed to terminate interpreter");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("pid", &self.pid())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Relay one internal channel to a public conduit, then close it.
///
/// Keeps receiving after the public side is dropped so the drain never
/// blocks on a full channel.
async fn forward<T>(mut rx: mpsc::Receiver<String>, conduit: mpsc::Sender<T>, wrap: fn(String) -> T) {
    let mut open = true;
    while let Some(line) = rx.recv().await {
        if open && conduit.send(wrap(line)).await.is_err() {
            tracing::debug!("Conduit receiver dropped");
            open = false;
        }
    }
}

/// Why a bounded step stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Deadline,
    Cancelled,
}

impl Interrupt {
    fn into_error(self, deadline: Option<Duration>) -> SessionError {
        match self {
            Self::Deadline => SessionError::Timeout(deadline.unwrap_or_default()),
            Self::Cancelled => SessionError::Cancelled,
        }
    }
}

/// Run `step` until it finishes, `expires` passes or `cancel` fires.
async fn bounded<F: Future>(
    step: F,
    expires: Option<Instant>,
    cancel: &CancellationToken,
) -> Result<F::Output, Interrupt> {
    let limited = async {
        match expires {
            Some(at) => tokio::time::timeout_at(at, step)
                .await
                .map_err(|_| Interrupt::Deadline),
            None => Ok(step.await),
        }
    };

    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(Interrupt::Cancelled),
        output = limited => output,
    }
}

/// Decide how a command ended from its two drain outcomes.
fn resolve(
    timed_out: bool,
    deadline: Option<Duration>,
    out: DrainOutcome,
    err: DrainOutcome,
) -> Option<SessionError> {
    if timed_out {
        return Some(SessionError::Timeout(deadline.unwrap_or_default()));
    }
    if out == DrainOutcome::Cancelled || err == DrainOutcome::Cancelled {
        return Some(SessionError::Cancelled);
    }
    if out == DrainOutcome::StreamClosed {
        return Some(SessionError::Truncated {
            stream: StreamKind::Stdout,
        });
    }
    if err == DrainOutcome::StreamClosed {
        return Some(SessionError::Truncated {
            stream: StreamKind::Stderr,
        });
    }
    None
}
