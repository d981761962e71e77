//! Process backends that start the interpreter and hand back its pipes.
//!
//! A backend is the only place that knows how a process is created. The
//! session sees three byte streams and a handle it can wait on.
//!
//! ```text
//! Session                          interpreter
//! ┌─────────────┐                 ┌─────────────┐
//! │ stdin       │──── commands ──▶│             │
//! │ stdout      │◀─── output ─────│             │
//! │ stderr      │◀─── errors ─────│             │
//! └─────────────┘                 └─────────────┘
//! ```

mod error;
mod local;

pub use error::*;
pub use local::*;

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed readable pipe.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed writable pipe.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle on a started process.
///
/// Dropping the handle must stop the process if it is still running.
#[async_trait]
pub trait ProcessWaiter: Send {
    /// Wait for the process to exit, returning its exit code if it has one.
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;

    /// Stop the process, allowing it `grace` to exit on its own first.
    async fn terminate(&mut self, grace: Duration) -> std::io::Result<()>;

    /// Operating system process id, when there is one.
    fn id(&self) -> Option<u32> {
        None
    }
}

/// The pipes and handle of a freshly started process.
pub struct ProcessPipes {
    pub waiter: Box<dyn ProcessWaiter>,
    pub stdin: BoxedWriter,
    pub stdout: BoxedReader,
    pub stderr: BoxedReader,
}

impl std::fmt::Debug for ProcessPipes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessPipes")
            .field("pid", &self.waiter.id())
            .finish_non_exhaustive()
    }
}

/// Starts processes.
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// Start `program` with `args`, with all three standard streams piped.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the process cannot be started.
    async fn start_process(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<ProcessPipes, BackendError>;
}
