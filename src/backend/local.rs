//! Backend that runs the interpreter as a local child process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use super::{BackendError, ProcessBackend, ProcessPipes, ProcessWaiter};

/// Starts interpreters with [`tokio::process::Command`].
///
/// Children are killed when their [`LocalProcess`] handle is dropped.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl LocalBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory for started processes.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable for started processes.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Get the working directory, if set.
    #[must_use]
    pub fn get_working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

#[async_trait]
impl ProcessBackend for LocalBackend {
    async fn start_process(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<ProcessPipes, BackendError> {
        let mut child = self
            .command(program, args)
            .spawn()
            .map_err(|e| BackendError::from_spawn(program, e))?;

        let stdin = child.stdin.take().ok_or(BackendError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(BackendError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(BackendError::MissingPipe("stderr"))?;

        let process = LocalProcess { child };
        tracing::debug!(program, ?args, pid = ?process.id(), "Started interpreter");

        Ok(ProcessPipes {
            waiter: Box::new(process),
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        })
    }
}

/// A running local interpreter process.
#[derive(Debug)]
pub struct LocalProcess {
    child: Child,
}

impl LocalProcess {
    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.child.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        if let Err(e) = kill(nix_pid, Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "SIGTERM failed");
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(pid, ?timeout, "Interpreter ignored SIGTERM, killing");
                self.child.kill().await
            }
        }
    }
}

#[async_trait]
impl ProcessWaiter for LocalProcess {
    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    async fn terminate(&mut self, grace: Duration) -> std::io::Result<()> {
        self.graceful_terminate(grace).await
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }
}
