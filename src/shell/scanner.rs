//! Byte-level line scanner for interpreter output pipes.

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use super::error::ScanError;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Reads a byte stream one line at a time.
///
/// Carriage returns are dropped wherever they occur and a line feed ends the
/// current line. The scanner is meant to live as long as the pipe it reads:
/// bytes buffered past one command's boundary belong to the next command.
///
/// A partially read line is kept inside the scanner, so dropping a pending
/// [`next_line`](Self::next_line) future loses no bytes.
#[derive(Debug)]
pub struct LineScanner<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineScanner<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::with_capacity(256),
        }
    }

    /// Read the next complete line, without its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Eof`] once the stream is closed and
    /// [`ScanError::Io`] on any other read failure. An unterminated trailing
    /// fragment is discarded at end of stream.
    pub async fn next_line(&mut self) -> Result<String, ScanError> {
        loop {
            let byte = self.reader.read_u8().await.map_err(ScanError::from_io)?;
            match byte {
                CR => {}
                LF => {
                    let line = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return Ok(line);
                }
                other => self.pending.push(other),
            }
        }
    }

    /// Bytes of the line currently being assembled.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}
