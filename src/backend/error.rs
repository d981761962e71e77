//! Backend error types.

/// Errors starting an interpreter process.
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    /// The program was not found.
    #[error("Interpreter not found: {program}")]
    NotFound { program: String },
    /// Permission denied when starting the program.
    #[error("Permission denied starting {program}")]
    PermissionDenied { program: String },
    /// The process started without one of its standard pipes.
    #[error("Process {0} not available")]
    MissingPipe(&'static str),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Classify a spawn failure for `program`.
    #[must_use]
    pub fn from_spawn(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                program: program.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                program: program.to_string(),
            },
            _ => Self::Io(err),
        }
    }
}
