//! PowerShell Session - drive a long-lived interpreter over its standard pipes.

pub mod backend;
pub mod config;
pub mod display;
pub mod shell;

pub use backend::{LocalBackend, ProcessBackend};
pub use config::SessionConfig;
pub use shell::{CommandOutput, ErrorLine, Session, SessionError};
