//! Command framing over an interpreter's raw pipes.
//!
//! [`Session`] writes each command followed by two boundary echoes, then
//! drains stdout and stderr concurrently until each boundary shows up.

mod boundary;
mod drain;
mod error;
mod output;
mod scanner;
mod session;
mod state;
mod token;

pub use boundary::*;
pub use drain::*;
pub use error::*;
pub use output::*;
pub use scanner::*;
pub use session::*;
pub use state::*;
pub use token::*;
