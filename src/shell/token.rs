//! Random token sources used to build command boundaries.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Produces short, hard-to-guess alphanumeric strings.
///
/// Implementations need not be cryptographically secure. The session only
/// relies on tokens being unlikely to appear in command output.
pub trait TokenSource: Send + Sync {
    /// Generate a token of exactly `len` alphanumeric characters.
    fn generate(&self, len: usize) -> String;
}

/// Token source backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn generate(&self, len: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}
