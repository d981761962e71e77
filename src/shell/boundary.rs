//! Sentinel strings that mark the end of a command's output.

use std::fmt;
use std::sync::Arc;

use super::token::{RandomTokens, TokenSource};

/// Prefix of every generated boundary.
pub const BOUNDARY_PREFIX: &str = "$gorilla";

/// Suffix of every generated boundary.
pub const BOUNDARY_SUFFIX: &str = "$";

/// Length of the random token between prefix and suffix.
pub const BOUNDARY_TOKEN_LEN: usize = 12;

/// A marker line the interpreter echoes once a command has finished writing
/// to one stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Wrap an already-formatted marker.
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True only when `line` is exactly this boundary.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        line == self.0
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds boundaries from an injected token source.
#[derive(Clone)]
pub struct BoundaryGenerator {
    source: Arc<dyn TokenSource>,
}

impl BoundaryGenerator {
    #[must_use]
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self { source }
    }

    /// Create a fresh `$gorilla<token>$` marker.
    ///
    /// No collision detection is performed.
    #[must_use]
    pub fn create_boundary(&self) -> Boundary {
        let token = self.source.generate(BOUNDARY_TOKEN_LEN);
        Boundary(format!("{BOUNDARY_PREFIX}{token}{BOUNDARY_SUFFIX}"))
    }
}

impl Default for BoundaryGenerator {
    fn default() -> Self {
        Self::new(Arc::new(RandomTokens))
    }
}

impl fmt::Debug for BoundaryGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryGenerator").finish_non_exhaustive()
    }
}
