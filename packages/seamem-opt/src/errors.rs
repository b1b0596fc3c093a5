//! Error types.
//!
//! The optimizer itself is total: a rewrite either simplifies or reports
//! "no change". Errors surface only from arena misuse and from the debug
//! invariant checker.

use thiserror::Error;

/// Crate error type.
#[derive(Debug, Error)]
pub enum OptError {
    /// Malformed graph handed to an entry point.
    #[error("graph error: {0}")]
    Graph(String),

    /// A structural invariant does not hold.
    #[error("verification error: {0}")]
    Verification(String),
}

impl OptError {
    pub fn graph(msg: impl Into<String>) -> Self {
        OptError::Graph(msg.into())
    }

    pub fn verification(msg: impl Into<String>) -> Self {
        OptError::Verification(msg.into())
    }
}

/// Result type alias for fallible entry points.
pub type Result<T> = std::result::Result<T, OptError>;
