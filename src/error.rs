//! Error types for shell-exec.
//!
//! Process-level faults (spawn failure, non-zero exit, timeout) are not
//! errors: they resolve into a [`ShellResult`](crate::ShellResult). The
//! variants here cover contract violations and internal plumbing only.

use thiserror::Error;

use crate::execution::TerminationState;

/// Main error type for shell-exec operations.
#[derive(Error, Debug)]
pub enum ShellExecError {
    /// The command line was empty or whitespace only.
    #[error("empty command line")]
    EmptyCommand,

    /// Invalid termination state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: TerminationState,
        to: TerminationState,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output sink rejected a chunk.
    #[error("sink delivery failed: {0}")]
    Sink(String),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// Convenience Result type for shell-exec operations.
pub type Result<T> = std::result::Result<T, ShellExecError>;
