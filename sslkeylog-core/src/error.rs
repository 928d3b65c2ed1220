//! Error types for sslkeylog-core.
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`DebuggerError`] - Failures reported by the debugger collaborator
//! - [`KeyLogError`] - Failures opening, writing or parsing a key log
//!
//! Missing key material is not an error: the extractor reports it as `None`.

use thiserror::Error;

use crate::debugger::BreakpointId;
pub use crate::keylog::KeyLogError;

/// Main error type for sslkeylog-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the debugger collaborator
    #[error("Debugger error: {0}")]
    Debugger(#[from] DebuggerError),

    /// Error opening, writing or parsing the key log
    #[error("Key log error: {0}")]
    KeyLog(#[from] KeyLogError),
}

/// Errors reported by a [`Debugger`](crate::Debugger) implementation.
#[derive(Error, Debug)]
pub enum DebuggerError {
    /// Symbol could not be resolved in the target
    #[error("Symbol not found in target: {symbol}")]
    SymbolNotFound { symbol: String },

    /// Named local or parameter is not available in the selected frame
    #[error("No variable named '{name}' in the selected frame")]
    UnknownVariable { name: String },

    /// Target memory could not be read
    #[error("Cannot read {len} bytes at {address:#x}: {reason}")]
    MemoryRead {
        address: u64,
        len: usize,
        reason: String,
    },

    /// Breakpoint id not known to the debugger
    #[error("Unknown breakpoint: {0}")]
    UnknownBreakpoint(BreakpointId),

    /// Operation needs a stopped thread but the target is running
    #[error("Target is not stopped")]
    NotStopped,

    /// No target process (never started, or already exited)
    #[error("No target process")]
    NoProcess,

    /// Backend-specific failure (ptrace, procfs, ...)
    #[error("{operation} failed: {reason}")]
    Backend {
        operation: &'static str,
        reason: String,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
