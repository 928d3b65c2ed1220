//! Error types for the sslkeylog binary crate.

use std::path::PathBuf;

use sslkeylog_core::DebuggerError;
use thiserror::Error;

/// Errors raised by the ptrace backend.
#[derive(Error, Debug)]
pub enum TraceError {
    /// A ptrace, wait or signal request failed
    #[error("{operation} failed for {pid}: {reason}")]
    Request {
        operation: &'static str,
        pid: i32,
        reason: String,
    },

    /// Reading a procfs file failed
    #[error("Cannot read {}: {source}", path.display())]
    Procfs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A procfs file had unexpected content
    #[error("Malformed {}: {reason}", path.display())]
    MalformedProcfs { path: PathBuf, reason: String },

    /// A mapped object could not be parsed as ELF
    #[error("Cannot parse ELF object {}: {reason}", path.display())]
    Elf { path: PathBuf, reason: String },

    /// The program to trace could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The target stopped in a way the tracer does not expect
    #[error("Unexpected stop of {pid}: {status}")]
    UnexpectedStop { pid: i32, status: String },

    /// The target exited before tracing was set up
    #[error("Target {pid} exited during setup")]
    ExitedDuringSetup { pid: i32 },

    /// The key logging session failed
    #[error("Session error: {0}")]
    Session(#[from] sslkeylog_core::Error),
}

impl From<TraceError> for DebuggerError {
    fn from(err: TraceError) -> Self {
        let operation = match &err {
            TraceError::Request { operation, .. } => *operation,
            TraceError::Procfs { .. } | TraceError::MalformedProcfs { .. } => "procfs",
            TraceError::Elf { .. } => "symbol lookup",
            TraceError::Spawn { .. } => "spawn",
            TraceError::UnexpectedStop { .. } | TraceError::ExitedDuringSetup { .. } => "wait",
            TraceError::Session(_) => "session",
        };
        DebuggerError::Backend {
            operation,
            reason: err.to_string(),
        }
    }
}

/// Result type alias for the ptrace backend.
pub type Result<T> = std::result::Result<T, TraceError>;
