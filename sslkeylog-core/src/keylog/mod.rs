//! NSS key log (`SSLKEYLOGFILE`) support.
//!
//! - [`KeyLog`] appends `CLIENT_RANDOM` lines for newly observed sessions,
//!   skipping client randoms it has already written.
//! - [`KeyLogFile`] parses a key log back, for verification.
//!
//! ## Format
//!
//! ```text
//! # Automatically generated by sslkeylog.py
//! CLIENT_RANDOM <64 hex client_random> <96 hex master_secret>
//! ```
//!
//! The header is only written to files that are empty when opened.

mod parser;
mod writer;

use std::path::PathBuf;

use thiserror::Error;

pub use parser::{KeyLogEntry, KeyLogFile, SecretLabel};
pub use writer::{format_line, KeyLog, KEYLOG_HEADER};

/// Errors that can occur when writing or parsing a key log.
#[derive(Debug, Error)]
pub enum KeyLogError {
    /// The log file could not be opened in append or write mode
    #[error("Cannot open key log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an entry failed
    #[error("Failed to write key log entry: {0}")]
    Write(#[source] std::io::Error),

    /// I/O error reading a key log
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid hex string in key log
    #[error("Invalid hex at line {line}: {message}")]
    InvalidHex { line: usize, message: String },

    /// Invalid line format
    #[error("Invalid format at line {line}: {message}")]
    InvalidFormat { line: usize, message: String },

    /// Unknown key type
    #[error("Unknown key type at line {line}: {label}")]
    UnknownKeyType { line: usize, label: String },
}
