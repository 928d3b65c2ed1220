//! # sslkeylog-core
//!
//! Debugger-agnostic core for extracting TLS session keys from a live
//! OpenSSL process.
//!
//! The crate never touches the target process directly. Everything it needs
//! from the outside world goes through the [`Debugger`] trait: registering
//! breakpoints, reading memory, reading frame locals and resuming the target.
//! A ptrace backend lives in the `sslkeylog` binary crate; tests use the fake
//! debugger in [`test_utils`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sslkeylog_core::prelude::*;
//!
//! let mut session = SessionController::new(Config::from_env());
//! session.start(&mut debugger, None, true)?;
//!
//! // For every breakpoint event delivered by the debugger:
//! session.handle_breakpoint(&mut debugger, id)?;
//!
//! let total = session.stop(&mut debugger);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        sslkeylog-core                               |
//! +---------------------------------------------------------------------+
//! |  debugger/  - Debugger trait, BreakpointId (collaborator interface) |
//! |  memory/    - MemoryReader: raw and typed reads of target memory    |
//! |  layout/    - StructLayout presets for OpenSSL ABIs                 |
//! |  extract/   - KeyExtractor: SSL* -> (client random, master secret)  |
//! |  keylog/    - KeyLog writer (dedup + append) and key log parser     |
//! |  watch/     - EntryWatcher, ReturnWatcher, WatchSet                 |
//! |  session/   - SessionController lifecycle and event dispatch        |
//! |  config/    - Output path, layout and parameter configuration       |
//! |  error/     - Error types                                           |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! SessionController::enable -> EntryWatcher per entry point
//!     |
//!     v  (target calls SSL_read & co.)
//! EntryWatcher::on_hit -> reads `s`, arms a ReturnWatcher for this call
//!     |
//!     v  (that call returns)
//! ReturnWatcher::fire -> KeyExtractor -> KeyLog::observe
//! ```

pub mod config;
pub mod debugger;
pub mod error;
pub mod extract;
pub mod keylog;
pub mod layout;
pub mod memory;
pub mod prelude;
pub mod session;
pub mod watch;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Config, DEFAULT_CONNECTION_PARAM, DEFAULT_KEYLOG_FILENAME, SSLKEYLOGFILE_ENV};
pub use debugger::{BreakpointId, Debugger};
pub use error::{DebuggerError, Error, Result};
pub use extract::{ConnectionHandle, KeyExtractor, KeyMaterial};
pub use keylog::{
    format_line, KeyLog, KeyLogEntry, KeyLogError, KeyLogFile, SecretLabel, KEYLOG_HEADER,
};
pub use layout::{IntWidth, LayoutOverrides, LayoutPreset, StructLayout};
pub use memory::MemoryReader;
pub use session::{HitOutcome, SessionController};
pub use watch::{EntryPoint, EntryWatcher, FireOutcome, ReturnWatcher, WatchSet, WatchStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
