//! sslkeylog - Log TLS session keys of a running OpenSSL process.
//!
//! This crate wires the [`sslkeylog_core`] session controller to a Linux
//! ptrace backend and exposes the command-line front end.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
//! # fn main() -> anyhow::Result<()> {
//! use std::sync::atomic::AtomicBool;
//!
//! use sslkeylog::trace::{drive, TraceEvent, Tracer};
//! use sslkeylog_core::{Config, SessionController};
//!
//! let tracer = Tracer::attach(1234)?;
//! let mut session = SessionController::new(Config::from_env());
//!
//! // Returns once the target exits or the flag is raised; the target is
//! // detached either way.
//! let shutdown = AtomicBool::new(false);
//! let event = drive(tracer, &mut session, None, &shutdown)?;
//! assert!(matches!(event, TraceEvent::Exited(_) | TraceEvent::Interrupted));
//! # Ok(())
//! # }
//! # #[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
//! # fn main() {}
//! ```

pub mod cli;
pub mod error;
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub mod trace;

pub use error::{Result, TraceError};
