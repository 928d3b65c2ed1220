//! Linux x86_64 ptrace backend for the key logging core.
//!
//! - [`procfs`] - `/proc/<pid>` parsing (maps, tasks, auxv)
//! - [`symbols`] - ELF symbol lookup in mapped objects
//! - [`ptrace`] - [`Tracer`], the [`Debugger`](sslkeylog_core::Debugger)
//!   implementation, and its event loop
//! - [`driver`] - [`drive`], the session loop that always releases the
//!   target

pub mod driver;
pub mod procfs;
pub mod ptrace;
pub mod symbols;

pub use driver::{drive, TraceTarget};
pub use ptrace::{TraceEvent, Tracer};
pub use symbols::SymbolResolver;
