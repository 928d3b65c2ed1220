//! Debugger collaborator interface.
//!
//! The core drives the target exclusively through [`Debugger`]. A backend
//! owns the process-control mechanics (ptrace, a scripting host, a fake for
//! tests) and delivers breakpoint events one at a time to
//! [`SessionController::handle_breakpoint`](crate::SessionController::handle_breakpoint).

use std::fmt;

use crate::error::DebuggerError;

/// Identifier issued by a debugger for every breakpoint it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(pub u64);

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Abstract interface to a debugger attached to the target process.
///
/// "Selected frame" below means the frame of the thread that triggered the
/// breakpoint event currently being handled.
pub trait Debugger {
    /// Register a durable breakpoint on every call to `symbol`.
    fn set_breakpoint(&mut self, symbol: &str) -> Result<BreakpointId, DebuggerError>;

    /// Register a one-shot breakpoint that fires when the call in the
    /// selected frame returns.
    ///
    /// The breakpoint is scoped to that call instance: a different call that
    /// returns through the same address must not trigger it. The debugger
    /// deletes it on its own once it has fired.
    fn set_return_breakpoint(&mut self) -> Result<BreakpointId, DebuggerError>;

    /// Remove a breakpoint. Removing a return breakpoint that already fired
    /// is an error.
    fn delete_breakpoint(&mut self, id: BreakpointId) -> Result<(), DebuggerError>;

    /// Number of times a breakpoint has been hit.
    fn hit_count(&self, id: BreakpointId) -> u64;

    /// Read `len` bytes of target memory starting at `address`.
    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>, DebuggerError>;

    /// Value of a named local or parameter in the selected frame.
    fn read_local(&self, name: &str) -> Result<u64, DebuggerError>;

    /// Let the target run again.
    fn resume(&mut self) -> Result<(), DebuggerError>;

    /// Whether a target process exists (started and not exited).
    fn is_live(&self) -> bool;
}
