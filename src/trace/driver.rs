//! Event loop tying a traced target to a [`SessionController`].
//!
//! [`drive`] owns the target for the whole session. However the loop ends
//! (exit, signal, or a failed ptrace request) the session is stopped and
//! the target is released before the outcome is returned, so no patched
//! instruction outlives the tool.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use sslkeylog_core::{Debugger, SessionController};
use tracing::{info, warn};

use super::ptrace::{TraceEvent, Tracer};
use crate::error::Result;

/// A debugger that also delivers stop events and can be handed back.
pub trait TraceTarget: Debugger {
    /// Block until a breakpoint hit, target exit, or `shutdown`.
    fn next_event(&mut self, shutdown: &AtomicBool) -> Result<TraceEvent>;

    /// Restore the target: detach from an attached process, kill a spawned
    /// one.
    fn release(self) -> Result<()>;
}

impl TraceTarget for Tracer {
    fn next_event(&mut self, shutdown: &AtomicBool) -> Result<TraceEvent> {
        self.wait_event(shutdown)
    }

    fn release(self) -> Result<()> {
        if self.is_spawned() {
            self.kill()
        } else {
            self.detach()
        }
    }
}

/// Log keys from `target` into `output` until it exits or `shutdown` is
/// raised.
///
/// Returns the event that ended the session. An error from the loop wins
/// over an error from releasing the target; the latter is then logged.
pub fn drive<T: TraceTarget>(
    mut target: T,
    session: &mut SessionController,
    output: Option<PathBuf>,
    shutdown: &AtomicBool,
) -> Result<TraceEvent> {
    let outcome = run_loop(&mut target, session, output, shutdown);

    session.stop(&mut target);
    let released = target.release();

    match outcome {
        Ok(event) => {
            released?;
            Ok(event)
        }
        Err(e) => {
            if let Err(release_err) = released {
                warn!("Failed to release target: {release_err}");
            }
            Err(e)
        }
    }
}

fn run_loop<T: TraceTarget>(
    target: &mut T,
    session: &mut SessionController,
    output: Option<PathBuf>,
    shutdown: &AtomicBool,
) -> Result<TraceEvent> {
    session.start(target, output, true)?;

    loop {
        match target.next_event(shutdown)? {
            TraceEvent::Breakpoint(id) => {
                if let Err(e) = session.handle_breakpoint(target, id) {
                    warn!("Breakpoint {id}: {e}");
                }
                target.resume().map_err(sslkeylog_core::Error::from)?;
            }
            TraceEvent::Exited(code) => {
                info!("Target exited with status {code}");
                return Ok(TraceEvent::Exited(code));
            }
            TraceEvent::Killed(signal) => {
                info!("Target killed by {signal:?}");
                return Ok(TraceEvent::Killed(signal));
            }
            TraceEvent::Interrupted => {
                info!("Interrupted, cleaning up");
                return Ok(TraceEvent::Interrupted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::fs;
    use std::rc::Rc;

    use sslkeylog_core::test_utils::{ConnectionImage, FakeDebugger};
    use sslkeylog_core::{
        format_line, BreakpointId, Config, DebuggerError, StructLayout, KEYLOG_HEADER,
    };
    use tempfile::tempdir;

    use super::*;
    use crate::error::TraceError;

    const SSL: u64 = 0x10_0000;

    type Step = fn(&mut FakeDebugger) -> Result<TraceEvent>;
    type DebugResult<T> = std::result::Result<T, DebuggerError>;

    /// Replays a fixed list of events against an in-memory debugger.
    struct ScriptedTarget {
        dbg: FakeDebugger,
        steps: VecDeque<Step>,
        /// Entry breakpoints still armed when the target was released
        released: Rc<Cell<Option<usize>>>,
    }

    impl ScriptedTarget {
        fn new(steps: Vec<Step>) -> (Self, Rc<Cell<Option<usize>>>) {
            let mut dbg = FakeDebugger::new();
            ConnectionImage::new(SSL)
                .with_keys([0xab; 32], [0xcd; 48])
                .write_to(&mut dbg, &StructLayout::default());
            dbg.set_local("s", SSL);

            let released = Rc::new(Cell::new(None));
            let target = Self {
                dbg,
                steps: steps.into(),
                released: Rc::clone(&released),
            };
            (target, released)
        }
    }

    impl Debugger for ScriptedTarget {
        fn set_breakpoint(&mut self, symbol: &str) -> DebugResult<BreakpointId> {
            self.dbg.set_breakpoint(symbol)
        }

        fn set_return_breakpoint(&mut self) -> DebugResult<BreakpointId> {
            self.dbg.set_return_breakpoint()
        }

        fn delete_breakpoint(&mut self, id: BreakpointId) -> DebugResult<()> {
            self.dbg.delete_breakpoint(id)
        }

        fn hit_count(&self, id: BreakpointId) -> u64 {
            self.dbg.hit_count(id)
        }

        fn read_memory(&self, address: u64, len: usize) -> DebugResult<Vec<u8>> {
            self.dbg.read_memory(address, len)
        }

        fn read_local(&self, name: &str) -> DebugResult<u64> {
            self.dbg.read_local(name)
        }

        fn resume(&mut self) -> DebugResult<()> {
            self.dbg.resume()
        }

        fn is_live(&self) -> bool {
            self.dbg.is_live()
        }
    }

    impl TraceTarget for ScriptedTarget {
        fn next_event(&mut self, _shutdown: &AtomicBool) -> Result<TraceEvent> {
            let step = self.steps.pop_front().unwrap_or(interrupt);
            step(&mut self.dbg)
        }

        fn release(self) -> Result<()> {
            self.released.set(Some(self.dbg.entry_breakpoints()));
            Ok(())
        }
    }

    fn enter_ssl_read(dbg: &mut FakeDebugger) -> Result<TraceEvent> {
        let id = dbg.breakpoint_for("SSL_read").unwrap();
        dbg.trigger(id);
        Ok(TraceEvent::Breakpoint(id))
    }

    fn leave_ssl_read(dbg: &mut FakeDebugger) -> Result<TraceEvent> {
        let id = dbg.return_breakpoint_ids()[0];
        dbg.trigger(id);
        Ok(TraceEvent::Breakpoint(id))
    }

    fn exit_cleanly(_: &mut FakeDebugger) -> Result<TraceEvent> {
        Ok(TraceEvent::Exited(0))
    }

    fn interrupt(_: &mut FakeDebugger) -> Result<TraceEvent> {
        Ok(TraceEvent::Interrupted)
    }

    fn thread_vanished(_: &mut FakeDebugger) -> Result<TraceEvent> {
        Err(TraceError::Request {
            operation: "PTRACE_GETREGS",
            pid: 4242,
            reason: "No such process".to_string(),
        })
    }

    #[test]
    fn test_handshake_logged_then_exit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");
        let steps: Vec<Step> = vec![enter_ssl_read, leave_ssl_read, exit_cleanly];
        let (target, released) = ScriptedTarget::new(steps);

        let mut session = SessionController::new(Config::default());
        let shutdown = AtomicBool::new(false);
        let event = drive(target, &mut session, Some(path.clone()), &shutdown).unwrap();

        assert_eq!(event, TraceEvent::Exited(0));
        assert_eq!(released.get(), Some(0));
        assert!(!session.is_running());

        let expected = format!("{KEYLOG_HEADER}{}", format_line(&[0xab; 32], &[0xcd; 48]));
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn test_trace_error_still_releases_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");
        let steps: Vec<Step> = vec![enter_ssl_read, thread_vanished];
        let (target, released) = ScriptedTarget::new(steps);

        let mut session = SessionController::new(Config::default());
        let shutdown = AtomicBool::new(false);
        let result = drive(target, &mut session, Some(path), &shutdown);

        assert!(matches!(
            result,
            Err(TraceError::Request {
                operation: "PTRACE_GETREGS",
                ..
            })
        ));
        assert_eq!(released.get(), Some(0));
        assert!(!session.is_running());
    }

    #[test]
    fn test_start_failure_still_releases_target() {
        let dir = tempdir().unwrap();
        // Parent directory does not exist, so the key log cannot be created
        let path = dir.path().join("missing").join("keys.log");
        let (target, released) = ScriptedTarget::new(vec![]);

        let mut session = SessionController::new(Config::default());
        let shutdown = AtomicBool::new(false);
        let result = drive(target, &mut session, Some(path), &shutdown);

        assert!(matches!(result, Err(TraceError::Session(_))));
        assert_eq!(released.get(), Some(0));
    }
}
