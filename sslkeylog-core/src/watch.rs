//! Entry and return watchers.
//!
//! An [`EntryWatcher`] sits on one instrumented symbol for as long as it is
//! installed. Every hit captures the `SSL*` argument of that call and arms a
//! [`ReturnWatcher`] bound to the same call instance. The return watcher
//! fires once, when that call returns, and is consumed by firing.
//!
//! ```text
//! EntryWatcher:   uninstalled --install--> active --uninstall--> (dropped)
//!                                          |  ^
//!                                          +--+ on_hit (durable)
//!
//! ReturnWatcher:  armed --fire--> (consumed)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::debugger::{BreakpointId, Debugger};
use crate::error::{DebuggerError, Error};
use crate::extract::{ConnectionHandle, KeyExtractor};
use crate::keylog::KeyLog;

/// OpenSSL connection API entry points that may produce new key material.
///
/// All of them take the `SSL*` as their first parameter, named `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryPoint {
    Connect,
    DoHandshake,
    Accept,
    Read,
    Write,
}

impl EntryPoint {
    /// The fixed set of instrumented entry points.
    pub const ALL: [EntryPoint; 5] = [
        EntryPoint::Connect,
        EntryPoint::DoHandshake,
        EntryPoint::Accept,
        EntryPoint::Read,
        EntryPoint::Write,
    ];

    /// Symbol name in the TLS library.
    pub fn symbol(self) -> &'static str {
        match self {
            EntryPoint::Connect => "SSL_connect",
            EntryPoint::DoHandshake => "SSL_do_handshake",
            EntryPoint::Accept => "SSL_accept",
            EntryPoint::Read => "SSL_read",
            EntryPoint::Write => "SSL_write",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Statistics reported when an entry watcher is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchStats {
    pub entry_point: EntryPoint,
    pub breakpoint: BreakpointId,
    pub hits: u64,
}

impl fmt::Display for WatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deleting breakpoint {} ({})",
            self.breakpoint, self.entry_point
        )?;
        if self.hits > 0 {
            write!(f, " (called {} times)", self.hits)?;
        }
        Ok(())
    }
}

/// Durable watcher on one entry point.
#[derive(Debug)]
pub struct EntryWatcher {
    entry_point: EntryPoint,
    breakpoint: BreakpointId,
}

impl EntryWatcher {
    /// Register a breakpoint on `entry_point`.
    pub fn install<D: Debugger + ?Sized>(
        debugger: &mut D,
        entry_point: EntryPoint,
    ) -> Result<Self, DebuggerError> {
        let breakpoint = debugger.set_breakpoint(entry_point.symbol())?;
        debug!(%entry_point, %breakpoint, "Installed entry watcher");
        Ok(Self {
            entry_point,
            breakpoint,
        })
    }

    pub fn entry_point(&self) -> EntryPoint {
        self.entry_point
    }

    pub fn breakpoint(&self) -> BreakpointId {
        self.breakpoint
    }

    /// Handle a call to the watched symbol.
    ///
    /// Reads the connection parameter from the selected frame and arms a
    /// return watcher for this call. Does not resume the target.
    pub fn on_hit<D: Debugger + ?Sized>(
        &self,
        debugger: &mut D,
        connection_param: &str,
    ) -> Result<ReturnWatcher, DebuggerError> {
        let connection = ConnectionHandle::new(debugger.read_local(connection_param)?);
        let breakpoint = debugger.set_return_breakpoint()?;
        debug!(
            entry_point = %self.entry_point,
            ssl = %connection,
            return_breakpoint = %breakpoint,
            "Armed return watcher"
        );
        Ok(ReturnWatcher {
            breakpoint,
            entry_point: self.entry_point,
            connection,
        })
    }

    /// Remove the breakpoint. Return watchers armed by earlier hits stay
    /// armed.
    pub fn uninstall<D: Debugger + ?Sized>(
        self,
        debugger: &mut D,
    ) -> Result<WatchStats, DebuggerError> {
        let hits = debugger.hit_count(self.breakpoint);
        debugger.delete_breakpoint(self.breakpoint)?;
        Ok(WatchStats {
            entry_point: self.entry_point,
            breakpoint: self.breakpoint,
            hits,
        })
    }
}

/// What happened when a return watcher fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// New key material was written to the log
    Logged,
    /// Key material was present but its client random was already logged
    Duplicate,
    /// The connection had no key material yet
    NoKeyMaterial,
    /// Key material was present but no key log is open
    LogClosed,
}

/// One-shot watcher armed for a single call instance.
#[derive(Debug)]
pub struct ReturnWatcher {
    breakpoint: BreakpointId,
    entry_point: EntryPoint,
    connection: ConnectionHandle,
}

impl ReturnWatcher {
    pub fn breakpoint(&self) -> BreakpointId {
        self.breakpoint
    }

    pub fn entry_point(&self) -> EntryPoint {
        self.entry_point
    }

    /// Handle captured when the call was entered.
    pub fn connection(&self) -> ConnectionHandle {
        self.connection
    }

    /// Extract key material for the captured connection and log it.
    ///
    /// Consumes the watcher. The debugger has already removed the return
    /// breakpoint by the time this runs.
    pub fn fire<D: Debugger + ?Sized>(
        self,
        debugger: &D,
        extractor: &KeyExtractor,
        keylog: Option<&mut KeyLog>,
    ) -> Result<FireOutcome, Error> {
        let Some(keys) = extractor.extract(debugger, self.connection)? else {
            return Ok(FireOutcome::NoKeyMaterial);
        };

        let Some(keylog) = keylog else {
            debug!(
                entry_point = %self.entry_point,
                ssl = %self.connection,
                "Key log closed, dropping key material"
            );
            return Ok(FireOutcome::LogClosed);
        };

        if keylog.observe(&keys.client_random, &keys.master_secret)? {
            Ok(FireOutcome::Logged)
        } else {
            Ok(FireOutcome::Duplicate)
        }
    }
}

/// Active entry watchers, at most one per entry point.
#[derive(Debug, Default)]
pub struct WatchSet {
    watchers: BTreeMap<EntryPoint, EntryWatcher>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an entry point is currently watched.
    pub fn is_watched(&self, entry_point: EntryPoint) -> bool {
        self.watchers.contains_key(&entry_point)
    }

    pub fn get(&self, entry_point: EntryPoint) -> Option<&EntryWatcher> {
        self.watchers.get(&entry_point)
    }

    /// Add a watcher. A watcher already present for the same entry point is
    /// kept and the new one is handed back.
    pub fn insert(&mut self, watcher: EntryWatcher) -> Result<(), EntryWatcher> {
        if self.is_watched(watcher.entry_point) {
            return Err(watcher);
        }
        self.watchers.insert(watcher.entry_point, watcher);
        Ok(())
    }

    pub fn remove(&mut self, entry_point: EntryPoint) -> Option<EntryWatcher> {
        self.watchers.remove(&entry_point)
    }

    /// Find the watcher that owns a breakpoint.
    pub fn find_by_breakpoint(&self, breakpoint: BreakpointId) -> Option<&EntryWatcher> {
        self.watchers.values().find(|w| w.breakpoint == breakpoint)
    }

    /// Watched entry points in a stable order.
    pub fn entry_points(&self) -> Vec<EntryPoint> {
        self.watchers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}
