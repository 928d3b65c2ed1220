//! Key logging session lifecycle and breakpoint dispatch.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::debugger::{BreakpointId, Debugger};
use crate::error::Result;
use crate::extract::KeyExtractor;
use crate::keylog::KeyLog;
use crate::watch::{EntryPoint, EntryWatcher, FireOutcome, ReturnWatcher, WatchSet, WatchStats};

/// Result of dispatching one breakpoint event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// An entry point was hit and a return watcher armed for the call
    Armed {
        entry_point: EntryPoint,
        return_breakpoint: BreakpointId,
    },
    /// A pending return watcher fired
    Fired {
        entry_point: EntryPoint,
        outcome: FireOutcome,
    },
    /// The breakpoint belongs to no watcher (for example an entry hit
    /// racing with `disable`)
    Ignored,
}

/// Owns the key log, the watch set and the return watchers still waiting
/// for their call to return.
///
/// ```text
/// stopped --start/enable--> running --stop--> stopped
/// ```
///
/// `disable` alone leaves the key log open: entry points stop being
/// watched but the session still counts as running.
#[derive(Debug)]
pub struct SessionController {
    config: Config,
    extractor: KeyExtractor,
    keylog: Option<KeyLog>,
    watches: WatchSet,
    pending: HashMap<BreakpointId, ReturnWatcher>,
}

impl SessionController {
    pub fn new(config: Config) -> Self {
        let extractor = KeyExtractor::new(config.layout);
        Self {
            config,
            extractor,
            keylog: None,
            watches: WatchSet::new(),
            pending: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn watches(&self) -> &WatchSet {
        &self.watches
    }

    /// Number of armed return watchers.
    pub fn pending_returns(&self) -> usize {
        self.pending.len()
    }

    /// Check if a key log is open.
    pub fn is_running(&self) -> bool {
        self.keylog.is_some()
    }

    /// Distinct client randoms logged by the open key log.
    pub fn keys_logged(&self) -> usize {
        self.keylog.as_ref().map_or(0, KeyLog::len)
    }

    /// Start logging.
    ///
    /// `path` replaces the configured output path for this and later
    /// sessions. The target is resumed afterwards when it is live and
    /// `should_continue` is set.
    pub fn start<D: Debugger + ?Sized>(
        &mut self,
        debugger: &mut D,
        path: Option<PathBuf>,
        should_continue: bool,
    ) -> Result<()> {
        if let Some(path) = path {
            self.config.output_path = path;
        }

        self.enable(debugger)?;

        if debugger.is_live() && should_continue {
            debugger.resume()?;
        }
        Ok(())
    }

    /// Open the key log if needed and watch every entry point.
    ///
    /// Entry points that are already watched keep their existing watcher.
    pub fn enable<D: Debugger + ?Sized>(&mut self, debugger: &mut D) -> Result<()> {
        if self.keylog.is_none() {
            let keylog = KeyLog::create(&self.config.output_path)?;
            info!("Started logging SSL keys to {}", keylog.path().display());
            self.keylog = Some(keylog);
        }

        for &entry_point in self.config.entry_points() {
            if self.watches.is_watched(entry_point) {
                info!("Breakpoint for {entry_point} already active, ignoring");
                continue;
            }

            let watcher = EntryWatcher::install(debugger, entry_point)?;
            if let Err(watcher) = self.watches.insert(watcher) {
                // Unreachable after the is_watched check; keep the table clean
                debugger.delete_breakpoint(watcher.breakpoint())?;
            }
        }
        Ok(())
    }

    /// Remove every entry watcher.
    ///
    /// Return watchers that are already armed stay armed. A watcher whose
    /// breakpoint cannot be deleted is still dropped from the watch set.
    pub fn disable<D: Debugger + ?Sized>(&mut self, debugger: &mut D) -> Vec<WatchStats> {
        let mut stats = Vec::with_capacity(self.watches.len());

        for entry_point in self.watches.entry_points() {
            let Some(watcher) = self.watches.remove(entry_point) else {
                continue;
            };
            let breakpoint = watcher.breakpoint();
            match watcher.uninstall(debugger) {
                Ok(watch_stats) => {
                    info!("{watch_stats}");
                    stats.push(watch_stats);
                }
                Err(e) => {
                    warn!(%entry_point, %breakpoint, error = %e, "Failed to delete breakpoint");
                }
            }
        }
        stats
    }

    /// Disable, close the key log and report how many keys it holds.
    ///
    /// Returns `None` when no session is running.
    pub fn stop<D: Debugger + ?Sized>(&mut self, debugger: &mut D) -> Option<usize> {
        let Some(keylog) = self.keylog.take() else {
            info!("No active keylog session");
            return None;
        };

        self.disable(debugger);
        let total = keylog.close();
        info!("Logged {total} entries in total");
        Some(total)
    }

    /// Dispatch a breakpoint event.
    ///
    /// Never resumes the target; the caller does that once this returns,
    /// whether it succeeded or not.
    pub fn handle_breakpoint<D: Debugger + ?Sized>(
        &mut self,
        debugger: &mut D,
        id: BreakpointId,
    ) -> Result<HitOutcome> {
        if let Some(watcher) = self.watches.find_by_breakpoint(id) {
            let entry_point = watcher.entry_point();
            let return_watcher = watcher.on_hit(debugger, &self.config.connection_param)?;
            let return_breakpoint = return_watcher.breakpoint();
            self.pending.insert(return_breakpoint, return_watcher);
            return Ok(HitOutcome::Armed {
                entry_point,
                return_breakpoint,
            });
        }

        // Removed before firing: a watcher that fails is done
        if let Some(return_watcher) = self.pending.remove(&id) {
            let entry_point = return_watcher.entry_point();
            let outcome = return_watcher.fire(&*debugger, &self.extractor, self.keylog.as_mut())?;
            debug!(%entry_point, breakpoint = %id, ?outcome, "Return watcher fired");
            return Ok(HitOutcome::Fired {
                entry_point,
                outcome,
            });
        }

        debug!(breakpoint = %id, "Ignoring breakpoint with no watcher");
        Ok(HitOutcome::Ignored)
    }
}
