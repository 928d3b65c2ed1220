//! x86_64 Linux ptrace backend.
//!
//! Entry and return breakpoints are `int3` bytes patched into the target
//! through `/proc/<pid>/mem`. Several breakpoints may share one patched
//! site; the original byte comes back when the last one is deleted.
//!
//! A return breakpoint belongs to one call: it is matched on the thread that
//! made the call and on the stack pointer that thread will have once the
//! call has returned. Hits of the same site by other threads or by other
//! (recursive) calls are stepped over silently.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::libc::{self, user_regs_struct};
use nix::sys::ptrace::{self, Options};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use sslkeylog_core::{BreakpointId, Debugger, DebuggerError};
use tracing::{debug, info, trace, warn};

use super::procfs::{self, AT_ENTRY};
use super::symbols::SymbolResolver;
use crate::error::{Result, TraceError};

const INT3: u8 = 0xcc;

/// Delay between polls of `waitpid` while the target runs.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// System V argument registers, in order.
const ARGUMENT_REGISTERS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// What ended a call to [`Tracer::wait_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// A thread stopped at one of our breakpoints and is waiting for
    /// [`Debugger::resume`]
    Breakpoint(BreakpointId),
    /// The target exited with a status code
    Exited(i32),
    /// The target was killed by a signal
    Killed(Signal),
    /// The shutdown flag was raised
    Interrupted,
}

#[derive(Debug)]
enum Breakpoint {
    Entry {
        symbol: String,
        address: u64,
        hits: u64,
    },
    Return {
        address: u64,
        tid: Pid,
        stack_pointer: u64,
    },
}

impl Breakpoint {
    fn address(&self) -> u64 {
        match self {
            Breakpoint::Entry { address, .. } | Breakpoint::Return { address, .. } => *address,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Site {
    original: u8,
    refs: usize,
}

/// Thread stopped at a breakpoint, whose frame the core is inspecting.
#[derive(Debug, Clone, Copy)]
struct Selected {
    tid: Pid,
    regs: user_regs_struct,
}

#[derive(Debug)]
enum Origin {
    Attached,
    Spawned(Child),
}

/// A traced process.
#[derive(Debug)]
pub struct Tracer {
    pid: Pid,
    origin: Origin,
    mem: File,
    symbols: SymbolResolver,
    breakpoints: BTreeMap<BreakpointId, Breakpoint>,
    sites: HashMap<u64, Site>,
    /// Sites deleted while a thread may still have a pending trap on them
    retired: HashSet<u64>,
    next_id: u64,
    threads: HashSet<Pid>,
    /// Threads in a ptrace-stop, with the signal to deliver on resume
    stopped: BTreeMap<Pid, Option<Signal>>,
    selected: Option<Selected>,
    live: bool,
}

fn request(operation: &'static str, pid: Pid) -> impl FnOnce(Errno) -> TraceError {
    move |errno| TraceError::Request {
        operation,
        pid: pid.as_raw(),
        reason: errno.desc().to_string(),
    }
}

impl Tracer {
    /// Attach to every thread of a running process and stop them all.
    pub fn attach(pid: i32) -> Result<Self> {
        let pid = Pid::from_raw(pid);
        let mut threads = HashSet::new();
        let mut stopped = BTreeMap::new();

        // Threads may be created while we attach; list until stable
        loop {
            let tids: Vec<Pid> = procfs::list_tasks(pid.as_raw())?
                .into_iter()
                .map(Pid::from_raw)
                .filter(|tid| !threads.contains(tid))
                .collect();
            if tids.is_empty() {
                break;
            }
            for tid in tids {
                ptrace::seize(tid, Options::PTRACE_O_TRACECLONE)
                    .map_err(request("PTRACE_SEIZE", tid))?;
                ptrace::interrupt(tid).map_err(request("PTRACE_INTERRUPT", tid))?;
                threads.insert(tid);
            }
        }

        for &tid in &threads {
            if let Some(signal) = wait_for_stop(tid)? {
                stopped.insert(tid, signal);
            }
        }
        debug!(pid = pid.as_raw(), threads = threads.len(), "Attached");

        Self::new(pid, Origin::Attached, threads, stopped)
    }

    /// Start `program` under trace and stop it at its ELF entry point, once
    /// the dynamic loader has mapped every `DT_NEEDED` library.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut command = Command::new(program);
        command.args(args);
        // SAFETY: traceme is async-signal-safe and touches no parent state
        unsafe {
            command.pre_exec(|| ptrace::traceme().map_err(std::io::Error::from));
        }
        let child = command.spawn().map_err(|source| TraceError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = Pid::from_raw(child.id() as i32);

        // First stop is the SIGTRAP raised by execve
        match waitpid(pid, Some(WaitPidFlag::__WALL)).map_err(request("waitpid", pid))? {
            WaitStatus::Stopped(_, Signal::SIGTRAP) => {}
            WaitStatus::Exited(..) | WaitStatus::Signaled(..) => {
                return Err(TraceError::ExitedDuringSetup { pid: pid.as_raw() })
            }
            status => {
                return Err(TraceError::UnexpectedStop {
                    pid: pid.as_raw(),
                    status: format!("{status:?}"),
                })
            }
        }
        ptrace::setoptions(
            pid,
            Options::PTRACE_O_TRACECLONE | Options::PTRACE_O_EXITKILL,
        )
        .map_err(request("PTRACE_SETOPTIONS", pid))?;

        let threads = HashSet::from([pid]);
        let stopped = BTreeMap::from([(pid, None)]);
        let mut tracer = Self::new(pid, Origin::Spawned(child), threads, stopped)?;
        tracer.run_to_entry()?;
        Ok(tracer)
    }

    fn new(
        pid: Pid,
        origin: Origin,
        threads: HashSet<Pid>,
        stopped: BTreeMap<Pid, Option<Signal>>,
    ) -> Result<Self> {
        let path = PathBuf::from(format!("/proc/{pid}/mem"));
        let mem = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| TraceError::Procfs { path, source })?;

        Ok(Self {
            pid,
            origin,
            mem,
            symbols: SymbolResolver::new(pid.as_raw()),
            breakpoints: BTreeMap::new(),
            sites: HashMap::new(),
            retired: HashSet::new(),
            next_id: 1,
            threads,
            stopped,
            selected: None,
            live: true,
        })
    }

    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Check if the target was started by this tracer.
    pub fn is_spawned(&self) -> bool {
        matches!(self.origin, Origin::Spawned(_))
    }

    fn run_to_entry(&mut self) -> Result<()> {
        let entry = procfs::read_auxv_entry(self.pid.as_raw(), AT_ENTRY)?.ok_or_else(|| {
            TraceError::MalformedProcfs {
                path: PathBuf::from(format!("/proc/{}/auxv", self.pid)),
                reason: "no AT_ENTRY".to_string(),
            }
        })?;

        self.patch(entry)?;
        ptrace::cont(self.pid, None).map_err(request("PTRACE_CONT", self.pid))?;
        self.stopped.clear();

        loop {
            match waitpid(self.pid, Some(WaitPidFlag::__WALL))
                .map_err(request("waitpid", self.pid))?
            {
                WaitStatus::Stopped(tid, Signal::SIGTRAP) => {
                    let mut regs = ptrace::getregs(tid).map_err(request("PTRACE_GETREGS", tid))?;
                    if regs.rip.wrapping_sub(1) == entry {
                        regs.rip = entry;
                        ptrace::setregs(tid, regs).map_err(request("PTRACE_SETREGS", tid))?;
                        self.unpatch(entry)?;
                        self.stopped.insert(tid, None);
                        debug!("Reached program entry at {entry:#x}");
                        return Ok(());
                    }
                    ptrace::cont(tid, Signal::SIGTRAP).map_err(request("PTRACE_CONT", tid))?;
                }
                WaitStatus::Stopped(tid, sig) => {
                    ptrace::cont(tid, sig).map_err(request("PTRACE_CONT", tid))?;
                }
                WaitStatus::Exited(..) | WaitStatus::Signaled(..) => {
                    self.live = false;
                    return Err(TraceError::ExitedDuringSetup {
                        pid: self.pid.as_raw(),
                    });
                }
                status => {
                    return Err(TraceError::UnexpectedStop {
                        pid: self.pid.as_raw(),
                        status: format!("{status:?}"),
                    })
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Memory and sites
    // ------------------------------------------------------------------

    fn read_bytes(&self, address: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.mem.read_exact_at(&mut buf, address)?;
        Ok(buf)
    }

    fn write_byte(&self, address: u64, byte: u8) -> Result<()> {
        self.mem
            .write_all_at(&[byte], address)
            .map_err(|source| TraceError::Procfs {
                path: PathBuf::from(format!("/proc/{}/mem", self.pid)),
                source,
            })
    }

    fn patch(&mut self, address: u64) -> Result<()> {
        if let Some(site) = self.sites.get_mut(&address) {
            site.refs += 1;
            return Ok(());
        }

        let original = self
            .read_bytes(address, 1)
            .map_err(|source| TraceError::Procfs {
                path: PathBuf::from(format!("/proc/{}/mem", self.pid)),
                source,
            })?[0];
        self.write_byte(address, INT3)?;
        self.sites.insert(address, Site { original, refs: 1 });
        self.retired.remove(&address);
        Ok(())
    }

    fn unpatch(&mut self, address: u64) -> Result<()> {
        let Some(site) = self.sites.get_mut(&address) else {
            return Ok(());
        };
        site.refs -= 1;
        if site.refs > 0 {
            return Ok(());
        }

        let original = site.original;
        self.sites.remove(&address);
        if self.live {
            self.write_byte(address, original)?;
        }
        self.retired.insert(address);
        Ok(())
    }

    fn allocate(&mut self, breakpoint: Breakpoint) -> BreakpointId {
        let id = BreakpointId(self.next_id);
        self.next_id += 1;
        self.breakpoints.insert(id, breakpoint);
        id
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Run until a thread hits one of our breakpoints, the target goes
    /// away, or `shutdown` is raised.
    pub fn wait_event(&mut self, shutdown: &AtomicBool) -> Result<TraceEvent> {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(TraceEvent::Interrupted);
            }

            let flags = WaitPidFlag::__WALL | WaitPidFlag::WNOHANG;
            let status = match waitpid(Pid::from_raw(-1), Some(flags)) {
                Ok(status) => status,
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => {
                    self.live = false;
                    return Ok(TraceEvent::Exited(0));
                }
                Err(errno) => return Err(request("waitpid", self.pid)(errno)),
            };

            match status {
                WaitStatus::StillAlive => thread::sleep(POLL_INTERVAL),
                WaitStatus::Exited(tid, code) => {
                    self.forget_thread(tid);
                    if tid == self.pid {
                        self.live = false;
                        return Ok(TraceEvent::Exited(code));
                    }
                }
                WaitStatus::Signaled(tid, sig, _) => {
                    self.forget_thread(tid);
                    if tid == self.pid {
                        self.live = false;
                        return Ok(TraceEvent::Killed(sig));
                    }
                }
                WaitStatus::PtraceEvent(tid, _, event) if event == libc::PTRACE_EVENT_CLONE => {
                    if let Ok(new_tid) = ptrace::getevent(tid) {
                        let new_tid = Pid::from_raw(new_tid as i32);
                        trace!(tid = new_tid.as_raw(), "New thread");
                        self.threads.insert(new_tid);
                    }
                    self.cont(tid, None)?;
                }
                WaitStatus::PtraceEvent(tid, _, _) => {
                    // Group-stop or a stray interrupt
                    self.threads.insert(tid);
                    self.cont(tid, None)?;
                }
                WaitStatus::Stopped(tid, Signal::SIGSTOP) if !self.threads.contains(&tid) => {
                    // A clone reporting in before its parent's clone event
                    self.threads.insert(tid);
                    self.cont(tid, None)?;
                }
                WaitStatus::Stopped(tid, Signal::SIGTRAP) => {
                    if let Some(id) = self.on_trap(tid)? {
                        return Ok(TraceEvent::Breakpoint(id));
                    }
                }
                WaitStatus::Stopped(tid, sig) => self.cont(tid, Some(sig))?,
                _ => {}
            }
        }
    }

    /// Classify a SIGTRAP. Returns the breakpoint to report, leaving the
    /// thread stopped, or resumes the thread and returns `None`.
    fn on_trap(&mut self, tid: Pid) -> Result<Option<BreakpointId>> {
        let mut regs = ptrace::getregs(tid).map_err(request("PTRACE_GETREGS", tid))?;
        let address = regs.rip.wrapping_sub(1);

        if !self.sites.contains_key(&address) {
            if self.retired.contains(&address) {
                // Trap raised just before the site was removed: re-execute
                regs.rip = address;
                ptrace::setregs(tid, regs).map_err(request("PTRACE_SETREGS", tid))?;
                self.cont(tid, None)?;
            } else {
                self.cont(tid, Some(Signal::SIGTRAP))?;
            }
            return Ok(None);
        }

        regs.rip = address;
        ptrace::setregs(tid, regs).map_err(request("PTRACE_SETREGS", tid))?;

        let hit = self.breakpoints.iter().find_map(|(id, bp)| match bp {
            Breakpoint::Entry { address: a, .. } if *a == address => Some(*id),
            Breakpoint::Return {
                address: a,
                tid: t,
                stack_pointer,
            } if *a == address && *t == tid && *stack_pointer == regs.rsp => Some(*id),
            _ => None,
        });

        let Some(id) = hit else {
            // Someone else's return site
            self.step_over(tid, address)?;
            self.cont(tid, None)?;
            return Ok(None);
        };

        if matches!(self.breakpoints.get(&id), Some(Breakpoint::Return { .. })) {
            // One-shot
            self.breakpoints.remove(&id);
            self.unpatch(address)?;
        } else if let Some(Breakpoint::Entry { hits, .. }) = self.breakpoints.get_mut(&id) {
            *hits += 1;
        }

        self.stopped.insert(tid, None);
        self.selected = Some(Selected { tid, regs });
        Ok(Some(id))
    }

    fn cont(&mut self, tid: Pid, signal: Option<Signal>) -> Result<()> {
        match ptrace::cont(tid, signal) {
            Ok(()) => {
                self.stopped.remove(&tid);
                Ok(())
            }
            // The thread died in the meantime; its exit is reported later
            Err(Errno::ESRCH) => {
                self.stopped.remove(&tid);
                Ok(())
            }
            Err(errno) => Err(request("PTRACE_CONT", tid)(errno)),
        }
    }

    /// Execute the original instruction at a patched `address` and put the
    /// `int3` back.
    fn step_over(&mut self, tid: Pid, address: u64) -> Result<()> {
        let Some(site) = self.sites.get(&address).copied() else {
            return Ok(());
        };

        self.write_byte(address, site.original)?;
        ptrace::step(tid, None).map_err(request("PTRACE_SINGLESTEP", tid))?;
        let status = waitpid(tid, Some(WaitPidFlag::__WALL)).map_err(request("waitpid", tid))?;
        if self.sites.contains_key(&address) {
            self.write_byte(address, INT3)?;
        }

        match status {
            WaitStatus::Stopped(_, Signal::SIGTRAP) => Ok(()),
            WaitStatus::Exited(..) | WaitStatus::Signaled(..) => {
                self.forget_thread(tid);
                Ok(())
            }
            // Any other signal is delivered on the next resume
            WaitStatus::Stopped(_, sig) => {
                self.stopped.insert(tid, Some(sig));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn forget_thread(&mut self, tid: Pid) {
        self.threads.remove(&tid);
        self.stopped.remove(&tid);
        if self.selected.is_some_and(|s| s.tid == tid) {
            self.selected = None;
        }
    }

    fn selected(&self) -> std::result::Result<&Selected, DebuggerError> {
        self.selected.as_ref().ok_or(DebuggerError::NotStopped)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Bring every running thread into a ptrace-stop.
    fn stop_all(&mut self) -> Result<()> {
        let running: Vec<Pid> = self
            .threads
            .iter()
            .filter(|tid| !self.stopped.contains_key(*tid))
            .copied()
            .collect();

        for tid in running {
            if ptrace::interrupt(tid).is_err() {
                self.forget_thread(tid);
                continue;
            }
            match wait_for_stop(tid)? {
                Some(signal) => {
                    // A trap on one of our sites is undone so the thread
                    // re-executes the original instruction after detach
                    if signal == Some(Signal::SIGTRAP) {
                        let mut regs =
                            ptrace::getregs(tid).map_err(request("PTRACE_GETREGS", tid))?;
                        let address = regs.rip.wrapping_sub(1);
                        if self.sites.contains_key(&address) || self.retired.contains(&address) {
                            regs.rip = address;
                            ptrace::setregs(tid, regs).map_err(request("PTRACE_SETREGS", tid))?;
                            self.stopped.insert(tid, None);
                            continue;
                        }
                    }
                    self.stopped.insert(tid, signal);
                }
                None => self.forget_thread(tid),
            }
        }
        Ok(())
    }

    /// Restore every patched instruction and let the target run on
    /// untraced.
    pub fn detach(mut self) -> Result<()> {
        if !self.live {
            return Ok(());
        }

        self.stop_all()?;
        let sites: Vec<(u64, Site)> = self.sites.drain().collect();
        for (address, site) in sites {
            self.write_byte(address, site.original)?;
        }
        self.breakpoints.clear();

        for (tid, signal) in std::mem::take(&mut self.stopped) {
            if let Err(errno) = ptrace::detach(tid, signal) {
                warn!(tid = tid.as_raw(), error = %errno, "Failed to detach thread");
            }
        }
        info!(pid = self.pid.as_raw(), "Detached");
        Ok(())
    }

    /// Kill a spawned target and reap it.
    pub fn kill(mut self) -> Result<()> {
        if !self.live {
            return Ok(());
        }
        match signal::kill(self.pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(errno) => return Err(request("kill", self.pid)(errno)),
        }
        if let Origin::Spawned(child) = &mut self.origin {
            if let Err(e) = child.wait() {
                warn!(pid = self.pid.as_raw(), error = %e, "Failed to reap target");
            }
        }
        self.live = false;
        info!(pid = self.pid.as_raw(), "Killed target");
        Ok(())
    }
}

/// Wait for `tid` to enter a ptrace-stop. Returns the signal to redeliver
/// on resume, or `None` if the thread exited instead.
fn wait_for_stop(tid: Pid) -> Result<Option<Option<Signal>>> {
    loop {
        match waitpid(tid, Some(WaitPidFlag::__WALL)) {
            Ok(WaitStatus::PtraceEvent(..)) => return Ok(Some(None)),
            Ok(WaitStatus::Stopped(_, Signal::SIGSTOP)) => return Ok(Some(None)),
            Ok(WaitStatus::Stopped(_, sig)) => return Ok(Some(Some(sig))),
            Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => return Ok(None),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(None),
            Err(errno) => return Err(request("waitpid", tid)(errno)),
        }
    }
}

impl Debugger for Tracer {
    fn set_breakpoint(&mut self, symbol: &str) -> std::result::Result<BreakpointId, DebuggerError> {
        if !self.live {
            return Err(DebuggerError::NoProcess);
        }
        let address = self
            .symbols
            .resolve(symbol)?
            .ok_or_else(|| DebuggerError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        self.patch(address)?;
        let id = self.allocate(Breakpoint::Entry {
            symbol: symbol.to_string(),
            address,
            hits: 0,
        });
        debug!("Breakpoint {id} at {symbol} ({address:#x})");
        Ok(id)
    }

    fn set_return_breakpoint(&mut self) -> std::result::Result<BreakpointId, DebuggerError> {
        if !self.live {
            return Err(DebuggerError::NoProcess);
        }
        let Selected { tid, regs } = *self.selected()?;

        // At function entry [rsp] holds the return address; `ret` pops it
        let return_address = self
            .read_bytes(regs.rsp, 8)
            .map(|bytes| {
                let mut word = [0u8; 8];
                word.copy_from_slice(&bytes);
                u64::from_le_bytes(word)
            })
            .map_err(|e| DebuggerError::MemoryRead {
                address: regs.rsp,
                len: 8,
                reason: e.to_string(),
            })?;

        self.patch(return_address)?;
        let id = self.allocate(Breakpoint::Return {
            address: return_address,
            tid,
            stack_pointer: regs.rsp + 8,
        });
        trace!(tid = tid.as_raw(), "Return breakpoint {id} at {return_address:#x}");
        Ok(id)
    }

    fn delete_breakpoint(&mut self, id: BreakpointId) -> std::result::Result<(), DebuggerError> {
        let breakpoint = self
            .breakpoints
            .remove(&id)
            .ok_or(DebuggerError::UnknownBreakpoint(id))?;
        if let Breakpoint::Entry { symbol, hits, .. } = &breakpoint {
            trace!("Deleted breakpoint {id} at {symbol} after {hits} hits");
        }
        self.unpatch(breakpoint.address())?;
        Ok(())
    }

    fn hit_count(&self, id: BreakpointId) -> u64 {
        match self.breakpoints.get(&id) {
            Some(Breakpoint::Entry { hits, .. }) => *hits,
            Some(Breakpoint::Return { .. }) | None => 0,
        }
    }

    fn read_memory(&self, address: u64, len: usize) -> std::result::Result<Vec<u8>, DebuggerError> {
        if !self.live {
            return Err(DebuggerError::NoProcess);
        }
        self.read_bytes(address, len)
            .map_err(|e| DebuggerError::MemoryRead {
                address,
                len,
                reason: e.to_string(),
            })
    }

    fn read_local(&self, name: &str) -> std::result::Result<u64, DebuggerError> {
        let regs = &self.selected()?.regs;
        let index = if name == sslkeylog_core::DEFAULT_CONNECTION_PARAM {
            0
        } else {
            ARGUMENT_REGISTERS
                .iter()
                .position(|r| *r == name)
                .ok_or_else(|| DebuggerError::UnknownVariable {
                    name: name.to_string(),
                })?
        };

        Ok(match index {
            0 => regs.rdi,
            1 => regs.rsi,
            2 => regs.rdx,
            3 => regs.rcx,
            4 => regs.r8,
            _ => regs.r9,
        })
    }

    fn resume(&mut self) -> std::result::Result<(), DebuggerError> {
        if !self.live {
            return Err(DebuggerError::NoProcess);
        }
        self.selected = None;

        let stopped: Vec<Pid> = self.stopped.keys().copied().collect();
        for tid in stopped {
            let rip = ptrace::getregs(tid)
                .map_err(request("PTRACE_GETREGS", tid))
                .map_err(DebuggerError::from)?
                .rip;
            if self.sites.contains_key(&rip) {
                self.step_over(tid, rip)?;
            }
            let signal = self.stopped.get(&tid).copied().flatten();
            self.cont(tid, signal)?;
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if let Origin::Spawned(child) = &mut self.origin {
            if self.live {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}
