//! Test utilities: an in-memory debugger and a builder for `SSL` object
//! images.
//!
//! Available to unit tests and, through the `test-utils` feature, to
//! integration tests and other crates.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::debugger::{BreakpointId, Debugger};
use crate::error::DebuggerError;
use crate::extract::{CLIENT_RANDOM_LEN, MASTER_SECRET_LEN};
use crate::layout::{IntWidth, StructLayout};
use crate::watch::EntryPoint;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Entry(String),
    Return,
}

#[derive(Debug)]
struct Breakpoint {
    kind: Kind,
    hits: u64,
}

/// Scripted [`Debugger`] backed by plain maps.
///
/// Memory is a set of non-overlapping regions. Locals are whatever the test
/// set last. Return breakpoints behave like the real thing: they are removed
/// when triggered.
#[derive(Debug)]
pub struct FakeDebugger {
    regions: BTreeMap<u64, Vec<u8>>,
    locals: HashMap<String, u64>,
    symbols: HashSet<String>,
    breakpoints: BTreeMap<BreakpointId, Breakpoint>,
    next_id: u64,
    resumes: usize,
    live: bool,
}

impl Default for FakeDebugger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDebugger {
    /// A live target exporting the five instrumented entry points.
    pub fn new() -> Self {
        let symbols: Vec<&str> = EntryPoint::ALL.iter().map(|e| e.symbol()).collect();
        Self::with_symbols(&symbols)
    }

    /// A live target that only resolves `symbols`.
    pub fn with_symbols(symbols: &[&str]) -> Self {
        Self {
            regions: BTreeMap::new(),
            locals: HashMap::new(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            breakpoints: BTreeMap::new(),
            next_id: 1,
            resumes: 0,
            live: true,
        }
    }

    /// Map `bytes` at `address`, replacing any region starting there.
    pub fn map(&mut self, address: u64, bytes: Vec<u8>) {
        self.regions.insert(address, bytes);
    }

    /// Set the value of a local in the selected frame.
    pub fn set_local(&mut self, name: &str, value: u64) {
        self.locals.insert(name.to_string(), value);
    }

    /// Mark the target as exited (or alive again).
    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    /// Simulate the target stopping at breakpoint `id`.
    ///
    /// Return breakpoints are one-shot and disappear here. Returns `false`
    /// when `id` is not armed.
    pub fn trigger(&mut self, id: BreakpointId) -> bool {
        let Some(bp) = self.breakpoints.get_mut(&id) else {
            return false;
        };
        bp.hits += 1;
        if bp.kind == Kind::Return {
            self.breakpoints.remove(&id);
        }
        true
    }

    /// Entry breakpoint armed on `symbol`, if any. The lowest id wins when
    /// several are armed.
    pub fn breakpoint_for(&self, symbol: &str) -> Option<BreakpointId> {
        self.breakpoints
            .iter()
            .find(|(_, bp)| matches!(&bp.kind, Kind::Entry(s) if s == symbol))
            .map(|(id, _)| *id)
    }

    /// Check if a breakpoint is currently armed.
    pub fn is_armed(&self, id: BreakpointId) -> bool {
        self.breakpoints.contains_key(&id)
    }

    /// Number of entry breakpoints currently armed.
    pub fn entry_breakpoints(&self) -> usize {
        self.breakpoints
            .values()
            .filter(|bp| matches!(bp.kind, Kind::Entry(_)))
            .count()
    }

    /// Number of return breakpoints currently armed.
    pub fn return_breakpoints(&self) -> usize {
        self.breakpoints
            .values()
            .filter(|bp| bp.kind == Kind::Return)
            .count()
    }

    /// Ids of the return breakpoints currently armed, oldest first.
    pub fn return_breakpoint_ids(&self) -> Vec<BreakpointId> {
        self.breakpoints
            .iter()
            .filter(|(_, bp)| bp.kind == Kind::Return)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of times the target was resumed.
    pub fn resume_count(&self) -> usize {
        self.resumes
    }

    fn allocate(&mut self, kind: Kind) -> BreakpointId {
        let id = BreakpointId(self.next_id);
        self.next_id += 1;
        self.breakpoints.insert(id, Breakpoint { kind, hits: 0 });
        id
    }

    fn ensure_live(&self) -> Result<(), DebuggerError> {
        if self.live {
            Ok(())
        } else {
            Err(DebuggerError::NoProcess)
        }
    }
}

impl Debugger for FakeDebugger {
    fn set_breakpoint(&mut self, symbol: &str) -> Result<BreakpointId, DebuggerError> {
        self.ensure_live()?;
        if !self.symbols.contains(symbol) {
            return Err(DebuggerError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(self.allocate(Kind::Entry(symbol.to_string())))
    }

    fn set_return_breakpoint(&mut self) -> Result<BreakpointId, DebuggerError> {
        self.ensure_live()?;
        Ok(self.allocate(Kind::Return))
    }

    fn delete_breakpoint(&mut self, id: BreakpointId) -> Result<(), DebuggerError> {
        self.breakpoints
            .remove(&id)
            .map(|_| ())
            .ok_or(DebuggerError::UnknownBreakpoint(id))
    }

    fn hit_count(&self, id: BreakpointId) -> u64 {
        self.breakpoints.get(&id).map_or(0, |bp| bp.hits)
    }

    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>, DebuggerError> {
        self.ensure_live()?;
        let unmapped = || DebuggerError::MemoryRead {
            address,
            len,
            reason: "unmapped".to_string(),
        };

        let (&start, bytes) = self.regions.range(..=address).next_back().ok_or_else(unmapped)?;
        let offset = (address - start) as usize;
        let end = offset.checked_add(len).ok_or_else(unmapped)?;
        bytes.get(offset..end).map(<[u8]>::to_vec).ok_or_else(unmapped)
    }

    fn read_local(&self, name: &str) -> Result<u64, DebuggerError> {
        self.ensure_live()?;
        self.locals
            .get(name)
            .copied()
            .ok_or_else(|| DebuggerError::UnknownVariable {
                name: name.to_string(),
            })
    }

    fn resume(&mut self) -> Result<(), DebuggerError> {
        self.ensure_live()?;
        self.resumes += 1;
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Distance between the `SSL`, session and `s3` objects of one image.
const OBJECT_STRIDE: u64 = 0x1000;

/// Builder for the three in-memory objects the extractor walks.
///
/// The `SSL` object lives at the given address, the session and `s3`
/// objects at fixed strides above it.
///
/// ```ignore
/// ConnectionImage::new(0x4000)
///     .with_keys([0x11; 32], [0x22; 48])
///     .write_to(&mut dbg, &layout);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionImage {
    ssl: u64,
    client_random: [u8; CLIENT_RANDOM_LEN],
    master_secret: [u8; MASTER_SECRET_LEN],
    master_key_length: i64,
    has_session: bool,
    has_s3: bool,
}

impl ConnectionImage {
    /// An image with zeroed key material and a full-length master key.
    pub fn new(ssl: u64) -> Self {
        Self {
            ssl,
            client_random: [0; CLIENT_RANDOM_LEN],
            master_secret: [0; MASTER_SECRET_LEN],
            master_key_length: MASTER_SECRET_LEN as i64,
            has_session: true,
            has_s3: true,
        }
    }

    pub fn with_keys(
        mut self,
        client_random: [u8; CLIENT_RANDOM_LEN],
        master_secret: [u8; MASTER_SECRET_LEN],
    ) -> Self {
        self.client_random = client_random;
        self.master_secret = master_secret;
        self
    }

    pub fn master_key_length(mut self, length: i64) -> Self {
        self.master_key_length = length;
        self
    }

    /// Leave `ssl->session` null, as before the handshake.
    pub fn without_session(mut self) -> Self {
        self.has_session = false;
        self
    }

    /// Leave `ssl->s3` null.
    pub fn without_s3(mut self) -> Self {
        self.has_s3 = false;
        self
    }

    /// Address of the session object.
    pub fn session_address(&self) -> u64 {
        self.ssl + OBJECT_STRIDE
    }

    /// Address of the `s3` object.
    pub fn s3_address(&self) -> u64 {
        self.ssl + 2 * OBJECT_STRIDE
    }

    /// Map the objects into `dbg` using `layout`. Re-writing an image at the
    /// same address replaces the previous one.
    pub fn write_to(&self, dbg: &mut FakeDebugger, layout: &StructLayout) {
        let session = if self.has_session { self.session_address() } else { 0 };
        let s3 = if self.has_s3 { self.s3_address() } else { 0 };

        let mut ssl = vec![0u8; (layout.ssl_session.max(layout.ssl_s3) + 8) as usize];
        put(&mut ssl, layout.ssl_session, &session.to_le_bytes());
        put(&mut ssl, layout.ssl_s3, &s3.to_le_bytes());
        dbg.map(self.ssl, ssl);

        let width = layout.master_key_length_width;
        let session_len = (layout.session_master_key_length + width.bytes() as u64)
            .max(layout.session_master_key + MASTER_SECRET_LEN as u64);
        let mut session_obj = vec![0u8; session_len as usize];
        match width {
            IntWidth::Four => put(
                &mut session_obj,
                layout.session_master_key_length,
                &(self.master_key_length as i32).to_le_bytes(),
            ),
            IntWidth::Eight => put(
                &mut session_obj,
                layout.session_master_key_length,
                &self.master_key_length.to_le_bytes(),
            ),
        }
        put(&mut session_obj, layout.session_master_key, &self.master_secret);
        dbg.map(self.session_address(), session_obj);

        let mut s3_obj = vec![0u8; layout.s3_client_random as usize + CLIENT_RANDOM_LEN];
        put(&mut s3_obj, layout.s3_client_random, &self.client_random);
        dbg.map(self.s3_address(), s3_obj);
    }
}

fn put(buf: &mut [u8], offset: u64, bytes: &[u8]) {
    let offset = offset as usize;
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}
