//! Session controller integration tests.
//!
//! These tests drive a full session against the in-memory debugger: entry
//! hits arm return watchers, returns extract key material out of simulated
//! `SSL` objects, and the resulting key log is read back from disk.

use std::fs;
use std::path::{Path, PathBuf};

use sslkeylog_core::test_utils::{ConnectionImage, FakeDebugger};
use sslkeylog_core::{
    format_line, BreakpointId, Config, DebuggerError, EntryPoint, Error, FireOutcome, HitOutcome,
    KeyLogFile, SessionController, StructLayout, KEYLOG_HEADER,
};
use tempfile::{tempdir, TempDir};

// ============================================================================
// Test Constants
// ============================================================================

const SSL_A: u64 = 0x10_0000;
const SSL_B: u64 = 0x20_0000;

const CLIENT_RANDOM_A: [u8; 32] = [0xab; 32];
const MASTER_SECRET_A: [u8; 48] = [0xcd; 48];

const CLIENT_RANDOM_B: [u8; 32] = [0x01; 32];
const MASTER_SECRET_B: [u8; 48] = [0x02; 48];

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    _dir: TempDir,
    path: PathBuf,
    dbg: FakeDebugger,
    session: SessionController,
}

impl Harness {
    fn started() -> Self {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");
        let mut dbg = FakeDebugger::new();
        let mut session = SessionController::new(Config::default());
        session.start(&mut dbg, Some(path.clone()), true).unwrap();
        Self {
            _dir: dir,
            path,
            dbg,
            session,
        }
    }

    fn connection(&mut self, image: ConnectionImage) {
        image.write_to(&mut self.dbg, &StructLayout::default());
    }

    /// Stop at `entry_point` with `s == ssl` and return the armed return
    /// breakpoint.
    fn enter(&mut self, entry_point: EntryPoint, ssl: u64) -> BreakpointId {
        let id = self.dbg.breakpoint_for(entry_point.symbol()).unwrap();
        self.dbg.trigger(id);
        self.dbg.set_local("s", ssl);
        match self.session.handle_breakpoint(&mut self.dbg, id).unwrap() {
            HitOutcome::Armed {
                entry_point: hit,
                return_breakpoint,
            } => {
                assert_eq!(hit, entry_point);
                return_breakpoint
            }
            other => panic!("expected an armed return watcher, got {other:?}"),
        }
    }

    /// Return from the call that armed `id`.
    fn leave(&mut self, id: BreakpointId) -> FireOutcome {
        assert!(self.dbg.trigger(id));
        match self.session.handle_breakpoint(&mut self.dbg, id).unwrap() {
            HitOutcome::Fired { outcome, .. } => outcome,
            other => panic!("expected a fired return watcher, got {other:?}"),
        }
    }

    fn contents(&self) -> String {
        read(&self.path)
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ============================================================================
// Logging Tests
// ============================================================================

#[test]
fn test_handshake_logs_one_line() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));

    let ret = h.enter(EntryPoint::Connect, SSL_A);
    assert_eq!(h.leave(ret), FireOutcome::Logged);

    let expected = format!(
        "{KEYLOG_HEADER}CLIENT_RANDOM {} {}\n",
        "AB".repeat(32),
        "CD".repeat(48)
    );
    assert_eq!(h.contents(), expected);
    assert_eq!(h.session.stop(&mut h.dbg), Some(1));
}

#[test]
fn test_repeated_calls_log_once() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));

    let ret = h.enter(EntryPoint::Connect, SSL_A);
    assert_eq!(h.leave(ret), FireOutcome::Logged);
    for _ in 0..3 {
        let ret = h.enter(EntryPoint::Read, SSL_A);
        assert_eq!(h.leave(ret), FireOutcome::Duplicate);
        let ret = h.enter(EntryPoint::Write, SSL_A);
        assert_eq!(h.leave(ret), FireOutcome::Duplicate);
    }

    let parsed = KeyLogFile::from_file(&h.path).unwrap();
    assert_eq!(parsed.entry_count(), 1);
    assert!(parsed.duplicate_client_randoms().is_empty());
    assert_eq!(h.session.stop(&mut h.dbg), Some(1));
}

#[test]
fn test_distinct_connections_are_isolated() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));
    h.connection(ConnectionImage::new(SSL_B).with_keys(CLIENT_RANDOM_B, MASTER_SECRET_B));

    let ret = h.enter(EntryPoint::Connect, SSL_A);
    h.leave(ret);
    let ret = h.enter(EntryPoint::Accept, SSL_B);
    h.leave(ret);

    let parsed = KeyLogFile::from_file(&h.path).unwrap();
    assert_eq!(parsed.session_count(), 2);
    assert_eq!(parsed.master_secret(&CLIENT_RANDOM_A), Some(MASTER_SECRET_A));
    assert_eq!(parsed.master_secret(&CLIENT_RANDOM_B), Some(MASTER_SECRET_B));
    assert_eq!(
        h.contents(),
        format!(
            "{KEYLOG_HEADER}{}{}",
            format_line(&CLIENT_RANDOM_A, &MASTER_SECRET_A),
            format_line(&CLIENT_RANDOM_B, &MASTER_SECRET_B)
        )
    );
}

#[test]
fn test_keys_become_available_after_handshake() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).without_session());

    // Handshake still in progress when SSL_do_handshake returns
    let ret = h.enter(EntryPoint::DoHandshake, SSL_A);
    assert_eq!(h.leave(ret), FireOutcome::NoKeyMaterial);
    assert_eq!(h.contents(), KEYLOG_HEADER);

    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));
    let ret = h.enter(EntryPoint::DoHandshake, SSL_A);
    assert_eq!(h.leave(ret), FireOutcome::Logged);
    assert_eq!(h.session.keys_logged(), 1);
}

#[test]
fn test_gating_conditions_produce_no_lines() {
    let mut h = Harness::started();

    let cases = [
        ConnectionImage::new(SSL_A).without_session(),
        ConnectionImage::new(SSL_A)
            .with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A)
            .master_key_length(0),
        ConnectionImage::new(SSL_A)
            .with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A)
            .without_s3(),
    ];
    for image in cases {
        h.connection(image);
        let ret = h.enter(EntryPoint::Read, SSL_A);
        assert_eq!(h.leave(ret), FireOutcome::NoKeyMaterial);
    }

    assert_eq!(h.contents(), KEYLOG_HEADER);
    assert_eq!(h.session.stop(&mut h.dbg), Some(0));
}

// ============================================================================
// Watcher Scoping Tests
// ============================================================================

#[test]
fn test_interleaved_calls_keep_their_own_connection() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));
    h.connection(ConnectionImage::new(SSL_B).with_keys(CLIENT_RANDOM_B, MASTER_SECRET_B));

    // entry A, entry B, return B, return A
    let ret_a = h.enter(EntryPoint::Read, SSL_A);
    let ret_b = h.enter(EntryPoint::Write, SSL_B);
    assert_ne!(ret_a, ret_b);
    assert_eq!(h.session.pending_returns(), 2);

    // The frame now reports B; return A must still use the handle captured
    // at its own entry
    assert_eq!(h.leave(ret_b), FireOutcome::Logged);
    assert_eq!(h.leave(ret_a), FireOutcome::Logged);
    assert_eq!(h.session.pending_returns(), 0);

    let lines: Vec<_> = h.contents().lines().skip(1).map(str::to_string).collect();
    assert_eq!(
        lines,
        vec![
            format_line(&CLIENT_RANDOM_B, &MASTER_SECRET_B).trim_end().to_string(),
            format_line(&CLIENT_RANDOM_A, &MASTER_SECRET_A).trim_end().to_string(),
        ]
    );
}

#[test]
fn test_return_watcher_fires_once() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));

    let ret = h.enter(EntryPoint::Connect, SSL_A);
    h.leave(ret);

    // The debugger no longer knows the id; a stray event is ignored
    assert!(!h.dbg.is_armed(ret));
    assert_eq!(
        h.session.handle_breakpoint(&mut h.dbg, ret).unwrap(),
        HitOutcome::Ignored
    );
}

#[test]
fn test_entry_hit_does_not_resume() {
    let mut h = Harness::started();
    let resumes = h.dbg.resume_count();

    h.enter(EntryPoint::Read, SSL_A);
    assert_eq!(h.dbg.resume_count(), resumes);
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[test]
fn test_disable_then_hit_is_ignored() {
    let mut h = Harness::started();
    let read = h.dbg.breakpoint_for("SSL_read").unwrap();

    let stats = h.session.disable(&mut h.dbg);
    assert_eq!(stats.len(), 5);
    assert!(h.session.watches().is_empty());

    // An event for the deleted breakpoint still reaches the controller
    assert_eq!(
        h.session.handle_breakpoint(&mut h.dbg, read).unwrap(),
        HitOutcome::Ignored
    );
    assert_eq!(h.session.pending_returns(), 0);
    assert_eq!(h.contents(), KEYLOG_HEADER);
}

#[test]
fn test_return_watchers_survive_disable() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));

    let ret = h.enter(EntryPoint::Connect, SSL_A);
    h.session.disable(&mut h.dbg);

    assert!(h.dbg.is_armed(ret));
    assert_eq!(h.leave(ret), FireOutcome::Logged);
}

#[test]
fn test_return_after_stop_is_noop() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));

    let ret = h.enter(EntryPoint::Connect, SSL_A);
    assert_eq!(h.session.stop(&mut h.dbg), Some(0));

    assert_eq!(h.leave(ret), FireOutcome::LogClosed);
    assert_eq!(h.contents(), KEYLOG_HEADER);
}

#[test]
fn test_double_enable_keeps_watchers() {
    let mut h = Harness::started();
    let before: Vec<_> = EntryPoint::ALL
        .iter()
        .map(|e| h.session.watches().get(*e).unwrap().breakpoint())
        .collect();

    h.session.enable(&mut h.dbg).unwrap();

    let after: Vec<_> = EntryPoint::ALL
        .iter()
        .map(|e| h.session.watches().get(*e).unwrap().breakpoint())
        .collect();
    assert_eq!(before, after);
    assert_eq!(h.dbg.entry_breakpoints(), 5);
    assert_eq!(h.contents().matches(KEYLOG_HEADER).count(), 1);
}

#[test]
fn test_restart_appends_without_second_header() {
    let mut h = Harness::started();
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));
    let ret = h.enter(EntryPoint::Connect, SSL_A);
    h.leave(ret);
    assert_eq!(h.session.stop(&mut h.dbg), Some(1));

    h.session.start(&mut h.dbg, None, true).unwrap();
    // Fresh fingerprint set: the same session is written again
    let ret = h.enter(EntryPoint::Read, SSL_A);
    assert_eq!(h.leave(ret), FireOutcome::Logged);
    assert_eq!(h.session.stop(&mut h.dbg), Some(1));

    let contents = h.contents();
    assert_eq!(contents.matches(KEYLOG_HEADER).count(), 1);
    let parsed = KeyLogFile::parse(&contents).unwrap();
    assert_eq!(parsed.entry_count(), 2);
    assert_eq!(parsed.duplicate_client_randoms(), vec![CLIENT_RANDOM_A]);
}

#[test]
fn test_stop_without_start() {
    let mut dbg = FakeDebugger::new();
    let mut session = SessionController::new(Config::default());
    assert_eq!(session.stop(&mut dbg), None);
    assert_eq!(dbg.entry_breakpoints(), 0);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_failing_return_watcher_is_removed() {
    let mut h = Harness::started();

    // Nothing mapped at SSL_A: the read at return fails
    let ret = h.enter(EntryPoint::Read, SSL_A);
    h.dbg.trigger(ret);
    let result = h.session.handle_breakpoint(&mut h.dbg, ret);
    assert!(matches!(
        result,
        Err(Error::Debugger(DebuggerError::MemoryRead { .. }))
    ));
    assert_eq!(h.session.pending_returns(), 0);

    // Watchers are untouched and later calls still work
    h.connection(ConnectionImage::new(SSL_A).with_keys(CLIENT_RANDOM_A, MASTER_SECRET_A));
    let ret = h.enter(EntryPoint::Read, SSL_A);
    assert_eq!(h.leave(ret), FireOutcome::Logged);
}

#[test]
fn test_missing_connection_parameter() {
    let dir = tempdir().unwrap();
    let mut dbg = FakeDebugger::new();
    let mut session = SessionController::new(
        Config::default()
            .with_output_path(dir.path().join("keys.log"))
            .with_connection_param("ssl"),
    );
    session.start(&mut dbg, None, true).unwrap();

    dbg.set_local("s", SSL_A);
    let id = dbg.breakpoint_for("SSL_connect").unwrap();
    let result = session.handle_breakpoint(&mut dbg, id);
    assert!(matches!(
        result,
        Err(Error::Debugger(DebuggerError::UnknownVariable { .. }))
    ));
    assert_eq!(session.pending_returns(), 0);
}

#[test]
fn test_missing_symbol_fails_enable() {
    let dir = tempdir().unwrap();
    let mut dbg = FakeDebugger::with_symbols(&["SSL_connect", "SSL_read"]);
    let mut session =
        SessionController::new(Config::default().with_output_path(dir.path().join("keys.log")));

    let result = session.start(&mut dbg, None, true);
    assert!(matches!(
        result,
        Err(Error::Debugger(DebuggerError::SymbolNotFound { .. }))
    ));
    assert_eq!(dbg.resume_count(), 0);
}
