//! Append-only key log writer with client-random deduplication.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::KeyLogError;
use crate::extract::{CLIENT_RANDOM_LEN, MASTER_SECRET_LEN};

/// Comment written at the top of a fresh key log.
pub const KEYLOG_HEADER: &str = "# Automatically generated by sslkeylog.py\n";

/// Format one `CLIENT_RANDOM` line, newline included.
pub fn format_line(
    client_random: &[u8; CLIENT_RANDOM_LEN],
    master_secret: &[u8; MASTER_SECRET_LEN],
) -> String {
    format!(
        "CLIENT_RANDOM {} {}\n",
        hex::encode_upper(client_random),
        hex::encode_upper(master_secret)
    )
}

/// Open key log file plus the set of client randoms already written to it.
///
/// Writes go straight to the file without buffering so that every line
/// survives an abrupt end of the debugging session. The fingerprint set
/// lives only as long as this value: it is never loaded from an existing
/// file.
#[derive(Debug)]
pub struct KeyLog {
    file: File,
    path: PathBuf,
    logged: HashSet<[u8; CLIENT_RANDOM_LEN]>,
}

impl KeyLog {
    /// Open `path` for appending, creating it if needed.
    ///
    /// Falls back to plain write mode when the medium cannot seek (pipes,
    /// character devices). The header is written only if a size probe shows
    /// the file is empty; it is skipped when the probe itself fails.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, KeyLogError> {
        let path = path.as_ref();
        let mut file = open_for_append(path).map_err(|source| KeyLogError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        if needs_header(&mut file) {
            file.write_all(KEYLOG_HEADER.as_bytes())
                .map_err(KeyLogError::Write)?;
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            logged: HashSet::new(),
        })
    }

    /// Record key material for a session.
    ///
    /// Returns `Ok(false)` without touching the file when `client_random`
    /// was already logged by this instance.
    pub fn observe(
        &mut self,
        client_random: &[u8; CLIENT_RANDOM_LEN],
        master_secret: &[u8; MASTER_SECRET_LEN],
    ) -> Result<bool, KeyLogError> {
        if self.logged.contains(client_random) {
            return Ok(false);
        }

        let line = format_line(client_random, master_secret);
        self.file
            .write_all(line.as_bytes())
            .map_err(KeyLogError::Write)?;
        self.logged.insert(*client_random);

        debug!(
            client_random = %hex::encode_upper(client_random),
            "Logged new session key"
        );
        Ok(true)
    }

    /// Check if a client random has been logged.
    pub fn contains(&self, client_random: &[u8; CLIENT_RANDOM_LEN]) -> bool {
        self.logged.contains(client_random)
    }

    /// Number of distinct client randoms logged.
    pub fn len(&self) -> usize {
        self.logged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logged.is_empty()
    }

    /// Path the log was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the file and return the number of distinct client randoms
    /// logged.
    pub fn close(self) -> usize {
        self.logged.len()
    }
}

fn open_for_append(path: &Path) -> io::Result<File> {
    match OpenOptions::new().append(true).create(true).open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::NotSeekable => {
            debug!(path = %path.display(), "Append not supported, using write mode");
            OpenOptions::new().write(true).create(true).open(path)
        }
        Err(e) => Err(e),
    }
}

fn needs_header(file: &mut File) -> bool {
    matches!(file.seek(SeekFrom::End(0)), Ok(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const CR_A: [u8; 32] = [0xab; 32];
    const MS_A: [u8; 48] = [0xcd; 48];

    #[test]
    fn test_line_format() {
        let line = format_line(&CR_A, &MS_A);
        let expected = format!("CLIENT_RANDOM {} {}\n", "AB".repeat(32), "CD".repeat(48));
        assert_eq!(line, expected);
        assert_eq!(line.len(), "CLIENT_RANDOM ".len() + 64 + 1 + 96 + 1);
    }

    #[test]
    fn test_header_written_to_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");

        let keylog = KeyLog::create(&path).unwrap();
        assert!(keylog.is_empty());
        assert_eq!(keylog.path(), path.as_path());
        drop(keylog);

        assert_eq!(fs::read_to_string(&path).unwrap(), KEYLOG_HEADER);
    }

    #[test]
    fn test_header_written_to_existing_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");
        fs::write(&path, "").unwrap();

        KeyLog::create(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), KEYLOG_HEADER);
    }

    #[test]
    fn test_no_header_for_non_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");
        let existing = format_line(&[0x01; 32], &[0x02; 48]);
        fs::write(&path, &existing).unwrap();

        let mut keylog = KeyLog::create(&path).unwrap();
        keylog.observe(&CR_A, &MS_A).unwrap();
        drop(keylog);

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains(KEYLOG_HEADER));
        assert_eq!(content, format!("{existing}{}", format_line(&CR_A, &MS_A)));
    }

    #[test]
    fn test_reopen_keeps_single_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");

        let mut first = KeyLog::create(&path).unwrap();
        first.observe(&CR_A, &MS_A).unwrap();
        assert_eq!(first.close(), 1);

        // A new instance starts with an empty fingerprint set
        let mut second = KeyLog::create(&path).unwrap();
        assert!(second.observe(&CR_A, &MS_A).unwrap());
        drop(second);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(KEYLOG_HEADER).count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_observe_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");

        let mut keylog = KeyLog::create(&path).unwrap();
        assert!(keylog.observe(&CR_A, &MS_A).unwrap());
        assert!(!keylog.observe(&CR_A, &MS_A).unwrap());
        // Same fingerprint with a different secret is still a duplicate
        assert!(!keylog.observe(&CR_A, &[0xee; 48]).unwrap());
        assert_eq!(keylog.len(), 1);
        assert!(keylog.contains(&CR_A));
        drop(keylog);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{KEYLOG_HEADER}{}", format_line(&CR_A, &MS_A)));
    }

    #[test]
    fn test_distinct_fingerprints_in_call_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");
        let cr_b = [0x01; 32];
        let ms_b = [0x02; 48];

        let mut keylog = KeyLog::create(&path).unwrap();
        keylog.observe(&CR_A, &MS_A).unwrap();
        keylog.observe(&cr_b, &ms_b).unwrap();
        assert_eq!(keylog.close(), 2);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], format_line(&CR_A, &MS_A).trim_end());
        assert_eq!(lines[2], format_line(&cr_b, &ms_b).trim_end());
    }

    #[test]
    fn test_writes_are_visible_before_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.log");

        let mut keylog = KeyLog::create(&path).unwrap();
        keylog.observe(&CR_A, &MS_A).unwrap();

        // Still open: the line must already be on disk
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with(&format_line(&CR_A, &MS_A)));
        drop(keylog);
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_gets_no_header() {
        use nix::sys::stat::Mode;
        use nix::unistd::mkfifo;
        use std::thread;

        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.fifo");
        mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();

        let reader = {
            let path = path.clone();
            thread::spawn(move || fs::read_to_string(path).unwrap())
        };

        // Opening the write end blocks until the reader has opened its end
        let mut keylog = KeyLog::create(&path).unwrap();
        assert!(keylog.observe(&CR_A, &MS_A).unwrap());
        assert_eq!(keylog.close(), 1);

        assert_eq!(reader.join().unwrap(), format_line(&CR_A, &MS_A));
    }

    #[test]
    fn test_open_failure_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("keys.log");

        let result = KeyLog::create(&path);
        assert!(matches!(result, Err(KeyLogError::Open { .. })));
    }
}
