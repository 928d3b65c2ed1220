//! `/proc/<pid>` helpers: memory maps, thread ids and the auxiliary vector.

use std::fs;
use std::path::PathBuf;

use crate::error::{Result, TraceError};

/// `AT_ENTRY`: program entry point in the auxiliary vector.
pub const AT_ENTRY: u64 = 9;

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    /// Backing file, if the mapping has one
    pub path: Option<PathBuf>,
}

impl MapEntry {
    pub fn is_executable(&self) -> bool {
        self.perms.as_bytes().get(2) == Some(&b'x')
    }
}

/// A file-backed object mapped into the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedObject {
    pub path: PathBuf,
    /// Start of the mapping that covers file offset 0
    pub base: u64,
}

fn proc_path(pid: i32, file: &str) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/{file}"))
}

/// Read and parse `/proc/<pid>/maps`.
pub fn read_maps(pid: i32) -> Result<Vec<MapEntry>> {
    let path = proc_path(pid, "maps");
    let content = fs::read_to_string(&path).map_err(|source| TraceError::Procfs {
        path: path.clone(),
        source,
    })?;
    parse_maps(&content).map_err(|reason| TraceError::MalformedProcfs { path, reason })
}

/// Parse the text of a maps file.
///
/// ```text
/// 7f1c2a400000-7f1c2a465000 r--p 00000000 fd:01 1234  /usr/lib/libssl.so.1.0.2
/// ```
pub fn parse_maps(content: &str) -> std::result::Result<Vec<MapEntry>, String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_maps_line)
        .collect()
}

fn parse_maps_line(line: &str) -> std::result::Result<MapEntry, String> {
    let mut fields = line.splitn(6, char::is_whitespace);
    let range = fields.next().unwrap_or_default();
    let perms = fields.next().unwrap_or_default();
    let offset = fields.next().unwrap_or_default();
    // dev and inode are not needed
    let _dev = fields.next();
    let _inode = fields.next();
    let path = fields.next().map(str::trim).unwrap_or_default();

    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| format!("bad address range in line: {line}"))?;
    let parse_hex = |s: &str| {
        u64::from_str_radix(s, 16).map_err(|e| format!("bad hex value '{s}': {e}"))
    };

    let path =
        (path.starts_with('/') && !path.ends_with(" (deleted)")).then(|| PathBuf::from(path));

    Ok(MapEntry {
        start: parse_hex(start)?,
        end: parse_hex(end)?,
        perms: perms.to_string(),
        offset: parse_hex(offset)?,
        path,
    })
}

/// Distinct file-backed objects in mapping order, with their base address.
///
/// Objects that have an executable mapping but no mapping at offset 0 are
/// skipped.
pub fn mapped_objects(maps: &[MapEntry]) -> Vec<MappedObject> {
    let mut objects: Vec<MappedObject> = Vec::new();
    let mut executable: Vec<&PathBuf> = Vec::new();

    for entry in maps {
        let Some(path) = &entry.path else { continue };
        if entry.is_executable() && !executable.contains(&path) {
            executable.push(path);
        }
        if entry.offset == 0 && !objects.iter().any(|o| &o.path == path) {
            objects.push(MappedObject {
                path: path.clone(),
                base: entry.start,
            });
        }
    }

    objects.retain(|o| executable.contains(&&o.path));
    objects
}

/// Thread ids of the target.
pub fn list_tasks(pid: i32) -> Result<Vec<i32>> {
    let path = proc_path(pid, "task");
    let dir = fs::read_dir(&path).map_err(|source| TraceError::Procfs {
        path: path.clone(),
        source,
    })?;

    let mut tids: Vec<i32> = dir
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().and_then(|s| s.parse().ok()))
        .collect();
    tids.sort_unstable();
    Ok(tids)
}

/// Look up `key` in `/proc/<pid>/auxv`.
pub fn read_auxv_entry(pid: i32, key: u64) -> Result<Option<u64>> {
    let path = proc_path(pid, "auxv");
    let bytes = fs::read(&path).map_err(|source| TraceError::Procfs { path, source })?;
    Ok(find_auxv_entry(&bytes, key))
}

/// Scan native-endian `(type, value)` pairs of an auxiliary vector, stopping
/// at `AT_NULL`.
pub fn find_auxv_entry(bytes: &[u8], key: u64) -> Option<u64> {
    bytes
        .chunks_exact(16)
        .map(|pair| {
            let (kind, value) = pair.split_at(8);
            (
                u64::from_ne_bytes(kind.try_into().unwrap_or_default()),
                u64::from_ne_bytes(value.try_into().unwrap_or_default()),
            )
        })
        .take_while(|&(kind, _)| kind != 0)
        .find(|&(kind, _)| kind == key)
        .map(|(_, value)| value)
}
