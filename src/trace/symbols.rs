//! Symbol resolution against the objects mapped into the target.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use object::{Object, ObjectKind, ObjectSegment, ObjectSymbol};
use tracing::{debug, trace};

use super::procfs::{self, MappedObject};
use crate::error::{Result, TraceError};

/// Function symbols of one ELF object, relative to its link address.
#[derive(Debug, Default)]
struct ObjectSymbols {
    functions: HashMap<String, u64>,
    /// Lowest `PT_LOAD` address, page aligned
    link_base: u64,
    /// Position independent (`ET_DYN`); absolute addresses otherwise
    relocatable: bool,
}

impl ObjectSymbols {
    fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|source| TraceError::Procfs {
            path: path.to_path_buf(),
            source,
        })?;
        let file = object::File::parse(&*data).map_err(|e| TraceError::Elf {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut functions = HashMap::new();
        // Exported symbols first; the static table only fills gaps
        for symbol in file.dynamic_symbols().chain(file.symbols()) {
            if !symbol.is_definition() || symbol.address() == 0 {
                continue;
            }
            if let Ok(name) = symbol.name() {
                // Strip symbol versions (SSL_read@@OPENSSL_1.0.0)
                let name = name.split('@').next().unwrap_or(name);
                functions
                    .entry(name.to_string())
                    .or_insert_with(|| symbol.address());
            }
        }

        let link_base = file
            .segments()
            .map(|segment| segment.address())
            .min()
            .unwrap_or(0)
            & !0xfff;

        Ok(Self {
            functions,
            link_base,
            relocatable: file.kind() == ObjectKind::Dynamic,
        })
    }

    fn runtime_address(&self, symbol: &str, load_base: u64) -> Option<u64> {
        let address = *self.functions.get(symbol)?;
        if self.relocatable {
            Some(load_base.wrapping_sub(self.link_base).wrapping_add(address))
        } else {
            Some(address)
        }
    }
}

/// Resolves function names to runtime addresses in a traced process.
///
/// Parsed objects are cached by path; the memory map is re-read on every
/// lookup so libraries loaded after attach are found too.
#[derive(Debug)]
pub struct SymbolResolver {
    pid: i32,
    objects: HashMap<PathBuf, ObjectSymbols>,
}

impl SymbolResolver {
    pub fn new(pid: i32) -> Self {
        Self {
            pid,
            objects: HashMap::new(),
        }
    }

    /// Runtime address of `symbol`, searching objects in mapping order.
    pub fn resolve(&mut self, symbol: &str) -> Result<Option<u64>> {
        let maps = procfs::read_maps(self.pid)?;
        for MappedObject { path, base } in procfs::mapped_objects(&maps) {
            if !self.objects.contains_key(&path) {
                match ObjectSymbols::load(&path) {
                    Ok(symbols) => {
                        self.objects.insert(path.clone(), symbols);
                    }
                    Err(e) => {
                        // Not every mapped file is an ELF object we can read
                        trace!(path = %path.display(), error = %e, "Skipping mapped object");
                        continue;
                    }
                }
            }
            let symbols = &self.objects[&path];

            if let Some(address) = symbols.runtime_address(symbol, base) {
                debug!(path = %path.display(), "Resolved {symbol} at {address:#x}");
                return Ok(Some(address));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_address() {
        let mut functions = HashMap::new();
        functions.insert("SSL_read".to_string(), 0x3b4a0);

        let shared = ObjectSymbols {
            functions: functions.clone(),
            link_base: 0,
            relocatable: true,
        };
        assert_eq!(
            shared.runtime_address("SSL_read", 0x7f3a2d200000),
            Some(0x7f3a2d23b4a0)
        );
        assert_eq!(shared.runtime_address("SSL_write", 0x7f3a2d200000), None);

        let fixed = ObjectSymbols {
            functions,
            link_base: 0x400000,
            relocatable: false,
        };
        assert_eq!(fixed.runtime_address("SSL_read", 0x400000), Some(0x3b4a0));
    }

    #[test]
    fn test_load_non_elf_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-elf.so");
        fs::write(&path, b"plain text").unwrap();
        assert!(matches!(
            ObjectSymbols::load(&path),
            Err(TraceError::Elf { .. })
        ));
    }

    #[test]
    fn test_resolve_in_own_process() {
        // Every dynamically linked Rust test binary maps libc
        let mut resolver = SymbolResolver::new(std::process::id() as i32);
        let address = resolver.resolve("getpid").unwrap();
        assert!(address.is_some());
        assert_eq!(
            resolver.resolve("no_such_symbol_in_any_object").unwrap(),
            None
        );
    }
}
