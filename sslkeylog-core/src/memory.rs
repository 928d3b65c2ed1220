//! Raw and typed reads of target memory.
//!
//! All values are decoded little-endian (x86_64 targets).

use crate::debugger::Debugger;
use crate::error::DebuggerError;
use crate::layout::IntWidth;

/// Reads bytes from the attached process through a [`Debugger`].
///
/// Stateless: every call goes straight to the debugger.
pub struct MemoryReader<'a, D: Debugger + ?Sized> {
    debugger: &'a D,
}

impl<'a, D: Debugger + ?Sized> MemoryReader<'a, D> {
    /// Create a reader over `debugger`.
    pub fn new(debugger: &'a D) -> Self {
        Self { debugger }
    }

    /// Read exactly `len` bytes at `address`.
    pub fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>, DebuggerError> {
        let bytes = self.debugger.read_memory(address, len)?;
        if bytes.len() != len {
            return Err(DebuggerError::MemoryRead {
                address,
                len,
                reason: format!("short read: got {} bytes", bytes.len()),
            });
        }
        Ok(bytes)
    }

    /// Read a fixed-size field.
    pub fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N], DebuggerError> {
        let bytes = self.read_bytes(address, N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(&bytes);
        Ok(arr)
    }

    /// Read `len` bytes at `address` rendered as uppercase hex, two
    /// characters per byte, no separators.
    pub fn read_hex(&self, address: u64, len: usize) -> Result<String, DebuggerError> {
        Ok(hex::encode_upper(self.read_bytes(address, len)?))
    }

    /// Read a pointer-sized value.
    pub fn read_pointer(&self, address: u64) -> Result<u64, DebuggerError> {
        Ok(u64::from_le_bytes(self.read_array::<8>(address)?))
    }

    /// Read a signed integer of the given width, sign-extended to `i64`.
    pub fn read_int(&self, address: u64, width: IntWidth) -> Result<i64, DebuggerError> {
        match width {
            IntWidth::Four => Ok(i32::from_le_bytes(self.read_array::<4>(address)?) as i64),
            IntWidth::Eight => Ok(i64::from_le_bytes(self.read_array::<8>(address)?)),
        }
    }
}
