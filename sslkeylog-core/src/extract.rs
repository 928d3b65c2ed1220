//! Key material extraction from an in-target `SSL` object.

use std::fmt;

use tracing::trace;

use crate::debugger::Debugger;
use crate::error::DebuggerError;
use crate::layout::StructLayout;
use crate::memory::MemoryReader;

/// Length of the client random in bytes.
pub const CLIENT_RANDOM_LEN: usize = 32;

/// Length of a TLS 1.2 master secret in bytes.
pub const MASTER_SECRET_LEN: usize = 48;

/// Address of the `SSL` object passed to an instrumented call.
///
/// Only meaningful between the entry and the return of the call that
/// produced it. The core never dereferences it except through a
/// [`MemoryReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    pub fn new(address: u64) -> Self {
        Self(address)
    }

    pub fn address(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Session key material recovered from the target.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub client_random: [u8; CLIENT_RANDOM_LEN],
    pub master_secret: [u8; MASTER_SECRET_LEN],
}

impl KeyMaterial {
    pub fn new(
        client_random: [u8; CLIENT_RANDOM_LEN],
        master_secret: [u8; MASTER_SECRET_LEN],
    ) -> Self {
        Self {
            client_random,
            master_secret,
        }
    }

    /// Client random as uppercase hex.
    pub fn client_random_hex(&self) -> String {
        hex::encode_upper(self.client_random)
    }

    /// Master secret as uppercase hex.
    pub fn master_secret_hex(&self) -> String {
        hex::encode_upper(self.master_secret)
    }
}

// Keep secrets out of debug logs.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("client_random", &self.client_random_hex())
            .field("master_secret", &"<redacted>")
            .finish()
    }
}

/// Decodes master secret and client random from an `SSL` object.
#[derive(Debug, Clone)]
pub struct KeyExtractor {
    layout: StructLayout,
}

impl KeyExtractor {
    pub fn new(layout: StructLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StructLayout {
        &self.layout
    }

    /// Recover the key material for `handle`.
    ///
    /// Returns `Ok(None)` while the handshake has not produced a session
    /// (null session, non-positive key length, null `s3`). Memory read
    /// failures are propagated.
    pub fn extract<D: Debugger + ?Sized>(
        &self,
        debugger: &D,
        handle: ConnectionHandle,
    ) -> Result<Option<KeyMaterial>, DebuggerError> {
        if handle.is_null() {
            trace!("Null SSL pointer, nothing to extract");
            return Ok(None);
        }

        let reader = MemoryReader::new(debugger);
        let ssl = handle.address();

        let session = reader.read_pointer(field_address(ssl, self.layout.ssl_session, 8)?)?;
        if session == 0 {
            trace!(ssl = %handle, "No session yet");
            return Ok(None);
        }

        let width = self.layout.master_key_length_width;
        let key_length = reader.read_int(
            field_address(session, self.layout.session_master_key_length, width.bytes())?,
            width,
        )?;
        if key_length <= 0 {
            trace!(ssl = %handle, key_length, "Master key not established");
            return Ok(None);
        }

        let master_secret = reader.read_array::<MASTER_SECRET_LEN>(field_address(
            session,
            self.layout.session_master_key,
            MASTER_SECRET_LEN,
        )?)?;

        let s3 = reader.read_pointer(field_address(ssl, self.layout.ssl_s3, 8)?)?;
        if s3 == 0 {
            trace!(ssl = %handle, "No s3 state");
            return Ok(None);
        }

        let client_random = reader.read_array::<CLIENT_RANDOM_LEN>(field_address(
            s3,
            self.layout.s3_client_random,
            CLIENT_RANDOM_LEN,
        )?)?;

        Ok(Some(KeyMaterial::new(client_random, master_secret)))
    }
}

/// Address of the field at `offset` inside the object at `base`.
///
/// Overflow is reported as a failed read of `len` bytes at `base`.
fn field_address(base: u64, offset: u64, len: usize) -> Result<u64, DebuggerError> {
    base.checked_add(offset).ok_or_else(|| DebuggerError::MemoryRead {
        address: base,
        len,
        reason: "address overflow".to_string(),
    })
}
