//! In-target struct layouts.
//!
//! The extractor reads five fields out of three OpenSSL structs:
//!
//! ```text
//! struct ssl_st          { ... SSL_SESSION *session; ... struct ssl3_state_st *s3; ... }
//! struct ssl_session_st  { ... int master_key_length; unsigned char master_key[48]; ... }
//! struct ssl3_state_st   { ... unsigned char client_random[32]; ... }
//! ```
//!
//! Offsets are ABI and version specific, so they are kept in a small table
//! per supported library build. Any offset can be overridden when the
//! target was built differently.

use std::fmt;
use std::str::FromStr;

/// Width of a signed integer field in target memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    /// `int` on LP64
    Four,
    /// `long` / `size_t` on LP64
    Eight,
}

impl IntWidth {
    /// Size in bytes.
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::Four => 4,
            IntWidth::Eight => 8,
        }
    }

    /// Parse a width given in bytes.
    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            4 => Some(IntWidth::Four),
            8 => Some(IntWidth::Eight),
            _ => None,
        }
    }
}

/// Byte offsets of the fields the extractor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructLayout {
    /// `ssl_st.session` (pointer)
    pub ssl_session: u64,
    /// `ssl_st.s3` (pointer)
    pub ssl_s3: u64,
    /// `ssl_session_st.master_key_length`
    pub session_master_key_length: u64,
    /// Width of `master_key_length`
    pub master_key_length_width: IntWidth,
    /// `ssl_session_st.master_key` (48 bytes)
    pub session_master_key: u64,
    /// `ssl3_state_st.client_random` (32 bytes)
    pub s3_client_random: u64,
}

impl Default for StructLayout {
    fn default() -> Self {
        LayoutPreset::default().layout()
    }
}

/// Library builds with a known layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutPreset {
    /// OpenSSL 1.0.1 / 1.0.2 on x86_64 Linux
    #[default]
    OpenSsl102X86_64,
}

impl LayoutPreset {
    /// All presets, in display order.
    pub const ALL: [LayoutPreset; 1] = [LayoutPreset::OpenSsl102X86_64];

    /// Name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            LayoutPreset::OpenSsl102X86_64 => "openssl-1.0.2-x86_64",
        }
    }

    /// One-line description.
    pub fn description(self) -> &'static str {
        match self {
            LayoutPreset::OpenSsl102X86_64 => {
                "OpenSSL 1.0.1/1.0.2, LP64 (s3 is a pointer, int master_key_length)"
            }
        }
    }

    /// Field offsets for this build.
    pub fn layout(self) -> StructLayout {
        match self {
            LayoutPreset::OpenSsl102X86_64 => StructLayout {
                ssl_session: 0x130,
                ssl_s3: 0x80,
                session_master_key_length: 0x10,
                master_key_length_width: IntWidth::Four,
                session_master_key: 0x14,
                s3_client_random: 0xc4,
            },
        }
    }
}

impl fmt::Display for LayoutPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayoutPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutPreset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown layout preset: {s}"))
    }
}

/// Per-field overrides applied on top of a preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutOverrides {
    pub ssl_session: Option<u64>,
    pub ssl_s3: Option<u64>,
    pub session_master_key_length: Option<u64>,
    pub master_key_length_width: Option<IntWidth>,
    pub session_master_key: Option<u64>,
    pub s3_client_random: Option<u64>,
}

impl LayoutOverrides {
    /// Check if any field is overridden.
    pub fn is_empty(&self) -> bool {
        *self == LayoutOverrides::default()
    }

    /// Apply the overrides to `layout`.
    pub fn apply(&self, layout: StructLayout) -> StructLayout {
        StructLayout {
            ssl_session: self.ssl_session.unwrap_or(layout.ssl_session),
            ssl_s3: self.ssl_s3.unwrap_or(layout.ssl_s3),
            session_master_key_length: self
                .session_master_key_length
                .unwrap_or(layout.session_master_key_length),
            master_key_length_width: self
                .master_key_length_width
                .unwrap_or(layout.master_key_length_width),
            session_master_key: self.session_master_key.unwrap_or(layout.session_master_key),
            s3_client_random: self.s3_client_random.unwrap_or(layout.s3_client_random),
        }
    }
}
