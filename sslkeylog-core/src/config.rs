//! Session configuration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::layout::StructLayout;
use crate::watch::EntryPoint;

/// Environment variable naming the key log file.
pub const SSLKEYLOGFILE_ENV: &str = "SSLKEYLOGFILE";

/// Key log file used when `SSLKEYLOGFILE` is not set.
pub const DEFAULT_KEYLOG_FILENAME: &str = "keys.log";

/// Name of the `SSL*` parameter of every instrumented entry point.
pub const DEFAULT_CONNECTION_PARAM: &str = "s";

/// Settings for one key logging session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where key lines are appended
    pub output_path: PathBuf,
    /// Field offsets of the target's TLS library
    pub layout: StructLayout,
    /// Frame parameter holding the `SSL*` at entry
    pub connection_param: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_KEYLOG_FILENAME),
            layout: StructLayout::default(),
            connection_param: DEFAULT_CONNECTION_PARAM.to_string(),
        }
    }
}

impl Config {
    /// Build the default configuration, taking the output path from
    /// `SSLKEYLOGFILE` when it is set and non-empty.
    pub fn from_env() -> Self {
        Self::from_keylog_var(std::env::var_os(SSLKEYLOGFILE_ENV))
    }

    /// Same as [`Config::from_env`] with an explicit variable value.
    pub fn from_keylog_var(value: Option<OsString>) -> Self {
        let output_path = value
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYLOG_FILENAME));
        Self {
            output_path,
            ..Self::default()
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_layout(mut self, layout: StructLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_connection_param(mut self, name: impl Into<String>) -> Self {
        self.connection_param = name.into();
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// The instrumented entry points. Fixed for every session.
    pub fn entry_points(&self) -> &'static [EntryPoint] {
        &EntryPoint::ALL
    }
}
