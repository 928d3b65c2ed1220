//! Commonly used types for driving a key logging session.
//!
//! ```rust,ignore
//! use sslkeylog_core::prelude::*;
//! ```

pub use crate::config::Config;
pub use crate::debugger::{BreakpointId, Debugger};
pub use crate::error::{DebuggerError, Error, Result};
pub use crate::extract::{ConnectionHandle, KeyExtractor, KeyMaterial};
pub use crate::keylog::{KeyLog, KeyLogFile};
pub use crate::layout::{LayoutOverrides, LayoutPreset, StructLayout};
pub use crate::session::{HitOutcome, SessionController};
pub use crate::watch::{EntryPoint, FireOutcome, WatchStats};
