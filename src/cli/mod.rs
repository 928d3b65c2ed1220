//! Command-line interface module.
//!
//! This module handles:
//! - Argument parsing via clap
//! - Reports for `verify` and `layouts`

mod args;
mod report;

pub use args::{parse_offset, Args, Command, SessionArgs};
pub use report::{write_layouts, write_verify_report, ReportFormat};
