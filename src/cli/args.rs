//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sslkeylog_core::{Config, IntWidth, LayoutOverrides, LayoutPreset, SSLKEYLOGFILE_ENV};

use super::ReportFormat;

/// Log TLS session keys of a running OpenSSL process to an SSLKEYLOGFILE.
#[derive(Parser, Debug)]
#[command(name = "sslkeylog")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Attach to a running process
    Attach {
        /// Process id of the target
        #[arg(short = 'p', long = "pid")]
        pid: i32,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Start a program and log its keys from the first instruction on
    Run {
        #[command(flatten)]
        session: SessionArgs,

        /// Program and arguments, after `--`
        #[arg(last = true, required = true, num_args = 1.., value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Parse a key log and summarize it
    Verify {
        /// Key log file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(long = "format", value_enum, default_value = "table")]
        format: ReportFormat,
    },

    /// List built-in struct layouts
    Layouts,
}

/// Options shared by `attach` and `run`.
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Key log file [default: keys.log]
    #[arg(short = 'o', long = "output", value_name = "FILE", env = SSLKEYLOGFILE_ENV)]
    pub output: Option<PathBuf>,

    /// Struct layout of the target's OpenSSL build
    #[arg(long = "layout", value_name = "PRESET", default_value = "openssl-1.0.2-x86_64")]
    pub layout: LayoutPreset,

    /// Offset of `session` in `struct ssl_st`
    #[arg(long = "session-offset", value_name = "OFFSET", value_parser = parse_offset)]
    pub session_offset: Option<u64>,

    /// Offset of `s3` in `struct ssl_st`
    #[arg(long = "s3-offset", value_name = "OFFSET", value_parser = parse_offset)]
    pub s3_offset: Option<u64>,

    /// Offset of `master_key_length` in `struct ssl_session_st`
    #[arg(long = "master-key-length-offset", value_name = "OFFSET", value_parser = parse_offset)]
    pub master_key_length_offset: Option<u64>,

    /// Width of `master_key_length` in bytes (4 or 8)
    #[arg(long = "master-key-length-width", value_name = "BYTES", value_parser = parse_width)]
    pub master_key_length_width: Option<IntWidth>,

    /// Offset of `master_key` in `struct ssl_session_st`
    #[arg(long = "master-key-offset", value_name = "OFFSET", value_parser = parse_offset)]
    pub master_key_offset: Option<u64>,

    /// Offset of `client_random` in `struct ssl3_state_st`
    #[arg(long = "client-random-offset", value_name = "OFFSET", value_parser = parse_offset)]
    pub client_random_offset: Option<u64>,
}

impl SessionArgs {
    /// Layout overrides given on the command line.
    pub fn overrides(&self) -> LayoutOverrides {
        LayoutOverrides {
            ssl_session: self.session_offset,
            ssl_s3: self.s3_offset,
            session_master_key_length: self.master_key_length_offset,
            master_key_length_width: self.master_key_length_width,
            session_master_key: self.master_key_offset,
            s3_client_random: self.client_random_offset,
        }
    }

    /// Session configuration. The output path is left to
    /// `SessionController::start`.
    pub fn config(&self) -> Config {
        Config::from_env().with_layout(self.overrides().apply(self.layout.layout()))
    }
}

/// Parse a byte offset given in decimal or `0x` hex.
pub fn parse_offset(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid offset '{s}': {e}"))
}

fn parse_width(s: &str) -> Result<IntWidth, String> {
    s.parse::<usize>()
        .ok()
        .and_then(IntWidth::from_bytes)
        .ok_or_else(|| format!("invalid width '{s}': expected 4 or 8"))
}
