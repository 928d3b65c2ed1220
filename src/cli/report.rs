//! Human-readable reports for the `verify` and `layouts` subcommands.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use clap::ValueEnum;
use sslkeylog_core::{KeyLogFile, LayoutPreset};

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Summary followed by one row per entry (default)
    Table,
    /// Comma-separated values, one row per entry
    Csv,
}

/// Write a summary of a parsed key log.
pub fn write_verify_report<W: Write>(
    writer: &mut W,
    path: &Path,
    keylog: &KeyLogFile,
    format: ReportFormat,
) -> std::io::Result<()> {
    match format {
        ReportFormat::Table => write_table(writer, path, keylog),
        ReportFormat::Csv => write_csv(writer, keylog),
    }
}

fn write_table<W: Write>(writer: &mut W, path: &Path, keylog: &KeyLogFile) -> std::io::Result<()> {
    writeln!(writer, "Key log: {}", path.display())?;
    writeln!(writer, "{:-<60}", "")?;
    writeln!(writer, "{:<20} {}", "Sessions", keylog.session_count())?;
    writeln!(writer, "{:<20} {}", "Entries", keylog.entry_count())?;
    writeln!(writer, "{:<20} {}", "Comment lines", keylog.comment_count())?;

    let mut by_label: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in keylog.entries() {
        *by_label.entry(entry.label.as_str()).or_default() += 1;
    }
    for (label, count) in &by_label {
        writeln!(writer, "  {label:<18} {count}")?;
    }

    let duplicates = keylog.duplicate_client_randoms();
    if !duplicates.is_empty() {
        writeln!(writer)?;
        writeln!(
            writer,
            "{} client random(s) logged more than once:",
            duplicates.len()
        )?;
        for client_random in duplicates {
            writeln!(writer, "  {}", hex::encode_upper(client_random))?;
        }
    }

    if !keylog.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "{:<32} {:<64} Secret", "Label", "Client random")?;
        writeln!(writer, "{:-<106}", "")?;
        for entry in keylog.entries() {
            writeln!(
                writer,
                "{:<32} {:<64} {} bytes",
                entry.label.as_str(),
                hex::encode_upper(entry.client_random),
                entry.secret.len()
            )?;
        }
    }
    Ok(())
}

fn write_csv<W: Write>(writer: &mut W, keylog: &KeyLogFile) -> std::io::Result<()> {
    writeln!(writer, "label,client_random,secret_length")?;
    for entry in keylog.entries() {
        writeln!(
            writer,
            "{},{},{}",
            entry.label.as_str(),
            hex::encode_upper(entry.client_random),
            entry.secret.len()
        )?;
    }
    Ok(())
}

/// List the built-in layout presets with their offsets.
pub fn write_layouts<W: Write>(writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "Built-in struct layouts:")?;
    writeln!(writer, "{:-<60}", "")?;

    for preset in LayoutPreset::ALL {
        let layout = preset.layout();
        writeln!(writer, "  {preset}")?;
        writeln!(writer, "    {}", preset.description())?;
        let rows = [
            ("ssl_st.session", "--session-offset", layout.ssl_session),
            ("ssl_st.s3", "--s3-offset", layout.ssl_s3),
            (
                "ssl_session_st.master_key_length",
                "--master-key-length-offset",
                layout.session_master_key_length,
            ),
            (
                "ssl_session_st.master_key",
                "--master-key-offset",
                layout.session_master_key,
            ),
            (
                "ssl3_state_st.client_random",
                "--client-random-offset",
                layout.s3_client_random,
            ),
        ];
        for (field, flag, offset) in rows {
            writeln!(writer, "    {field:<34} {offset:#06x}  ({flag})")?;
        }
        writeln!(
            writer,
            "    {:<34} {} bytes  (--master-key-length-width)",
            "master_key_length width",
            layout.master_key_length_width.bytes()
        )?;
    }
    Ok(())
}
