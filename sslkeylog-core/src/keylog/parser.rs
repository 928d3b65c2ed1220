//! Key log reader.
//!
//! Reads the NSS key log format back so a produced log can be checked before
//! it is handed to a packet analyzer. Besides `CLIENT_RANDOM`, the TLS 1.3
//! labels are accepted so that logs mixing entries from other tools parse.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use super::KeyLogError;
use crate::extract::{CLIENT_RANDOM_LEN, MASTER_SECRET_LEN};

/// Label at the start of a key log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretLabel {
    /// TLS 1.2 master secret (always 48 bytes)
    ClientRandom,
    ClientEarlyTrafficSecret,
    ClientHandshakeTrafficSecret,
    ServerHandshakeTrafficSecret,
    ClientTrafficSecret0,
    ServerTrafficSecret0,
    EarlyExporterSecret,
    ExporterSecret,
}

impl SecretLabel {
    /// Label as it appears in the file.
    pub fn as_str(self) -> &'static str {
        match self {
            SecretLabel::ClientRandom => "CLIENT_RANDOM",
            SecretLabel::ClientEarlyTrafficSecret => "CLIENT_EARLY_TRAFFIC_SECRET",
            SecretLabel::ClientHandshakeTrafficSecret => "CLIENT_HANDSHAKE_TRAFFIC_SECRET",
            SecretLabel::ServerHandshakeTrafficSecret => "SERVER_HANDSHAKE_TRAFFIC_SECRET",
            SecretLabel::ClientTrafficSecret0 => "CLIENT_TRAFFIC_SECRET_0",
            SecretLabel::ServerTrafficSecret0 => "SERVER_TRAFFIC_SECRET_0",
            SecretLabel::EarlyExporterSecret => "EARLY_EXPORTER_SECRET",
            SecretLabel::ExporterSecret => "EXPORTER_SECRET",
        }
    }
}

impl fmt::Display for SecretLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretLabel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLIENT_RANDOM" => Ok(SecretLabel::ClientRandom),
            "CLIENT_EARLY_TRAFFIC_SECRET" => Ok(SecretLabel::ClientEarlyTrafficSecret),
            "CLIENT_HANDSHAKE_TRAFFIC_SECRET" => Ok(SecretLabel::ClientHandshakeTrafficSecret),
            "SERVER_HANDSHAKE_TRAFFIC_SECRET" => Ok(SecretLabel::ServerHandshakeTrafficSecret),
            "CLIENT_TRAFFIC_SECRET_0" => Ok(SecretLabel::ClientTrafficSecret0),
            "SERVER_TRAFFIC_SECRET_0" => Ok(SecretLabel::ServerTrafficSecret0),
            "EARLY_EXPORTER_SECRET" => Ok(SecretLabel::EarlyExporterSecret),
            "EXPORTER_SECRET" => Ok(SecretLabel::ExporterSecret),
            _ => Err(()),
        }
    }
}

/// A single line from a key log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLogEntry {
    pub label: SecretLabel,
    pub client_random: [u8; CLIENT_RANDOM_LEN],
    pub secret: Vec<u8>,
}

/// Parsed key log, indexed by client random.
#[derive(Debug, Clone, Default)]
pub struct KeyLogFile {
    entries: Vec<KeyLogEntry>,
    by_client_random: HashMap<[u8; CLIENT_RANDOM_LEN], Vec<usize>>,
    comment_lines: usize,
}

impl KeyLogFile {
    /// Parse a key log from file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KeyLogError> {
        Self::from_reader(File::open(path)?)
    }

    /// Parse a key log from a string.
    pub fn parse(content: &str) -> Result<Self, KeyLogError> {
        Self::from_reader(content.as_bytes())
    }

    /// Parse a key log from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, KeyLogError> {
        let mut keylog = KeyLogFile::default();

        for (index, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                keylog.comment_lines += 1;
                continue;
            }

            // 1-indexed for error messages
            let entry = parse_line(line, index + 1)?;
            keylog
                .by_client_random
                .entry(entry.client_random)
                .or_default()
                .push(keylog.entries.len());
            keylog.entries.push(entry);
        }

        Ok(keylog)
    }

    /// All entries in file order.
    pub fn entries(&self) -> &[KeyLogEntry] {
        &self.entries
    }

    /// Entries recorded for a client random.
    pub fn lookup(
        &self,
        client_random: &[u8; CLIENT_RANDOM_LEN],
    ) -> impl Iterator<Item = &KeyLogEntry> + '_ {
        self.by_client_random
            .get(client_random)
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i])
    }

    /// TLS 1.2 master secret for a client random, if logged.
    pub fn master_secret(
        &self,
        client_random: &[u8; CLIENT_RANDOM_LEN],
    ) -> Option<[u8; MASTER_SECRET_LEN]> {
        self.lookup(client_random)
            .find(|entry| entry.label == SecretLabel::ClientRandom)
            .and_then(|entry| entry.secret.as_slice().try_into().ok())
    }

    /// Client randoms that appear on more than one `CLIENT_RANDOM` line.
    pub fn duplicate_client_randoms(&self) -> Vec<[u8; CLIENT_RANDOM_LEN]> {
        let mut duplicates: Vec<_> = self
            .by_client_random
            .iter()
            .filter(|(_, indices)| {
                indices
                    .iter()
                    .filter(|&&i| self.entries[i].label == SecretLabel::ClientRandom)
                    .count()
                    > 1
            })
            .map(|(client_random, _)| *client_random)
            .collect();
        duplicates.sort_unstable();
        duplicates
    }

    /// Number of distinct client randoms.
    pub fn session_count(&self) -> usize {
        self.by_client_random.len()
    }

    /// Number of key lines.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of `#` comment lines.
    pub fn comment_count(&self) -> usize {
        self.comment_lines
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(line: &str, line_num: usize) -> Result<KeyLogEntry, KeyLogError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [label, client_random_hex, secret_hex] = fields.as_slice() else {
        return Err(KeyLogError::InvalidFormat {
            line: line_num,
            message: format!("expected 3 space-separated fields, got {}", fields.len()),
        });
    };

    let label: SecretLabel = label.parse().map_err(|()| KeyLogError::UnknownKeyType {
        line: line_num,
        label: label.to_string(),
    })?;

    let client_random =
        decode_fixed::<CLIENT_RANDOM_LEN>(client_random_hex, "client_random", line_num)?;

    let secret = if label == SecretLabel::ClientRandom {
        decode_fixed::<MASTER_SECRET_LEN>(secret_hex, "master_secret", line_num)?.to_vec()
    } else {
        decode(secret_hex, line_num)?
    };

    Ok(KeyLogEntry {
        label,
        client_random,
        secret,
    })
}

fn decode_fixed<const N: usize>(
    hex_str: &str,
    field: &str,
    line: usize,
) -> Result<[u8; N], KeyLogError> {
    if hex_str.len() != N * 2 {
        return Err(KeyLogError::InvalidHex {
            line,
            message: format!(
                "expected {} hex chars for {field}, got {}",
                N * 2,
                hex_str.len()
            ),
        });
    }

    let mut arr = [0u8; N];
    hex::decode_to_slice(hex_str, &mut arr).map_err(|e| KeyLogError::InvalidHex {
        line,
        message: e.to_string(),
    })?;
    Ok(arr)
}

fn decode(hex_str: &str, line: usize) -> Result<Vec<u8>, KeyLogError> {
    hex::decode(hex_str).map_err(|e| KeyLogError::InvalidHex {
        line,
        message: e.to_string(),
    })
}
