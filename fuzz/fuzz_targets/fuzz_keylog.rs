//! Fuzz target for the key log parser.
//!
//! The parser handles:
//! - Comment and blank lines
//! - `CLIENT_RANDOM` and TLS 1.3 secret labels
//! - Hex decoding of client randoms and secrets

#![no_main]

use libfuzzer_sys::fuzz_target;
use sslkeylog_core::{format_line, KeyLogFile};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(keylog) = KeyLogFile::parse(text) {
        // Every indexed client random must resolve back to its entries
        for entry in keylog.entries() {
            assert!(keylog.lookup(&entry.client_random).next().is_some());
        }
        assert!(keylog.session_count() <= keylog.entry_count());
    }

    // Lines produced by the writer always parse back
    if data.len() >= 80 {
        let client_random: [u8; 32] = data[..32].try_into().unwrap();
        let master_secret: [u8; 48] = data[32..80].try_into().unwrap();
        let line = format_line(&client_random, &master_secret);
        let keylog = KeyLogFile::parse(&line).unwrap();
        assert_eq!(keylog.master_secret(&client_random), Some(master_secret));
    }
});
