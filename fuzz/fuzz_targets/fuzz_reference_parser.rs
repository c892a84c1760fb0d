//! Fuzz target for `${...}` reference parsing.
//!
//! Goal: parsing arbitrary strings should **never panic**, and every parsed value
//! must render back to text.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_reference_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let value = tfguard_domain::reference::parse_string(text);
        let _ = value.to_text();
    }
});
