//! Fuzz target for configuration decoding.
//!
//! Goal: decoding and reference parsing should **never panic** on any input.
//! They may return errors, but panics are unacceptable.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_hcl_decoder
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = tfguard_repo::fuzz::decode_and_parse(text);
        let _ = tfguard_repo::fuzz::decode_json(text);
    }
});
