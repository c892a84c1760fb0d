//! Filesystem adapters: walk configuration directories, decode files, read variable files.
//!
//! This crate is allowed to do filesystem IO. Resolution and assertions live in
//! `tfguard-domain`; this crate only hands it a populated scope tree.

#![forbid(unsafe_code)]

mod decode;
mod load;

use anyhow::Context;
use camino::Utf8Path;
use tfguard_domain::ConfigValue;
use tfguard_domain::value::Mapping;

pub use decode::{
    CONFIG_EXTENSIONS, DecodeError, Decoder, HclDecoder, JsonDecoder, config_decoder,
    variable_file_decoder,
};
pub use load::{LoadError, LoadOptions, LoadedTree, SKIP_DIRS, load_tree, module_sources};

/// Fuzz-friendly API for testing decoding robustness without filesystem access.
/// These functions are designed to never panic on any input.
pub mod fuzz {
    use super::*;

    /// Decode arbitrary text as HCL configuration.
    ///
    /// **Never panics** on any input.
    pub fn decode_hcl(text: &str) -> Result<(), DecodeError> {
        HclDecoder.decode(text).map(|_| ())
    }

    /// Decode arbitrary text as JSON configuration syntax.
    ///
    /// **Never panics** on any input.
    pub fn decode_json(text: &str) -> Result<(), DecodeError> {
        JsonDecoder.decode(text).map(|_| ())
    }

    /// Decode HCL and parse every string in it for references, as the loader does.
    ///
    /// **Never panics** on any input.
    pub fn decode_and_parse(text: &str) -> Result<ConfigValue, DecodeError> {
        HclDecoder.decode(text).map(ConfigValue::from_json)
    }
}

/// Read a `.tfvars` (HCL) or `.json` variable file into literal override values.
///
/// Strings are taken verbatim; `${...}` inside a variable file is not interpolated.
pub fn read_variable_file(path: &Utf8Path) -> anyhow::Result<Mapping> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    let json = variable_file_decoder(path)
        .decode(&text)
        .with_context(|| format!("parse {path}"))?;
    match ConfigValue::literal_from_json(json) {
        ConfigValue::Mapping(map) => Ok(map),
        _ => anyhow::bail!("{path}: variable file must contain key/value pairs"),
    }
}
