//! Config parsing, waiver tables and CLI override merging.
//!
//! This crate is intentionally IO-free: it parses and resolves configuration provided as strings.

#![forbid(unsafe_code)]

mod model;
mod resolve;

pub use model::{RuleConfig, TfguardConfigV1};
pub use resolve::{
    CliOverrides, ResolvedConfig, RuleSettings, parse_override_list, parse_var_assignment,
};

/// Parse `tfguard.toml` (or equivalent) into a typed model.
pub fn parse_config_toml(input: &str) -> anyhow::Result<TfguardConfigV1> {
    let cfg: TfguardConfigV1 = toml::from_str(input)?;
    Ok(cfg)
}

/// Resolve the effective settings (config file + CLI flags).
pub fn resolve_config(
    cfg: TfguardConfigV1,
    overrides: CliOverrides,
) -> anyhow::Result<ResolvedConfig> {
    resolve::resolve_config(cfg, overrides)
}
