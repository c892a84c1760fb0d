use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `tfguard.toml` schema v1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TfguardConfigV1 {
    /// Optional schema string for tooling (`tfguard.config.v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Report a failure when a selected property is absent, for every rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on_missing: Option<bool>,

    /// Globs (relative to the scan root) the loader skips.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Variable overrides. Bare keys mean `var.<key>`.
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,

    /// `.tfvars` or `.json` files merged into the variable overrides, in order.
    #[serde(default)]
    pub variable_files: Vec<String>,

    /// Waivers: `[rule, resource]` or `[rule, resource, reference id]`.
    #[serde(default)]
    pub overrides: Vec<Vec<String>>,

    /// Map of rule id -> config.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// `high`, `medium` or `low`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}
