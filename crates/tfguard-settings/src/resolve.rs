use crate::model::TfguardConfigV1;
use anyhow::Context;
use globset::Glob;
use std::collections::BTreeMap;
use tfguard_domain::ConfigValue;
use tfguard_domain::overrides::{OverrideTable, RuleOverride};
use tfguard_types::Severity;

/// Values given on the command line; each one beats the config file.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub fail_on_missing: Option<bool>,
    pub exclude: Vec<String>,
    /// `key=value` assignments from `--var`.
    pub variables: Vec<String>,
    pub variable_files: Vec<String>,
    /// Waiver entries from `--overrides`, appended to the config ones.
    pub overrides: Vec<RuleOverride>,
    /// Rule id glob from `--rules`.
    pub rules: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSettings {
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
}

#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub fail_on_missing: bool,
    pub exclude: Vec<String>,
    /// Applied after the variable files: config entries first, then `--var`.
    pub variables: Vec<(String, ConfigValue)>,
    pub variable_files: Vec<String>,
    pub overrides: OverrideTable,
    pub rules: BTreeMap<String, RuleSettings>,
    pub rule_glob: Option<String>,
}

pub fn resolve_config(
    cfg: TfguardConfigV1,
    overrides: CliOverrides,
) -> anyhow::Result<ResolvedConfig> {
    let fail_on_missing = overrides
        .fail_on_missing
        .or(cfg.fail_on_missing)
        .unwrap_or(false);

    let mut exclude = cfg.exclude;
    exclude.extend(overrides.exclude);
    for pattern in &exclude {
        Glob::new(pattern).with_context(|| format!("invalid exclude glob: {pattern}"))?;
    }

    let mut variables: Vec<(String, ConfigValue)> = cfg
        .variables
        .into_iter()
        .map(|(k, v)| (k, ConfigValue::literal_from_json(v)))
        .collect();
    for assignment in &overrides.variables {
        variables.push(parse_var_assignment(assignment)?);
    }

    let mut variable_files = cfg.variable_files;
    variable_files.extend(overrides.variable_files);

    let mut waivers = Vec::with_capacity(cfg.overrides.len() + overrides.overrides.len());
    for (i, fields) in cfg.overrides.iter().enumerate() {
        let entry = RuleOverride::from_fields(fields)
            .with_context(|| format!("invalid overrides[{i}] in config"))?;
        waivers.push(entry);
    }
    waivers.extend(overrides.overrides);

    let mut rules = BTreeMap::new();
    for (rule_id, rc) in cfg.rules {
        let severity = match rc.severity.as_deref() {
            Some(s) => Some(
                s.parse::<Severity>()
                    .with_context(|| format!("invalid severity for {rule_id}"))?,
            ),
            None => None,
        };
        rules.insert(
            rule_id,
            RuleSettings {
                enabled: rc.enabled,
                severity,
            },
        );
    }

    if let Some(glob) = overrides.rules.as_deref() {
        Glob::new(glob).with_context(|| format!("invalid rule glob: {glob}"))?;
    }

    Ok(ResolvedConfig {
        fail_on_missing,
        exclude,
        variables,
        variable_files,
        overrides: OverrideTable::new(waivers),
        rules,
        rule_glob: overrides.rules,
    })
}

/// Parse one `--var key=value` assignment. The value is taken as a literal string.
pub fn parse_var_assignment(text: &str) -> anyhow::Result<(String, ConfigValue)> {
    let Some((key, value)) = text.split_once('=') else {
        anyhow::bail!("invalid variable assignment: {text} (expected key=value)");
    };
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("invalid variable assignment: {text} (empty key)");
    }
    Ok((key.to_string(), ConfigValue::string(value)))
}

/// Parse a waiver list given as JSON: `[["rule", "resource"], ["rule", "resource", "RR-1"]]`.
pub fn parse_override_list(text: &str) -> anyhow::Result<Vec<RuleOverride>> {
    let raw: Vec<Vec<String>> =
        serde_json::from_str(text).context("overrides must be a JSON list of string lists")?;
    raw.iter()
        .enumerate()
        .map(|(i, fields)| {
            RuleOverride::from_fields(fields).with_context(|| format!("invalid override #{i}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config_toml;

    #[test]
    fn config_file_is_parsed_and_resolved() {
        let cfg = parse_config_toml(
            r#"
fail_on_missing = true
exclude = ["scratch/**"]
variable_files = ["prod.tfvars"]
overrides = [["alb_logs", "aws_alb.web"], ["alb_internal", "web", "RR-42"]]

[variables]
env = "prod"
replicas = 3

[rules."public_exposure.aws_alb_public"]
severity = "medium"

[rules."security_group.aws_db_security_group_used"]
enabled = false
"#,
        )
        .expect("parse");

        let resolved = resolve_config(cfg, CliOverrides::default()).expect("resolve");
        assert!(resolved.fail_on_missing);
        assert_eq!(resolved.exclude, vec!["scratch/**"]);
        assert_eq!(resolved.variable_files, vec!["prod.tfvars"]);
        assert_eq!(
            resolved.variables,
            vec![
                ("env".to_string(), ConfigValue::from("prod")),
                ("replicas".to_string(), ConfigValue::from(3)),
            ]
        );
        assert_eq!(resolved.overrides.entries().len(), 2);
        assert_eq!(
            resolved.overrides.entries()[1].reference_id.as_deref(),
            Some("RR-42")
        );
        assert_eq!(
            resolved.rules["public_exposure.aws_alb_public"].severity,
            Some(Severity::Medium)
        );
        assert_eq!(
            resolved.rules["security_group.aws_db_security_group_used"].enabled,
            Some(false)
        );
    }

    #[test]
    fn cli_flags_win_and_append() {
        let cfg = parse_config_toml(
            r#"
fail_on_missing = true
[variables]
env = "prod"
"#,
        )
        .expect("parse");
        let cli = CliOverrides {
            fail_on_missing: Some(false),
            variables: vec!["env=dev".to_string()],
            overrides: vec![RuleOverride::new("r", "x")],
            rules: Some("encryption.*".to_string()),
            ..CliOverrides::default()
        };

        let resolved = resolve_config(cfg, cli).expect("resolve");
        assert!(!resolved.fail_on_missing);
        assert_eq!(
            resolved.variables.last(),
            Some(&("env".to_string(), ConfigValue::from("dev")))
        );
        assert_eq!(resolved.overrides.entries().len(), 1);
        assert_eq!(resolved.rule_glob.as_deref(), Some("encryption.*"));
    }

    #[test]
    fn malformed_config_override_is_rejected() {
        let cfg = parse_config_toml("overrides = [[\"only-rule\"]]").expect("parse");
        let err = resolve_config(cfg, CliOverrides::default()).expect_err("shape");
        assert!(format!("{err:#}").contains("2 or 3 fields"), "{err:#}");
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let cfg = parse_config_toml("[rules.x]\nseverity = \"urgent\"\n").expect("parse");
        assert!(resolve_config(cfg, CliOverrides::default()).is_err());
    }

    #[test]
    fn bad_rule_glob_is_rejected() {
        let cli = CliOverrides {
            rules: Some("enc[".to_string()),
            ..CliOverrides::default()
        };
        assert!(resolve_config(TfguardConfigV1::default(), cli).is_err());
    }

    #[test]
    fn var_assignments_split_on_first_equals() {
        let (k, v) = parse_var_assignment("query=a=b").expect("parse");
        assert_eq!(k, "query");
        assert_eq!(v, ConfigValue::from("a=b"));
        assert!(parse_var_assignment("novalue").is_err());
        assert!(parse_var_assignment("=x").is_err());
    }

    #[test]
    fn override_lists_parse_from_json() {
        let list =
            parse_override_list(r#"[["r1", "aws_s3_bucket.logs"], ["r2", "web", "RAR-7"]]"#)
                .expect("parse");
        assert_eq!(list[0], RuleOverride::new("r1", "aws_s3_bucket.logs"));
        assert_eq!(list[1], RuleOverride::new("r2", "web").with_reference("RAR-7"));

        assert!(parse_override_list(r#"[["a", "b", "c", "d"]]"#).is_err());
        assert!(parse_override_list(r#"{"a": 1}"#).is_err());
    }
}
