//! The `scan` use case: load, resolve, evaluate rules and produce a report.

use crate::rules::select_rules;
use anyhow::Context;
use camino::Utf8Path;
use tfguard_domain::assert::AssertError;
use tfguard_domain::overrides::InvalidOverride;
use tfguard_domain::{EvaluationOptions, VariableOverrides};
use tfguard_repo::LoadOptions;
use tfguard_settings::{CliOverrides, ResolvedConfig};
use tfguard_types::{SCHEMA_REPORT_V1, ScanReport, ScanSummary, ToolMeta, Verdict};
use time::OffsetDateTime;

/// Input for the scan use case.
#[derive(Clone, Debug)]
pub struct ScanInput<'a> {
    /// Directory holding the root module.
    pub root: &'a Utf8Path,
    /// Config file contents (empty string if not found).
    pub config_text: &'a str,
    /// CLI overrides.
    pub overrides: CliOverrides,
}

#[derive(Clone, Debug)]
pub struct ScanOutput {
    pub report: ScanReport,
    pub resolved_config: ResolvedConfig,
}

/// Run the scan use case.
///
/// Relative variable file paths are taken from the scan root.
pub fn run_scan(input: ScanInput<'_>) -> anyhow::Result<ScanOutput> {
    let started_at = OffsetDateTime::now_utc();

    let cfg = if input.config_text.trim().is_empty() {
        tfguard_settings::TfguardConfigV1::default()
    } else {
        tfguard_settings::parse_config_toml(input.config_text).context("parse config")?
    };
    let resolved =
        tfguard_settings::resolve_config(cfg, input.overrides).context("resolve config")?;
    let rules = select_rules(&resolved).context("select rules")?;

    let loaded = tfguard_repo::load_tree(
        input.root,
        &LoadOptions {
            exclude: resolved.exclude.clone(),
        },
    )
    .with_context(|| format!("load {}", input.root))?;

    let mut variables = VariableOverrides::new();
    for file in &resolved.variable_files {
        let path = input.root.join(file);
        let values = tfguard_repo::read_variable_file(&path)
            .with_context(|| format!("variable file {file}"))?;
        variables.extend_from_mapping(values);
    }
    for (key, value) in &resolved.variables {
        variables.insert(key, value.clone());
    }

    let resolution = tfguard_domain::resolve(&loaded.tree, variables);
    let sink = tfguard_domain::evaluate(
        &resolution.registry,
        &rules,
        &resolved.overrides,
        EvaluationOptions {
            fail_on_missing: resolved.fail_on_missing,
        },
    )
    .context("evaluate rules")?;

    let summary_base = ScanSummary {
        modules_scanned: count(resolution.registry.len()),
        resources_scanned: count(resolution.registry.iter().map(|r| r.resources.len()).sum()),
        rules_evaluated: count(rules.len()),
        ..ScanSummary::default()
    };

    let (failures, sink_errors) = sink.into_parts();
    let mut errors = loaded.errors;
    errors.extend(resolution.errors);
    errors.extend(sink_errors);

    let failures_waived = failures.iter().filter(|d| d.waived.is_waived()).count();
    let verdict = if failures_waived < failures.len() {
        Verdict::Fail
    } else {
        Verdict::Pass
    };
    let summary = ScanSummary {
        failures_total: count(failures.len()),
        failures_waived: count(failures_waived),
        errors_total: count(errors.len()),
        ..summary_base
    };

    let report = ScanReport {
        schema: SCHEMA_REPORT_V1.to_string(),
        tool: ToolMeta {
            name: "tfguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        started_at,
        finished_at: OffsetDateTime::now_utc(),
        verdict,
        summary,
        failures,
        errors,
    };

    Ok(ScanOutput {
        report,
        resolved_config: resolved,
    })
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Map verdict to exit code: 0 = pass, 2 = unwaived failures.
pub fn verdict_exit_code(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Pass => 0,
        Verdict::Fail => 2,
    }
}

/// Exit code for a scan that did not complete: 99 for a misconfigured waiver, else 1.
pub fn error_exit_code(err: &anyhow::Error) -> i32 {
    let invalid_override = err.chain().any(|cause| {
        cause.is::<InvalidOverride>()
            || matches!(
                cause.downcast_ref::<AssertError>(),
                Some(AssertError::InvalidOverride(_))
            )
    });
    if invalid_override { 99 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tfguard_domain::overrides::RuleOverride;
    use tfguard_types::Waived;

    fn write_file(path: &Utf8Path, contents: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, contents).expect("write file");
    }

    fn public_alb(tmp: &tempfile::TempDir) -> Utf8PathBuf {
        let root = Utf8Path::from_path(tmp.path()).expect("utf8 path").to_path_buf();
        write_file(
            &root.join("main.tf"),
            r#"
variable "internal" {
  default = false
}

resource "aws_alb" "web" {
  internal = "${var.internal}"
}
"#,
        );
        root
    }

    fn only_alb_public() -> CliOverrides {
        CliOverrides {
            rules: Some("public_exposure.aws_alb_public".to_string()),
            ..CliOverrides::default()
        }
    }

    #[test]
    fn failing_scan_reports_and_exits_two() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let root = public_alb(&tmp);

        let output = run_scan(ScanInput {
            root: &root,
            config_text: "",
            overrides: only_alb_public(),
        })
        .expect("run_scan");

        let report = output.report;
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].message,
            "[aws_alb.web.internal] should not be 'False'. Is: 'False'"
        );
        assert_eq!(report.summary.rules_evaluated, 1);
        assert_eq!(report.summary.resources_scanned, 1);
        assert_eq!(verdict_exit_code(report.verdict), 2);
    }

    #[test]
    fn declared_defaults_beat_cli_variables() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let root = public_alb(&tmp);

        let mut overrides = only_alb_public();
        overrides.variables = vec!["internal=true".to_string()];
        let output = run_scan(ScanInput {
            root: &root,
            config_text: "",
            overrides,
        })
        .expect("run_scan");
        assert_eq!(output.report.verdict, Verdict::Fail);
    }

    #[test]
    fn waived_failures_pass() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let root = public_alb(&tmp);

        let mut overrides = only_alb_public();
        overrides.overrides = vec![
            RuleOverride::new("public_exposure.aws_alb_public", "web").with_reference("RR-12"),
        ];
        let output = run_scan(ScanInput {
            root: &root,
            config_text: "",
            overrides,
        })
        .expect("run_scan");
        assert_eq!(output.report.verdict, Verdict::Pass);
        assert_eq!(
            output.report.failures[0].waived,
            Waived::By("RR-12".to_string())
        );
        assert_eq!(output.report.summary.failures_waived, 1);
    }

    #[test]
    fn high_waiver_without_reference_is_fatal() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let root = public_alb(&tmp);

        let mut overrides = only_alb_public();
        overrides.overrides = vec![RuleOverride::new("public_exposure.aws_alb_public", "web")];
        let err = run_scan(ScanInput {
            root: &root,
            config_text: "",
            overrides,
        })
        .expect_err("fatal");
        assert_eq!(error_exit_code(&err), 99);
    }

    #[test]
    fn bad_config_is_a_runtime_error() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let root = public_alb(&tmp);
        let err = run_scan(ScanInput {
            root: &root,
            config_text: "fail_on_missing = \"yes\"",
            overrides: CliOverrides::default(),
        })
        .expect_err("bad config");
        assert_eq!(error_exit_code(&err), 1);
    }

    #[test]
    fn verdict_exit_codes() {
        assert_eq!(verdict_exit_code(Verdict::Pass), 0);
        assert_eq!(verdict_exit_code(Verdict::Fail), 2);
    }
}
