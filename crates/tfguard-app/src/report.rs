//! Report serialization and the `schema` / `rules` outputs.

use anyhow::Context;
use tfguard_domain::Rule;
use tfguard_types::ScanReport;

pub fn serialize_report(report: &ScanReport) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec_pretty(report).context("serialize report")
}

pub fn parse_report_json(text: &str) -> anyhow::Result<ScanReport> {
    serde_json::from_str(text).context("parse report json")
}

/// JSON schema of the report document.
pub fn report_schema() -> anyhow::Result<String> {
    let schema = schemars::schema_for!(ScanReport);
    serde_json::to_string_pretty(&schema).context("serialize report schema")
}

/// One line per rule: `<severity>\t<id>\t<description>`.
pub fn format_rule_list(rules: &[Rule]) -> String {
    let mut out = String::new();
    for rule in rules {
        out.push_str(&format!(
            "{:<6}\t{}\t{}\n",
            rule.severity.as_str(),
            rule.id,
            rule.description
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BUILTIN_RULES;
    use tfguard_types::{
        Diagnostic, SCHEMA_REPORT_V1, ScanSummary, Severity, ToolMeta, Verdict, Waived,
    };
    use time::macros::datetime;

    fn sample_report() -> ScanReport {
        ScanReport {
            schema: SCHEMA_REPORT_V1.to_string(),
            tool: ToolMeta {
                name: "tfguard".to_string(),
                version: "0.1.0".to_string(),
            },
            started_at: datetime!(2024-05-01 10:00:00 UTC),
            finished_at: datetime!(2024-05-01 10:00:01 UTC),
            verdict: Verdict::Fail,
            summary: ScanSummary {
                modules_scanned: 1,
                resources_scanned: 1,
                rules_evaluated: 1,
                failures_total: 1,
                failures_waived: 0,
                errors_total: 1,
            },
            failures: vec![Diagnostic::new(
                Severity::High,
                "[aws_alb.web.internal] should not be 'False'. Is: 'False'",
                "infra",
                "/repo/infra/main.tf",
            )
            .with_waiver(Waived::No)],
            errors: vec![Diagnostic::error(
                "Couldn't find a replacement for: var.ami in infra",
                "infra",
                "/repo/infra/main.tf",
            )],
        }
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = sample_report();
        let bytes = serialize_report(&report).expect("serialize");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.contains("\"started_at\": \"2024-05-01T10:00:00Z\""), "{text}");
        let parsed = parse_report_json(&text).expect("parse");
        assert_eq!(parsed, report);
    }

    #[test]
    fn report_json_snapshot() {
        let value = serde_json::to_value(sample_report()).expect("to value");
        insta::assert_json_snapshot!(value["failures"], @r###"
        [
          {
            "severity": "high",
            "waived": "",
            "message": "[aws_alb.web.internal] should not be 'False'. Is: 'False'",
            "moduleName": "infra",
            "fileName": "/repo/infra/main.tf"
          }
        ]
        "###);
    }

    #[test]
    fn schema_names_the_report_fields() {
        let schema = report_schema().expect("schema");
        for field in ["failures", "errors", "summary", "verdict"] {
            assert!(schema.contains(field), "{field}");
        }
    }

    #[test]
    fn rule_list_has_one_line_per_rule() {
        let listing = format_rule_list(BUILTIN_RULES);
        assert_eq!(listing.lines().count(), BUILTIN_RULES.len());
        assert!(listing.contains("public_exposure.aws_alb_public"));
    }
}
