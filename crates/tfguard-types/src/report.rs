use crate::diagnostic::Diagnostic;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stable schema identifier for tfguard reports.
pub const SCHEMA_REPORT_V1: &str = "tfguard.report.v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScanSummary {
    pub modules_scanned: u32,
    pub resources_scanned: u32,
    pub rules_evaluated: u32,
    pub failures_total: u32,
    pub failures_waived: u32,
    pub errors_total: u32,
}

/// The JSON document written for one scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScanReport {
    pub schema: String,
    pub tool: ToolMeta,
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub verdict: Verdict,
    pub summary: ScanSummary,
    pub failures: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

impl ScanReport {
    /// Failures that no waiver covers.
    pub fn unwaived_failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.failures.iter().filter(|d| !d.waived.is_waived())
    }
}
