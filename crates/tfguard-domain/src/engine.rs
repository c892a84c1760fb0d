use crate::assert::{AssertError, Validator};
use crate::overrides::OverrideTable;
use crate::registry::ModuleRegistry;
use crate::sink::DiagnosticSink;
use tfguard_types::Severity;
use tracing::debug;

pub type CheckFn = fn(&Validator<'_>) -> Result<(), AssertError>;

/// A named check expressed through the assertion chain.
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub check: CheckFn,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Turn on "fail on missing property" for every rule.
    pub fail_on_missing: bool,
}

/// Run `rules` in order against every module in discovery order.
///
/// Stops at the first fatal error; failures recorded before it are lost with the scan.
pub fn evaluate(
    registry: &ModuleRegistry,
    rules: &[Rule],
    overrides: &OverrideTable,
    options: EvaluationOptions,
) -> Result<DiagnosticSink, AssertError> {
    let mut sink = DiagnosticSink::new();
    for rule in rules {
        for record in registry.iter() {
            let validator = Validator::new(record, rule.id, rule.severity, overrides);
            if options.fail_on_missing {
                validator.error_if_property_missing();
            }
            (rule.check)(&validator)?;
            let failures = validator.into_diagnostics();
            if !failures.is_empty() {
                debug!(
                    rule = rule.id,
                    module = %record.name,
                    failures = failures.len(),
                    "rule failed"
                );
            }
            sink.extend_failures(failures);
        }
    }
    Ok(sink)
}
