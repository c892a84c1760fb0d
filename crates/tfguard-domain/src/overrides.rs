//! Waiver table: `[rule, resource]` or `[rule, resource, reference id]` entries.
//!
//! A waiver on a `high` severity rule only counts with a tracked reference id
//! (`RR-<digits>` or `RAR-<digits>`, 1 to 10 digits). Anything else is a fatal
//! misconfiguration rather than a diagnostic.

use tfguard_types::{Severity, Waived};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleOverride {
    pub rule: String,
    pub resource: String,
    pub reference_id: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("override entry must have 2 or 3 fields (rule, resource, reference id), got {0}")]
pub struct OverrideShapeError(pub usize);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "invalid override {rule}:{resource}{}: high severity rules need a reference id in the form RR-xxx or RAR-xxx where xxx is 1-10 digits",
    .reference_id.as_deref().map(|id| format!(":{id}")).unwrap_or_default()
)]
pub struct InvalidOverride {
    pub rule: String,
    pub resource: String,
    pub reference_id: Option<String>,
}

impl RuleOverride {
    pub fn new(rule: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            resource: resource.into(),
            reference_id: None,
        }
    }

    pub fn with_reference(mut self, id: impl Into<String>) -> Self {
        self.reference_id = Some(id.into());
        self
    }

    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self, OverrideShapeError> {
        match fields {
            [rule, resource] => Ok(Self::new(rule.as_ref(), resource.as_ref())),
            [rule, resource, id] => {
                Ok(Self::new(rule.as_ref(), resource.as_ref()).with_reference(id.as_ref()))
            }
            other => Err(OverrideShapeError(other.len())),
        }
    }

    /// Matches `label` or its owning resource name, each bare or behind `<type>.`.
    ///
    /// A nested property failure is labelled `<name>.<property>`, so an entry can
    /// waive either the whole resource or just that nested block.
    fn matches(&self, rule: &str, resource_type: &str, label: &str) -> bool {
        if self.rule != rule {
            return false;
        }
        let root = label.split_once('.').map_or(label, |(name, _)| name);
        let unprefixed = self
            .resource
            .strip_prefix(resource_type)
            .and_then(|rest| rest.strip_prefix('.'));
        [Some(self.resource.as_str()), unprefixed]
            .into_iter()
            .flatten()
            .any(|candidate| candidate == label || candidate == root)
    }
}

pub fn is_valid_reference_id(id: &str) -> bool {
    let digits = id.strip_prefix("RR-").or_else(|| id.strip_prefix("RAR-"));
    matches!(
        digits,
        Some(d) if (1..=10).contains(&d.len()) && d.bytes().all(|b| b.is_ascii_digit())
    )
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverrideTable {
    entries: Vec<RuleOverride>,
}

impl OverrideTable {
    pub fn new(entries: Vec<RuleOverride>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RuleOverride] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Waiver state for a failure of `rule` labelled `label`; the first matching entry wins.
    pub fn waiver(
        &self,
        rule: &str,
        severity: Severity,
        resource_type: &str,
        label: &str,
    ) -> Result<Waived, InvalidOverride> {
        let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.matches(rule, resource_type, label))
        else {
            return Ok(Waived::No);
        };

        if severity != Severity::High {
            return Ok(Waived::Yes);
        }
        match entry.reference_id.as_deref() {
            Some(id) if is_valid_reference_id(id) => Ok(Waived::By(id.to_string())),
            _ => Err(InvalidOverride {
                rule: entry.rule.clone(),
                resource: entry.resource.clone(),
                reference_id: entry.reference_id.clone(),
            }),
        }
    }
}

impl FromIterator<RuleOverride> for OverrideTable {
    fn from_iter<I: IntoIterator<Item = RuleOverride>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_ids_need_prefix_and_digits() {
        assert!(is_valid_reference_id("RR-1234"));
        assert!(is_valid_reference_id("RAR-1"));
        assert!(is_valid_reference_id("RR-1234567890"));
        assert!(!is_valid_reference_id("RR-12345678901"));
        assert!(!is_valid_reference_id("RR-"));
        assert!(!is_valid_reference_id("XR-12"));
        assert!(!is_valid_reference_id("RR-12a"));
    }

    #[test]
    fn high_severity_waiver_reports_its_id() {
        let table: OverrideTable =
            [RuleOverride::new("alb_internal", "web").with_reference("RR-1234")]
                .into_iter()
                .collect();
        assert_eq!(
            table.waiver("alb_internal", Severity::High, "aws_alb", "web"),
            Ok(Waived::By("RR-1234".to_string()))
        );
        assert_eq!(
            table.waiver("alb_internal", Severity::High, "aws_alb", "other"),
            Ok(Waived::No)
        );
        assert_eq!(
            table.waiver("other_rule", Severity::High, "aws_alb", "web"),
            Ok(Waived::No)
        );
    }

    #[test]
    fn high_severity_waiver_without_id_is_fatal() {
        let table: OverrideTable = [RuleOverride::new("alb_internal", "web")]
            .into_iter()
            .collect();
        let err = table
            .waiver("alb_internal", Severity::High, "aws_alb", "web")
            .expect_err("fatal");
        assert_eq!(err.resource, "web");
        assert!(err.to_string().contains("RR-xxx"));
    }

    #[test]
    fn lower_severities_waive_without_id() {
        let table: OverrideTable = [RuleOverride::new("tags", "aws_s3_bucket.logs")]
            .into_iter()
            .collect();
        assert_eq!(
            table.waiver("tags", Severity::Low, "aws_s3_bucket", "logs"),
            Ok(Waived::Yes)
        );
    }

    #[test]
    fn nested_labels_match_their_own_entry_or_the_owner() {
        let nested: OverrideTable = [RuleOverride::new("ebs_encrypted", "web.ebs_block_device")]
            .into_iter()
            .collect();
        assert_eq!(
            nested.waiver(
                "ebs_encrypted",
                Severity::Medium,
                "aws_instance",
                "web.ebs_block_device"
            ),
            Ok(Waived::Yes)
        );
        assert_eq!(
            nested.waiver(
                "ebs_encrypted",
                Severity::Medium,
                "aws_instance",
                "web.root_block_device"
            ),
            Ok(Waived::No)
        );

        let typed: OverrideTable =
            [RuleOverride::new("ebs_encrypted", "aws_instance.web.ebs_block_device")]
                .into_iter()
                .collect();
        assert_eq!(
            typed.waiver(
                "ebs_encrypted",
                Severity::Medium,
                "aws_instance",
                "web.ebs_block_device"
            ),
            Ok(Waived::Yes)
        );

        let owner: OverrideTable = [RuleOverride::new("ebs_encrypted", "web")]
            .into_iter()
            .collect();
        assert_eq!(
            owner.waiver(
                "ebs_encrypted",
                Severity::Medium,
                "aws_instance",
                "web.ebs_block_device"
            ),
            Ok(Waived::Yes)
        );
    }

    #[test]
    fn entries_must_have_two_or_three_fields() {
        assert!(RuleOverride::from_fields(&["a", "b"]).is_ok());
        assert_eq!(
            RuleOverride::from_fields(&["a", "b", "RR-1"]).map(|o| o.reference_id),
            Ok(Some("RR-1".to_string()))
        );
        assert_eq!(RuleOverride::from_fields(&["a"]), Err(OverrideShapeError(1)));
    }
}
