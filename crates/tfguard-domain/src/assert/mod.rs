//! Fluent assertions over the resources of one resolved module.
//!
//! Rules start from [`Validator::resources`] and narrow down to properties. Every
//! operation that can fail appends [`Diagnostic`]s to the validator and also returns
//! the ones it appended.

mod format;
mod properties;
mod resources;

pub use properties::{PropertyEntry, PropertySelection};
pub use resources::ResourceSelection;

use crate::overrides::{InvalidOverride, OverrideTable};
use crate::registry::{ModuleRecord, ResourceRecord};
use std::cell::{Cell, RefCell};
use tfguard_types::{Diagnostic, Severity};

#[derive(Debug, thiserror::Error)]
pub enum AssertError {
    /// Fatal: the scan must stop with the reserved exit status.
    #[error(transparent)]
    InvalidOverride(#[from] InvalidOverride),
    #[error("invalid pattern '{pattern}' in rule: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Which resource types a selection covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSelector {
    /// Anchored regex over resource types.
    Pattern(String),
    /// Exact resource types, selected in the given order.
    Names(Vec<String>),
}

impl From<&str> for TypeSelector {
    fn from(pattern: &str) -> Self {
        TypeSelector::Pattern(pattern.to_string())
    }
}

impl From<&[&str]> for TypeSelector {
    fn from(names: &[&str]) -> Self {
        TypeSelector::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TypeSelector {
    fn from(names: [&str; N]) -> Self {
        TypeSelector::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Assertion context for one rule against one module.
pub struct Validator<'a> {
    record: &'a ModuleRecord,
    rule: &'a str,
    severity: Severity,
    overrides: &'a OverrideTable,
    fail_on_missing: Cell<bool>,
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl<'a> Validator<'a> {
    pub fn new(
        record: &'a ModuleRecord,
        rule: &'a str,
        severity: Severity,
        overrides: &'a OverrideTable,
    ) -> Self {
        Self {
            record,
            rule,
            severity,
            overrides,
            fail_on_missing: Cell::new(false),
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    /// Report a failure whenever `property(..)` finds a resource without the property.
    pub fn error_if_property_missing(&self) {
        self.fail_on_missing.set(true);
    }

    pub fn fail_on_missing(&self) -> bool {
        self.fail_on_missing.get()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn module(&self) -> &ModuleRecord {
        self.record
    }

    /// Select resources by type.
    ///
    /// A pattern yields types in first-seen order; a name list yields them in list
    /// order. Resources of one type keep their declaration order.
    pub fn resources(
        &self,
        selector: impl Into<TypeSelector>,
    ) -> Result<ResourceSelection<'_>, AssertError> {
        let selector = selector.into();
        let mut types: Vec<&str> = Vec::new();
        match &selector {
            TypeSelector::Pattern(pattern) => {
                let pattern = format::Pattern::new(pattern)?;
                for resource in self.record.resources.values() {
                    let ty = resource.resource_type.as_str();
                    if !types.contains(&ty) && pattern.is_match(ty) {
                        types.push(ty);
                    }
                }
            }
            TypeSelector::Names(names) => types.extend(names.iter().map(String::as_str)),
        }

        let selected = types
            .iter()
            .flat_map(|ty| {
                self.record
                    .resources
                    .values()
                    .filter(move |r| r.resource_type == *ty)
            })
            .collect();
        Ok(ResourceSelection::new(self, selected))
    }

    /// Everything appended so far, in order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_inner()
    }

    /// Record one failure against `resource`, applying the waiver table.
    ///
    /// `label` is the resource name, or `<name>.<property>` for nested blocks.
    pub(crate) fn fail(
        &self,
        resource: &ResourceRecord,
        label: &str,
        message: String,
    ) -> Result<Diagnostic, AssertError> {
        let waived = self.overrides.waiver(
            self.rule,
            self.severity,
            &resource.resource_type,
            label,
        )?;
        let diagnostic = Diagnostic::new(self.severity, message, &resource.module, &resource.file)
            .with_waiver(waived);
        self.diagnostics.borrow_mut().push(diagnostic.clone());
        Ok(diagnostic)
    }
}
