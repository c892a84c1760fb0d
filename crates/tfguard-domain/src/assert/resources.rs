use super::format::Pattern;
use super::properties::{PropertyEntry, PropertySelection};
use super::{AssertError, Validator};
use crate::registry::ResourceRecord;
use tfguard_types::Diagnostic;

/// Resources of the selected types in one module.
pub struct ResourceSelection<'v> {
    validator: &'v Validator<'v>,
    resources: Vec<&'v ResourceRecord>,
}

impl<'v> ResourceSelection<'v> {
    pub(crate) fn new(validator: &'v Validator<'v>, resources: Vec<&'v ResourceRecord>) -> Self {
        Self {
            validator,
            resources,
        }
    }

    pub fn resources(&self) -> &[&'v ResourceRecord] {
        &self.resources
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Select `name` on every resource. Resources without it are dropped, and reported
    /// when the validator fails on missing properties.
    pub fn property(&self, name: &str) -> Result<PropertySelection<'v>, AssertError> {
        let mut entries = Vec::new();
        let mut missing = Vec::new();
        for resource in self.resources.iter().copied() {
            match resource.config_map().and_then(|c| c.get(name)) {
                Some(value) => entries.push(PropertyEntry {
                    resource,
                    resource_name: resource.name.clone(),
                    property: name.to_string(),
                    value,
                }),
                None if self.validator.fail_on_missing() => {
                    missing.push(self.validator.fail(
                        resource,
                        &resource.name,
                        format!(
                            "[{}.{}] should have property: '{}'",
                            resource.resource_type, resource.name, name
                        ),
                    )?);
                }
                None => {}
            }
        }
        Ok(PropertySelection::new(self.validator, entries, missing))
    }

    /// Select every top-level property whose name matches `pattern`.
    pub fn find_property(&self, pattern: &str) -> Result<PropertySelection<'v>, AssertError> {
        let pattern = Pattern::new(pattern)?;
        let mut entries = Vec::new();
        for resource in self.resources.iter().copied() {
            let Some(config) = resource.config_map() else {
                continue;
            };
            entries.extend(
                config
                    .iter()
                    .filter(|(key, _)| pattern.is_match(key))
                    .map(|(key, value)| PropertyEntry {
                        resource,
                        resource_name: resource.name.clone(),
                        property: key.clone(),
                        value,
                    }),
            );
        }
        Ok(PropertySelection::new(self.validator, entries, Vec::new()))
    }

    /// Keep resources whose `name` property matches `pattern`.
    pub fn with_property(&self, name: &str, pattern: &str) -> Result<Self, AssertError> {
        let pattern = Pattern::new(pattern)?;
        let resources = self
            .resources
            .iter()
            .copied()
            .filter(|r| {
                r.config_map()
                    .and_then(|c| c.get(name))
                    .is_some_and(|v| pattern.matches_value(v))
            })
            .collect();
        Ok(Self::new(self.validator, resources))
    }

    pub fn should_not_exist(&self) -> Result<Vec<Diagnostic>, AssertError> {
        self.resources
            .iter()
            .map(|r| {
                self.validator.fail(
                    r,
                    &r.name,
                    format!(
                        "[{}] should not exist. Found in resource named {}",
                        r.resource_type, r.name
                    ),
                )
            })
            .collect()
    }

    pub fn should_have_properties(&self, names: &[&str]) -> Result<Vec<Diagnostic>, AssertError> {
        self.check_properties(names, false, "should have property")
    }

    pub fn should_not_have_properties(
        &self,
        names: &[&str],
    ) -> Result<Vec<Diagnostic>, AssertError> {
        self.check_properties(names, true, "should not have property")
    }

    fn check_properties(
        &self,
        names: &[&str],
        fail_when_present: bool,
        verb: &str,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        let mut out = Vec::new();
        for resource in self.resources.iter().copied() {
            let config = resource.config_map();
            for name in names {
                let present = config.is_some_and(|c| c.contains_key(*name));
                if present == fail_when_present {
                    out.push(self.validator.fail(
                        resource,
                        &resource.name,
                        format!(
                            "[{}.{}] {verb}: '{name}'",
                            resource.resource_type, resource.name
                        ),
                    )?);
                }
            }
        }
        Ok(out)
    }

    pub fn name_should_match_regex(&self, pattern: &str) -> Result<Vec<Diagnostic>, AssertError> {
        let compiled = Pattern::new(pattern)?;
        let mut out = Vec::new();
        for resource in self.resources.iter().copied() {
            if !compiled.is_match(&resource.name) {
                out.push(self.validator.fail(
                    resource,
                    &resource.name,
                    format!(
                        "[{}.{}] name should match regex: '{}'",
                        resource.resource_type,
                        resource.name,
                        compiled.as_str()
                    ),
                )?);
            }
        }
        Ok(out)
    }
}
