use super::format::{self, Pattern};
use super::{AssertError, Validator};
use crate::registry::ResourceRecord;
use crate::value::ConfigValue;
use tfguard_types::Diagnostic;

/// One selected property value.
#[derive(Clone, Debug)]
pub struct PropertyEntry<'v> {
    pub resource: &'v ResourceRecord,
    /// Resource name, extended with each parent property on nested selections
    /// (`web.root_block_device`).
    pub resource_name: String,
    pub property: String,
    pub value: &'v ConfigValue,
}

impl PropertyEntry<'_> {
    fn label(&self) -> String {
        format!(
            "{}.{}.{}",
            self.resource.resource_type, self.resource_name, self.property
        )
    }

    fn nested_name(&self) -> String {
        format!("{}.{}", self.resource_name, self.property)
    }
}

/// Flattened `(resource, property, value)` selections.
pub struct PropertySelection<'v> {
    validator: &'v Validator<'v>,
    entries: Vec<PropertyEntry<'v>>,
    missing: Vec<Diagnostic>,
}

impl<'v> PropertySelection<'v> {
    pub(crate) fn new(
        validator: &'v Validator<'v>,
        entries: Vec<PropertyEntry<'v>>,
        missing: Vec<Diagnostic>,
    ) -> Self {
        Self {
            validator,
            entries,
            missing,
        }
    }

    pub fn entries(&self) -> &[PropertyEntry<'v>] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// "Missing property" failures recorded while building this selection.
    pub fn missing(&self) -> &[Diagnostic] {
        &self.missing
    }

    /// Select `name` inside map values, and inside every map of a list value.
    pub fn property(&self, name: &str) -> Result<PropertySelection<'v>, AssertError> {
        let mut entries = Vec::new();
        let mut missing = Vec::new();
        for entry in &self.entries {
            let before = entries.len();
            for map in mappings(entry.value) {
                if let Some(value) = map.get(name) {
                    entries.push(PropertyEntry {
                        resource: entry.resource,
                        resource_name: entry.nested_name(),
                        property: name.to_string(),
                        value,
                    });
                }
            }
            if entries.len() == before && self.validator.fail_on_missing() {
                missing.push(self.validator.fail(
                    entry.resource,
                    &entry.resource_name,
                    format!(
                        "[{}.{}] should have property: '{}'",
                        entry.resource.resource_type,
                        entry.nested_name(),
                        name
                    ),
                )?);
            }
        }
        Ok(PropertySelection::new(self.validator, entries, missing))
    }

    /// Select every key of map values that matches `pattern`.
    pub fn find_property(&self, pattern: &str) -> Result<PropertySelection<'v>, AssertError> {
        let pattern = Pattern::new(pattern)?;
        let mut entries = Vec::new();
        for entry in &self.entries {
            let Some(map) = entry.value.as_mapping() else {
                continue;
            };
            for (key, value) in map {
                if pattern.is_match(key) {
                    entries.push(PropertyEntry {
                        resource: entry.resource,
                        resource_name: entry.nested_name(),
                        property: key.clone(),
                        value,
                    });
                }
            }
        }
        Ok(PropertySelection::new(self.validator, entries, Vec::new()))
    }

    pub fn should_equal(
        &self,
        expected: impl Into<ConfigValue>,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        self.compare(expected.into(), false, true)
    }

    pub fn should_equal_case_insensitive(
        &self,
        expected: impl Into<ConfigValue>,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        self.compare(expected.into(), true, true)
    }

    pub fn should_not_equal(
        &self,
        expected: impl Into<ConfigValue>,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        self.compare(expected.into(), false, false)
    }

    pub fn should_not_equal_case_insensitive(
        &self,
        expected: impl Into<ConfigValue>,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        self.compare(expected.into(), true, false)
    }

    /// Messages carry the canonical forms; case folding only affects the comparison.
    fn compare(
        &self,
        expected: ConfigValue,
        ignore_case: bool,
        want_equal: bool,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        let expected = format::canonical(&expected);
        let mut out = Vec::new();
        for entry in &self.entries {
            let actual = format::canonical(entry.value);
            let equal = if ignore_case {
                actual.to_lowercase() == expected.to_lowercase()
            } else {
                actual == expected
            };
            if equal != want_equal {
                let verb = if want_equal { "should be" } else { "should not be" };
                out.push(self.validator.fail(
                    entry.resource,
                    &entry.resource_name,
                    format!("[{}] {verb} '{expected}'. Is: '{actual}'", entry.label()),
                )?);
            }
        }
        Ok(out)
    }

    /// Every given value must be in the property: a substring of a string, an element
    /// of a list, or a key of a map.
    pub fn list_should_contain(
        &self,
        values: impl Into<ConfigValue>,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        let values = operand_list(values.into());
        let mut out = Vec::new();
        for entry in &self.entries {
            let missing: Vec<ConfigValue> = values
                .iter()
                .filter(|v| !contains(entry.value, v))
                .cloned()
                .collect();
            if !missing.is_empty() {
                out.push(self.validator.fail(
                    entry.resource,
                    &entry.resource_name,
                    format!(
                        "[{}] '{}' should contain '{}'.",
                        entry.label(),
                        format::list_actual(entry.value),
                        format::list_repr(&missing)
                    ),
                )?);
            }
        }
        Ok(out)
    }

    pub fn list_should_not_contain(
        &self,
        values: impl Into<ConfigValue>,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        let values = operand_list(values.into());
        let mut out = Vec::new();
        for entry in &self.entries {
            let present: Vec<ConfigValue> = values
                .iter()
                .filter(|v| contains(entry.value, v))
                .cloned()
                .collect();
            if !present.is_empty() {
                out.push(self.validator.fail(
                    entry.resource,
                    &entry.resource_name,
                    format!(
                        "[{}] '{}' should not contain '{}'.",
                        entry.label(),
                        format::list_actual(entry.value),
                        format::list_repr(&present)
                    ),
                )?);
            }
        }
        Ok(out)
    }

    /// Every element of the property must be one of `allowed`; one failure per property.
    pub fn list_should_contain_any(
        &self,
        allowed: impl Into<ConfigValue>,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        let allowed = operand_list(allowed.into());
        let allowed_text: Vec<String> = allowed.iter().map(format::canonical).collect();
        let mut out = Vec::new();
        for entry in &self.entries {
            let items = match entry.value {
                ConfigValue::Sequence(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            let stray = items
                .iter()
                .any(|item| !allowed_text.contains(&format::canonical(item)));
            if stray {
                out.push(self.validator.fail(
                    entry.resource,
                    &entry.resource_name,
                    format!(
                        "[{}] '{}' should have been one of '{}'.",
                        entry.label(),
                        format::list_actual(entry.value),
                        format::list_repr(&allowed)
                    ),
                )?);
            }
        }
        Ok(out)
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

    /// Keys are those of a map value, or of all maps in a list value.
    fn check_properties(
        &self,
        names: &[&str],
        fail_when_present: bool,
        verb: &str,
    ) -> Result<Vec<Diagnostic>, AssertError> {
        let mut out = Vec::new();
        for entry in &self.entries {
            let maps = mappings(entry.value);
            for name in names {
                let present = maps.iter().any(|m| m.contains_key(*name));
                if present == fail_when_present {
                    out.push(self.validator.fail(
                        entry.resource,
                        &entry.resource_name,
                        format!("[{}] {verb}: '{name}'", entry.label()),
                    )?);
                }
            }
        }
        Ok(out)
    }

    pub fn should_match_regex(&self, pattern: &str) -> Result<Vec<Diagnostic>, AssertError> {
        let compiled = Pattern::new(pattern)?;
        let mut out = Vec::new();
        for entry in &self.entries {
            if !compiled.matches_value(entry.value) {
                out.push(self.validator.fail(
                    entry.resource,
                    &entry.resource_name,
                    format!("[{}] should match regex '{}'", entry.label(), compiled.as_str()),
                )?);
            }
        }
        Ok(out)
    }

    /// String values must parse as JSON. Non-string values fail.
    pub fn should_contain_valid_json(&self) -> Result<Vec<Diagnostic>, AssertError> {
        let mut out = Vec::new();
        for entry in &self.entries {
            let valid = entry
                .value
                .as_str()
                .is_some_and(|s| serde_json::from_str::<serde_json::Value>(s).is_ok());
            if !valid {
                out.push(self.validator.fail(
                    entry.resource,
                    &entry.resource_name,
                    format!("[{}] is not valid json", entry.label()),
                )?);
            }
        }
        Ok(out)
    }
}

fn mappings(value: &ConfigValue) -> Vec<&crate::value::Mapping> {
    match value {
        ConfigValue::Mapping(map) => vec![map],
        ConfigValue::Sequence(items) => items.iter().filter_map(ConfigValue::as_mapping).collect(),
        _ => Vec::new(),
    }
}

fn operand_list(value: ConfigValue) -> Vec<ConfigValue> {
    match value {
        ConfigValue::Sequence(items) => items,
        single => vec![single],
    }
}

fn contains(haystack: &ConfigValue, needle: &ConfigValue) -> bool {
    match haystack {
        ConfigValue::Scalar(crate::value::Scalar::String(s)) => {
            s.contains(&format::display(needle))
        }
        ConfigValue::Sequence(items) => {
            let needle = format::canonical(needle);
            items.iter().any(|i| format::canonical(i) == needle)
        }
        ConfigValue::Mapping(map) => map.contains_key(&format::display(needle)),
        other => format::canonical(other) == format::canonical(needle),
    }
}
