use crate::value::{ConfigValue, Mapping};
use indexmap::IndexMap;

const QUALIFIED_PREFIXES: [&str; 4] = ["var.", "local.", "module.", "data."];

/// Values supplied from outside the configuration (CLI, variable files).
///
/// Keys are full reference texts; a bare key `env` is stored as `var.env`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariableOverrides {
    values: IndexMap<String, ConfigValue>,
}

impl VariableOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(qualify(key), value);
    }

    /// Merge every top-level entry of a decoded variable file.
    pub fn extend_from_mapping(&mut self, map: Mapping) {
        for (k, v) in map {
            self.insert(&k, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn qualify(key: &str) -> String {
    if key == "terraform.workspace" || QUALIFIED_PREFIXES.iter().any(|p| key.starts_with(p)) {
        key.to_string()
    } else {
        format!("var.{key}")
    }
}

impl<K: AsRef<str>> FromIterator<(K, ConfigValue)> for VariableOverrides {
    fn from_iter<I: IntoIterator<Item = (K, ConfigValue)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k.as_ref(), v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_keys_become_variables() {
        let o: VariableOverrides = [
            ("env", ConfigValue::from("prod")),
            ("var.region", ConfigValue::from("us-east-1")),
            ("terraform.workspace", ConfigValue::from("staging")),
        ]
        .into_iter()
        .collect();
        assert_eq!(o.get("var.env"), Some(&ConfigValue::from("prod")));
        assert_eq!(o.get("var.region"), Some(&ConfigValue::from("us-east-1")));
        assert!(o.get("terraform.workspace").is_some());
        assert!(o.get("env").is_none());
    }
}
