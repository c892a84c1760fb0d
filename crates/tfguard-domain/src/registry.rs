//! Module records: the per-module maps resolution fills in.

use crate::scope::{ScopeId, ScopeNode};
use crate::value::{ConfigValue, Mapping};
use indexmap::IndexMap;

/// Module block keys that are not input variables of the called module.
const META_ARGUMENTS: [&str; 7] = [
    "source",
    "version",
    "providers",
    "count",
    "for_each",
    "depends_on",
    "lifecycle",
];

/// A named value plus where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub value: ConfigValue,
    pub file: String,
    /// Module whose namespace the value's references point into. Differs from the
    /// owning module for invocation parameters, which are written by the caller.
    pub context: ScopeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceRecord {
    pub resource_type: String,
    pub name: String,
    pub config: ConfigValue,
    pub file: String,
    pub module: String,
}

impl ResourceRecord {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    pub fn config_map(&self) -> Option<&Mapping> {
        self.config.as_mapping()
    }
}

/// A `module "<name>" { source = ... }` block.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleCall {
    pub name: String,
    pub source: Option<String>,
    /// Called scope, when the source is a local path present in the arena.
    pub target: Option<ScopeId>,
    pub params: IndexMap<String, ConfigValue>,
    pub file: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRecord {
    pub scope: ScopeId,
    pub name: String,
    pub variables: IndexMap<String, Binding>,
    pub locals: IndexMap<String, Binding>,
    pub outputs: IndexMap<String, Binding>,
    /// Keyed by `<type>.<name>`.
    pub resources: IndexMap<String, ResourceRecord>,
    pub calls: IndexMap<String, ModuleCall>,
}

impl ModuleRecord {
    /// Build the record from the scope's own files. Nested scopes are separate records.
    pub(crate) fn build(node: &ScopeNode, call_target: impl Fn(&str) -> Option<ScopeId>) -> Self {
        let mut record = ModuleRecord {
            scope: node.id,
            name: node.name.clone(),
            variables: IndexMap::new(),
            locals: IndexMap::new(),
            outputs: IndexMap::new(),
            resources: IndexMap::new(),
            calls: IndexMap::new(),
        };

        for file in &node.files {
            let file_name = file.path.to_string();
            let bind = |value: &ConfigValue| Binding {
                value: value.clone(),
                file: file_name.clone(),
                context: node.id,
            };

            for (name, block) in labeled_blocks(&file.body, "variable", 1) {
                if let Some(default) = block.get("default") {
                    record.variables.insert(name[0].clone(), bind(default));
                }
            }

            for locals in top_blocks(&file.body, "locals") {
                for (name, value) in locals {
                    record.locals.insert(name.clone(), bind(value));
                }
            }

            for (name, block) in labeled_blocks(&file.body, "output", 1) {
                if let Some(value) = block.get("value") {
                    record.outputs.insert(name[0].clone(), bind(value));
                }
            }

            for (labels, config) in labeled_blocks(&file.body, "resource", 2) {
                let resource = ResourceRecord {
                    resource_type: labels[0].clone(),
                    name: labels[1].clone(),
                    config: ConfigValue::Mapping(config.clone()),
                    file: file_name.clone(),
                    module: node.name.clone(),
                };
                record.resources.insert(resource.address(), resource);
            }

            for (name, block) in labeled_blocks(&file.body, "module", 1) {
                let source = block.get("source").and_then(ConfigValue::as_str);
                let params = block
                    .iter()
                    .filter(|(k, _)| !META_ARGUMENTS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let call = ModuleCall {
                    name: name[0].clone(),
                    source: source.map(str::to_string),
                    target: source.and_then(&call_target),
                    params,
                    file: file_name.clone(),
                };
                record.calls.insert(call.name.clone(), call);
            }
        }

        record
    }

    fn values(&self) -> impl Iterator<Item = &ConfigValue> {
        self.variables
            .values()
            .chain(self.locals.values())
            .chain(self.outputs.values())
            .map(|b| &b.value)
            .chain(self.resources.values().map(|r| &r.config))
    }

    /// True when no value can change on another pass.
    pub fn is_settled(&self) -> bool {
        self.values().all(ConfigValue::is_settled)
    }

    pub fn is_resolved(&self) -> bool {
        self.values().all(ConfigValue::is_resolved)
    }
}

/// Blocks directly under `key`; repeated blocks may decode as a sequence.
fn top_blocks<'a>(body: &'a ConfigValue, key: &str) -> Vec<&'a Mapping> {
    let mut out = Vec::new();
    if let Some(value) = body.as_mapping().and_then(|m| m.get(key)) {
        collect_mappings(value, &mut out);
    }
    out
}

fn collect_mappings<'a>(value: &'a ConfigValue, out: &mut Vec<&'a Mapping>) {
    match value {
        ConfigValue::Mapping(m) => out.push(m),
        ConfigValue::Sequence(items) => {
            for item in items {
                collect_mappings(item, out);
            }
        }
        _ => {}
    }
}

/// Blocks under `key` with `depth` labels, e.g. `resource "<type>" "<name>" {}`.
fn labeled_blocks<'a>(
    body: &'a ConfigValue,
    key: &str,
    depth: usize,
) -> Vec<(Vec<String>, &'a Mapping)> {
    let mut level: Vec<(Vec<String>, &Mapping)> = top_blocks(body, key)
        .into_iter()
        .map(|m| (Vec::new(), m))
        .collect();
    for _ in 0..depth {
        let mut next = Vec::new();
        for (labels, map) in level {
            for (label, value) in map {
                let mut inner = Vec::new();
                collect_mappings(value, &mut inner);
                for m in inner {
                    let mut l = labels.clone();
                    l.push(label.clone());
                    next.push((l, m));
                }
            }
        }
        level = next;
    }
    level
}

/// Resolved module records, in scope discovery order.
#[derive(Clone, Debug, Default)]
pub struct ModuleRegistry {
    records: IndexMap<ScopeId, ModuleRecord>,
}

impl ModuleRegistry {
    pub fn insert(&mut self, record: ModuleRecord) {
        self.records.insert(record.scope, record);
    }

    pub fn contains(&self, scope: ScopeId) -> bool {
        self.records.contains_key(&scope)
    }

    pub fn by_scope(&self, scope: ScopeId) -> Option<&ModuleRecord> {
        self.records.get(&scope)
    }

    pub(crate) fn by_scope_mut(&mut self, scope: ScopeId) -> Option<&mut ModuleRecord> {
        self.records.get_mut(&scope)
    }

    /// First record with this module name.
    pub fn get(&self, name: &str) -> Option<&ModuleRecord> {
        self.records.values().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn sort_by_scope(&mut self) {
        self.records.sort_keys();
    }
}
