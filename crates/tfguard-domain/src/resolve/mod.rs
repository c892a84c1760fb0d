//! Two-pass reference resolution over a [`ScopeTree`].
//!
//! All mutable state lives in [`ResolutionContext`]. The first pass resolves whatever it
//! can and marks failed attempts [`ReferenceState::PendingRetry`]; the second pass
//! retries those, marks leftovers [`ReferenceState::Failed`] and reports them.
//!
//! [`ReferenceState::PendingRetry`]: crate::reference::ReferenceState::PendingRetry
//! [`ReferenceState::Failed`]: crate::reference::ReferenceState::Failed

mod expression;
mod lookup;
mod variables;

pub use variables::VariableOverrides;

use crate::registry::{Binding, ModuleRecord, ModuleRegistry};
use crate::scope::{ScopeId, ScopeTree, is_local_source};
use crate::value::ConfigValue;
use std::collections::HashSet;
use tfguard_types::Diagnostic;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    First,
    Second,
}

/// Output of a full resolution run.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub registry: ModuleRegistry,
    /// Unresolvable references, reported once each on the second pass.
    pub errors: Vec<Diagnostic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SlotKind {
    Variable,
    Local,
    Output,
    Resource,
}

/// One named value of one module.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    pub(crate) scope: ScopeId,
    pub(crate) kind: SlotKind,
    pub(crate) name: String,
}

/// Where a value being resolved lives: references are looked up in `scope`, errors
/// are attributed to `file`.
#[derive(Clone, Debug)]
pub(crate) struct Site {
    pub(crate) scope: ScopeId,
    pub(crate) file: String,
}

pub struct ResolutionContext<'t> {
    tree: &'t ScopeTree,
    registry: ModuleRegistry,
    overrides: VariableOverrides,
    pass: Pass,
    active_slots: HashSet<SlotKey>,
    active_modules: HashSet<ScopeId>,
    visited: HashSet<ScopeId>,
    errors: Vec<Diagnostic>,
}

/// Resolve every module of `tree` in two passes.
pub fn resolve(tree: &ScopeTree, overrides: VariableOverrides) -> Resolution {
    let mut ctx = ResolutionContext::new(tree, overrides);
    ctx.run();
    ctx.into_resolution()
}

impl<'t> ResolutionContext<'t> {
    pub fn new(tree: &'t ScopeTree, overrides: VariableOverrides) -> Self {
        Self {
            tree,
            registry: ModuleRegistry::default(),
            overrides,
            pass: Pass::First,
            active_slots: HashSet::new(),
            active_modules: HashSet::new(),
            visited: HashSet::new(),
            errors: Vec::new(),
        }
    }

    pub fn pass(&self) -> Pass {
        self.pass
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Run both passes over every scope that holds configuration files.
    ///
    /// Records are registered in discovery order. Within a pass, invocation parameters
    /// are pushed into called modules first, then modules resolve children-first.
    pub fn run(&mut self) {
        let tree = self.tree;
        for node in tree.iter() {
            self.ensure_record(node.id);
        }
        let order = tree.post_order();

        for pass in [Pass::First, Pass::Second] {
            self.pass = pass;
            self.visited.clear();
            debug!(?pass, modules = self.registry.len(), "resolution pass");
            for id in &order {
                self.apply_calls(*id);
            }
            for id in &order {
                self.resolve_module(*id);
            }
        }
        self.registry.sort_by_scope();
    }

    /// Resolve the first module named `name` (depth-first) in the current pass and
    /// return its record.
    pub fn resolve_named(&mut self, name: &str) -> Option<&ModuleRecord> {
        let scope = self.tree.find_by_name(name)?;
        if !self.ensure_record(scope) {
            return None;
        }
        self.resolve_module(scope);
        self.registry.by_scope(scope)
    }

    pub fn into_resolution(self) -> Resolution {
        Resolution {
            registry: self.registry,
            errors: self.errors,
        }
    }

    /// Build the record for `scope` on first use. False for scopes without files.
    pub(crate) fn ensure_record(&mut self, scope: ScopeId) -> bool {
        if self.registry.contains(scope) {
            return true;
        }
        let tree = self.tree;
        let node = tree.get(scope);
        if !node.has_files() {
            return false;
        }
        let record = ModuleRecord::build(node, |source| {
            is_local_source(source)
                .then(|| tree.resolve_source(scope, source))
                .flatten()
        });
        trace!(module = %record.name, resources = record.resources.len(), "registered module");
        self.registry.insert(record);
        true
    }

    /// Push resolved invocation parameters of every `module` block in `caller` into
    /// the called module's variables.
    ///
    /// The first pass only transfers fully resolved parameters; the second transfers
    /// everything, so unresolved parameters keep their references and caller context.
    fn apply_calls(&mut self, caller: ScopeId) {
        let Some(record) = self.registry.by_scope(caller) else {
            return;
        };
        let calls: Vec<_> = record.calls.values().cloned().collect();

        for call in calls {
            let Some(target) = call.target else {
                debug!(
                    module = %call.name,
                    source = ?call.source,
                    "module source is not a local directory, skipping"
                );
                continue;
            };
            if !self.ensure_record(target) {
                continue;
            }
            let site = Site {
                scope: caller,
                file: call.file.clone(),
            };
            for (name, value) in call.params {
                let value = self.resolve_value(value, &site);
                if self.pass == Pass::First && !value.is_resolved() {
                    continue;
                }
                let binding = Binding {
                    value,
                    file: call.file.clone(),
                    context: caller,
                };
                if let Some(callee) = self.registry.by_scope_mut(target) {
                    callee.variables.insert(name, binding);
                }
            }
        }
    }

    /// Resolve every value of one module, at most once per pass.
    pub(crate) fn resolve_module(&mut self, scope: ScopeId) {
        if self.visited.contains(&scope) || self.active_modules.contains(&scope) {
            return;
        }
        let Some(record) = self.registry.by_scope(scope) else {
            return;
        };
        if self.pass == Pass::Second && record.is_settled() {
            self.visited.insert(scope);
            return;
        }

        let slots: Vec<SlotKey> = record
            .variables
            .keys()
            .map(|n| (SlotKind::Variable, n))
            .chain(record.locals.keys().map(|n| (SlotKind::Local, n)))
            .chain(record.outputs.keys().map(|n| (SlotKind::Output, n)))
            .chain(record.resources.keys().map(|n| (SlotKind::Resource, n)))
            .map(|(kind, name)| SlotKey {
                scope,
                kind,
                name: name.clone(),
            })
            .collect();

        self.active_modules.insert(scope);
        for slot in &slots {
            self.resolve_slot(slot);
        }
        self.active_modules.remove(&scope);
        self.visited.insert(scope);
    }

    /// Resolve one slot on demand and store the result.
    ///
    /// A slot already under resolution is returned as-is, which breaks reference cycles.
    pub(crate) fn resolve_slot(&mut self, key: &SlotKey) -> Option<ConfigValue> {
        let (value, site) = self.read_slot(key)?;
        if value.is_resolved() || self.active_slots.contains(key) {
            return Some(value);
        }

        self.active_slots.insert(key.clone());
        let resolved = self.resolve_value(value, &site);
        self.active_slots.remove(key);

        self.write_slot(key, resolved.clone());
        Some(resolved)
    }

    fn read_slot(&self, key: &SlotKey) -> Option<(ConfigValue, Site)> {
        let record = self.registry.by_scope(key.scope)?;
        let binding = |b: &Binding| {
            (
                b.value.clone(),
                Site {
                    scope: b.context,
                    file: b.file.clone(),
                },
            )
        };
        match key.kind {
            SlotKind::Variable => record.variables.get(&key.name).map(binding),
            SlotKind::Local => record.locals.get(&key.name).map(binding),
            SlotKind::Output => record.outputs.get(&key.name).map(binding),
            SlotKind::Resource => record.resources.get(&key.name).map(|r| {
                (
                    r.config.clone(),
                    Site {
                        scope: key.scope,
                        file: r.file.clone(),
                    },
                )
            }),
        }
    }

    fn write_slot(&mut self, key: &SlotKey, value: ConfigValue) {
        let Some(record) = self.registry.by_scope_mut(key.scope) else {
            return;
        };
        let slot = match key.kind {
            SlotKind::Variable => record.variables.get_mut(&key.name).map(|b| &mut b.value),
            SlotKind::Local => record.locals.get_mut(&key.name).map(|b| &mut b.value),
            SlotKind::Output => record.outputs.get_mut(&key.name).map(|b| &mut b.value),
            SlotKind::Resource => record.resources.get_mut(&key.name).map(|r| &mut r.config),
        };
        if let Some(slot) = slot {
            *slot = value;
        }
    }

    pub(crate) fn module_name(&self, scope: ScopeId) -> &str {
        &self.tree.get(scope).name
    }
}

#[cfg(test)]
mod tests;
