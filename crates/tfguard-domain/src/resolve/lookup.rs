use super::{ResolutionContext, Site, SlotKey, SlotKind};
use crate::reference::{Accessor, Reference, Root};
use crate::scope::ScopeId;
use crate::value::ConfigValue;
use tracing::{trace, warn};

pub(crate) enum Lookup {
    Found(ConfigValue),
    Missing(Miss),
}

/// Why a reference could not be replaced, and whether that deserves an error.
pub(crate) struct Miss {
    pub(crate) message: String,
    pub(crate) reportable: bool,
}

impl Miss {
    pub(crate) fn reportable(message: String) -> Self {
        Self {
            message,
            reportable: true,
        }
    }

    pub(crate) fn silent() -> Self {
        Self {
            message: String::new(),
            reportable: false,
        }
    }
}

impl ResolutionContext<'_> {
    pub(crate) fn lookup(&mut self, reference: &Reference, site: &Site) -> Lookup {
        let found = match &reference.root {
            Root::Variable(name) => self.lookup_slot(site.scope, SlotKind::Variable, name),
            Root::Local(name) => self.lookup_slot(site.scope, SlotKind::Local, name),
            Root::Module(name) => return self.lookup_module_output(name, reference, site),
            Root::Data | Root::Workspace => None,
        };

        let (value, consumed) = match found {
            Some(value) => (value, 0),
            None => match self.override_value(reference) {
                Some(found) => found,
                None => return Lookup::Missing(self.not_found(reference, site)),
            },
        };
        if !value.is_resolved() {
            return Lookup::Missing(self.unresolved_dependency(&value, reference, site));
        }
        let value = walk(value, &reference.accessors[consumed..], reference);
        if let Lookup::Found(v) = &value {
            trace!(%reference, value = %v, "resolved reference");
        }
        value
    }

    fn lookup_slot(&mut self, scope: ScopeId, kind: SlotKind, name: &str) -> Option<ConfigValue> {
        let key = SlotKey {
            scope,
            kind,
            name: name.to_string(),
        };
        self.resolve_slot(&key)
    }

    fn override_value(&self, reference: &Reference) -> Option<(ConfigValue, usize)> {
        let (key, consumed) = reference.override_key();
        self.overrides.get(&key).map(|v| (v.clone(), consumed))
    }

    fn not_found(&self, reference: &Reference, site: &Site) -> Miss {
        match reference.root {
            // Data sources are only ever supplied through overrides.
            Root::Data => Miss::silent(),
            _ => Miss::reportable(format!(
                "Couldn't find a replacement for: {reference} in {}",
                self.module_name(site.scope)
            )),
        }
    }

    /// A dependency whose own references all failed has already been reported.
    fn unresolved_dependency(
        &self,
        value: &ConfigValue,
        reference: &Reference,
        site: &Site,
    ) -> Miss {
        if value.is_settled() {
            Miss::silent()
        } else {
            self.not_found(reference, site)
        }
    }

    fn lookup_module_output(&mut self, module: &str, reference: &Reference, site: &Site) -> Lookup {
        let Some(Accessor::Attr(output)) = reference.accessors.first() else {
            return Lookup::Missing(Miss::reportable(format!(
                "Error resolving variable: {reference} is missing the expected output name"
            )));
        };
        let target = match self.module_target(site.scope, module) {
            Some(target) if self.ensure_record(target) => target,
            _ => {
                return Lookup::Missing(Miss::reportable(format!(
                    "Error resolving variable: {reference} module {module} not found"
                )));
            }
        };

        self.resolve_module(target);
        match self.lookup_slot(target, SlotKind::Output, output) {
            Some(value) if value.is_resolved() => walk(value, &reference.accessors[1..], reference),
            Some(value) => Lookup::Missing(self.unresolved_dependency(&value, reference, site)),
            None => Lookup::Missing(Miss::reportable(format!(
                "Error resolving variable: {reference} variable not found in module {module}"
            ))),
        }
    }

    /// A `module` block in the calling scope wins; otherwise the first directory with
    /// that name, depth-first from the root.
    fn module_target(&self, scope: ScopeId, module: &str) -> Option<ScopeId> {
        let called = self
            .registry
            .by_scope(scope)
            .and_then(|r| r.calls.get(module))
            .and_then(|c| c.target);
        if called.is_some() {
            return called;
        }
        let matches = self.tree.all_named(module);
        if matches.len() > 1 {
            warn!(
                module,
                candidates = matches.len(),
                "ambiguous module name, using the first match"
            );
        }
        matches.first().copied()
    }
}

/// Apply attribute and index accessors to an already resolved value.
fn walk(mut value: ConfigValue, accessors: &[Accessor], reference: &Reference) -> Lookup {
    for accessor in accessors {
        let key = match accessor {
            Accessor::Attr(name) => name.clone(),
            Accessor::Index(index) => match index.as_scalar() {
                Some(scalar) => scalar.to_text(),
                // The index expression reports its own failure.
                None => return Lookup::Missing(Miss::silent()),
            },
        };
        let next = match &mut value {
            ConfigValue::Mapping(map) => map.swap_remove(&key),
            ConfigValue::Sequence(items) => index_into(items, &key),
            _ => None,
        };
        value = match next {
            Some(v) => v,
            None => {
                return Lookup::Missing(Miss::reportable(format!(
                    "Couldn't find key {key} for: {reference}"
                )));
            }
        };
    }
    Lookup::Found(value)
}

fn index_into(items: &mut Vec<ConfigValue>, key: &str) -> Option<ConfigValue> {
    let index = key.parse::<usize>().ok()?;
    (index < items.len()).then(|| items.swap_remove(index))
}
