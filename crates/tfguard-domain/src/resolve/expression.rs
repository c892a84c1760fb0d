use super::lookup::{Lookup, Miss};
use super::{Pass, ResolutionContext, Site};
use crate::functions::{self, Arithmetic};
use crate::reference::{
    Accessor, Expr, Interpolation, Reference, ReferenceState, Template, TemplatePart,
};
use crate::value::ConfigValue;
use tfguard_types::Diagnostic;
use tracing::debug;

impl ResolutionContext<'_> {
    /// Resolve every node of `value` that can be resolved right now.
    pub(crate) fn resolve_value(&mut self, value: ConfigValue, site: &Site) -> ConfigValue {
        match value {
            ConfigValue::Scalar(_) => value,
            ConfigValue::Sequence(items) => {
                let items: Vec<ConfigValue> = items
                    .into_iter()
                    .map(|item| self.resolve_value(item, site))
                    .collect();
                match functions::evaluate_triple(&items) {
                    Some(number) => number,
                    None => ConfigValue::Sequence(items),
                }
            }
            ConfigValue::Mapping(map) => ConfigValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, self.resolve_value(v, site)))
                    .collect(),
            ),
            ConfigValue::Reference(template) => self.resolve_template(template, site),
            ConfigValue::FunctionCall(mut call) => {
                call.args = std::mem::take(&mut call.args)
                    .into_iter()
                    .map(|arg| self.resolve_value(arg, site))
                    .collect();
                call.evaluate().unwrap_or(ConfigValue::FunctionCall(call))
            }
            ConfigValue::Arithmetic(arithmetic) => {
                let Arithmetic { lhs, op, rhs } = *arithmetic;
                let arithmetic = Arithmetic {
                    lhs: self.resolve_value(lhs, site),
                    op,
                    rhs: self.resolve_value(rhs, site),
                };
                arithmetic
                    .evaluate()
                    .unwrap_or_else(|| ConfigValue::Arithmetic(Box::new(arithmetic)))
            }
        }
    }

    /// A whole-value template takes the type of its value; otherwise resolved parts
    /// are spliced in as text and the remaining interpolations are kept.
    fn resolve_template(&mut self, template: Template, site: &Site) -> ConfigValue {
        let whole = template.is_whole();
        let mut parts: Vec<TemplatePart> = Vec::with_capacity(template.parts.len());

        for part in template.parts {
            let next = match part {
                TemplatePart::Literal(text) => TemplatePart::Literal(text),
                TemplatePart::Interpolation(interpolation) => {
                    match self.resolve_interpolation(interpolation, site) {
                        Ok(value) if whole => return value,
                        Ok(value) => TemplatePart::Literal(value.to_text()),
                        Err(pending) => TemplatePart::Interpolation(pending),
                    }
                }
            };
            match (parts.last_mut(), next) {
                (Some(TemplatePart::Literal(prev)), TemplatePart::Literal(text)) => {
                    prev.push_str(&text)
                }
                (_, next) => parts.push(next),
            }
        }

        Template { parts }.into_value()
    }

    fn should_attempt(&self, state: ReferenceState) -> bool {
        match state {
            ReferenceState::Unresolved => true,
            ReferenceState::PendingRetry => self.pass == Pass::Second,
            ReferenceState::Failed => false,
        }
    }

    /// `Ok` with the fully resolved value, or `Err` with the interpolation in its new state.
    fn resolve_interpolation(
        &mut self,
        mut interpolation: Interpolation,
        site: &Site,
    ) -> Result<ConfigValue, Interpolation> {
        if !self.should_attempt(interpolation.state) {
            return Err(interpolation);
        }

        let miss = match std::mem::replace(&mut interpolation.expr, Expr::Unsupported) {
            Expr::Reference(reference) => {
                let reference = self.resolve_indices(reference, site);
                match self.lookup(&reference, site) {
                    Lookup::Found(value) => return Ok(value),
                    Lookup::Missing(miss) => {
                        interpolation.expr = Expr::Reference(reference);
                        Some(miss)
                    }
                }
            }
            Expr::Value(value) => {
                let value = self.resolve_value(value, site);
                if value.is_resolved() {
                    return Ok(value);
                }
                interpolation.expr = Expr::Value(value);
                // Nested references report on their own.
                None
            }
            Expr::Unsupported => {
                debug!(
                    expression = %interpolation.source,
                    "unsupported expression left unresolved"
                );
                Some(Miss::silent())
            }
            Expr::Unterminated => {
                interpolation.expr = Expr::Unterminated;
                Some(Miss::reportable(format!(
                    "Matching close brace not found: {}",
                    interpolation.source
                )))
            }
        };

        self.escalate(&mut interpolation, miss, site);
        Err(interpolation)
    }

    /// Index expressions are resolved before the reference that uses them.
    fn resolve_indices(&mut self, reference: Reference, site: &Site) -> Reference {
        let accessors = reference
            .accessors
            .into_iter()
            .map(|accessor| match accessor {
                Accessor::Index(index) => {
                    Accessor::Index(Box::new(self.resolve_value(*index, site)))
                }
                attr => attr,
            })
            .collect();
        Reference {
            root: reference.root,
            accessors,
        }
    }

    fn escalate(&mut self, interpolation: &mut Interpolation, miss: Option<Miss>, site: &Site) {
        match self.pass {
            Pass::First => interpolation.state = ReferenceState::PendingRetry,
            Pass::Second => {
                interpolation.state = ReferenceState::Failed;
                match miss {
                    Some(miss) if miss.reportable => {
                        let module = self.module_name(site.scope).to_string();
                        debug!(
                            %module,
                            file = %site.file,
                            message = %miss.message,
                            "unresolved reference"
                        );
                        self.errors
                            .push(Diagnostic::error(miss.message, module, site.file.clone()));
                    }
                    _ => {}
                }
            }
        }
    }
}
