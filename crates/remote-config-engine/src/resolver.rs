//! Template resolution: computing the effective value set for a client.
//!
//! A template is compiled once (every condition expression parsed into its
//! AST, every parameter flattened into one namespace) and the compiled form
//! is then shared freely across reader threads. Resolution itself is a pure
//! function of the compiled template and the client context.

use std::collections::BTreeMap;

use crate::expr::{self, evaluate, ClientContext, Expr, ExpressionError};
use crate::template::{Parameter, Template, TemplateSnapshot};

/// A compiled template ready for repeated, concurrent resolution.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    /// Parsed conditions in the template's declaration order. This order is
    /// the resolution precedence order.
    conditions: Vec<(String, Expr)>,
    /// Every parameter, top-level and grouped, in one namespace.
    parameters: Vec<(String, Parameter)>,
}

impl TemplateResolver {
    /// Compiles a template by parsing each condition expression once.
    ///
    /// Fails only on templates that never passed validation; templates read
    /// back from the version store always compile.
    pub fn compile(template: &Template) -> Result<Self, ExpressionError> {
        let conditions = template
            .conditions
            .iter()
            .map(|condition| {
                expr::parse(&condition.expression)
                    .map(|parsed| (condition.name.clone(), parsed))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let parameters = template
            .iter_parameters()
            .map(|(name, parameter)| (name.to_string(), parameter.clone()))
            .collect();
        Ok(Self {
            conditions,
            parameters,
        })
    }

    /// Compiles a snapshot read back from the version store.
    ///
    /// The store only accepts validated templates, so a compile failure here
    /// is a store-integrity bug, not a caller error, and aborts loudly.
    pub fn for_snapshot(snapshot: &TemplateSnapshot) -> Self {
        Self::compile(&snapshot.template).unwrap_or_else(|err| {
            panic!(
                "stored template (etag '{}') failed to compile: {err}; \
                 the version store must only accept validated templates",
                snapshot.etag
            )
        })
    }

    /// Resolves the effective value of every parameter for the given context.
    ///
    /// For each parameter, conditions are tried in the template's declared
    /// order, never the parameter's own map order, and the first condition
    /// that evaluates true *and* appears in the parameter's conditional
    /// values supplies the value. When none does, the default applies. The
    /// resulting `None` entries mean "defer to the client-compiled default";
    /// the resolver never invents a value.
    pub fn resolve(&self, context: &ClientContext) -> BTreeMap<String, Option<String>> {
        // Each condition is evaluated once per resolution, not once per
        // parameter referencing it.
        let truths: Vec<(&str, bool)> = self
            .conditions
            .iter()
            .map(|(name, parsed)| (name.as_str(), evaluate(parsed, context)))
            .collect();

        let mut resolved = BTreeMap::new();
        for (name, parameter) in &self.parameters {
            let mut winner = None;
            for (condition_name, holds) in &truths {
                if !holds {
                    continue;
                }
                if let Some(value) = parameter.conditional_values.get(*condition_name) {
                    winner = Some(value);
                    break;
                }
            }
            let value = winner.or(parameter.default_value.as_ref());
            resolved.insert(
                name.clone(),
                value.and_then(|v| v.resolve()).map(str::to_owned),
            );
        }
        resolved
    }
}
