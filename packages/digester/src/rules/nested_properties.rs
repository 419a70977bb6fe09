//! Set-nested-properties: map child elements onto properties of the top object.
//!
//! `<employee><name>Ada</name></employee>` with this rule on `employee`
//! sets `name = "Ada"`. The rule itself only marks the element; the engine
//! resolves each direct child through the [`NestedScope`] and assigns the
//! child's text when the child exits. Rules bound to the children still fire.

use std::sync::Arc;

use super::{provider_accessors, Aliases};
use crate::config::validate_property_name;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::Host;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, NestedChild, Rule};
use crate::value::{Attributes, Value};

/// Builder for [`SetNestedPropertiesRule`].
///
/// There is at most one per (pattern, namespace).
#[derive(Debug)]
pub struct NestedPropertiesBuilder {
    target: RuleTarget,
    aliases: Vec<(String, Option<String>)>,
    trim_data: bool,
    allow_unknown_child_elements: bool,
}

impl NestedPropertiesBuilder {
    pub(crate) fn new(target: RuleTarget) -> Self {
        Self {
            target,
            aliases: Vec::new(),
            trim_data: true,
            allow_unknown_child_elements: false,
        }
    }

    /// Assign child element `element` to property `property`.
    pub fn add_alias(
        &mut self,
        element: impl Into<String>,
        property: impl Into<String>,
    ) -> &mut Self {
        self.aliases.push((element.into(), Some(property.into())));
        self
    }

    /// Leave child element `element` alone.
    pub fn ignore_child(&mut self, element: impl Into<String>) -> &mut Self {
        self.aliases.push((element.into(), None));
        self
    }

    /// Trim child text before assigning it. Defaults to `true`.
    pub fn trim_data(&mut self, trim: bool) -> &mut Self {
        self.trim_data = trim;
        self
    }

    /// Skip children without a matching property instead of failing.
    pub fn allow_unknown_child_elements(&mut self, allow: bool) -> &mut Self {
        self.allow_unknown_child_elements = allow;
        self
    }
}

impl RuleProvider for NestedPropertiesBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "set-nested-properties"
    }

    fn finalize(&mut self, _host: &dyn Host, errors: &mut ErrorAggregator) {
        for (_, property) in &self.aliases {
            if let Some(Err(e)) = property.as_deref().map(validate_property_name) {
                self.target.error(errors, e);
            }
        }
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(SetNestedPropertiesRule {
            scope: Arc::new(NestedScope {
                aliases: self.aliases.iter().cloned().collect(),
                trim_data: self.trim_data,
                allow_unknown_child_elements: self.allow_unknown_child_elements,
            }),
        })
    }
}

/// Child-to-property mapping installed on an element by the rule.
#[derive(Debug)]
pub struct NestedScope {
    aliases: Aliases,
    trim_data: bool,
    allow_unknown_child_elements: bool,
}

impl NestedScope {
    /// Resolve a direct child of the marked element.
    ///
    /// Returns `None` for ignored children and, when allowed, for children
    /// without a matching property on `target`.
    pub(crate) fn child(
        self: &Arc<Self>,
        host: &dyn Host,
        element: &str,
        target: &Value,
    ) -> Result<Option<NestedChild>, ExecutionError> {
        let property = match self.aliases.get(element) {
            Some(Some(property)) => property.clone(),
            Some(None) => return Ok(None),
            None => element.to_string(),
        };

        if !host.has_property(target, &property) {
            if self.allow_unknown_child_elements {
                tracing::debug!(element = %element, "Unknown child element skipped");
                return Ok(None);
            }
            return Err(ExecutionError::UnknownChildElement {
                element: element.to_string(),
                property,
                target: host.describe(target),
            });
        }

        Ok(Some(NestedChild {
            scope: Arc::clone(self),
            property,
            target: target.clone(),
        }))
    }

    /// Assign the text of an exited child.
    pub(crate) fn assign(
        &self,
        host: &dyn Host,
        child: NestedChild,
        text: &str,
    ) -> Result<(), ExecutionError> {
        let text = if self.trim_data { text.trim() } else { text };
        host.set_property(&child.target, &child.property, Value::from(text))?;
        Ok(())
    }
}

/// Marks an element so its direct children become property assignments.
#[derive(Debug)]
pub struct SetNestedPropertiesRule {
    scope: Arc<NestedScope>,
}

impl Rule for SetNestedPropertiesRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        _attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        ctx.peek(0)?;
        ctx.intercept_children(Arc::clone(&self.scope));
        Ok(())
    }
}
