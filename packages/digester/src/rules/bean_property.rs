//! Bean-property-from-body: assign element text to a property of the top object.

use super::provider_accessors;
use crate::config::validate_property_name;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::Host;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::{Attributes, Value};

/// Builder for [`BeanPropertySetterRule`].
#[derive(Debug)]
pub struct BeanPropertyBuilder {
    target: RuleTarget,
    name: Option<String>,
    name_attribute: Option<String>,
    value_attribute: Option<String>,
}

impl BeanPropertyBuilder {
    pub(crate) fn new(target: RuleTarget) -> Self {
        Self {
            target,
            name: None,
            name_attribute: None,
            value_attribute: None,
        }
    }

    /// Property to set. Defaults to the element's local name.
    pub fn with_name(&mut self, property: impl Into<String>) -> &mut Self {
        self.name = Some(property.into());
        self
    }

    /// Read the property name from an attribute of the element.
    pub fn name_from_attribute(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.name_attribute = Some(attribute.into());
        self
    }

    /// Read the value from an attribute instead of the element text.
    pub fn value_from_attribute(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.value_attribute = Some(attribute.into());
        self
    }
}

impl RuleProvider for BeanPropertyBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "bean-property"
    }

    fn finalize(&mut self, _host: &dyn Host, errors: &mut ErrorAggregator) {
        if self.name.is_some() && self.name_attribute.is_some() {
            self.target.error(
                errors,
                "Bean-property rule cannot take both a fixed name and a name attribute",
            );
        }
        if let Some(Err(e)) = self.name.as_deref().map(validate_property_name) {
            self.target.error(errors, e);
        }
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(BeanPropertySetterRule {
            name: self.name.clone(),
            name_attribute: self.name_attribute.clone(),
            value_attribute: self.value_attribute.clone(),
            pending: Vec::new(),
        })
    }
}

#[derive(Debug)]
struct PendingProperty {
    property: String,
    value: Option<String>,
}

/// Sets a property of the top object when the element ends.
#[derive(Debug)]
pub struct BeanPropertySetterRule {
    name: Option<String>,
    name_attribute: Option<String>,
    value_attribute: Option<String>,
    /// One entry per open element matched by this rule.
    pending: Vec<PendingProperty>,
}

impl Rule for BeanPropertySetterRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        let property = match (&self.name_attribute, &self.name) {
            (Some(attribute), _) => attributes
                .get(attribute)
                .ok_or_else(|| ExecutionError::MissingAttribute(attribute.clone()))?
                .to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => ctx.element_name().to_string(),
        };
        let value = match &self.value_attribute {
            Some(attribute) => Some(
                attributes
                    .get(attribute)
                    .ok_or_else(|| ExecutionError::MissingAttribute(attribute.clone()))?
                    .to_string(),
            ),
            None => None,
        };
        self.pending.push(PendingProperty { property, value });
        Ok(())
    }

    fn body(&mut self, _ctx: &mut Context<'_>, text: &str) -> Result<(), ExecutionError> {
        if let Some(pending) = self.pending.last_mut() {
            if pending.value.is_none() {
                pending.value = Some(text.trim().to_string());
            }
        }
        Ok(())
    }

    fn end(&mut self, ctx: &mut Context<'_>) -> Result<(), ExecutionError> {
        let Some(PendingProperty { property, value }) = self.pending.pop() else {
            return Ok(());
        };
        let target = ctx.peek(0)?;
        let host = ctx.host();
        if !host.has_property(target, &property) {
            return Err(ExecutionError::MissingProperty {
                attribute: ctx.element_name().to_string(),
                property,
                target: host.describe(target),
            });
        }
        tracing::trace!(property = %property, "Setting property from body");
        host.set_property(target, &property, Value::from(value.unwrap_or_default()))?;
        Ok(())
    }
}
