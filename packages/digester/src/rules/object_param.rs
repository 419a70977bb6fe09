//! Object-param: store a constant into a call-method parameter slot.

use super::provider_accessors;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::Host;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::{Attributes, Literal, Value};

/// Builder for [`ObjectParamRule`].
#[derive(Debug)]
pub struct ObjectParamBuilder {
    target: RuleTarget,
    value: Literal,
    index: i32,
    attribute: Option<String>,
}

impl ObjectParamBuilder {
    pub(crate) fn new(target: RuleTarget, value: Literal) -> Self {
        Self {
            target,
            value,
            index: 0,
            attribute: None,
        }
    }

    pub fn of_index(&mut self, index: i32) -> &mut Self {
        self.index = index;
        self
    }

    /// Only store the value when the element carries this attribute.
    pub fn when_attribute_present(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl RuleProvider for ObjectParamBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "object-param"
    }

    fn finalize(&mut self, _host: &dyn Host, errors: &mut ErrorAggregator) {
        if self.index < 0 {
            self.target.error(
                errors,
                format!("Object-param index must not be negative, got {}", self.index),
            );
        }
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(ObjectParamRule {
            value: Value::from(&self.value),
            index: usize::try_from(self.index).unwrap_or(0),
            attribute: self.attribute.clone(),
        })
    }
}

#[derive(Debug)]
pub struct ObjectParamRule {
    value: Value,
    index: usize,
    attribute: Option<String>,
}

impl Rule for ObjectParamRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        if let Some(attribute) = &self.attribute {
            if attributes.get(attribute).is_none() {
                return Ok(());
            }
        }
        ctx.set_param(self.index, self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{host, stacks, target};

    #[test]
    fn test_stores_constant() {
        let host = host();
        let mut stacks = stacks("flag");
        let mut ctx = Context::new(&host, &mut stacks);
        ctx.push_params(2);

        let mut builder = ObjectParamBuilder::new(target("*/flag"), Literal::Bool(true));
        builder.of_index(1).when_attribute_present("on");
        let mut rule = builder.create_rule();

        rule.begin(&mut ctx, &Attributes::new()).unwrap();
        assert_eq!(ctx.params().unwrap(), &[None, None]);

        rule.begin(&mut ctx, &Attributes::from_pairs([("on", "")])).unwrap();
        assert_eq!(ctx.params().unwrap(), &[None, Some(Value::Bool(true))]);
    }
}
