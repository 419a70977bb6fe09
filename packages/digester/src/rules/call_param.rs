//! Call-param: supply one argument to the enclosing call-method rule.

use super::provider_accessors;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::Host;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::{Attributes, Value};

/// Where the parameter value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// The trimmed element text.
    Body,
    Attribute(String),
    /// An object on the stack, addressed like [`Context::peek`].
    Stack(i32),
}

/// Builder for [`CallParamRule`].
#[derive(Debug)]
pub struct CallParamBuilder {
    target: RuleTarget,
    index: i32,
    attribute: Option<String>,
    stack_offset: Option<i32>,
}

impl CallParamBuilder {
    pub(crate) fn new(target: RuleTarget) -> Self {
        Self {
            target,
            index: 0,
            attribute: None,
            stack_offset: None,
        }
    }

    /// Zero-based parameter slot.
    pub fn of_index(&mut self, index: i32) -> &mut Self {
        self.index = index;
        self
    }

    pub fn from_attribute(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn from_stack(&mut self, offset: i32) -> &mut Self {
        self.stack_offset = Some(offset);
        self
    }

    fn source(&self) -> ParamSource {
        match (&self.attribute, self.stack_offset) {
            (Some(attribute), _) => ParamSource::Attribute(attribute.clone()),
            (None, Some(offset)) => ParamSource::Stack(offset),
            (None, None) => ParamSource::Body,
        }
    }
}

impl RuleProvider for CallParamBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "call-param"
    }

    fn finalize(&mut self, _host: &dyn Host, errors: &mut ErrorAggregator) {
        if self.index < 0 {
            self.target.error(
                errors,
                format!("Call-param index must not be negative, got {}", self.index),
            );
        }
        if self.attribute.is_some() && self.stack_offset.is_some() {
            self.target.error(
                errors,
                "Call-param cannot read from both an attribute and the stack",
            );
        }
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(CallParamRule {
            index: usize::try_from(self.index).unwrap_or(0),
            source: self.source(),
        })
    }
}

/// Stores one parameter into the innermost open parameter frame.
///
/// Attribute and stack values are stored on `begin`, body text on `body`, so
/// the value is in place before any `end` hook of the same element runs.
#[derive(Debug)]
pub struct CallParamRule {
    index: usize,
    source: ParamSource,
}

impl Rule for CallParamRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        match &self.source {
            ParamSource::Body => Ok(()),
            ParamSource::Attribute(attribute) => match attributes.get(attribute) {
                Some(value) => ctx.set_param(self.index, Value::from(value)),
                None => Ok(()),
            },
            ParamSource::Stack(offset) => {
                let value = ctx.peek(*offset)?.clone();
                ctx.set_param(self.index, value)
            }
        }
    }

    fn body(&mut self, ctx: &mut Context<'_>, text: &str) -> Result<(), ExecutionError> {
        if self.source == ParamSource::Body {
            ctx.set_param(self.index, Value::from(text.trim()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{host, messages, stacks, target};

    fn rule(configure: impl FnOnce(&mut CallParamBuilder)) -> Box<dyn Rule> {
        let mut builder = CallParamBuilder::new(target("*/param"));
        configure(&mut builder);
        builder.create_rule()
    }

    #[test]
    fn test_sources() {
        let host = host();
        let mut stacks = stacks("param");
        stacks.push_object(Value::Int(5));
        let mut ctx = Context::new(&host, &mut stacks);
        ctx.push_params(3);

        let attributes = Attributes::from_pairs([("v", "from-attribute")]);
        let mut body = rule(|_| {});
        let mut attribute = rule(|b| {
            b.of_index(1).from_attribute("v");
        });
        let mut stack = rule(|b| {
            b.of_index(2).from_stack(0);
        });

        for rule in [&mut body, &mut attribute, &mut stack] {
            rule.begin(&mut ctx, &attributes).unwrap();
        }
        for rule in [&mut body, &mut attribute, &mut stack] {
            rule.body(&mut ctx, "  text ").unwrap();
        }

        assert_eq!(
            ctx.params().unwrap(),
            &[
                Some(Value::from("text")),
                Some(Value::from("from-attribute")),
                Some(Value::Int(5)),
            ]
        );
    }

    #[test]
    fn test_absent_attribute_leaves_slot_empty() {
        let host = host();
        let mut stacks = stacks("param");
        let mut ctx = Context::new(&host, &mut stacks);
        ctx.push_params(1);

        rule(|b| {
            b.from_attribute("missing");
        })
        .begin(&mut ctx, &Attributes::new())
        .unwrap();
        assert_eq!(ctx.params().unwrap(), &[None::<Value>]);
    }

    #[test]
    fn test_without_enclosing_call() {
        let host = host();
        let mut stacks = stacks("param");
        let mut ctx = Context::new(&host, &mut stacks);
        let err = rule(|_| {}).body(&mut ctx, "x").unwrap_err();
        assert!(matches!(err, ExecutionError::NoParameterFrame { index: 0 }));
    }

    #[test]
    fn test_configuration_errors() {
        let mut builder = CallParamBuilder::new(target("*/param"));
        builder.of_index(-2).from_attribute("a").from_stack(1);
        let mut errors = ErrorAggregator::new();
        builder.finalize(&host(), &mut errors);
        assert_eq!(
            messages(&errors),
            [
                "Call-param index must not be negative, got -2 (pattern '*/param')",
                "Call-param cannot read from both an attribute and the stack (pattern '*/param')",
            ]
        );
    }
}
