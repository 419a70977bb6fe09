//! Object-create: construct an object when an element is entered.

use super::provider_accessors;
use crate::config::validate_type_name;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::Host;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::{Attributes, Literal, TypeName, Value};

/// Builder for [`ObjectCreateRule`].
#[derive(Debug)]
pub struct ObjectCreateBuilder {
    target: RuleTarget,
    type_name: Option<String>,
    type_attribute: Option<String>,
    constructor_args: Vec<Literal>,
    resolved: Option<TypeName>,
}

impl ObjectCreateBuilder {
    pub(crate) fn new(target: RuleTarget) -> Self {
        Self {
            target,
            type_name: None,
            type_attribute: None,
            constructor_args: Vec::new(),
            resolved: None,
        }
    }

    /// Type to construct.
    pub fn of_type(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Attribute whose value, when present, overrides the type.
    pub fn of_type_attribute(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.type_attribute = Some(attribute.into());
        self
    }

    /// Constant constructor arguments.
    pub fn with_constructor_args<I, L>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        self.constructor_args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl RuleProvider for ObjectCreateBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "object-create"
    }

    fn finalize(&mut self, host: &dyn Host, errors: &mut ErrorAggregator) {
        match (&self.type_name, &self.type_attribute) {
            (None, None) => self.target.error(
                errors,
                "Object-create rule needs a type or a type attribute",
            ),
            (Some(name), _) => {
                if let Err(e) = validate_type_name(name) {
                    self.target.error(errors, e);
                } else {
                    self.resolved = host.resolve_type(name);
                    if self.resolved.is_none() {
                        self.target.error(errors, format!("Unknown type '{name}'"));
                    }
                }
            }
            (None, Some(_)) => {}
        }
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(ObjectCreateRule {
            type_name: self.resolved.clone(),
            type_attribute: self.type_attribute.clone(),
            args: self.constructor_args.iter().map(Value::from).collect(),
        })
    }
}

/// Constructs an object on `begin` and pushes it.
#[derive(Debug)]
pub struct ObjectCreateRule {
    type_name: Option<TypeName>,
    type_attribute: Option<String>,
    args: Vec<Value>,
}

impl ObjectCreateRule {
    fn select_type(
        &self,
        host: &dyn Host,
        attributes: &Attributes,
    ) -> Result<TypeName, ExecutionError> {
        if let Some(attribute) = &self.type_attribute {
            if let Some(name) = attributes.get(attribute) {
                return host.resolve_type(name).ok_or_else(|| ExecutionError::UnknownType {
                    attribute: attribute.clone(),
                    type_name: name.to_string(),
                });
            }
        }
        match (&self.type_name, &self.type_attribute) {
            (Some(type_name), _) => Ok(type_name.clone()),
            (None, Some(attribute)) => Err(ExecutionError::MissingAttribute(attribute.clone())),
            (None, None) => Err(ExecutionError::MissingAttribute(String::new())),
        }
    }
}

impl Rule for ObjectCreateRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        let type_name = self.select_type(ctx.host(), attributes)?;
        let object = ctx.host().construct(&type_name, &self.args)?;
        tracing::trace!(path = %ctx.path(), type_name = %type_name, "Created object");
        ctx.push(object);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Record;
    use crate::rules::testing::{host, messages, stacks, target};

    fn finalized(
        configure: impl FnOnce(&mut ObjectCreateBuilder),
    ) -> (ObjectCreateBuilder, ErrorAggregator) {
        let mut builder = ObjectCreateBuilder::new(target("company/employee"));
        configure(&mut builder);
        let mut errors = ErrorAggregator::new();
        builder.finalize(&host(), &mut errors);
        (builder, errors)
    }

    #[test]
    fn test_creates_and_pushes() {
        let (builder, errors) = finalized(|b| {
            b.of_type("Employee").with_constructor_args([7_i64]);
        });
        assert!(!errors.has_errors());

        let host = host();
        let mut stacks = stacks("employee");
        let mut ctx = Context::new(&host, &mut stacks);
        let mut rule = builder.create_rule();
        rule.begin(&mut ctx, &Attributes::new()).unwrap();

        assert_eq!(ctx.depth(), 1);
        let id = ctx
            .peek(0)
            .unwrap()
            .with_object(|r: &Record| r.get("employeeId").cloned());
        assert_eq!(id, Some(Some(Value::Int(7))));
    }

    #[test]
    fn test_type_attribute_overrides() {
        let (builder, _) = finalized(|b| {
            b.of_type("Employee").of_type_attribute("class");
        });
        let host = host();
        let mut stacks = stacks("employee");
        let mut ctx = Context::new(&host, &mut stacks);
        let mut rule = builder.create_rule();

        rule.begin(&mut ctx, &Attributes::from_pairs([("class", "Address")]))
            .unwrap();
        let created = ctx.peek(0).unwrap().with_object(|r: &Record| r.type_name.clone());
        assert_eq!(created.as_deref(), Some("Address"));

        let err = rule
            .begin(&mut ctx, &Attributes::from_pairs([("class", "Nope")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Attribute 'class' names unknown type 'Nope'");
    }

    #[test]
    fn test_configuration_errors() {
        let (_, errors) = finalized(|_| {});
        assert_eq!(
            messages(&errors),
            ["Object-create rule needs a type or a type attribute (pattern 'company/employee')"]
        );

        let (_, errors) = finalized(|b| {
            b.of_type("Emplyee");
        });
        assert_eq!(
            messages(&errors),
            ["Unknown type 'Emplyee' (pattern 'company/employee')"]
        );
    }
}
