//! Set-properties: copy element attributes onto the top object.

use super::{provider_accessors, Aliases};
use crate::config::validate_property_name;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::Host;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::{Attributes, Value};

/// Builder for [`SetPropertiesRule`].
///
/// There is at most one per (pattern, namespace): binding it again returns
/// the existing builder.
#[derive(Debug)]
pub struct SetPropertiesBuilder {
    target: RuleTarget,
    aliases: Vec<(String, Option<String>)>,
    ignore_missing_property: bool,
}

impl SetPropertiesBuilder {
    pub(crate) fn new(target: RuleTarget) -> Self {
        Self {
            target,
            aliases: Vec::new(),
            ignore_missing_property: false,
        }
    }

    /// Assign attribute `attribute` to property `property`.
    pub fn add_alias(
        &mut self,
        attribute: impl Into<String>,
        property: impl Into<String>,
    ) -> &mut Self {
        self.aliases.push((attribute.into(), Some(property.into())));
        self
    }

    /// Skip attribute `attribute` entirely.
    pub fn ignore_attribute(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.aliases.push((attribute.into(), None));
        self
    }

    /// Skip attributes without a matching property instead of failing.
    pub fn ignore_missing_property(&mut self, ignore: bool) -> &mut Self {
        self.ignore_missing_property = ignore;
        self
    }
}

impl RuleProvider for SetPropertiesBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "set-properties"
    }

    fn finalize(&mut self, _host: &dyn Host, errors: &mut ErrorAggregator) {
        for (_, property) in &self.aliases {
            if let Some(Err(e)) = property.as_deref().map(validate_property_name) {
                self.target.error(errors, e);
            }
        }
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(SetPropertiesRule {
            aliases: self.aliases.iter().cloned().collect(),
            ignore_missing_property: self.ignore_missing_property,
        })
    }
}

/// Sets one property per attribute on `begin`.
#[derive(Debug)]
pub struct SetPropertiesRule {
    aliases: Aliases,
    ignore_missing_property: bool,
}

impl Rule for SetPropertiesRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        let target = ctx.peek(0)?.clone();
        let host = ctx.host();

        // Every resolvable attribute is assigned before the first missing one is reported.
        let mut missing = None;
        for attribute in attributes {
            let property = match self.aliases.get(&attribute.local_name) {
                Some(Some(property)) => property.as_str(),
                Some(None) => {
                    tracing::trace!(attribute = %attribute.local_name, "Ignored attribute");
                    continue;
                }
                None => attribute.local_name.as_str(),
            };

            if !host.has_property(&target, property) {
                if self.ignore_missing_property {
                    tracing::debug!(
                        attribute = %attribute.local_name,
                        property = %property,
                        "No matching property, attribute skipped"
                    );
                } else if missing.is_none() {
                    missing = Some(ExecutionError::MissingProperty {
                        attribute: attribute.local_name.clone(),
                        property: property.to_string(),
                        target: host.describe(&target),
                    });
                }
                continue;
            }
            host.set_property(&target, property, Value::String(attribute.value.clone()))?;
        }
        missing.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Record;
    use crate::rules::testing::{host, messages, stacks, target};
    use crate::value::TypeName;

    fn employee(host: &dyn Host) -> Value {
        host.construct(&TypeName::new("Employee"), &[]).unwrap()
    }

    fn property(object: &Value, name: &str) -> Option<Value> {
        object
            .with_object(|r: &Record| r.get(name).cloned())
            .flatten()
    }

    #[test]
    fn test_alias_and_missing_property() {
        let host = host();
        let object = employee(&host);
        let mut stacks = stacks("employee");
        stacks.push_object(object.clone());
        let mut ctx = Context::new(&host, &mut stacks);

        let mut builder = SetPropertiesBuilder::new(target("company/employee"));
        builder.add_alias("a", "name");
        let err = builder
            .create_rule()
            .begin(&mut ctx, &Attributes::from_pairs([("a", "x"), ("b", "y")]))
            .unwrap_err();

        assert_eq!(property(&object, "name"), Some(Value::from("x")));
        assert_eq!(
            err.to_string(),
            "No property 'b' on Employee object for attribute 'b'"
        );
    }

    #[test]
    fn test_missing_property_does_not_block_later_attributes() {
        let host = host();
        let object = employee(&host);
        let mut stacks = stacks("employee");
        stacks.push_object(object.clone());
        let mut ctx = Context::new(&host, &mut stacks);

        let mut builder = SetPropertiesBuilder::new(target("company/employee"));
        builder.add_alias("a", "name");
        let err = builder
            .create_rule()
            .begin(
                &mut ctx,
                &Attributes::from_pairs([("b", "y"), ("a", "x"), ("c", "z")]),
            )
            .unwrap_err();

        assert_eq!(property(&object, "name"), Some(Value::from("x")));
        assert!(matches!(
            err,
            ExecutionError::MissingProperty { ref attribute, .. } if attribute == "b"
        ));
    }

    #[test]
    fn test_ignore_missing_and_ignored_attribute() {
        let host = host();
        let object = employee(&host);
        let mut stacks = stacks("employee");
        stacks.push_object(object.clone());
        let mut ctx = Context::new(&host, &mut stacks);

        let mut builder = SetPropertiesBuilder::new(target("company/employee"));
        builder
            .add_alias("id", "employeeId")
            .ignore_attribute("name")
            .ignore_missing_property(true);
        builder
            .create_rule()
            .begin(
                &mut ctx,
                &Attributes::from_pairs([("id", "7"), ("name", "skipped"), ("extra", "1")]),
            )
            .unwrap();

        assert_eq!(property(&object, "employeeId"), Some(Value::Int(7)));
        assert_eq!(property(&object, "name"), None);
    }

    #[test]
    fn test_empty_stack_is_underflow() {
        let host = host();
        let mut stacks = stacks("employee");
        let mut ctx = Context::new(&host, &mut stacks);
        let builder = SetPropertiesBuilder::new(target("company/employee"));

        let err = builder
            .create_rule()
            .begin(&mut ctx, &Attributes::new())
            .unwrap_err();
        assert!(matches!(err, ExecutionError::StackUnderflow { offset: 0, depth: 0 }));
    }

    #[test]
    fn test_invalid_alias_is_configuration_error() {
        let mut builder = SetPropertiesBuilder::new(target("a"));
        builder.add_alias("x", "not a property");
        let mut errors = ErrorAggregator::new();
        builder.finalize(&host(), &mut errors);
        assert_eq!(
            messages(&errors),
            ["Invalid property name 'not a property' (pattern 'a')"]
        );
    }
}
