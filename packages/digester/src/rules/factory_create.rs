//! Factory-create: delegate object construction to an [`ObjectFactory`].

use std::fmt;
use std::sync::Arc;

use super::provider_accessors;
use crate::config::validate_type_name;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::{Host, ObjectFactory};
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::Attributes;

/// Builder for [`FactoryCreateRule`].
pub struct FactoryCreateBuilder {
    target: RuleTarget,
    type_name: Option<String>,
    type_attribute: Option<String>,
    factory: Option<Arc<dyn ObjectFactory>>,
    ignore_create_exceptions: bool,
}

impl FactoryCreateBuilder {
    pub(crate) fn new(target: RuleTarget) -> Self {
        Self {
            target,
            type_name: None,
            type_attribute: None,
            factory: None,
            ignore_create_exceptions: false,
        }
    }

    /// Name under which the host registered the factory.
    pub fn of_type(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Attribute whose value, when present, names the factory to use instead.
    pub fn of_type_attribute(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.type_attribute = Some(attribute.into());
        self
    }

    /// Use a factory instance directly.
    pub fn using_factory(&mut self, factory: Arc<dyn ObjectFactory>) -> &mut Self {
        self.factory = Some(factory);
        self
    }

    /// When set, a failing factory pushes nothing instead of failing the document.
    pub fn ignore_create_exceptions(&mut self, ignore: bool) -> &mut Self {
        self.ignore_create_exceptions = ignore;
        self
    }
}

impl fmt::Debug for FactoryCreateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryCreateBuilder")
            .field("target", &self.target)
            .field("type_name", &self.type_name)
            .field("type_attribute", &self.type_attribute)
            .field("factory", &self.factory.is_some())
            .field("ignore_create_exceptions", &self.ignore_create_exceptions)
            .finish()
    }
}

impl RuleProvider for FactoryCreateBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "factory-create"
    }

    fn finalize(&mut self, host: &dyn Host, errors: &mut ErrorAggregator) {
        if self.factory.is_some() {
            return;
        }
        let Some(name) = &self.type_name else {
            if self.type_attribute.is_none() {
                self.target.error(
                    errors,
                    "Factory-create rule needs a factory, a factory type or a type attribute",
                );
            }
            return;
        };
        if let Err(e) = validate_type_name(name) {
            self.target.error(errors, e);
            return;
        }
        let Some(type_name) = host.resolve_type(name) else {
            self.target.error(errors, format!("Unknown factory type '{name}'"));
            return;
        };
        match host.factory(&type_name) {
            Ok(factory) => self.factory = Some(factory),
            Err(e) => {
                let message = format!("No factory registered for type '{name}'");
                self.target.error_with_cause(errors, message, e);
            }
        }
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(FactoryCreateRule {
            factory: self.factory.clone(),
            type_attribute: self.type_attribute.clone(),
            ignore_create_exceptions: self.ignore_create_exceptions,
        })
    }
}

/// Asks a factory for an object on `begin` and pushes it.
pub struct FactoryCreateRule {
    factory: Option<Arc<dyn ObjectFactory>>,
    type_attribute: Option<String>,
    ignore_create_exceptions: bool,
}

impl FactoryCreateRule {
    fn select_factory(
        &self,
        host: &dyn Host,
        attributes: &Attributes,
    ) -> Result<Arc<dyn ObjectFactory>, ExecutionError> {
        if let Some(attribute) = &self.type_attribute {
            if let Some(name) = attributes.get(attribute) {
                let type_name = host.resolve_type(name).ok_or_else(|| ExecutionError::UnknownType {
                    attribute: attribute.clone(),
                    type_name: name.to_string(),
                })?;
                return Ok(host.factory(&type_name)?);
            }
        }
        match (&self.factory, &self.type_attribute) {
            (Some(factory), _) => Ok(Arc::clone(factory)),
            (None, attribute) => Err(ExecutionError::MissingAttribute(
                attribute.clone().unwrap_or_default(),
            )),
        }
    }

    fn create(&self, ctx: &mut Context<'_>, attributes: &Attributes) -> Result<(), ExecutionError> {
        let factory = self.select_factory(ctx.host(), attributes)?;
        let object = factory.create_object(ctx.host(), attributes)?;
        ctx.push(object);
        Ok(())
    }
}

impl Rule for FactoryCreateRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        match self.create(ctx, attributes) {
            Err(err) if self.ignore_create_exceptions => {
                tracing::warn!(
                    error = %err,
                    path = %ctx.path(),
                    "Factory failed to create object, continuing without it"
                );
                Ok(())
            }
            result => result,
        }
    }
}

impl fmt::Debug for FactoryCreateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryCreateRule")
            .field("type_attribute", &self.type_attribute)
            .field("ignore_create_exceptions", &self.ignore_create_exceptions)
            .finish_non_exhaustive()
    }
}
