//! Set-next, set-top and set-root: link the top object to another object.

use super::provider_accessors;
use crate::config::validate_method_name;
use crate::diagnostics::ErrorAggregator;
use crate::error::ExecutionError;
use crate::host::{resolve_param_type, Host, MethodCall};
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::ParamType;

/// Which two objects are linked, and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `parent.method(child)`, parent being the object below the top.
    Next,
    /// `child.method(parent)`.
    Top,
    /// `root.method(child)`, root being the first object of the document.
    Root,
}

impl Relation {
    fn kind(self) -> &'static str {
        match self {
            Self::Next => "set-next",
            Self::Top => "set-top",
            Self::Root => "set-root",
        }
    }
}

/// Builder for [`SetLinkRule`].
#[derive(Debug)]
pub struct SetLinkBuilder {
    target: RuleTarget,
    relation: Relation,
    method: String,
    param_type_name: Option<String>,
    exact_match: bool,
    param_type: ParamType,
}

impl SetLinkBuilder {
    pub(crate) fn new(target: RuleTarget, relation: Relation, method: String) -> Self {
        Self {
            target,
            relation,
            method,
            param_type_name: None,
            exact_match: false,
            param_type: ParamType::Any,
        }
    }

    /// Declared type of the argument.
    pub fn with_param_type(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.param_type_name = Some(type_name.into());
        self
    }

    pub fn use_exact_match(&mut self, exact: bool) -> &mut Self {
        self.exact_match = exact;
        self
    }
}

impl RuleProvider for SetLinkBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        self.relation.kind()
    }

    fn finalize(&mut self, host: &dyn Host, errors: &mut ErrorAggregator) {
        if let Err(e) = validate_method_name(&self.method) {
            self.target.error(errors, e);
        }
        if let Some(name) = &self.param_type_name {
            match resolve_param_type(host, name) {
                Some(param_type) => self.param_type = param_type,
                None => self
                    .target
                    .error(errors, format!("Unknown parameter type '{name}'")),
            }
        }
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(SetLinkRule {
            relation: self.relation,
            method: self.method.clone(),
            param_type: self.param_type.clone(),
            exact_match: self.exact_match,
        })
    }
}

/// Calls the link method on `end`.
#[derive(Debug)]
pub struct SetLinkRule {
    relation: Relation,
    method: String,
    param_type: ParamType,
    exact_match: bool,
}

impl Rule for SetLinkRule {
    fn end(&mut self, ctx: &mut Context<'_>) -> Result<(), ExecutionError> {
        let child = ctx.peek(0)?;
        let (target, arg) = match self.relation {
            Relation::Next => (ctx.peek(1)?, child),
            Relation::Top => (child, ctx.peek(1)?),
            Relation::Root => {
                let root = ctx.root().ok_or(ExecutionError::StackUnderflow {
                    offset: 0,
                    depth: ctx.depth(),
                })?;
                (root, child)
            }
        };

        let host = ctx.host();
        tracing::trace!(
            relation = self.relation.kind(),
            method = %self.method,
            target = %host.describe(target),
            "Linking objects"
        );
        let arg = self.param_type.convert(arg.clone())?;
        host.invoke_method(
            target,
            MethodCall {
                name: &self.method,
                param_types: std::slice::from_ref(&self.param_type),
                args: vec![arg],
                exact_match: self.exact_match,
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{RecordHost, TypeDef};
    use crate::rules::testing::{messages, stacks, target};
    use crate::value::{Attributes, TypeName, Value};

    fn host() -> RecordHost {
        RecordHost::new()
            .with_type(
                TypeDef::new("Company")
                    .method_append("addEmployee", "employees")
                    .method_set("setBoss", "boss"),
            )
            .with_type(
                TypeDef::new("Employee")
                    .property("company", ParamType::Object(TypeName::new("Company")))
                    .method_set("setCompany", "company"),
            )
    }

    fn link(relation: Relation, method: &str, depth: usize) -> (RecordHost, Value, Value) {
        let host = host();
        let company = host.construct(&TypeName::new("Company"), &[]).unwrap();
        let employee = host.construct(&TypeName::new("Employee"), &[]).unwrap();
        let mut stacks = stacks("employee");
        stacks.push_object(company.clone());
        for _ in 1..depth {
            stacks.push_object(host.construct(&TypeName::new("Company"), &[]).unwrap());
        }
        stacks.push_object(employee.clone());

        let mut builder = SetLinkBuilder::new(target("*/employee"), relation, method.to_string());
        let mut errors = ErrorAggregator::new();
        builder.finalize(&host, &mut errors);
        assert!(!errors.has_errors());

        let mut ctx = Context::new(&host, &mut stacks);
        let mut rule = builder.create_rule();
        rule.begin(&mut ctx, &Attributes::new()).unwrap();
        rule.end(&mut ctx).unwrap();
        (host, company, employee)
    }

    #[test]
    fn test_set_next_links_parent_to_child() {
        let (host, company, employee) = link(Relation::Next, "addEmployee", 1);
        let Value::List(employees) = host.get_property(&company, "employees").unwrap() else {
            panic!("expected a list of employees");
        };
        assert!(employees[0].ptr_eq(&employee));
    }

    #[test]
    fn test_set_top_links_child_to_parent() {
        let (host, company, employee) = link(Relation::Top, "setCompany", 1);
        assert!(host.get_property(&employee, "company").unwrap().ptr_eq(&company));
    }

    #[test]
    fn test_set_root_skips_intermediate_objects() {
        let (host, company, employee) = link(Relation::Root, "setBoss", 3);
        assert!(host.get_property(&company, "boss").unwrap().ptr_eq(&employee));
    }

    #[test]
    fn test_set_next_needs_two_objects() {
        let host = host();
        let mut stacks = stacks("employee");
        stacks.push_object(host.construct(&TypeName::new("Employee"), &[]).unwrap());
        let mut ctx = Context::new(&host, &mut stacks);

        let builder = SetLinkBuilder::new(target("*/employee"), Relation::Next, "add".to_string());
        let err = builder.create_rule().end(&mut ctx).unwrap_err();
        assert!(matches!(err, ExecutionError::StackUnderflow { offset: 1, depth: 1 }));
    }

    #[test]
    fn test_configuration_errors() {
        let mut builder =
            SetLinkBuilder::new(target("*/employee"), Relation::Top, "set-company".to_string());
        builder.with_param_type("Nope");
        let mut errors = ErrorAggregator::new();
        builder.finalize(&host(), &mut errors);
        assert_eq!(
            messages(&errors),
            [
                "Invalid method name 'set-company' (pattern '*/employee')",
                "Unknown parameter type 'Nope' (pattern '*/employee')",
            ]
        );
    }
}
