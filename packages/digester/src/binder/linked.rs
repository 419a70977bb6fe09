//! The per-pattern entry point of the DSL.

use crate::diagnostics::SourceLocation;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::Rule;
use crate::rules::{
    BeanPropertyBuilder, CallMethodBuilder, CallParamBuilder, CustomRuleProvider,
    FactoryCreateBuilder, NestedPropertiesBuilder, NodeCreateBuilder, ObjectCreateBuilder,
    ObjectParamBuilder, Relation, SetLinkBuilder, SetPropertiesBuilder,
};
use crate::value::Literal;

use super::RulesBinder;

/// Binds rules to one pattern.
///
/// Every method registers a new provider and returns its builder, except
/// [`set_properties`](Self::set_properties) and
/// [`set_nested_properties`](Self::set_nested_properties), which return the
/// existing builder for this pattern and namespace when there is one.
/// Registration order is firing order.
pub struct LinkedRuleBuilder<'a> {
    binder: &'a mut RulesBinder,
    target: RuleTarget,
}

impl<'a> LinkedRuleBuilder<'a> {
    pub(super) fn new(binder: &'a mut RulesBinder, target: RuleTarget) -> Self {
        Self { binder, target }
    }

    /// Only match elements in this namespace. An empty URI matches elements
    /// in any namespace.
    #[must_use]
    pub fn with_namespace_uri(mut self, namespace_uri: impl Into<String>) -> Self {
        let namespace_uri = namespace_uri.into();
        self.target.namespace_uri = (!namespace_uri.is_empty()).then_some(namespace_uri);
        self
    }

    #[must_use]
    pub fn target(&self) -> &RuleTarget {
        &self.target
    }

    /// The bound target, located at the caller.
    #[track_caller]
    fn located(&self) -> RuleTarget {
        RuleTarget {
            source: self.binder.errors.locate(SourceLocation::caller()),
            ..self.target.clone()
        }
    }

    #[track_caller]
    pub fn object_create(&mut self) -> &mut ObjectCreateBuilder {
        let target = self.located();
        self.binder.registry.register(ObjectCreateBuilder::new(target))
    }

    #[track_caller]
    pub fn factory_create(&mut self) -> &mut FactoryCreateBuilder {
        let target = self.located();
        self.binder.registry.register(FactoryCreateBuilder::new(target))
    }

    #[track_caller]
    pub fn set_properties(&mut self) -> &mut SetPropertiesBuilder {
        let target = self.located();
        self.binder
            .registry
            .get_or_register(&target, || SetPropertiesBuilder::new(target.clone()))
    }

    #[track_caller]
    pub fn set_nested_properties(&mut self) -> &mut NestedPropertiesBuilder {
        let target = self.located();
        self.binder
            .registry
            .get_or_register(&target, || NestedPropertiesBuilder::new(target.clone()))
    }

    #[track_caller]
    pub fn set_bean_property(&mut self) -> &mut BeanPropertyBuilder {
        let target = self.located();
        self.binder.registry.register(BeanPropertyBuilder::new(target))
    }

    #[track_caller]
    pub fn call_method(&mut self, method: impl Into<String>) -> &mut CallMethodBuilder {
        let target = self.located();
        self.binder
            .registry
            .register(CallMethodBuilder::new(target, method.into()))
    }

    #[track_caller]
    pub fn call_param(&mut self) -> &mut CallParamBuilder {
        let target = self.located();
        self.binder.registry.register(CallParamBuilder::new(target))
    }

    #[track_caller]
    pub fn object_param(&mut self, value: impl Into<Literal>) -> &mut ObjectParamBuilder {
        let target = self.located();
        self.binder
            .registry
            .register(ObjectParamBuilder::new(target, value.into()))
    }

    /// `parent.method(child)` when the element ends.
    #[track_caller]
    pub fn set_next(&mut self, method: impl Into<String>) -> &mut SetLinkBuilder {
        self.set_link(Relation::Next, method.into())
    }

    /// `child.method(parent)` when the element ends.
    #[track_caller]
    pub fn set_top(&mut self, method: impl Into<String>) -> &mut SetLinkBuilder {
        self.set_link(Relation::Top, method.into())
    }

    /// `root.method(child)` when the element ends.
    #[track_caller]
    pub fn set_root(&mut self, method: impl Into<String>) -> &mut SetLinkBuilder {
        self.set_link(Relation::Root, method.into())
    }

    #[track_caller]
    fn set_link(&mut self, relation: Relation, method: String) -> &mut SetLinkBuilder {
        let target = self.located();
        self.binder
            .registry
            .register(SetLinkBuilder::new(target, relation, method))
    }

    #[track_caller]
    pub fn node_create(&mut self) -> &mut NodeCreateBuilder {
        let target = self.located();
        self.binder.registry.register(NodeCreateBuilder::new(target))
    }

    /// Bind an application-defined rule. `factory` is called once per document.
    #[track_caller]
    pub fn add_rule<F, R>(&mut self, factory: F) -> &mut CustomRuleProvider
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Rule + 'static,
    {
        let target = self.located();
        self.binder
            .registry
            .register(CustomRuleProvider::new(target, factory))
    }

    /// Bind an application-defined provider.
    #[track_caller]
    pub fn add_provider<P, F>(&mut self, create: F) -> &mut P
    where
        P: RuleProvider,
        F: FnOnce(RuleTarget) -> P,
    {
        let target = self.located();
        self.binder.registry.register(create(target))
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::RulesBinder;
    use crate::rules::ObjectCreateBuilder;

    #[test]
    fn test_rule_source_points_at_rule_call() {
        let mut binder = RulesBinder::new();
        let mut builder = binder.for_pattern("a");
        let for_pattern_line = line!() - 1;
        builder.object_create();
        let rule_line = line!() - 1;

        let provider = binder
            .registry()
            .lookup_first_of_type::<ObjectCreateBuilder>("a", None)
            .unwrap();
        let source = &crate::registry::RuleProvider::target(provider).source;
        assert_eq!(source.line, rule_line);
        assert_ne!(source.line, for_pattern_line);
        assert!(source.file.ends_with("linked.rs"));
    }

    #[test]
    fn test_empty_namespace_matches_any() {
        let mut binder = RulesBinder::new();
        let builder = binder.for_pattern("a").with_namespace_uri("");
        assert_eq!(builder.target().namespace_uri, None);
    }

    #[test]
    fn test_provider_kinds_in_registration_order() {
        let mut binder = RulesBinder::new();
        let mut employee = binder.for_pattern("company/employee");
        employee.object_create().of_type("Employee");
        employee.set_properties();
        employee.call_method("setName");
        employee.call_param().of_index(0);
        employee.object_param(7_i64);
        employee.set_next("addEmployee");
        employee.set_top("setCompany");
        employee.set_root("setLast");
        employee.node_create();
        employee.factory_create();
        employee.set_bean_property();
        employee.set_nested_properties();

        let kinds: Vec<&str> = binder.registry().providers().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            [
                "object-create",
                "set-properties",
                "call-method",
                "call-param",
                "object-param",
                "set-next",
                "set-top",
                "set-root",
                "node-create",
                "factory-create",
                "bean-property",
                "set-nested-properties",
            ]
        );
    }
}
