//! Rule variants.
//!
//! Each variant lives in its own module together with the builder that
//! configures it. Builders are [`RuleProvider`](crate::registry::RuleProvider)s:
//! they record options while a module is configured, validate them once in
//! `finalize`, and then create fresh rule instances for every document.

pub mod bean_property;
pub mod call_method;
pub mod call_param;
pub mod custom;
pub mod factory_create;
pub mod nested_properties;
pub mod node_create;
pub mod object_create;
pub mod object_param;
pub mod set_link;
pub mod set_properties;

pub use bean_property::{BeanPropertyBuilder, BeanPropertySetterRule};
pub use call_method::{CallMethodBuilder, CallMethodRule};
pub use call_param::{CallParamBuilder, CallParamRule};
pub use custom::CustomRuleProvider;
pub use factory_create::{FactoryCreateBuilder, FactoryCreateRule};
pub use nested_properties::{NestedPropertiesBuilder, SetNestedPropertiesRule};
pub use node_create::{NodeCreateBuilder, NodeCreateRule};
pub use object_create::{ObjectCreateBuilder, ObjectCreateRule};
pub use object_param::{ObjectParamBuilder, ObjectParamRule};
pub use set_link::{Relation, SetLinkBuilder, SetLinkRule};
pub use set_properties::{SetPropertiesBuilder, SetPropertiesRule};

/// `RuleProvider` accessors shared by every builder with a `target` field.
macro_rules! provider_accessors {
    () => {
        fn target(&self) -> &$crate::registry::RuleTarget {
            &self.target
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

pub(crate) use provider_accessors;

/// Alias table shared by the attribute and child-element property rules.
///
/// `None` marks a name that is ignored.
pub(crate) type Aliases = std::collections::HashMap<String, Option<String>>;
