//! Configuration DSL for binding rules to patterns.
//!
//! Rules are declared in [`RulesModule`]s against a [`RulesBinder`]:
//!
//! ```
//! use digester::binder::RulesBinder;
//!
//! let mut binder = RulesBinder::new();
//! let mut employee = binder.for_pattern("company/employee");
//! employee.object_create().of_type("Employee");
//! employee.set_properties().add_alias("id", "employeeId");
//! binder
//!     .for_pattern("company/employee/name")
//!     .set_bean_property();
//!
//! assert_eq!(binder.registry().len(), 3);
//! assert!(!binder.errors().has_errors());
//! ```
//!
//! Nothing is validated while a module runs. Every mistake is recorded in
//! the binder's [`ErrorAggregator`] and reported in bulk when the loader is
//! asked for an engine.

mod linked;

pub use linked::LinkedRuleBuilder;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{ErrorAggregator, SourceLocation};
use crate::pattern::Pattern;
use crate::registry::{PatternRegistry, RuleTarget};

/// A named bundle of pattern bindings.
pub trait RulesModule {
    fn configure(&self, binder: &mut RulesBinder);

    /// Name shown next to errors raised while this module is installed.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl<F> RulesModule for F
where
    F: Fn(&mut RulesBinder),
{
    fn configure(&self, binder: &mut RulesBinder) {
        self(binder);
    }
}

/// Installs a module with a default namespace for all of its patterns.
///
/// Bindings that call [`LinkedRuleBuilder::with_namespace_uri`] keep their
/// own namespace.
pub struct NamespacedModule<M> {
    namespace_uri: String,
    module: M,
}

impl<M: RulesModule> NamespacedModule<M> {
    pub fn new(namespace_uri: impl Into<String>, module: M) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            module,
        }
    }
}

impl<M: RulesModule> RulesModule for NamespacedModule<M> {
    fn configure(&self, binder: &mut RulesBinder) {
        let previous = binder.default_namespace.replace(self.namespace_uri.clone());
        self.module.configure(binder);
        binder.default_namespace = previous;
    }

    fn name(&self) -> String {
        self.module.name()
    }
}

/// Collects bindings into a [`PatternRegistry`] and errors into an
/// [`ErrorAggregator`].
#[derive(Debug, Default)]
pub struct RulesBinder {
    registry: PatternRegistry,
    errors: ErrorAggregator,
    default_namespace: Option<String>,
}

impl RulesBinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start binding rules to a pattern.
    ///
    /// An invalid pattern is recorded as an error; the bindings are still
    /// accepted so that later mistakes are reported too.
    #[track_caller]
    pub fn for_pattern(&mut self, pattern: &str) -> LinkedRuleBuilder<'_> {
        let source = self.errors.locate(SourceLocation::caller());
        let pattern = match Pattern::parse(pattern) {
            Ok(pattern) => pattern,
            Err(message) => {
                self.errors.add_error_at(message, source.clone());
                Pattern::exact(pattern)
            }
        };
        let target = RuleTarget {
            pattern,
            namespace_uri: self.default_namespace.clone(),
            source,
        };
        LinkedRuleBuilder::new(self, target)
    }

    /// Run a module against this binder. Modules may install other modules.
    pub fn install(&mut self, module: &dyn RulesModule) {
        let name = module.name();
        tracing::debug!(module = %name, "Installing rules module");
        self.errors.enter_module(name);
        module.configure(self);
        self.errors.leave_module();
    }

    /// Record a configuration error at the caller's location.
    #[track_caller]
    pub fn add_error(&mut self, message: impl fmt::Display) {
        self.errors.add_error(message);
    }

    /// Record a configuration error and the failure behind it.
    #[track_caller]
    pub fn add_error_with_cause(
        &mut self,
        message: impl fmt::Display,
        cause: impl StdError + Send + Sync + 'static,
    ) {
        let source = self.errors.locate(SourceLocation::caller());
        self.errors.add_error_with_cause(message, Arc::new(cause), source);
    }

    #[must_use]
    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    #[must_use]
    pub fn errors(&self) -> &ErrorAggregator {
        &self.errors
    }

    pub(crate) fn into_parts(self) -> (PatternRegistry, ErrorAggregator) {
        (self.registry, self.errors)
    }
}
