//! Assembles rules modules into a shared registry and hands out engines.

use std::sync::Arc;

use crate::binder::{RulesBinder, RulesModule};
use crate::diagnostics::{CreationReport, ErrorAggregator, ErrorMessage};
use crate::engine::Digester;
use crate::error::{DigesterError, Result};
use crate::host::Host;
use crate::registry::PatternRegistry;

/// Install `modules` in order and finalize the resulting registry.
///
/// Configuration errors do not fail here; they are kept by the loader and
/// reported by [`Loader::new_engine`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use digester::binder::RulesBinder;
/// use digester::host::{RecordHost, TypeDef};
/// use digester::loader::new_loader;
/// use digester::value::{ParamType, Value};
///
/// let host = RecordHost::new()
///     .with_type(TypeDef::new("Note").property("text", ParamType::String));
/// let rules = |binder: &mut RulesBinder| {
///     binder.for_pattern("note").object_create().of_type("Note");
///     binder.for_pattern("note").call_method("setText");
/// };
///
/// let loader = new_loader(Arc::new(host), &[&rules]);
/// let mut digester = loader.new_engine().unwrap();
/// let note = digester.parse_str("<note> hello </note>").unwrap().unwrap();
/// assert_eq!(loader.host().get_property(&note, "text").unwrap(), Value::from("hello"));
/// ```
pub fn new_loader(host: Arc<dyn Host>, modules: &[&dyn RulesModule]) -> Loader {
    let mut binder = RulesBinder::new();
    for module in modules {
        binder.install(*module);
    }
    Loader::from_binder(host, binder)
}

/// A finalized registry together with its host and configuration errors.
///
/// A loader is `Send + Sync`: engines for concurrent documents can be created
/// from one loader on several threads.
#[derive(Clone)]
pub struct Loader {
    registry: Arc<PatternRegistry>,
    host: Arc<dyn Host>,
    errors: Arc<ErrorAggregator>,
}

impl Loader {
    /// Finalize the bindings collected by `binder`.
    pub fn from_binder(host: Arc<dyn Host>, binder: RulesBinder) -> Self {
        let (mut registry, mut errors) = binder.into_parts();
        registry.finalize(host.as_ref(), &mut errors);
        tracing::debug!(
            providers = registry.len(),
            errors = errors.error_count(),
            "Finalized rule registry"
        );
        Self {
            registry: Arc::new(registry),
            host,
            errors: Arc::new(errors),
        }
    }

    /// Create an engine with fresh stacks.
    ///
    /// # Errors
    /// Returns `Configuration` with every recorded error when any module
    /// was misconfigured.
    pub fn new_engine(&self) -> Result<Digester> {
        if self.errors.has_errors() {
            return Err(DigesterError::Configuration(self.report()));
        }
        Ok(Digester::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.host),
        ))
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.error_count()
    }

    #[must_use]
    pub fn errors(&self) -> &[ErrorMessage] {
        self.errors.errors()
    }

    #[must_use]
    pub fn report(&self) -> CreationReport {
        self.errors.report()
    }

    #[must_use]
    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    #[must_use]
    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("registry", &self.registry)
            .field("errors", &self.errors.error_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordHost;

    fn broken(binder: &mut RulesBinder) {
        binder.for_pattern("a").object_create().of_type("Missing");
        binder.for_pattern("a").object_create().of_type("AlsoMissing");
        binder.for_pattern("a").call_method("");
    }

    #[test]
    fn test_errors_are_reported_in_bulk() {
        let loader = new_loader(Arc::new(RecordHost::new()), &[&broken]);
        assert_eq!(loader.error_count(), 3);

        let Err(DigesterError::Configuration(report)) = loader.new_engine() else {
            panic!("expected a configuration error");
        };
        let text = report.to_string();
        assert!(
            text.starts_with("Unable to create the digester, see the following errors:\n\n1) ")
        );
        assert!(text.contains("\n2) Unknown type 'AlsoMissing' (pattern 'a')\n"));
        assert!(text.contains("\n3) Method name must not be empty (pattern 'a')\n"));
        assert!(text.ends_with("3 errors"));
    }

    #[test]
    fn test_loader_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Loader>();
    }
}
