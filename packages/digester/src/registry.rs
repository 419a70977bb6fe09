//! Pattern registry mapping (pattern, namespace) keys to rule providers.
//!
//! Providers are kept in registration order. That order is the firing order
//! of the rules created from them, for `begin`, `body` and `end` alike.

use std::any::Any;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{ErrorAggregator, SourceLocation};
use crate::host::Host;
use crate::pattern::Pattern;
use crate::rule::Rule;

/// The (pattern, namespace) a provider is bound to, and where it was bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTarget {
    pub pattern: Pattern,
    /// `None` matches elements in any namespace.
    pub namespace_uri: Option<String>,
    pub source: SourceLocation,
}

impl RuleTarget {
    /// Record a configuration error against this binding.
    pub fn error(&self, errors: &mut ErrorAggregator, message: impl fmt::Display) {
        errors.add_error_at(
            format!("{message} (pattern '{}')", self.pattern),
            self.source.clone(),
        );
    }

    /// Record a configuration error together with the failure behind it.
    pub fn error_with_cause(
        &self,
        errors: &mut ErrorAggregator,
        message: impl fmt::Display,
        cause: impl StdError + Send + Sync + 'static,
    ) {
        errors.add_error_with_cause(
            format!("{message} (pattern '{}')", self.pattern),
            Arc::new(cause),
            self.source.clone(),
        );
    }

    fn applies_to(&self, namespace_uri: Option<&str>) -> bool {
        match &self.namespace_uri {
            None => true,
            Some(bound) => bound == namespace_uri.unwrap_or_default(),
        }
    }
}

/// Deferred construction of one rule.
///
/// Providers are configured through the DSL, validated once by
/// [`finalize`](Self::finalize) and then shared read-only by every engine.
pub trait RuleProvider: Any + Send + Sync {
    fn target(&self) -> &RuleTarget;

    /// Short name of the rule variant, used in logs and listings.
    fn kind(&self) -> &'static str;

    /// Validate the configuration and resolve names through the host.
    fn finalize(&mut self, _host: &dyn Host, _errors: &mut ErrorAggregator) {}

    /// Create a fresh rule instance for one document.
    fn create_rule(&self) -> Box<dyn Rule>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Rules selected for one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// The pattern that won.
    pub pattern: String,
    /// Provider indices in firing order.
    pub rules: Vec<usize>,
}

type Key = (String, Option<String>);

/// Registry of rule providers.
#[derive(Default)]
pub struct PatternRegistry {
    providers: Vec<Box<dyn RuleProvider>>,
    index: HashMap<Key, Vec<usize>>,
    /// Providers of exact patterns, by pattern text.
    exact: HashMap<String, Vec<usize>>,
    /// Wildcard patterns in first-registration order, with their providers.
    wildcards: Vec<(Pattern, Vec<usize>)>,
}

impl PatternRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider and return it for further configuration.
    pub fn register<P: RuleProvider>(&mut self, provider: P) -> &mut P {
        let index = self.push(Box::new(provider));
        #[allow(clippy::expect_used)] // The provider at `index` was just pushed as a `P`
        let provider = self
            .provider_mut::<P>(index)
            .expect("registered provider has the registered type");
        provider
    }

    /// Append a boxed provider and return its index.
    pub fn push(&mut self, provider: Box<dyn RuleProvider>) -> usize {
        let index = self.providers.len();
        let target = provider.target();
        let pattern = target.pattern.clone();
        let key = (pattern.as_str().to_string(), target.namespace_uri.clone());

        tracing::trace!(pattern = %pattern, kind = provider.kind(), "Registered rule provider");

        self.index.entry(key).or_default().push(index);
        if pattern.is_wildcard() {
            match self.wildcards.iter_mut().find(|(p, _)| *p == pattern) {
                Some((_, indices)) => indices.push(index),
                None => self.wildcards.push((pattern, vec![index])),
            }
        } else {
            self.exact
                .entry(pattern.as_str().to_string())
                .or_default()
                .push(index);
        }
        self.providers.push(provider);
        index
    }

    #[must_use]
    pub fn provider_mut<P: RuleProvider>(&mut self, index: usize) -> Option<&mut P> {
        self.providers
            .get_mut(index)
            .and_then(|p| p.as_any_mut().downcast_mut::<P>())
    }

    /// Index of the first provider of type `P` bound to the key.
    #[must_use]
    pub fn first_index_of_type<P: RuleProvider>(
        &self,
        pattern: &str,
        namespace_uri: Option<&str>,
    ) -> Option<usize> {
        let key = (pattern.to_string(), namespace_uri.map(String::from));
        self.index.get(&key)?.iter().copied().find(|&i| {
            self.providers
                .get(i)
                .is_some_and(|p| p.as_any().is::<P>())
        })
    }

    /// First provider of type `P` bound to the key.
    #[must_use]
    pub fn lookup_first_of_type<P: RuleProvider>(
        &self,
        pattern: &str,
        namespace_uri: Option<&str>,
    ) -> Option<&P> {
        let index = self.first_index_of_type::<P>(pattern, namespace_uri)?;
        self.providers[index].as_any().downcast_ref::<P>()
    }

    /// Return the first provider of type `P` for the target, registering a
    /// new one when there is none.
    pub fn get_or_register<P: RuleProvider>(
        &mut self,
        target: &RuleTarget,
        create: impl FnOnce() -> P,
    ) -> &mut P {
        let existing = self.first_index_of_type::<P>(
            target.pattern.as_str(),
            target.namespace_uri.as_deref(),
        );
        match existing {
            #[allow(clippy::expect_used)] // Index was found by type
            Some(index) => self
                .provider_mut::<P>(index)
                .expect("indexed provider has the looked-up type"),
            None => self.register(create()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn providers(&self) -> impl Iterator<Item = &dyn RuleProvider> {
        self.providers.iter().map(|p| &**p)
    }

    /// Validate every provider, in registration order.
    pub fn finalize(&mut self, host: &dyn Host, errors: &mut ErrorAggregator) {
        for provider in &mut self.providers {
            provider.finalize(host, errors);
        }
    }

    /// Create one rule per provider, in registration order.
    pub fn instantiate_all(&self, mut sink: impl FnMut(&RuleTarget, Box<dyn Rule>)) {
        for provider in &self.providers {
            sink(provider.target(), provider.create_rule());
        }
    }

    /// Select the rules for an element.
    ///
    /// Candidates are tried from most to least specific: the exact pattern,
    /// then wildcards ordered by [`Pattern::precedence`] (earlier registration
    /// wins ties), `*` last. The first candidate with at least one rule
    /// applicable to the element's namespace wins. Within it, rules bound to
    /// that namespace come before rules bound to no namespace.
    ///
    /// # Arguments
    /// * `names` - Local names of the open elements, outermost first
    /// * `path` - The same path joined with `/`
    /// * `namespace_uri` - Namespace of the element being matched
    #[must_use]
    pub fn matches(
        &self,
        names: &[&str],
        path: &str,
        namespace_uri: Option<&str>,
    ) -> Option<RuleMatch> {
        if let Some(rules) = self.exact.get(path).and_then(|i| self.applicable(i, namespace_uri)) {
            return Some(RuleMatch {
                pattern: path.to_string(),
                rules,
            });
        }

        let mut candidates: Vec<&(Pattern, Vec<usize>)> = self
            .wildcards
            .iter()
            .filter(|(pattern, _)| pattern.matches(names))
            .collect();
        candidates.sort_by(|(a, _), (b, _)| b.precedence().cmp(&a.precedence()));

        candidates.into_iter().find_map(|(pattern, indices)| {
            self.applicable(indices, namespace_uri).map(|rules| RuleMatch {
                pattern: pattern.as_str().to_string(),
                rules,
            })
        })
    }

    fn applicable(&self, indices: &[usize], namespace_uri: Option<&str>) -> Option<Vec<usize>> {
        let (bound, unbound): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .filter(|&i| self.providers[i].target().applies_to(namespace_uri))
            .partition(|&i| self.providers[i].target().namespace_uri.is_some());
        let rules: Vec<usize> = bound.into_iter().chain(unbound).collect();
        (!rules.is_empty()).then_some(rules)
    }
}

impl fmt::Debug for PatternRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternRegistry")
            .field("providers", &self.providers.len())
            .field("exact", &self.exact.len())
            .field("wildcards", &self.wildcards.len())
            .finish()
    }
}
