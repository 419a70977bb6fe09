//! Provider for application-defined rules.

use std::fmt;
use std::sync::Arc;

use super::provider_accessors;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::Rule;

type RuleFactory = Arc<dyn Fn() -> Box<dyn Rule> + Send + Sync>;

/// Binds an arbitrary [`Rule`] constructor to a pattern.
pub struct CustomRuleProvider {
    target: RuleTarget,
    factory: RuleFactory,
}

impl CustomRuleProvider {
    pub(crate) fn new<F, R>(target: RuleTarget, factory: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Rule + 'static,
    {
        Self {
            target,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Rule>),
        }
    }
}

impl fmt::Debug for CustomRuleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRuleProvider")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl RuleProvider for CustomRuleProvider {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "custom"
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        (self.factory)()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ExecutionError;
    use crate::rule::Context;
    use crate::rules::testing::{host, stacks, target};
    use crate::value::{Attributes, Value};

    struct PushCount(usize);

    impl Rule for PushCount {
        fn begin(
            &mut self,
            ctx: &mut Context<'_>,
            _attributes: &Attributes,
        ) -> Result<(), ExecutionError> {
            ctx.push(Value::Int(i64::try_from(self.0).unwrap_or_default()));
            Ok(())
        }
    }

    #[test]
    fn test_fresh_rule_per_instantiation() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let provider = CustomRuleProvider::new(target("a"), move || {
            PushCount(counter.fetch_add(1, Ordering::SeqCst))
        });

        let host = host();
        let mut stacks = stacks("a");
        let mut ctx = Context::new(&host, &mut stacks);
        provider.create_rule().begin(&mut ctx, &Attributes::new()).unwrap();
        provider.create_rule().begin(&mut ctx, &Attributes::new()).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.peek(0).unwrap(), &Value::Int(1));
        assert_eq!(provider.kind(), "custom");
    }
}
