//! Node-create: capture an unmodelled subtree as a generic [`Node`](crate::node::Node).

use std::rc::Rc;

use super::provider_accessors;
use crate::error::ExecutionError;
use crate::node::NodeKind;
use crate::registry::{RuleProvider, RuleTarget};
use crate::rule::{Context, Rule};
use crate::value::{Attributes, Value};

/// Builder for [`NodeCreateRule`].
#[derive(Debug)]
pub struct NodeCreateBuilder {
    target: RuleTarget,
    kind: NodeKind,
}

impl NodeCreateBuilder {
    pub(crate) fn new(target: RuleTarget) -> Self {
        Self {
            target,
            kind: NodeKind::Element,
        }
    }

    pub fn of_kind(&mut self, kind: NodeKind) -> &mut Self {
        self.kind = kind;
        self
    }
}

impl RuleProvider for NodeCreateBuilder {
    provider_accessors!();

    fn kind(&self) -> &'static str {
        "node-create"
    }

    fn create_rule(&self) -> Box<dyn Rule> {
        Box::new(NodeCreateRule { kind: self.kind })
    }
}

/// Starts a capture on `begin` and pushes the finished node on `end`.
///
/// The node is pushed like any created object, so link rules registered
/// after this one on the same pattern see it on top of the stack.
#[derive(Debug)]
pub struct NodeCreateRule {
    kind: NodeKind,
}

impl Rule for NodeCreateRule {
    fn begin(
        &mut self,
        ctx: &mut Context<'_>,
        attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        ctx.begin_capture(self.kind, attributes);
        Ok(())
    }

    fn end(&mut self, ctx: &mut Context<'_>) -> Result<(), ExecutionError> {
        let node = ctx.captured().cloned().ok_or(ExecutionError::NoCapturedNode)?;
        ctx.push(Value::Node(Rc::new(node)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{host, stacks, target};

    #[test]
    fn test_end_without_capture_fails() {
        let host = host();
        let mut stacks = stacks("raw");
        let mut ctx = Context::new(&host, &mut stacks);

        let mut rule = NodeCreateBuilder::new(target("*/raw")).create_rule();
        rule.begin(&mut ctx, &Attributes::new()).unwrap();
        assert!(matches!(rule.end(&mut ctx), Err(ExecutionError::NoCapturedNode)));
        assert!(stacks.frames[0].capture.is_some());
    }

    #[test]
    fn test_pushes_captured_fragment() {
        let host = host();
        let mut stacks = stacks("raw");
        let mut ctx = Context::new(&host, &mut stacks);

        let mut builder = NodeCreateBuilder::new(target("*/raw"));
        builder.of_kind(NodeKind::DocumentFragment);
        let mut rule = builder.create_rule();
        rule.begin(&mut ctx, &Attributes::from_pairs([("id", "1")])).unwrap();

        let frame = &mut stacks.frames[0];
        let mut capture = frame.capture.take().unwrap();
        capture.text("hello");
        frame.captured = Some(capture.finish());

        let mut ctx = Context::new(&host, &mut stacks);
        rule.end(&mut ctx).unwrap();
        let node = ctx.peek(0).unwrap().as_node().unwrap();
        assert_eq!(node.kind(), NodeKind::DocumentFragment);
        assert_eq!(node.text_content(), "hello");
    }
}
