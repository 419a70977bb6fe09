//! Rule hooks and the runtime context they operate on.
//!
//! A [`Rule`] is invoked by the engine for every element whose path matches
//! the rule's pattern:
//!
//! 1. `begin` when the element is entered, with its attributes
//! 2. `body` when the element is exited, with the element's accumulated text
//! 3. `end` right after every matched rule received its body
//!
//! All three hooks fire in registration order. Objects and parameter frames
//! pushed through the [`Context`] while an element is open belong to that
//! element and are popped by the engine once every `end` hook of the element
//! has run.

use std::sync::Arc;

use crate::error::ExecutionError;
use crate::host::Host;
use crate::node::{Node, NodeBuilder, NodeKind};
use crate::rules::nested_properties::NestedScope;
use crate::value::{Attributes, Value};

/// Behaviour bound to a pattern.
///
/// Rule instances are created per document, so they may keep state between
/// hooks. Elements matched by the same rule can nest (a wildcard pattern
/// matching `section/section`), so per-element state must be kept as a stack.
pub trait Rule {
    fn begin(
        &mut self,
        _ctx: &mut Context<'_>,
        _attributes: &Attributes,
    ) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn body(&mut self, _ctx: &mut Context<'_>, _text: &str) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn end(&mut self, _ctx: &mut Context<'_>) -> Result<(), ExecutionError> {
        Ok(())
    }

    /// Called once after the document ended successfully.
    fn finish(&mut self) {}
}

/// Child element of an element whose children are mapped onto properties.
#[derive(Debug)]
pub(crate) struct NestedChild {
    pub(crate) scope: Arc<NestedScope>,
    pub(crate) property: String,
    pub(crate) target: Value,
}

/// Runtime state of one open element.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    pub(crate) local_name: String,
    pub(crate) namespace_uri: Option<String>,
    pub(crate) path: String,
    pub(crate) pattern: Option<String>,
    /// Indices into the engine's rule instances, in firing order.
    pub(crate) rules: Vec<usize>,
    pub(crate) text: String,
    /// Objects pushed while this element was open.
    pub(crate) objects: usize,
    /// Parameter frames pushed while this element was open.
    pub(crate) params: usize,
    pub(crate) nested: Option<Arc<NestedScope>>,
    pub(crate) nested_child: Option<NestedChild>,
    pub(crate) capture: Option<NodeBuilder>,
    pub(crate) captured: Option<Node>,
}

/// The execution stacks of one engine.
#[derive(Debug, Default)]
pub(crate) struct Stacks {
    pub(crate) objects: Vec<Value>,
    pub(crate) params: Vec<Vec<Option<Value>>>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) root: Option<Value>,
}

impl Stacks {
    pub(crate) fn clear(&mut self) {
        self.objects.clear();
        self.params.clear();
        self.frames.clear();
        self.root = None;
    }

    pub(crate) fn push_object(&mut self, value: Value) {
        if self.root.is_none() {
            self.root = Some(value.clone());
        }
        self.objects.push(value);
    }
}

/// View of the engine handed to rule hooks.
pub struct Context<'a> {
    host: &'a dyn Host,
    stacks: &'a mut Stacks,
}

impl<'a> Context<'a> {
    pub(crate) fn new(host: &'a dyn Host, stacks: &'a mut Stacks) -> Self {
        Self { host, stacks }
    }

    #[must_use]
    pub fn host(&self) -> &dyn Host {
        self.host
    }

    fn frame(&self) -> Option<&Frame> {
        self.stacks.frames.last()
    }

    fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.stacks.frames.last_mut()
    }

    /// Local name of the element being processed.
    #[must_use]
    pub fn element_name(&self) -> &str {
        self.frame().map_or("", |f| f.local_name.as_str())
    }

    #[must_use]
    pub fn namespace_uri(&self) -> Option<&str> {
        self.frame().and_then(|f| f.namespace_uri.as_deref())
    }

    /// Path of the element being processed.
    #[must_use]
    pub fn path(&self) -> &str {
        self.frame().map_or("", |f| f.path.as_str())
    }

    /// Number of objects on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stacks.objects.len()
    }

    /// Push an object. It is popped when the current element exits.
    pub fn push(&mut self, value: Value) {
        tracing::debug!(path = %self.path(), object = %value, "Pushed object");
        if let Some(frame) = self.frame_mut() {
            frame.objects += 1;
        }
        self.stacks.push_object(value);
    }

    /// Object at `offset`: `0` is the top, positive offsets go deeper and
    /// negative offsets count from the bottom (`-1` is the bottom object).
    pub fn peek(&self, offset: i32) -> Result<&Value, ExecutionError> {
        let depth = self.stacks.objects.len();
        let underflow = || ExecutionError::StackUnderflow { offset, depth };
        let from_top = if offset >= 0 {
            usize::try_from(offset).map_err(|_| underflow())?
        } else {
            let from_top = i64::try_from(depth).map_err(|_| underflow())? + i64::from(offset);
            usize::try_from(from_top).map_err(|_| underflow())?
        };
        if from_top >= depth {
            return Err(underflow());
        }
        Ok(&self.stacks.objects[depth - 1 - from_top])
    }

    /// The first object pushed in this document.
    #[must_use]
    pub fn root(&self) -> Option<&Value> {
        self.stacks.root.as_ref()
    }

    /// Open a parameter frame with `count` empty slots for a pending call
    /// and return its index.
    pub fn push_params(&mut self, count: usize) -> usize {
        if let Some(frame) = self.frame_mut() {
            frame.params += 1;
        }
        self.stacks.params.push(vec![None; count]);
        self.stacks.params.len() - 1
    }

    /// Store a parameter into the innermost open parameter frame.
    pub fn set_param(&mut self, index: usize, value: Value) -> Result<(), ExecutionError> {
        let slots = self
            .stacks
            .params
            .last_mut()
            .ok_or(ExecutionError::NoParameterFrame { index })?;
        let count = slots.len();
        let slot = slots
            .get_mut(index)
            .ok_or(ExecutionError::ParameterIndex { index, count })?;
        *slot = Some(value);
        Ok(())
    }

    /// Parameters of the innermost open parameter frame.
    #[must_use]
    pub fn params(&self) -> Option<&[Option<Value>]> {
        self.stacks.params.last().map(Vec::as_slice)
    }

    /// Parameters of the frame opened by [`push_params`](Self::push_params).
    #[must_use]
    pub fn params_at(&self, index: usize) -> Option<&[Option<Value>]> {
        self.stacks.params.get(index).map(Vec::as_slice)
    }

    /// Route direct children of the current element to property assignments.
    pub(crate) fn intercept_children(&mut self, scope: Arc<NestedScope>) {
        if let Some(frame) = self.frame_mut() {
            frame.nested = Some(scope);
        }
    }

    /// Start capturing the current element's subtree as a node.
    ///
    /// No rules fire for the captured descendants.
    pub fn begin_capture(&mut self, kind: NodeKind, attributes: &Attributes) {
        if let Some(frame) = self.stacks.frames.last_mut() {
            frame.capture = Some(NodeBuilder::new(
                kind,
                &frame.local_name,
                frame.namespace_uri.as_deref(),
                attributes,
            ));
        }
    }

    /// Node captured for the current element, available once it has exited.
    #[must_use]
    pub fn captured(&self) -> Option<&Node> {
        self.frame().and_then(|f| f.captured.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordHost;

    fn stacks_with(values: &[i64]) -> Stacks {
        let mut stacks = Stacks::default();
        stacks.frames.push(Frame {
            local_name: "a".to_string(),
            path: "a".to_string(),
            ..Frame::default()
        });
        for value in values {
            stacks.push_object(Value::Int(*value));
        }
        stacks
    }

    #[test]
    fn test_peek_offsets() {
        let host = RecordHost::new();
        let mut stacks = stacks_with(&[1, 2, 3]);
        let ctx = Context::new(&host, &mut stacks);

        assert_eq!(ctx.peek(0).unwrap(), &Value::Int(3));
        assert_eq!(ctx.peek(2).unwrap(), &Value::Int(1));
        assert_eq!(ctx.peek(-1).unwrap(), &Value::Int(1));
        assert_eq!(ctx.peek(-3).unwrap(), &Value::Int(3));
        assert!(matches!(
            ctx.peek(3),
            Err(ExecutionError::StackUnderflow { offset: 3, depth: 3 })
        ));
        assert!(ctx.peek(-4).is_err());
        assert_eq!(ctx.root(), Some(&Value::Int(1)));
    }

    #[test]
    fn test_push_is_owned_by_current_frame() {
        let host = RecordHost::new();
        let mut stacks = stacks_with(&[]);
        let mut ctx = Context::new(&host, &mut stacks);
        ctx.push(Value::Int(1));
        ctx.push(Value::Int(2));
        assert_eq!(ctx.push_params(1), 0);

        assert_eq!(stacks.frames[0].objects, 2);
        assert_eq!(stacks.frames[0].params, 1);
    }

    #[test]
    fn test_set_param_errors() {
        let host = RecordHost::new();
        let mut stacks = stacks_with(&[]);
        let mut ctx = Context::new(&host, &mut stacks);

        assert!(matches!(
            ctx.set_param(0, Value::Null),
            Err(ExecutionError::NoParameterFrame { index: 0 })
        ));

        let index = ctx.push_params(2);
        ctx.set_param(1, "x".into()).unwrap();
        assert!(matches!(
            ctx.set_param(2, Value::Null),
            Err(ExecutionError::ParameterIndex { index: 2, count: 2 })
        ));
        assert_eq!(ctx.params().unwrap(), &[None, Some(Value::from("x"))]);
        assert_eq!(ctx.params_at(index), ctx.params());
    }
}
