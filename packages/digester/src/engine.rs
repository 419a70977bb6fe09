//! Execution engine driving matched rules from parse events.
//!
//! A [`Digester`] consumes one document at a time:
//!
//! ```text
//! start_document (start_element (start_element | characters)* end_element)* end_document
//! ```
//!
//! On every element it asks the shared [`PatternRegistry`] for the rules to
//! fire, runs their hooks against its own execution stacks and pops whatever
//! the element pushed once the element ends. Any failing hook fails the
//! whole document; no partial object graph is kept.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::MATCH_CACHE_LIMIT;
use crate::error::{DigesterError, ExecutionError, Result};
use crate::host::Host;
use crate::path::PathTracker;
use crate::registry::{PatternRegistry, RuleMatch};
use crate::rule::{Context, Frame, Rule, Stacks};
use crate::value::{Attributes, Value};

/// Lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No document has been started yet.
    Idle,
    InDocument,
    /// The last document ended successfully.
    Done,
    /// The last document failed; its stacks were discarded.
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Idle => "idle",
            Self::InDocument => "in a document",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(state)
    }
}

/// A push-parser event.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    StartDocument,
    StartElement {
        local_name: &'a str,
        namespace_uri: Option<&'a str>,
        attributes: &'a Attributes,
    },
    Characters(&'a str),
    EndElement,
    EndDocument,
}

type MatchKey = (String, Option<String>);

/// Rule-driven object assembler for one document at a time.
///
/// Engines are created by a [`Loader`](crate::loader::Loader) and share its
/// registry and host. An engine is not `Send`; create one per thread.
pub struct Digester {
    registry: Arc<PatternRegistry>,
    host: Arc<dyn Host>,
    /// Rule instances of the current document, indexed like the providers.
    rules: Vec<Box<dyn Rule>>,
    path: PathTracker,
    stacks: Stacks,
    seeds: Vec<Value>,
    state: EngineState,
    matches: HashMap<MatchKey, Option<RuleMatch>>,
}

impl Digester {
    pub(crate) fn new(registry: Arc<PatternRegistry>, host: Arc<dyn Host>) -> Self {
        Self {
            registry,
            host,
            rules: Vec::new(),
            path: PathTracker::new(),
            stacks: Stacks::default(),
            seeds: Vec::new(),
            state: EngineState::Idle,
            matches: HashMap::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    /// Path of the innermost open element.
    #[must_use]
    pub fn current_path(&self) -> &str {
        self.path.current_path()
    }

    /// Number of objects on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stacks.objects.len()
    }

    /// Object at `offset` from the top of the stack.
    #[must_use]
    pub fn peek(&self, offset: usize) -> Option<&Value> {
        let depth = self.stacks.objects.len();
        depth
            .checked_sub(offset + 1)
            .and_then(|i| self.stacks.objects.get(i))
    }

    /// The first object pushed in the last document, or the first seed.
    ///
    /// `None` after a failed document.
    #[must_use]
    pub fn root(&self) -> Option<&Value> {
        self.stacks.root.as_ref()
    }

    /// Seed an object that sits at the bottom of the stack for every
    /// following document, for example a collection the document fills.
    ///
    /// # Errors
    /// Returns `IllegalState` while a document is in progress.
    pub fn push(&mut self, value: Value) -> Result<()> {
        if self.state == EngineState::InDocument {
            return Err(DigesterError::IllegalState(
                "objects cannot be seeded while a document is in progress".to_string(),
            ));
        }
        tracing::debug!(object = %value, "Seeded object");
        self.stacks.push_object(value.clone());
        self.seeds.push(value);
        Ok(())
    }

    /// Dispatch one parse event.
    ///
    /// # Errors
    /// See the individual event methods.
    pub fn handle(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::StartDocument => self.start_document(),
            Event::StartElement {
                local_name,
                namespace_uri,
                attributes,
            } => self.start_element(local_name, namespace_uri, attributes),
            Event::Characters(text) => self.characters(text),
            Event::EndElement => self.end_element(),
            Event::EndDocument => self.end_document(),
        }
    }

    /// Begin a document: fresh rule instances and stacks holding only the seeds.
    ///
    /// # Errors
    /// Returns `IllegalState` if the previous document has not ended.
    pub fn start_document(&mut self) -> Result<()> {
        if self.state == EngineState::InDocument {
            return Err(self.abort(DigesterError::IllegalState(
                "document started while another document is in progress".to_string(),
            )));
        }

        let mut rules = Vec::with_capacity(self.registry.len());
        self.registry.instantiate_all(|_, rule| rules.push(rule));
        self.rules = rules;

        self.path.clear();
        self.stacks.clear();
        for seed in &self.seeds {
            self.stacks.push_object(seed.clone());
        }
        self.state = EngineState::InDocument;

        tracing::debug!(
            rules = self.rules.len(),
            seeds = self.seeds.len(),
            "Document started"
        );
        Ok(())
    }

    /// Enter an element and fire the `begin` hooks of its rules.
    ///
    /// # Errors
    /// Returns `Execution` when a hook fails and `IllegalState` outside of a
    /// document.
    pub fn start_element(
        &mut self,
        local_name: &str,
        namespace_uri: Option<&str>,
        attributes: &Attributes,
    ) -> Result<()> {
        self.ensure_in_document("element start")?;
        let namespace_uri = namespace_uri.filter(|ns| !ns.is_empty());

        if let Some(capture) = self.capture_mut() {
            capture.open(local_name, namespace_uri, attributes);
            return Ok(());
        }

        let path = self.path.enter(local_name, namespace_uri).to_string();
        let (pattern, rules) = match self.lookup(&path, namespace_uri) {
            Some(found) => (Some(found.pattern), found.rules),
            None => (None, Vec::new()),
        };
        tracing::debug!(path = %path, pattern = ?pattern, rules = rules.len(), "Matched element");

        let nested_child = match self.nested_child(local_name) {
            Ok(child) => child,
            Err(source) => return Err(self.execution_error(path, pattern, source)),
        };

        self.stacks.frames.push(Frame {
            local_name: local_name.to_string(),
            namespace_uri: namespace_uri.map(String::from),
            path: path.clone(),
            pattern: pattern.clone(),
            rules: rules.clone(),
            nested_child,
            ..Frame::default()
        });

        let mut ctx = Context::new(self.host.as_ref(), &mut self.stacks);
        let mut result = Ok(());
        for &index in &rules {
            tracing::trace!(path = %path, rule = index, "begin");
            result = self.rules[index].begin(&mut ctx, attributes);
            if result.is_err() {
                break;
            }
        }
        result.map_err(|source| self.execution_error(path, pattern, source))
    }

    /// Append text to the innermost open element.
    ///
    /// # Errors
    /// Returns `IllegalState` outside of a document.
    pub fn characters(&mut self, text: &str) -> Result<()> {
        self.ensure_in_document("text")?;
        let Some(frame) = self.stacks.frames.last_mut() else {
            return Ok(());
        };
        match frame.capture.as_mut() {
            Some(capture) => {
                if capture.depth() == 1 {
                    frame.text.push_str(text);
                }
                capture.text(text);
            }
            None => frame.text.push_str(text),
        }
        Ok(())
    }

    /// Exit the innermost element: `body` then `end` hooks of its rules, in
    /// registration order, then pop everything the element pushed.
    ///
    /// # Errors
    /// Returns `Execution` when a hook fails, `IllegalState` without an open
    /// element or outside of a document.
    pub fn end_element(&mut self) -> Result<()> {
        self.ensure_in_document("element end")?;

        let Some(frame) = self.stacks.frames.last_mut() else {
            let err = match self.path.exit() {
                Err(err) => err,
                Ok(path) => DigesterError::IllegalState(format!(
                    "element <{path}> ended without engine state"
                )),
            };
            return Err(self.abort(err));
        };

        if let Some(capture) = frame.capture.as_mut() {
            if capture.depth() > 1 {
                capture.close();
                return Ok(());
            }
        }
        if let Some(capture) = frame.capture.take() {
            frame.captured = Some(capture.finish());
        }

        let rules = std::mem::take(&mut frame.rules);
        let text = std::mem::take(&mut frame.text);
        let path = frame.path.clone();
        let pattern = frame.pattern.clone();

        let mut ctx = Context::new(self.host.as_ref(), &mut self.stacks);
        let mut result = Ok(());
        for &index in &rules {
            tracing::trace!(path = %path, rule = index, "body");
            result = self.rules[index].body(&mut ctx, &text);
            if result.is_err() {
                break;
            }
        }
        if result.is_ok() {
            for &index in &rules {
                tracing::trace!(path = %path, rule = index, "end");
                result = self.rules[index].end(&mut ctx);
                if result.is_err() {
                    break;
                }
            }
        }
        if let Err(source) = result {
            return Err(self.execution_error(path, pattern, source));
        }

        let Some(frame) = self.stacks.frames.pop() else {
            return Err(self.abort(DigesterError::IllegalState(
                "element frame vanished while its rules ran".to_string(),
            )));
        };
        self.pop_owned(&frame);

        if let Some(child) = frame.nested_child {
            let scope = Arc::clone(&child.scope);
            if let Err(source) = scope.assign(self.host.as_ref(), child, &text) {
                return Err(self.execution_error(path, pattern, source));
            }
        }

        match self.path.exit() {
            Ok(_) => Ok(()),
            Err(err) => Err(self.abort(err)),
        }
    }

    /// End the document. The stacks must hold exactly the seeds again.
    ///
    /// # Errors
    /// Returns `IllegalState` when elements are still open or the stacks are
    /// unbalanced.
    pub fn end_document(&mut self) -> Result<()> {
        self.ensure_in_document("document end")?;

        let open = self.stacks.frames.len();
        if open > 0 {
            let path = self.path.current_path().to_string();
            return Err(self.abort(DigesterError::IllegalState(format!(
                "document ended with {open} open element(s), innermost <{path}>"
            ))));
        }
        let objects = self.stacks.objects.len();
        if objects != self.seeds.len() {
            return Err(self.abort(DigesterError::IllegalState(format!(
                "object stack holds {objects} object(s) at document end, expected {}",
                self.seeds.len()
            ))));
        }
        let params = self.stacks.params.len();
        if params > 0 {
            return Err(self.abort(DigesterError::IllegalState(format!(
                "parameter stack holds {params} frame(s) at document end"
            ))));
        }

        for rule in &mut self.rules {
            rule.finish();
        }
        self.state = EngineState::Done;
        tracing::debug!(root = ?self.stacks.root, "Document ended");
        Ok(())
    }

    /// Parse a whole XML document and return its root object.
    ///
    /// # Errors
    /// Returns `XmlParse` for malformed XML and any error raised while the
    /// events are processed.
    pub fn parse_str(&mut self, xml: &str) -> Result<Option<Value>> {
        crate::xml::parse_str(self, xml)?;
        Ok(self.root().cloned())
    }

    fn ensure_in_document(&self, event: &str) -> Result<()> {
        match self.state {
            EngineState::InDocument => Ok(()),
            state => Err(DigesterError::IllegalState(format!(
                "{event} received while the engine is {state}"
            ))),
        }
    }

    fn capture_mut(&mut self) -> Option<&mut crate::node::NodeBuilder> {
        self.stacks.frames.last_mut()?.capture.as_mut()
    }

    fn lookup(&mut self, path: &str, namespace_uri: Option<&str>) -> Option<RuleMatch> {
        let key = (path.to_string(), namespace_uri.map(String::from));
        if self.matches.len() >= MATCH_CACHE_LIMIT && !self.matches.contains_key(&key) {
            self.matches.clear();
        }
        let registry = &self.registry;
        let tracker = &self.path;
        self.matches
            .entry(key)
            .or_insert_with(|| registry.matches(&tracker.names(), path, namespace_uri))
            .clone()
    }

    /// Resolve the element against the nested-properties scope of its parent.
    fn nested_child(
        &self,
        local_name: &str,
    ) -> std::result::Result<Option<crate::rule::NestedChild>, ExecutionError> {
        let Some(scope) = self.stacks.frames.last().and_then(|f| f.nested.as_ref()) else {
            return Ok(None);
        };
        let depth = self.stacks.objects.len();
        let target = self
            .stacks
            .objects
            .last()
            .ok_or(ExecutionError::StackUnderflow { offset: 0, depth })?;
        scope.child(self.host.as_ref(), local_name, target)
    }

    fn pop_owned(&mut self, frame: &Frame) {
        for _ in 0..frame.objects {
            if let Some(object) = self.stacks.objects.pop() {
                tracing::debug!(path = %frame.path, object = %object, "Popped object");
            }
        }
        let params = self.stacks.params.len().saturating_sub(frame.params);
        self.stacks.params.truncate(params);
    }

    fn execution_error(
        &mut self,
        path: String,
        pattern: Option<String>,
        source: ExecutionError,
    ) -> DigesterError {
        self.abort(DigesterError::Execution {
            path,
            pattern,
            source,
        })
    }

    /// Fail the current document and discard its state.
    fn abort(&mut self, err: DigesterError) -> DigesterError {
        tracing::debug!(error = %err, path = %self.path.current_path(), "Document failed");
        self.state = EngineState::Failed;
        self.stacks.clear();
        self.path.clear();
        err
    }
}

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Digester")
            .field("state", &self.state)
            .field("path", &self.path.current_path())
            .field("depth", &self.stacks.objects.len())
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}
