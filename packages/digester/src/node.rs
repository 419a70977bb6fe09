//! Generic tree nodes captured by node-create rules.
//!
//! A node-create rule materialises an element and its whole subtree as a
//! [`Node`] instead of delegating to property and method rules. The engine
//! feeds the subtree's events into a [`NodeBuilder`] while the capture is
//! active; no other rules fire for the captured descendants.

use serde::{Deserialize, Serialize};

use crate::value::Attributes;

/// Shape of the captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The matched element itself, with its attributes and children.
    #[default]
    Element,
    /// Only the children of the matched element.
    DocumentFragment,
}

/// A captured element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementNode {
    pub local_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_uri: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeContent>,
}

impl ElementNode {
    pub fn new(local_name: impl Into<String>, namespace_uri: Option<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace_uri,
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Child elements, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(|child| match child {
            NodeContent::Element(element) => Some(element),
            NodeContent::Text(_) => None,
        })
    }

    /// First child element with the given local name.
    #[must_use]
    pub fn find_child(&self, local_name: &str) -> Option<&ElementNode> {
        self.child_elements().find(|e| e.local_name == local_name)
    }

    /// Concatenated text of this element and all descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }
}

/// Content of an element: a nested element or a run of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeContent {
    Element(ElementNode),
    Text(String),
}

/// A captured subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Fragment(Vec<NodeContent>),
}

impl Node {
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Element(_) => NodeKind::Element,
            Self::Fragment(_) => NodeKind::DocumentFragment,
        }
    }

    /// Top-level content: the element's children or the fragment's items.
    #[must_use]
    pub fn children(&self) -> &[NodeContent] {
        match self {
            Self::Element(element) => &element.children,
            Self::Fragment(children) => children,
        }
    }

    #[must_use]
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(self.children(), &mut text);
        text
    }
}

fn collect_text(children: &[NodeContent], out: &mut String) {
    for child in children {
        match child {
            NodeContent::Text(text) => out.push_str(text),
            NodeContent::Element(element) => collect_text(&element.children, out),
        }
    }
}

/// Incremental builder fed by the engine while a capture is active.
///
/// The first open element is the capture root. Whitespace-only text runs
/// are dropped.
#[derive(Debug)]
pub(crate) struct NodeBuilder {
    kind: NodeKind,
    open: Vec<ElementNode>,
}

impl NodeBuilder {
    pub(crate) fn new(
        kind: NodeKind,
        local_name: &str,
        namespace_uri: Option<&str>,
        attributes: &Attributes,
    ) -> Self {
        let mut root = ElementNode::new(local_name, namespace_uri.map(String::from));
        root.attributes = attributes.clone();
        Self {
            kind,
            open: vec![root],
        }
    }

    /// Number of open elements, the capture root included.
    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }

    pub(crate) fn open(
        &mut self,
        local_name: &str,
        namespace_uri: Option<&str>,
        attributes: &Attributes,
    ) {
        let mut element = ElementNode::new(local_name, namespace_uri.map(String::from));
        element.attributes = attributes.clone();
        self.open.push(element);
    }

    pub(crate) fn text(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let Some(current) = self.open.last_mut() else {
            return;
        };
        match current.children.last_mut() {
            Some(NodeContent::Text(existing)) => existing.push_str(text),
            _ => current.children.push(NodeContent::Text(text.to_string())),
        }
    }

    /// Close the innermost element below the capture root.
    pub(crate) fn close(&mut self) {
        if self.open.len() < 2 {
            return;
        }
        if let Some(element) = self.open.pop() {
            if let Some(parent) = self.open.last_mut() {
                parent.children.push(NodeContent::Element(element));
            }
        }
    }

    pub(crate) fn finish(mut self) -> Node {
        while self.open.len() > 1 {
            self.close();
        }
        let root = self
            .open
            .pop()
            .unwrap_or_else(|| ElementNode::new(String::new(), None));
        match self.kind {
            NodeKind::Element => Node::Element(root),
            NodeKind::DocumentFragment => Node::Fragment(root.children),
        }
    }
}
