//! Error types for the digester.
//!
//! Uses the dual-error pattern: `DigesterError` for library consumers with
//! detailed error context, and specific error types for the two boundaries
//! inside the engine: `ExecutionError` raised by rule hooks and `HostError`
//! raised by the host object model.
//!
//! Configuration mistakes are never raised as they happen. They are collected
//! by the [`ErrorAggregator`](crate::diagnostics::ErrorAggregator) and surface
//! once, as [`DigesterError::Configuration`], when an engine is requested.

use thiserror::Error;

use crate::diagnostics::CreationReport;

/// Main error type for the digester library.
#[derive(Debug, Error)]
pub enum DigesterError {
    /// One or more modules produced configuration errors.
    #[error("{0}")]
    Configuration(CreationReport),

    /// A rule failed while processing the current document.
    #[error(
        "Error processing <{path}>{}: {source}",
        .pattern.as_ref().map(|p| format!(" (pattern '{p}')")).unwrap_or_default()
    )]
    Execution {
        path: String,
        pattern: Option<String>,
        #[source]
        source: ExecutionError,
    },

    /// The engine was driven into a state that well-behaved hosts never produce.
    #[error("Unrecoverable engine state (engine or host bug, not a document error): {0}")]
    IllegalState(String),

    /// XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl DigesterError {
    /// Whether this error signals an engine or host bug rather than a bad document.
    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }
}

/// Error raised by a rule hook while an element is being processed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// An attribute has no matching property on the target object.
    #[error("No property '{property}' on {target} for attribute '{attribute}'")]
    MissingProperty {
        attribute: String,
        property: String,
        target: String,
    },

    /// A child element has no matching property on the parent object.
    #[error("Unknown child element <{element}>: no property '{property}' on {target}")]
    UnknownChildElement {
        element: String,
        property: String,
        target: String,
    },

    /// A rule addressed an object that is not on the stack.
    #[error("Object stack underflow: no object at offset {offset} (stack depth {depth})")]
    StackUnderflow { offset: i32, depth: usize },

    /// A parameter was produced outside of any call-method rule.
    #[error("No enclosing call-method rule to receive parameter {index}")]
    NoParameterFrame { index: usize },

    /// A parameter index exceeds the enclosing call's parameter count.
    #[error("Parameter index {index} out of range for a call with {count} parameter(s)")]
    ParameterIndex { index: usize, count: usize },

    /// An override attribute names a type the host does not know.
    #[error("Attribute '{attribute}' names unknown type '{type_name}'")]
    UnknownType {
        attribute: String,
        type_name: String,
    },

    /// A required attribute is absent from the element.
    #[error("Missing required attribute '{0}'")]
    MissingAttribute(String),

    /// A node-create rule ended without a captured subtree.
    #[error("No node was captured for this element")]
    NoCapturedNode,

    /// A value could not be converted to the declared parameter type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A host capability failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Error raised by a [`Host`](crate::host::Host) capability.
#[derive(Debug, Error)]
pub enum HostError {
    /// The type is not known to the host.
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// The object has no such property.
    #[error("No property '{property}' on {type_name}")]
    NoSuchProperty { type_name: String, property: String },

    /// The object has no method with this name and arity.
    #[error("No method '{method}' on {type_name} accepting {arity} argument(s)")]
    NoSuchMethod {
        type_name: String,
        method: String,
        arity: usize,
    },

    /// The value is not acceptable for the named property or argument.
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    /// A value could not be converted to the declared type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Any other host failure.
    #[error("{0}")]
    Other(String),
}

/// A value could not be converted to a parameter type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cannot convert {value} to {target}")]
pub struct ConversionError {
    pub value: String,
    pub target: String,
}

/// Result type alias for digester operations.
pub type Result<T> = std::result::Result<T, DigesterError>;
