//! Object-model capabilities supplied by the embedding application.
//!
//! The engine never inspects objects itself. Construction, property access
//! and method dispatch all go through a [`Host`]. The crate ships one
//! implementation, [`RecordHost`], which builds schema-described records;
//! applications with their own types implement the trait directly.

pub mod record;

use std::sync::Arc;

pub use record::{MethodDef, Record, RecordHost, TypeDef};

use crate::error::HostError;
use crate::value::{Attributes, ParamType, TypeName, Value};

/// A method invocation assembled by a rule.
#[derive(Debug)]
pub struct MethodCall<'a> {
    pub name: &'a str,
    /// Declared parameter types, one per argument.
    pub param_types: &'a [ParamType],
    pub args: Vec<Value>,
    /// Require the declared types to match the method signature exactly
    /// instead of allowing conversions.
    pub exact_match: bool,
}

/// Host object model.
///
/// A host is shared by every engine created from one loader, possibly on
/// several threads, so it must be `Send + Sync`. Objects themselves are
/// per-document and never cross threads.
pub trait Host: Send + Sync {
    /// Resolve a type name at configuration time.
    fn resolve_type(&self, name: &str) -> Option<TypeName>;

    /// Construct a new object.
    fn construct(&self, type_name: &TypeName, args: &[Value]) -> Result<Value, HostError>;

    /// Whether the object has a writable property with this name.
    fn has_property(&self, object: &Value, name: &str) -> bool;

    fn get_property(&self, object: &Value, name: &str) -> Result<Value, HostError>;

    fn set_property(&self, object: &Value, name: &str, value: Value) -> Result<(), HostError>;

    fn invoke_method(&self, target: &Value, call: MethodCall<'_>) -> Result<Value, HostError>;

    /// Look up an object factory registered under a type name.
    fn factory(&self, type_name: &TypeName) -> Result<Arc<dyn ObjectFactory>, HostError> {
        Err(HostError::UnknownType(type_name.to_string()))
    }

    /// Human-readable description of an object for diagnostics.
    fn describe(&self, object: &Value) -> String {
        object.to_string()
    }
}

/// Pluggable constructor used by factory-create rules.
pub trait ObjectFactory: Send + Sync {
    fn create_object(&self, host: &dyn Host, attributes: &Attributes) -> Result<Value, HostError>;
}

impl<F> ObjectFactory for F
where
    F: Fn(&dyn Host, &Attributes) -> Result<Value, HostError> + Send + Sync,
{
    fn create_object(&self, host: &dyn Host, attributes: &Attributes) -> Result<Value, HostError> {
        self(host, attributes)
    }
}

/// Resolve a parameter type name: a built-in scalar name or a host type.
pub fn resolve_param_type(host: &dyn Host, name: &str) -> Option<ParamType> {
    ParamType::builtin(name).or_else(|| host.resolve_type(name).map(ParamType::Object))
}
