//! Values exchanged between rules, the execution stacks and the host.
//!
//! Objects under construction are opaque to the engine: they are shared
//! `Rc<RefCell<dyn Any>>` handles that only the [`Host`](crate::host::Host)
//! knows how to inspect. Everything the engine itself produces (attribute
//! values, body text, captured nodes) is a plain variant.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConversionError;
use crate::host::record::Record;
use crate::node::Node;

/// Shared handle to a host object.
pub type ObjectRef = Rc<RefCell<dyn Any>>;

/// A value on the object stack, in a parameter slot, or passed to the host.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Object(ObjectRef),
    Node(Rc<Node>),
}

impl Value {
    /// Wrap a host object in a shared handle.
    pub fn object<T: Any>(object: T) -> Self {
        Self::Object(Rc::new(RefCell::new(object)))
    }

    /// Short label of the variant, used in diagnostics.
    #[must_use]
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Node(_) => "node",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Borrow the wrapped object as `T`.
    ///
    /// Returns `None` when the value is not an object, is a different type,
    /// or is currently mutably borrowed.
    pub fn with_object<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        match self {
            Self::Object(object) => {
                let object = object.try_borrow().ok()?;
                object.downcast_ref::<T>().map(f)
            }
            _ => None,
        }
    }

    /// Mutably borrow the wrapped object as `T`.
    pub fn with_object_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match self {
            Self::Object(object) => {
                let mut object = object.try_borrow_mut().ok()?;
                object.downcast_mut::<T>().map(f)
            }
            _ => None,
        }
    }

    /// Whether both values are the same object handle.
    #[must_use]
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Node(a), Self::Node(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Node(a), Self::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Self::Object(_) => match self.with_object(|record: &Record| format!("{record:?}")) {
                Some(record) => write!(f, "Object({record})"),
                None => f.write_str("Object(..)"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::List(items) => write!(f, "list of {}", items.len()),
            Self::Object(_) => match self.with_object(|record: &Record| record.type_name.clone()) {
                Some(type_name) => write!(f, "{type_name} object"),
                None => f.write_str("object"),
            },
            Self::Node(_) => f.write_str("node"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => items.serialize(serializer),
            Self::Node(node) => node.serialize(serializer),
            Self::Object(object) => {
                let object = object
                    .try_borrow()
                    .map_err(<S::Error as serde::ser::Error>::custom)?;
                match object.downcast_ref::<Record>() {
                    Some(record) => record.serialize(serializer),
                    None => serializer.serialize_str("<object>"),
                }
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A constant configured at binding time.
///
/// Unlike [`Value`] it is `Send + Sync`, so it can live inside the shared
/// pattern registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(x) => Value::Float(*x),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Name of a host type, as resolved by [`Host::resolve_type`](crate::host::Host::resolve_type).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared type of a method parameter, resolved once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    /// Passed through unchanged.
    Any,
    /// A host type; values are passed through and checked by the host.
    Object(TypeName),
}

impl ParamType {
    /// Parse a built-in type name. Host types are resolved separately.
    ///
    /// # Examples
    /// ```
    /// use digester::value::ParamType;
    ///
    /// assert_eq!(ParamType::builtin("int"), Some(ParamType::Int));
    /// assert_eq!(ParamType::builtin("Employee"), None);
    /// ```
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "int" | "integer" | "long" | "i64" => Some(Self::Int),
            "float" | "double" | "f64" => Some(Self::Float),
            "bool" | "boolean" => Some(Self::Bool),
            "any" | "object" => Some(Self::Any),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Any => "any",
            Self::Object(type_name) => type_name.as_str(),
        }
    }

    /// Convert a value to this type.
    ///
    /// Text is parsed into scalars; scalars are formatted into text. `Null`
    /// converts to `Null` for every type.
    pub fn convert(&self, value: Value) -> Result<Value, ConversionError> {
        let fail = |value: &Value| ConversionError {
            value: value.to_string(),
            target: self.name().to_string(),
        };

        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Any | Self::Object(_), value) => Ok(value),

            (Self::String, Value::String(s)) => Ok(Value::String(s)),
            (Self::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (Self::String, Value::Int(i)) => Ok(Value::String(i.to_string())),
            (Self::String, Value::Float(x)) => Ok(Value::String(x.to_string())),

            (Self::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (Self::Int, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| fail(&Value::String(s.clone()))),
            (Self::Int, Value::Float(x)) if x.fract() == 0.0 => Ok(Value::Int(x as i64)),

            (Self::Float, Value::Float(x)) => Ok(Value::Float(x)),
            (Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| fail(&Value::String(s.clone()))),

            (Self::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Self::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(fail(&Value::String(s))),
            },

            (_, value) => Err(fail(&value)),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One attribute of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub local_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_uri: Option<String>,
    pub value: String,
}

impl Attribute {
    pub fn new(local_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace_uri: None,
            value: value.into(),
        }
    }
}

/// Attributes of an element, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Attributes(Vec<Attribute>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build attributes from `(name, value)` pairs without namespaces.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(name, value)| Attribute::new(name, value))
                .collect(),
        )
    }

    pub fn push(&mut self, attribute: Attribute) {
        self.0.push(attribute);
    }

    /// Value of the first attribute with this local name.
    #[must_use]
    pub fn get(&self, local_name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|a| a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Attribute> for Attributes {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Counter(u32);

    #[test]
    fn test_object_downcast() {
        let value = Value::object(Counter(1));
        assert_eq!(value.with_object(|c: &Counter| c.0), Some(1));
        assert_eq!(value.with_object(|s: &String| s.len()), None);

        value.with_object_mut(|c: &mut Counter| c.0 += 1);
        assert_eq!(value.with_object(|c: &Counter| c.0), Some(2));
    }

    #[test]
    fn test_object_equality_is_identity() {
        let a = Value::object(Counter(1));
        let b = Value::object(Counter(1));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn test_convert_text_to_scalars() {
        assert_eq!(ParamType::Int.convert(" 7 ".into()), Ok(Value::Int(7)));
        assert_eq!(ParamType::Float.convert("2.5".into()), Ok(Value::Float(2.5)));
        assert_eq!(ParamType::Bool.convert("Yes".into()), Ok(Value::Bool(true)));
        assert_eq!(
            ParamType::String.convert(Value::Int(3)),
            Ok(Value::String("3".to_string()))
        );
        assert_eq!(ParamType::Int.convert(Value::Null), Ok(Value::Null));
    }

    #[test]
    fn test_convert_failure() {
        let err = ParamType::Int.convert("seven".into()).unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert 'seven' to int");

        let object = Value::object(Counter(0));
        assert!(ParamType::String.convert(object.clone()).is_err());
        assert!(ParamType::Any.convert(object).is_ok());
    }

    #[test]
    fn test_builtin_param_types() {
        assert_eq!(ParamType::builtin("String"), Some(ParamType::String));
        assert_eq!(ParamType::builtin("boolean"), Some(ParamType::Bool));
        assert_eq!(ParamType::builtin("Employee"), None);
    }

    #[test]
    fn test_attributes_lookup_keeps_order() {
        let attributes = Attributes::from_pairs([("a", "x"), ("b", "y")]);
        assert_eq!(attributes.get("b"), Some("y"));
        assert_eq!(attributes.get("c"), None);
        let names: Vec<_> = attributes.iter().map(|a| a.local_name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_literal_into_value() {
        assert_eq!(Value::from(&Literal::Int(3)), Value::Int(3));
        assert_eq!(Value::from(&Literal::from("x")), Value::String("x".to_string()));
    }
}
