//! A schema-driven host that builds generic records.
//!
//! Types are declared up front with their properties and methods. Objects
//! are [`Record`] values: a type name plus a property map. This is what the
//! YAML rules file and the CLI use, and it doubles as a ready-made host for
//! tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use super::{Host, MethodCall, ObjectFactory};
use crate::error::HostError;
use crate::value::{ParamType, TypeName, Value};

/// Instance of a declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }
}

/// Behaviour of a declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodDef {
    /// Assign the single argument to a property.
    Set(String),
    /// Append the single argument to a list property.
    Append(String),
}

impl MethodDef {
    fn property(&self) -> &str {
        match self {
            Self::Set(property) | Self::Append(property) => property,
        }
    }
}

/// Declaration of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    /// Properties in declaration order; constructor arguments follow it.
    pub properties: Vec<(String, ParamType)>,
    pub methods: BTreeMap<String, MethodDef>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            methods: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn property(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.properties.push((name.into(), param_type));
        self
    }

    #[must_use]
    pub fn method_set(mut self, method: impl Into<String>, property: impl Into<String>) -> Self {
        self.methods
            .insert(method.into(), MethodDef::Set(property.into()));
        self
    }

    /// Declare a method appending to a list property; the property is
    /// declared as `any` if it was not declared yet.
    #[must_use]
    pub fn method_append(mut self, method: impl Into<String>, property: impl Into<String>) -> Self {
        let property = property.into();
        if self.property_type(&property).is_none() {
            self.properties.push((property.clone(), ParamType::Any));
        }
        self.methods.insert(method.into(), MethodDef::Append(property));
        self
    }

    fn property_type(&self, name: &str) -> Option<&ParamType> {
        self.properties
            .iter()
            .find(|(property, _)| property == name)
            .map(|(_, param_type)| param_type)
    }

    /// Resolve a method, falling back to the implicit `setXxx` setter of a
    /// declared property.
    fn method(&self, name: &str) -> Option<MethodDef> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        let property = name.strip_prefix("set")?;
        let mut chars = property.chars();
        let first = chars.next()?;
        let property: String = first.to_lowercase().chain(chars).collect();
        self.property_type(&property)
            .map(|_| MethodDef::Set(property))
    }
}

/// Host over declared [`TypeDef`]s.
#[derive(Default)]
pub struct RecordHost {
    types: HashMap<String, TypeDef>,
    factories: HashMap<String, Arc<dyn ObjectFactory>>,
}

impl RecordHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a type, replacing any earlier declaration with the same name.
    #[must_use]
    pub fn with_type(mut self, type_def: TypeDef) -> Self {
        self.add_type(type_def);
        self
    }

    pub fn add_type(&mut self, type_def: TypeDef) {
        self.types.insert(type_def.name.clone(), type_def);
    }

    /// Register a factory under a type name, for factory-create rules.
    #[must_use]
    pub fn with_factory(
        mut self,
        name: impl Into<String>,
        factory: Arc<dyn ObjectFactory>,
    ) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    #[must_use]
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    fn type_of(&self, object: &Value) -> Result<&TypeDef, HostError> {
        let type_name = object
            .with_object(|record: &Record| record.type_name.clone())
            .ok_or_else(|| HostError::Other(format!("{object} is not a record")))?;
        self.types
            .get(&type_name)
            .ok_or(HostError::UnknownType(type_name))
    }

    /// Convert a value to a declared property type.
    fn coerce(&self, name: &str, param_type: &ParamType, value: Value) -> Result<Value, HostError> {
        let value = param_type.convert(value)?;
        if let ParamType::Object(expected) = param_type {
            if let Some(actual) = value.with_object(|record: &Record| record.type_name.clone()) {
                if actual != expected.as_str() {
                    return Err(HostError::InvalidValue {
                        name: name.to_string(),
                        reason: format!("expected {expected}, got {actual}"),
                    });
                }
            }
        }
        Ok(value)
    }

    fn write(&self, object: &Value, property: &str, value: Value) -> Result<(), HostError> {
        object
            .with_object_mut(|record: &mut Record| {
                record.properties.insert(property.to_string(), value);
            })
            .ok_or_else(|| HostError::Other(format!("{object} is not a writable record")))
    }
}

impl Host for RecordHost {
    fn resolve_type(&self, name: &str) -> Option<TypeName> {
        (self.types.contains_key(name) || self.factories.contains_key(name))
            .then(|| TypeName::new(name))
    }

    fn construct(&self, type_name: &TypeName, args: &[Value]) -> Result<Value, HostError> {
        let type_def = self
            .types
            .get(type_name.as_str())
            .ok_or_else(|| HostError::UnknownType(type_name.to_string()))?;
        if args.len() > type_def.properties.len() {
            return Err(HostError::NoSuchMethod {
                type_name: type_name.to_string(),
                method: "new".to_string(),
                arity: args.len(),
            });
        }

        let mut record = Record::new(type_name.as_str());
        for ((property, param_type), arg) in type_def.properties.iter().zip(args) {
            let value = self.coerce(property, param_type, arg.clone())?;
            record.properties.insert(property.clone(), value);
        }
        Ok(Value::object(record))
    }

    fn has_property(&self, object: &Value, name: &str) -> bool {
        self.type_of(object)
            .is_ok_and(|type_def| type_def.property_type(name).is_some())
    }

    fn get_property(&self, object: &Value, name: &str) -> Result<Value, HostError> {
        let type_def = self.type_of(object)?;
        if type_def.property_type(name).is_none() {
            return Err(HostError::NoSuchProperty {
                type_name: type_def.name.clone(),
                property: name.to_string(),
            });
        }
        Ok(object
            .with_object(|record: &Record| record.get(name).cloned())
            .flatten()
            .unwrap_or_default())
    }

    fn set_property(&self, object: &Value, name: &str, value: Value) -> Result<(), HostError> {
        let type_def = self.type_of(object)?;
        let param_type = type_def
            .property_type(name)
            .ok_or_else(|| HostError::NoSuchProperty {
                type_name: type_def.name.clone(),
                property: name.to_string(),
            })?;
        let value = self.coerce(name, param_type, value)?;
        self.write(object, name, value)
    }

    fn invoke_method(&self, target: &Value, call: MethodCall<'_>) -> Result<Value, HostError> {
        let type_def = self.type_of(target)?;
        let no_such_method = || HostError::NoSuchMethod {
            type_name: type_def.name.clone(),
            method: call.name.to_string(),
            arity: call.args.len(),
        };

        let method = type_def.method(call.name).ok_or_else(no_such_method)?;
        let [arg] = <[Value; 1]>::try_from(call.args.clone()).map_err(|_| no_such_method())?;
        let property = method.property();
        let declared = type_def
            .property_type(property)
            .cloned()
            .unwrap_or(ParamType::Any);

        if call.exact_match && call.param_types.first() != Some(&declared) {
            return Err(no_such_method());
        }

        match &method {
            MethodDef::Set(_) => {
                let value = self.coerce(property, &declared, arg)?;
                self.write(target, property, value)?;
            }
            MethodDef::Append(_) => {
                let mut items = match self.get_property(target, property)? {
                    Value::List(items) => items,
                    Value::Null => Vec::new(),
                    other => vec![other],
                };
                items.push(arg);
                self.write(target, property, Value::List(items))?;
            }
        }
        Ok(Value::Null)
    }

    fn factory(&self, type_name: &TypeName) -> Result<Arc<dyn ObjectFactory>, HostError> {
        self.factories
            .get(type_name.as_str())
            .cloned()
            .ok_or_else(|| HostError::UnknownType(type_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Attributes;

    fn host() -> RecordHost {
        RecordHost::new()
            .with_type(
                TypeDef::new("Employee")
                    .property("employeeId", ParamType::Int)
                    .property("name", ParamType::String)
                    .method_append("addAddress", "addresses"),
            )
            .with_type(TypeDef::new("Address").property("city", ParamType::String))
    }

    fn call<'a>(name: &'a str, types: &'a [ParamType], arg: Value) -> MethodCall<'a> {
        MethodCall {
            name,
            param_types: types,
            args: vec![arg],
            exact_match: false,
        }
    }

    #[test]
    fn test_construct_and_set_property() {
        let host = host();
        let employee = host.construct(&TypeName::new("Employee"), &[]).unwrap();

        host.set_property(&employee, "employeeId", "7".into()).unwrap();
        assert_eq!(host.get_property(&employee, "employeeId").unwrap(), Value::Int(7));
        assert_eq!(host.get_property(&employee, "name").unwrap(), Value::Null);
        assert!(host.has_property(&employee, "name"));
        assert!(!host.has_property(&employee, "salary"));
    }

    #[test]
    fn test_constructor_args_follow_declaration_order() {
        let host = host();
        let employee = host
            .construct(&TypeName::new("Employee"), &["3".into(), "Ada".into()])
            .unwrap();
        assert_eq!(host.get_property(&employee, "employeeId").unwrap(), Value::Int(3));
        assert_eq!(host.get_property(&employee, "name").unwrap(), Value::from("Ada"));

        let err = host
            .construct(&TypeName::new("Address"), &["a".into(), "b".into()])
            .unwrap_err();
        assert!(matches!(err, HostError::NoSuchMethod { arity: 2, .. }));
    }

    #[test]
    fn test_unknown_property_fails() {
        let host = host();
        let employee = host.construct(&TypeName::new("Employee"), &[]).unwrap();
        let err = host.set_property(&employee, "salary", "1".into()).unwrap_err();
        assert_eq!(err.to_string(), "No property 'salary' on Employee");
    }

    #[test]
    fn test_append_method_collects_list() {
        let host = host();
        let employee = host.construct(&TypeName::new("Employee"), &[]).unwrap();
        let address = host.construct(&TypeName::new("Address"), &[]).unwrap();

        host.invoke_method(&employee, call("addAddress", &[ParamType::Any], address.clone()))
            .unwrap();
        host.invoke_method(&employee, call("addAddress", &[ParamType::Any], address.clone()))
            .unwrap();

        let Value::List(items) = host.get_property(&employee, "addresses").unwrap() else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 2);
        assert!(items[0].ptr_eq(&address));
    }

    #[test]
    fn test_implicit_setter() {
        let host = host();
        let employee = host.construct(&TypeName::new("Employee"), &[]).unwrap();
        host.invoke_method(&employee, call("setName", &[ParamType::String], "Ada".into()))
            .unwrap();
        assert_eq!(host.get_property(&employee, "name").unwrap(), Value::from("Ada"));
    }

    #[test]
    fn test_exact_match_requires_declared_type() {
        let host = host();
        let employee = host.construct(&TypeName::new("Employee"), &[]).unwrap();
        let mut exact = call("setEmployeeId", &[ParamType::String], "7".into());
        exact.exact_match = true;
        assert!(host.invoke_method(&employee, exact).is_err());

        let mut exact = call("setEmployeeId", &[ParamType::Int], Value::Int(7));
        exact.exact_match = true;
        assert!(host.invoke_method(&employee, exact).is_ok());
    }

    #[test]
    fn test_object_property_checks_record_type() {
        let host = RecordHost::new()
            .with_type(
                TypeDef::new("Employee")
                    .property("home", ParamType::Object(TypeName::new("Address"))),
            )
            .with_type(TypeDef::new("Address"))
            .with_type(TypeDef::new("Car"));
        let employee = host.construct(&TypeName::new("Employee"), &[]).unwrap();
        let car = host.construct(&TypeName::new("Car"), &[]).unwrap();

        let err = host.set_property(&employee, "home", car).unwrap_err();
        assert!(matches!(err, HostError::InvalidValue { .. }));
    }

    #[test]
    fn test_factory_lookup() {
        let factory: Arc<dyn ObjectFactory> = Arc::new(|host: &dyn Host, _: &Attributes| {
            host.construct(&TypeName::new("Address"), &[])
        });
        let host = host().with_factory("AddressFactory", factory);

        assert!(host.resolve_type("AddressFactory").is_some());
        assert!(host.factory(&TypeName::new("AddressFactory")).is_ok());
        assert!(host.factory(&TypeName::new("Employee")).is_err());
    }
}
