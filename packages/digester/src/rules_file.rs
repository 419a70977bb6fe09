//! Declarative rules loaded from YAML.
//!
//! A rules file declares record types for a [`RecordHost`] and binds rules
//! to patterns:
//!
//! ```yaml
//! namespace: urn:example          # optional default for every binding
//! types:
//!   - name: Employee
//!     properties: { employeeId: int, name: string }
//!     methods: { addAddress: { append: addresses } }
//! rules:
//!   - pattern: company/employee
//!     object_create: { type: Employee }
//!     set_properties: { aliases: { id: employeeId } }
//! ```
//!
//! Rule keys of one binding are registered in the order they appear. The
//! file is a [`RulesModule`], so its mistakes are collected and reported
//! together with those of every other module.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value as YamlValue};

use crate::binder::{LinkedRuleBuilder, RulesBinder, RulesModule};
use crate::error::Result;
use crate::host::{RecordHost, TypeDef};
use crate::node::NodeKind;
use crate::value::{Literal, ParamType, TypeName};

/// A parsed rules document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub rules: Vec<Binding>,
    /// Where the document was loaded from, used as the module name.
    #[serde(skip)]
    origin: Option<String>,
}

/// A record type declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    pub name: String,
    /// Property name to type name, in constructor argument order.
    #[serde(default)]
    pub properties: Mapping,
    #[serde(default)]
    pub methods: BTreeMap<String, MethodSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodSpec {
    Set(String),
    Append(String),
}

/// Rules bound to one pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct Binding {
    pub pattern: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Rule name to options, in document order.
    #[serde(flatten)]
    pub rules: Mapping,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ObjectCreateSpec {
    #[serde(rename = "type")]
    type_name: Option<String>,
    type_attribute: Option<String>,
    args: Vec<Literal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FactoryCreateSpec {
    #[serde(rename = "type")]
    type_name: Option<String>,
    type_attribute: Option<String>,
    ignore_exceptions: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SetPropertiesSpec {
    aliases: BTreeMap<String, String>,
    ignore: Vec<String>,
    ignore_missing: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NestedPropertiesSpec {
    aliases: BTreeMap<String, String>,
    ignore: Vec<String>,
    trim: bool,
    allow_unknown: bool,
}

impl Default for NestedPropertiesSpec {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            ignore: Vec::new(),
            trim: true,
            allow_unknown: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BeanPropertySpec {
    name: Option<String>,
    name_attribute: Option<String>,
    value_attribute: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CallMethodSpec {
    method: String,
    #[serde(default)]
    params: i32,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    exact: bool,
    #[serde(default)]
    target_offset: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CallParamSpec {
    index: i32,
    attribute: Option<String>,
    stack: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectParamSpec {
    value: Literal,
    #[serde(default)]
    index: i32,
    #[serde(default)]
    when_attribute: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkSpec {
    method: String,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    exact: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NodeCreateSpec {
    kind: NodeKind,
}

impl RulesFile {
    /// Parse a rules document.
    ///
    /// # Errors
    /// Returns `Yaml` when the document does not have the rules file shape.
    /// Mistakes inside rule options are not errors here; they are reported
    /// when the rules are installed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Read and parse a rules file.
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be read, otherwise as [`from_yaml`](Self::from_yaml).
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        let mut file = Self::from_yaml(&yaml)?;
        file.origin = Some(path.display().to_string());
        Ok(file)
    }

    /// Host with every declared type.
    ///
    /// Property types that are neither built in nor declared become object
    /// types; installing the file reports them.
    #[must_use]
    pub fn record_host(&self) -> RecordHost {
        let mut host = RecordHost::new();
        for spec in &self.types {
            let mut type_def = TypeDef::new(&spec.name);
            for (property, type_name) in &spec.properties {
                let (Some(property), Some(type_name)) = (property.as_str(), type_name.as_str())
                else {
                    continue;
                };
                let param_type = ParamType::builtin(type_name)
                    .unwrap_or_else(|| ParamType::Object(TypeName::new(type_name)));
                type_def = type_def.property(property, param_type);
            }
            for (method, spec) in &spec.methods {
                type_def = match spec {
                    MethodSpec::Set(property) => type_def.method_set(method, property),
                    MethodSpec::Append(property) => type_def.method_append(method, property),
                };
            }
            host.add_type(type_def);
        }
        host
    }

    fn check_types(&self, binder: &mut RulesBinder) {
        for spec in &self.types {
            for (property, type_name) in &spec.properties {
                let (Some(property), Some(type_name)) = (property.as_str(), type_name.as_str())
                else {
                    binder.add_error(format!(
                        "Type '{}' has a property that is not a name-to-type pair",
                        spec.name
                    ));
                    continue;
                };
                let declared = self.types.iter().any(|t| t.name == type_name);
                if ParamType::builtin(type_name).is_none() && !declared {
                    binder.add_error(format!(
                        "Property '{property}' of type '{}' has unknown type '{type_name}'",
                        spec.name
                    ));
                }
            }
        }
    }
}

impl RulesModule for RulesFile {
    fn configure(&self, binder: &mut RulesBinder) {
        self.check_types(binder);
        for binding in &self.rules {
            binding.bind(binder, self.namespace.as_deref());
        }
    }

    fn name(&self) -> String {
        self.origin
            .clone()
            .unwrap_or_else(|| "rules file".to_string())
    }
}

impl Binding {
    fn bind(&self, binder: &mut RulesBinder, default_namespace: Option<&str>) {
        let mut mistakes = Vec::new();
        let mut linked = binder.for_pattern(&self.pattern);
        if let Some(namespace) = self.namespace.as_deref().or(default_namespace) {
            linked = linked.with_namespace_uri(namespace);
        }

        for (key, spec) in &self.rules {
            let Some(key) = key.as_str() else {
                mistakes.push(Mistake::new(format!("Rule names must be strings, got {key:?}")));
                continue;
            };
            if let Err(mistake) = apply(&mut linked, key, spec.clone()) {
                mistakes.push(mistake);
            }
        }

        for Mistake { message, cause } in mistakes {
            let message = format!("{message} (pattern '{}')", self.pattern);
            match cause {
                Some(cause) => binder.add_error_with_cause(message, cause),
                None => binder.add_error(message),
            }
        }
    }
}

/// A mistake in one rule of a binding.
#[derive(Debug)]
struct Mistake {
    message: String,
    cause: Option<serde_yaml_ng::Error>,
}

impl Mistake {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }
}

fn options<T: DeserializeOwned>(
    rule: &str,
    options: YamlValue,
) -> std::result::Result<T, Mistake> {
    let options = match options {
        YamlValue::Null => YamlValue::Mapping(Mapping::new()),
        other => other,
    };
    serde_yaml_ng::from_value(options).map_err(|e| Mistake {
        message: format!("Invalid options for '{rule}'"),
        cause: Some(e),
    })
}

fn apply(
    linked: &mut LinkedRuleBuilder<'_>,
    rule: &str,
    value: YamlValue,
) -> std::result::Result<(), Mistake> {
    match rule {
        "object_create" => {
            let spec: ObjectCreateSpec = options(rule, value)?;
            let builder = linked.object_create();
            if let Some(type_name) = spec.type_name {
                builder.of_type(type_name);
            }
            if let Some(attribute) = spec.type_attribute {
                builder.of_type_attribute(attribute);
            }
            builder.with_constructor_args(spec.args);
        }
        "factory_create" => {
            let spec: FactoryCreateSpec = options(rule, value)?;
            let builder = linked.factory_create();
            if let Some(type_name) = spec.type_name {
                builder.of_type(type_name);
            }
            if let Some(attribute) = spec.type_attribute {
                builder.of_type_attribute(attribute);
            }
            builder.ignore_create_exceptions(spec.ignore_exceptions);
        }
        "set_properties" => {
            let spec: SetPropertiesSpec = options(rule, value)?;
            let builder = linked.set_properties();
            for (attribute, property) in spec.aliases {
                builder.add_alias(attribute, property);
            }
            for attribute in spec.ignore {
                builder.ignore_attribute(attribute);
            }
            builder.ignore_missing_property(spec.ignore_missing);
        }
        "set_nested_properties" => {
            let spec: NestedPropertiesSpec = options(rule, value)?;
            let builder = linked.set_nested_properties();
            for (element, property) in spec.aliases {
                builder.add_alias(element, property);
            }
            for element in spec.ignore {
                builder.ignore_child(element);
            }
            builder
                .trim_data(spec.trim)
                .allow_unknown_child_elements(spec.allow_unknown);
        }
        "bean_property" => {
            let spec: BeanPropertySpec = options(rule, value)?;
            let builder = linked.set_bean_property();
            if let Some(name) = spec.name {
                builder.with_name(name);
            }
            if let Some(attribute) = spec.name_attribute {
                builder.name_from_attribute(attribute);
            }
            if let Some(attribute) = spec.value_attribute {
                builder.value_from_attribute(attribute);
            }
        }
        "call_method" => {
            let spec: CallMethodSpec = options(rule, value)?;
            let builder = linked.call_method(spec.method);
            builder
                .with_param_count(spec.params)
                .use_exact_match(spec.exact)
                .with_target_offset(spec.target_offset);
            if !spec.types.is_empty() {
                builder.with_param_types(spec.types);
            }
        }
        "call_param" => {
            let spec: CallParamSpec = options(rule, value)?;
            let builder = linked.call_param();
            builder.of_index(spec.index);
            if let Some(attribute) = spec.attribute {
                builder.from_attribute(attribute);
            }
            if let Some(offset) = spec.stack {
                builder.from_stack(offset);
            }
        }
        "object_param" => {
            let spec: ObjectParamSpec = options(rule, value)?;
            let builder = linked.object_param(spec.value);
            builder.of_index(spec.index);
            if let Some(attribute) = spec.when_attribute {
                builder.when_attribute_present(attribute);
            }
        }
        "set_next" | "set_top" | "set_root" => {
            let spec: LinkSpec = options(rule, value)?;
            let builder = match rule {
                "set_next" => linked.set_next(spec.method),
                "set_top" => linked.set_top(spec.method),
                _ => linked.set_root(spec.method),
            };
            if let Some(type_name) = spec.type_name {
                builder.with_param_type(type_name);
            }
            builder.use_exact_match(spec.exact);
        }
        "node_create" => {
            let spec: NodeCreateSpec = options(rule, value)?;
            linked.node_create().of_kind(spec.kind);
        }
        other => return Err(Mistake::new(format!("Unknown rule '{other}'"))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::host::{Host, Record};
    use crate::loader::new_loader;
    use crate::value::Value;

    const COMPANY: &str = r"
types:
  - name: Company
    properties: { name: string }
    methods: { addEmployee: { append: employees } }
  - name: Employee
    properties: { employeeId: int, name: string }
rules:
  - pattern: company
    object_create: { type: Company }
    set_properties:
  - pattern: company/employee
    object_create: { type: Employee }
    set_properties: { aliases: { id: employeeId } }
    set_next: { method: addEmployee }
  - pattern: company/employee/name
    bean_property:
";

    #[test]
    fn test_company_document() {
        let file = RulesFile::from_yaml(COMPANY).unwrap();
        let host = Arc::new(file.record_host());
        let loader = new_loader(host.clone(), &[&file]);
        let mut digester = loader.new_engine().unwrap();

        let root = digester
            .parse_str(
                r#"<company name="ACME"><employee id="7"><name>Ada</name></employee></company>"#,
            )
            .unwrap()
            .unwrap();
        let Value::List(employees) = host.get_property(&root, "employees").unwrap() else {
            panic!("expected employees");
        };
        let employee = employees[0].with_object(Record::clone).unwrap();
        assert_eq!(employee.get("employeeId"), Some(&Value::Int(7)));
        assert_eq!(employee.get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn test_rule_order_follows_document() {
        let file = RulesFile::from_yaml(COMPANY).unwrap();
        let mut binder = RulesBinder::new();
        binder.install(&file);
        let kinds: Vec<&str> = binder.registry().providers().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            [
                "object-create",
                "set-properties",
                "object-create",
                "set-properties",
                "set-next",
                "bean-property",
            ]
        );
    }

    #[test]
    fn test_mistakes_are_collected() {
        let file = RulesFile::from_yaml(
            r"
namespace: urn:doc
types:
  - name: Employee
    properties: { boss: Manager }
rules:
  - pattern: employee
    create_object: { type: Employee }
    call_method: { params: 1 }
    call_param: { index: 0 }
",
        )
        .unwrap();
        let mut binder = RulesBinder::new();
        binder.install(&file);

        let messages: Vec<String> = binder
            .errors()
            .errors()
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[0],
            "Property 'boss' of type 'Employee' has unknown type 'Manager'"
        );
        assert_eq!(messages[1], "Unknown rule 'create_object' (pattern 'employee')");
        assert_eq!(messages[2], "Invalid options for 'call_method' (pattern 'employee')");
        let cause = binder.errors().errors()[2].cause.as_ref().unwrap();
        assert!(cause.to_string().contains("missing field `method`"));

        let namespaces: Vec<Option<&str>> = binder
            .registry()
            .providers()
            .map(|p| p.target().namespace_uri.as_deref())
            .collect();
        assert_eq!(namespaces, [Some("urn:doc")]);
    }

    #[test]
    fn test_load_names_module_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        std::fs::write(&path, "rules:\n  - pattern: a\n    nope: {}\n").unwrap();

        let file = RulesFile::load(&path).unwrap();
        let mut binder = RulesBinder::new();
        binder.install(&file);
        let source = binder.errors().errors()[0].source.clone().unwrap();
        assert_eq!(source.module.as_deref(), Some(path.display().to_string().as_str()));
    }

    #[test]
    fn test_report_shows_option_cause() {
        let file = RulesFile::from_yaml(
            r"
rules:
  - pattern: employee
    call_param: { index: first }
",
        )
        .unwrap();
        let loader = new_loader(Arc::new(file.record_host()), &[&file]);

        let report = loader.report().to_string();
        assert!(report.contains("1) Invalid options for 'call_param' (pattern 'employee')\n"));
        let cause = report
            .lines()
            .find(|line| line.starts_with("  Caused by: "))
            .unwrap();
        assert!(cause.contains("invalid type"), "{cause}");
        assert!(report.ends_with("1 error"));
    }

    #[test]
    fn test_unknown_top_level_key() {
        assert!(RulesFile::from_yaml("rule: []").is_err());
    }
}
