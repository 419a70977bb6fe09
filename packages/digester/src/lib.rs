//! Digester - Assemble object graphs from XML with pattern-bound rules.
//!
//! Rules are bound to element path patterns through a small DSL. A
//! [`Digester`] walks the document events, fires the rules whose pattern
//! matches the current element, and builds objects on a stack through a
//! [`Host`](host::Host) that knows how to construct and wire them.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use digester::binder::RulesBinder;
//! use digester::host::{RecordHost, TypeDef};
//! use digester::value::{ParamType, Value};
//!
//! let host = RecordHost::new()
//!     .with_type(TypeDef::new("Company").property("name", ParamType::String));
//! let rules = |binder: &mut RulesBinder| {
//!     binder.for_pattern("company").object_create().of_type("Company");
//!     binder.for_pattern("company").set_properties();
//! };
//!
//! let loader = digester::new_loader(Arc::new(host), &[&rules]);
//! let mut digester = loader.new_engine().unwrap();
//! let company = digester.parse_str(r#"<company name="Acme"/>"#).unwrap().unwrap();
//! assert_eq!(loader.host().get_property(&company, "name").unwrap(), Value::from("Acme"));
//! ```
//!
//! # Architecture
//!
//! - [`pattern`]: Pattern syntax and classification
//! - [`path`]: Current element path tracking
//! - [`registry`]: Pattern-indexed rule providers and match precedence
//! - [`rule`]: Rule trait and the per-document execution context
//! - [`rules`]: Built-in rule variants
//! - [`binder`]: Fluent binding DSL and rules modules
//! - [`diagnostics`]: Configuration error collection and reporting
//! - [`loader`]: Finalized registries shared between engines
//! - [`engine`]: Event dispatch and stack management
//! - [`host`]: Object model abstraction and a record-based host
//! - [`node`]: Generic node trees for captured elements
//! - [`value`]: Stack values, literals and conversions
//! - [`xml`]: Feeding parsed XML into an engine
//! - [`rules_file`]: Rules and types declared in YAML
//! - [`config`]: Constants and name validation
//! - [`error`]: Error types and Result alias
//! - [`cli`]: Command-line interface

pub mod binder;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod host;
pub mod loader;
pub mod node;
pub mod path;
pub mod pattern;
pub mod registry;
pub mod rule;
pub mod rules;
pub mod rules_file;
pub mod value;
pub mod xml;

// Re-export main entry points
pub use binder::{LinkedRuleBuilder, NamespacedModule, RulesBinder, RulesModule};
pub use engine::{Digester, EngineState, Event};
pub use loader::{new_loader, Loader};

// Re-export commonly used items
pub use diagnostics::CreationReport;
pub use error::{DigesterError, ExecutionError, HostError, Result};
pub use host::{Host, RecordHost, TypeDef};
pub use rule::{Context, Rule};
pub use rules_file::RulesFile;
pub use value::{Attributes, Literal, ParamType, Value};
