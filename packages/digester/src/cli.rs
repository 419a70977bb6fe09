//! Command-line interface for the digester.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use serde::Serialize;

use crate::binder::RulesBinder;
use crate::config::DEFAULT_TREE_PATTERN;
use crate::error::{DigesterError, Result};
use crate::host::RecordHost;
use crate::loader::{new_loader, Loader};
use crate::node::NodeKind;
use crate::path::PathTracker;
use crate::registry::PatternRegistry;
use crate::rule::Rule;
use crate::rules_file::RulesFile;
use crate::value::Value;
use crate::xml;

/// Digester - Assemble object graphs from XML with pattern-bound rules.
#[derive(Parser)]
#[command(name = "digester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a YAML rules file to a document and print the root object.
    Digest {
        /// XML document to digest
        input: PathBuf,

        /// YAML rules file
        #[arg(short, long)]
        rules: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },

    /// Capture a document as a generic node tree.
    Tree {
        /// XML document to capture
        input: PathBuf,

        /// Pattern of the element to capture (default: the root element)
        #[arg(short, long, default_value = DEFAULT_TREE_PATTERN)]
        pattern: String,

        /// Capture only the children of the matched element
        #[arg(long)]
        fragment: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },

    /// Show which of the given patterns wins for every element.
    Match {
        /// XML document to walk
        input: PathBuf,

        /// Patterns to match, in registration order
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Yaml,
    Json,
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Digest {
            input,
            rules,
            format,
        } => digest_command(&input, &rules, format),
        Commands::Tree {
            input,
            pattern,
            fragment,
            format,
        } => tree_command(&input, &pattern, fragment, format),
        Commands::Match { input, patterns } => match_command(&input, &patterns),
    }
}

/// Serialize a digested value.
///
/// # Errors
/// Returns `Yaml` or `Json` when the value cannot be serialized.
pub fn render(value: &impl Serialize, format: Format) -> Result<String> {
    match format {
        Format::Yaml => Ok(serde_yaml_ng::to_string(value)?),
        Format::Json => Ok(serde_json::to_string_pretty(value)? + "\n"),
    }
}

fn digest_command(input: &Path, rules: &Path, format: Format) -> Result<()> {
    let file = RulesFile::load(rules)?;
    let loader = new_loader(Arc::new(file.record_host()), &[&file]);
    eprintln!(
        "{} {} with {} rule(s)",
        style("Digesting").bold(),
        style(input.display()).cyan(),
        loader.registry().len()
    );

    let root = digest(&loader, input)?;
    print!("{}", render(&root.unwrap_or_default(), format)?);
    Ok(())
}

fn digest(loader: &Loader, input: &Path) -> Result<Option<Value>> {
    let mut digester = loader.new_engine()?;
    xml::parse_file(&mut digester, input)
}

fn tree_command(input: &Path, pattern: &str, fragment: bool, format: Format) -> Result<()> {
    let kind = if fragment {
        NodeKind::DocumentFragment
    } else {
        NodeKind::Element
    };
    let rules = |binder: &mut RulesBinder| {
        binder.for_pattern(pattern).node_create().of_kind(kind);
    };
    let loader = new_loader(Arc::new(RecordHost::new()), &[&rules]);

    let root = digest(&loader, input)?;
    if root.is_none() {
        eprintln!(
            "{} no element matched '{}'",
            style("Warning:").yellow().bold(),
            pattern
        );
    }
    print!("{}", render(&root.unwrap_or_default(), format)?);
    Ok(())
}

/// Placeholder rule for pattern listings.
struct Unbound;

impl Rule for Unbound {}

fn match_command(input: &Path, patterns: &[String]) -> Result<()> {
    let rules = |binder: &mut RulesBinder| {
        for pattern in patterns {
            binder.for_pattern(pattern).add_rule(|| Unbound);
        }
    };
    let loader = new_loader(Arc::new(RecordHost::new()), &[&rules]);
    if loader.has_errors() {
        return Err(DigesterError::Configuration(loader.report()));
    }

    let xml = std::fs::read_to_string(input)?;
    let document = roxmltree::Document::parse(&xml)?;
    let mut lines = Vec::new();
    walk(
        loader.registry(),
        &mut PathTracker::new(),
        document.root_element(),
        &mut lines,
    );

    println!("{}", style(input.display()).bold());
    for (path, pattern) in lines {
        match pattern {
            Some(pattern) => {
                println!("  {path} {} {}", style("->").dim(), style(pattern).green());
            }
            None => println!("  {path} {}", style("(no match)").dim()),
        }
    }
    Ok(())
}

fn walk(
    registry: &PatternRegistry,
    tracker: &mut PathTracker,
    node: roxmltree::Node<'_, '_>,
    lines: &mut Vec<(String, Option<String>)>,
) {
    let namespace_uri = xml::namespace_uri(node);
    let path = tracker.enter(xml::local_name(node), namespace_uri).to_string();
    let found = registry.matches(&tracker.names(), &path, namespace_uri);
    lines.push((path, found.map(|m| m.pattern)));

    for child in node.children().filter(roxmltree::Node::is_element) {
        walk(registry, tracker, child, lines);
    }
    // Every enter above is paired with this exit.
    let _ = tracker.exit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_digest() {
        let cli = Cli::try_parse_from([
            "digester", "digest", "doc.xml", "--rules", "rules.yaml", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Digest {
                input,
                rules,
                format,
            } => {
                assert_eq!(input, PathBuf::from("doc.xml"));
                assert_eq!(rules, PathBuf::from("rules.yaml"));
                assert_eq!(format, Format::Json);
            }
            _ => panic!("expected digest"),
        }
    }

    #[test]
    fn test_cli_parse_tree_defaults() {
        let cli = Cli::try_parse_from(["digester", "tree", "doc.xml"]).unwrap();
        match cli.command {
            Commands::Tree {
                pattern,
                fragment,
                format,
                ..
            } => {
                assert_eq!(pattern, "*");
                assert!(!fragment);
                assert_eq!(format, Format::Yaml);
            }
            _ => panic!("expected tree"),
        }
    }

    #[test]
    fn test_cli_match_requires_pattern() {
        assert!(Cli::try_parse_from(["digester", "match", "doc.xml"]).is_err());
    }

    #[test]
    fn test_walk_reports_winning_pattern() {
        let rules = |binder: &mut RulesBinder| {
            binder.for_pattern("*/name").add_rule(|| Unbound);
            binder.for_pattern("company/employee/name").add_rule(|| Unbound);
        };
        let loader = new_loader(Arc::new(RecordHost::new()), &[&rules]);
        let document = roxmltree::Document::parse(
            "<company><name/><employee><name/></employee></company>",
        )
        .unwrap();

        let mut lines = Vec::new();
        walk(
            loader.registry(),
            &mut PathTracker::new(),
            document.root_element(),
            &mut lines,
        );
        assert_eq!(
            lines,
            [
                ("company".to_string(), None),
                ("company/name".to_string(), Some("*/name".to_string())),
                ("company/employee".to_string(), None),
                (
                    "company/employee/name".to_string(),
                    Some("company/employee/name".to_string())
                ),
            ]
        );
    }

    #[test]
    fn test_render_json() {
        let text = render(&Value::from("x"), Format::Json).unwrap();
        assert_eq!(text, "\"x\"\n");
    }
}
