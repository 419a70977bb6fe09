//! Drives a [`Digester`] from XML documents.
//!
//! `roxmltree` parses the whole document; the tree is then replayed as
//! push-parser events in document order.

mod utils;

pub use utils::{attributes, local_name, namespace_uri};

use std::path::Path;

use roxmltree::{Document, Node};

use crate::engine::Digester;
use crate::error::Result;
use crate::value::Value;

/// Replay a parsed document as one start/end document cycle.
///
/// # Errors
/// Returns the first error raised by the engine.
pub fn feed(digester: &mut Digester, document: &Document<'_>) -> Result<()> {
    digester.start_document()?;
    visit(digester, document.root_element())?;
    digester.end_document()
}

fn visit(digester: &mut Digester, node: Node<'_, '_>) -> Result<()> {
    let attributes = attributes(node);
    digester.start_element(local_name(node), namespace_uri(node), &attributes)?;
    for child in node.children() {
        if child.is_element() {
            visit(digester, child)?;
        } else if let Some(text) = child.text().filter(|_| child.is_text()) {
            digester.characters(text)?;
        }
    }
    digester.end_element()
}

/// Parse `xml` and feed it to the engine.
///
/// # Errors
/// Returns `XmlParse` for malformed XML and any engine error.
pub fn parse_str(digester: &mut Digester, xml: &str) -> Result<()> {
    let document = Document::parse(xml)?;
    feed(digester, &document)
}

/// Read and parse a file, returning the root object.
///
/// # Errors
/// Returns `Io` when the file cannot be read, otherwise as [`parse_str`].
pub fn parse_file(digester: &mut Digester, path: &Path) -> Result<Option<Value>> {
    let xml = std::fs::read_to_string(path)?;
    digester.parse_str(&xml)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::binder::RulesBinder;
    use crate::error::DigesterError;
    use crate::host::RecordHost;
    use crate::loader::new_loader;

    fn digester(rules: &dyn Fn(&mut RulesBinder)) -> Digester {
        let rules = |binder: &mut RulesBinder| rules(binder);
        new_loader(Arc::new(RecordHost::new()), &[&rules])
            .new_engine()
            .unwrap()
    }

    #[test]
    fn test_malformed_xml() {
        let mut digester = digester(&|_| {});
        let err = parse_str(&mut digester, "<a><b></a>").unwrap_err();
        assert!(matches!(err, DigesterError::XmlParse(_)));
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        std::fs::write(&path, "<doc><raw>x</raw></doc>").unwrap();

        let mut digester = digester(&|binder| {
            binder.for_pattern("doc/raw").node_create();
        });
        let root = parse_file(&mut digester, &path).unwrap().unwrap();
        assert_eq!(root.as_node().unwrap().text_content(), "x");
    }

    #[test]
    fn test_missing_file() {
        let mut digester = digester(&|_| {});
        let err = parse_file(&mut digester, Path::new("/nonexistent/doc.xml")).unwrap_err();
        assert!(matches!(err, DigesterError::Io(_)));
    }
}
