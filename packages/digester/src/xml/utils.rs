//! Conversions from `roxmltree` nodes to engine event data.

use roxmltree::Node;

use crate::value::{Attribute, Attributes};

/// Local name of an element, without namespace prefix.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use digester::xml::local_name;
///
/// let doc = Document::parse(r#"<c:company xmlns:c="urn:c"/>"#).unwrap();
/// assert_eq!(local_name(doc.root_element()), "company");
/// ```
pub fn local_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Namespace URI of an element; `None` when it has none.
pub fn namespace_uri<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.tag_name().namespace().filter(|ns| !ns.is_empty())
}

/// Attributes of an element in document order, namespace declarations excluded.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use digester::xml::attributes;
///
/// let doc = Document::parse(r#"<employee xmlns:x="urn:x" id="7" x:role="dev"/>"#).unwrap();
/// let attributes = attributes(doc.root_element());
/// assert_eq!(attributes.len(), 2);
/// assert_eq!(attributes.get("role"), Some("dev"));
/// ```
pub fn attributes(node: Node<'_, '_>) -> Attributes {
    node.attributes()
        .map(|attribute| Attribute {
            local_name: attribute.name().to_string(),
            namespace_uri: attribute.namespace().map(String::from),
            value: attribute.value().to_string(),
        })
        .collect()
}
