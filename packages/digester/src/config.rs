//! Configuration constants and validation functions for rule bindings.

use regex::Regex;
use std::sync::LazyLock;

/// Separator between pattern segments.
pub const PATTERN_SEPARATOR: char = '/';

/// Wildcard segment. Alone it matches every element; as the first segment it
/// matches a suffix at any depth, as the last segment any descendant.
pub const WILDCARD: &str = "*";

/// Header line of a configuration error report.
pub const REPORT_HEADER: &str = "Unable to create the digester, see the following errors:";

/// Distinct element paths an engine remembers the winning match for.
pub const MATCH_CACHE_LIMIT: usize = 4096;

/// Pattern the `tree` command binds its node-create rule to.
pub const DEFAULT_TREE_PATTERN: &str = WILDCARD;

/// Element local name: letter or underscore, then letters, digits, `_`, `-`, `.`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_.\-]*$").expect("valid regex"));

/// Method or property identifier.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*$").expect("valid regex"));

/// Type name: identifiers joined by `.` or `::`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TYPE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*(?:(?:\.|::)[\p{L}_][\p{L}\p{N}_]*)*$")
        .expect("valid regex")
});

/// Validate one segment of a pattern.
///
/// # Returns
/// * `Ok(())` if the segment is an element name or the wildcard
/// * `Err(message)` describing the problem otherwise
///
/// # Examples
/// ```
/// use digester::config::validate_pattern_segment;
///
/// assert!(validate_pattern_segment("employee").is_ok());
/// assert!(validate_pattern_segment("*").is_ok());
/// assert!(validate_pattern_segment("1st").is_err());
/// ```
pub fn validate_pattern_segment(segment: &str) -> Result<(), String> {
    if segment == WILDCARD || NAME_PATTERN.is_match(segment) {
        Ok(())
    } else {
        Err(format!("Invalid element name '{segment}' in pattern"))
    }
}

/// Validate a method name used by call-method and set-next style rules.
///
/// # Examples
/// ```
/// use digester::config::validate_method_name;
///
/// assert!(validate_method_name("addEmployee").is_ok());
/// assert!(validate_method_name("").is_err());
/// ```
pub fn validate_method_name(name: &str) -> Result<(), String> {
    validate_identifier("Method", name)
}

/// Validate a property name used by property-setting rules.
pub fn validate_property_name(name: &str) -> Result<(), String> {
    validate_identifier("Property", name)
}

/// Validate a type name before it is handed to the host for resolution.
pub fn validate_type_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Type name must not be empty".to_string());
    }
    if TYPE_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(format!("Invalid type name '{name}'"))
    }
}

fn validate_identifier(kind: &str, name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{kind} name must not be empty"));
    }
    if IDENTIFIER_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(format!("Invalid {} name '{name}'", kind.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pattern_segment() {
        assert!(validate_pattern_segment("employee").is_ok());
        assert!(validate_pattern_segment("li.nr").is_ok());
        assert!(validate_pattern_segment("meta-data").is_ok());
        assert!(validate_pattern_segment("_private").is_ok());
        assert!(validate_pattern_segment("*").is_ok());

        assert!(validate_pattern_segment("").is_err());
        assert!(validate_pattern_segment("a b").is_err());
        assert!(validate_pattern_segment("-dash").is_err());
        assert!(validate_pattern_segment("a*").is_err());
    }

    #[test]
    fn test_validate_method_name() {
        assert!(validate_method_name("setName").is_ok());
        assert!(validate_method_name("add_item2").is_ok());

        assert_eq!(
            validate_method_name("  "),
            Err("Method name must not be empty".to_string())
        );
        assert_eq!(
            validate_method_name("add-item"),
            Err("Invalid method name 'add-item'".to_string())
        );
    }

    #[test]
    fn test_validate_property_name() {
        assert!(validate_property_name("employeeId").is_ok());
        assert!(validate_property_name("").is_err());
    }

    #[test]
    fn test_validate_type_name() {
        assert!(validate_type_name("Employee").is_ok());
        assert!(validate_type_name("org.example.Employee").is_ok());
        assert!(validate_type_name("crate::model::Employee").is_ok());

        assert!(validate_type_name("").is_err());
        assert!(validate_type_name("org..Employee").is_err());
        assert!(validate_type_name("Employee<T>").is_err());
    }
}
