//! Rule-matching patterns.
//!
//! A pattern is a `/`-separated list of element local names. Three wildcard
//! forms are recognised:
//!
//! | Form    | Kind        | Matches                                         |
//! |---------|-------------|-------------------------------------------------|
//! | `*`     | `Universal` | every element                                   |
//! | `*/a/b` | `Suffix`    | any path ending in `a/b`, at any depth          |
//! | `a/b/*` | `Prefix`    | any element strictly below `a/b`                |
//!
//! Any other use of `*` is rejected.

use std::fmt;

use crate::config::{validate_pattern_segment, PATTERN_SEPARATOR, WILDCARD};

/// How a pattern is compared against a live path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Exact,
    Suffix,
    Prefix,
    Universal,
}

impl PatternKind {
    /// Tie-breaker between wildcards with the same number of literal segments.
    fn rank(self) -> u8 {
        match self {
            Self::Exact => 3,
            Self::Suffix => 2,
            Self::Prefix => 1,
            Self::Universal => 0,
        }
    }
}

/// A normalised, immutable pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    text: String,
    kind: PatternKind,
    literals: Vec<String>,
}

impl Pattern {
    /// Parse and normalise a pattern.
    ///
    /// Leading and trailing separators are removed.
    ///
    /// # Errors
    /// Returns a message for empty patterns, empty segments, invalid names
    /// and misplaced wildcards.
    ///
    /// # Examples
    /// ```
    /// use digester::pattern::{Pattern, PatternKind};
    ///
    /// let pattern = Pattern::parse("company/employee/").unwrap();
    /// assert_eq!(pattern.as_str(), "company/employee");
    /// assert_eq!(pattern.kind(), PatternKind::Exact);
    ///
    /// assert_eq!(Pattern::parse("*/name").unwrap().kind(), PatternKind::Suffix);
    /// assert!(Pattern::parse("a//b").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, String> {
        let text = raw.trim().trim_matches(PATTERN_SEPARATOR);
        if text.is_empty() {
            return Err(format!("Pattern '{raw}' is empty"));
        }

        let segments: Vec<&str> = text.split(PATTERN_SEPARATOR).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(format!("Pattern '{raw}' contains an empty segment"));
        }
        for segment in &segments {
            validate_pattern_segment(segment).map_err(|e| format!("{e} '{raw}'"))?;
        }

        let last = segments.len() - 1;
        let wildcards: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == WILDCARD)
            .map(|(i, _)| i)
            .collect();

        let kind = match wildcards.as_slice() {
            [] => PatternKind::Exact,
            [0] if last == 0 => PatternKind::Universal,
            [0] => PatternKind::Suffix,
            [i] if *i == last => PatternKind::Prefix,
            _ => {
                return Err(format!(
                    "Pattern '{raw}' may only use '*' alone, as the first segment or as the last segment"
                ))
            }
        };

        let literals = segments
            .into_iter()
            .filter(|s| *s != WILDCARD)
            .map(String::from)
            .collect();

        Ok(Self {
            text: text.to_string(),
            kind,
            literals,
        })
    }

    /// Build an exact pattern from a path that is already known to be valid.
    pub(crate) fn exact(path: &str) -> Self {
        Self {
            text: path.to_string(),
            kind: PatternKind::Exact,
            literals: path.split(PATTERN_SEPARATOR).map(String::from).collect(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.kind != PatternKind::Exact
    }

    /// Whether the pattern matches a path given as its local names, outermost first.
    #[must_use]
    pub fn matches(&self, names: &[&str]) -> bool {
        let literals = self.literals.iter().map(String::as_str);
        match self.kind {
            PatternKind::Exact => {
                names.len() == self.literals.len() && literals.eq(names.iter().copied())
            }
            PatternKind::Suffix => {
                names.len() >= self.literals.len()
                    && literals.eq(names[names.len() - self.literals.len()..].iter().copied())
            }
            PatternKind::Prefix => {
                names.len() > self.literals.len()
                    && literals.eq(names[..self.literals.len()].iter().copied())
            }
            PatternKind::Universal => !names.is_empty(),
        }
    }

    /// Specificity used to choose among matching wildcards; larger wins.
    #[must_use]
    pub fn precedence(&self) -> (usize, u8) {
        (self.literals.len(), self.kind.rank())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises_separators() {
        assert_eq!(Pattern::parse("a/b/").unwrap().as_str(), "a/b");
        assert_eq!(Pattern::parse("/a/b").unwrap().as_str(), "a/b");
        assert_eq!(Pattern::parse(" a ").unwrap().as_str(), "a");
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!(Pattern::parse("a/b").unwrap().kind(), PatternKind::Exact);
        assert_eq!(Pattern::parse("*").unwrap().kind(), PatternKind::Universal);
        assert_eq!(Pattern::parse("*/b").unwrap().kind(), PatternKind::Suffix);
        assert_eq!(Pattern::parse("a/*").unwrap().kind(), PatternKind::Prefix);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Pattern::parse("").is_err());
        assert!(Pattern::parse("/").is_err());
        assert!(Pattern::parse("a//b").is_err());
        assert!(Pattern::parse("a/*/b").is_err());
        assert!(Pattern::parse("*/a/*").is_err());
        assert!(Pattern::parse("a/1b").is_err());
    }

    #[test]
    fn test_exact_matching() {
        let pattern = Pattern::parse("company/employee").unwrap();
        assert!(pattern.matches(&["company", "employee"]));
        assert!(!pattern.matches(&["company"]));
        assert!(!pattern.matches(&["x", "company", "employee"]));
    }

    #[test]
    fn test_suffix_matching() {
        let pattern = Pattern::parse("*/employee/name").unwrap();
        assert!(pattern.matches(&["employee", "name"]));
        assert!(pattern.matches(&["company", "dept", "employee", "name"]));
        assert!(!pattern.matches(&["name"]));
        assert!(!pattern.matches(&["employee", "name", "first"]));
    }

    #[test]
    fn test_prefix_matching_is_strictly_below() {
        let pattern = Pattern::parse("company/*").unwrap();
        assert!(pattern.matches(&["company", "employee"]));
        assert!(pattern.matches(&["company", "employee", "name"]));
        assert!(!pattern.matches(&["company"]));
        assert!(!pattern.matches(&["other", "employee"]));
    }

    #[test]
    fn test_precedence_orders_wildcards() {
        let suffix = Pattern::parse("*/b").unwrap();
        let prefix = Pattern::parse("a/*").unwrap();
        let long_prefix = Pattern::parse("a/b/*").unwrap();
        let universal = Pattern::parse("*").unwrap();

        assert!(suffix.precedence() > prefix.precedence());
        assert!(long_prefix.precedence() > suffix.precedence());
        assert!(prefix.precedence() > universal.precedence());
    }
}
