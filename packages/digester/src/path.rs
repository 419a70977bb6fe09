//! Path tracker for the element currently being processed.

use crate::config::PATTERN_SEPARATOR;
use crate::error::{DigesterError, Result};

/// One level of the element path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub local_name: String,
    pub namespace_uri: Option<String>,
}

/// Stack of open elements, kept in sync with the enter/exit events.
///
/// The rendered path (`company/employee/name`) is maintained incrementally
/// so that lookups never rebuild it.
#[derive(Debug, Default)]
pub struct PathTracker {
    segments: Vec<PathSegment>,
    path: String,
    /// Length of `path` before each segment was appended.
    offsets: Vec<usize>,
}

impl PathTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a segment and return the new path.
    pub fn enter(&mut self, local_name: &str, namespace_uri: Option<&str>) -> &str {
        self.offsets.push(self.path.len());
        if !self.segments.is_empty() {
            self.path.push(PATTERN_SEPARATOR);
        }
        self.path.push_str(local_name);
        self.segments.push(PathSegment {
            local_name: local_name.to_string(),
            namespace_uri: namespace_uri.map(String::from),
        });
        &self.path
    }

    /// Pop a segment and return the path as it was before the pop.
    ///
    /// # Errors
    /// Returns `IllegalState` when called more often than [`enter`](Self::enter).
    pub fn exit(&mut self) -> Result<String> {
        let Some(offset) = self.offsets.pop() else {
            return Err(DigesterError::IllegalState(
                "element exit without a matching enter".to_string(),
            ));
        };
        let before = self.path.clone();
        self.path.truncate(offset);
        self.segments.pop();
        Ok(before)
    }

    /// The current path, empty outside of any element.
    #[must_use]
    pub fn current_path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Local names of the open elements, outermost first.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.local_name.as_str()).collect()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.offsets.clear();
        self.path.clear();
    }
}
