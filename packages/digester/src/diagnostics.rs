//! Configuration-time diagnostics.
//!
//! Mistakes made while binding rules are never raised where they happen.
//! They are recorded here, with the source location of the offending call,
//! and reported together once the loader is asked for an engine:
//!
//! ```text
//! Unable to create the digester, see the following errors:
//!
//! 1) Unknown type 'Emplyee' (pattern 'company/employee')
//!   at my_app::rules::CompanyRules (src/rules.rs:12:17)
//!
//! 1 error
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::config::REPORT_HEADER;

/// Where a configuration call was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Name of the rules module being installed, if any.
    pub module: Option<String>,
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            module: None,
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    #[must_use]
    pub fn with_module(mut self, module: Option<String>) -> Self {
        self.module = module;
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{module} ({}:{}:{})", self.file, self.line, self.column),
            None => write!(f, "{}:{}:{}", self.file, self.line, self.column),
        }
    }
}

/// Shared error attached to a message.
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// One recorded configuration error.
#[derive(Debug, Clone)]
pub struct ErrorMessage {
    pub message: String,
    pub cause: Option<Cause>,
    pub source: Option<SourceLocation>,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            source: None,
        }
    }
}

/// Collects configuration errors for bulk reporting.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    errors: Vec<ErrorMessage>,
    modules: Vec<String>,
}

impl ErrorAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error at the caller's location.
    #[track_caller]
    pub fn add_error(&mut self, message: impl fmt::Display) {
        let location = self.locate(SourceLocation::caller());
        self.add_error_at(message, location);
    }

    /// Record an error at a known location.
    pub fn add_error_at(&mut self, message: impl fmt::Display, source: SourceLocation) {
        let message = message.to_string();
        tracing::debug!(error = %message, at = %source, "Recorded configuration error");
        self.errors.push(ErrorMessage {
            message,
            cause: None,
            source: Some(source),
        });
    }

    /// Record an error derived from a failure.
    #[track_caller]
    pub fn add_cause(&mut self, cause: impl StdError + Send + Sync + 'static) {
        let location = self.locate(SourceLocation::caller());
        self.errors.push(ErrorMessage {
            message: cause.to_string(),
            cause: Some(Arc::new(cause)),
            source: Some(location),
        });
    }

    /// Record a message together with the failure that caused it.
    pub fn add_error_with_cause(
        &mut self,
        message: impl fmt::Display,
        cause: Cause,
        source: SourceLocation,
    ) {
        self.errors.push(ErrorMessage {
            message: message.to_string(),
            cause: Some(cause),
            source: Some(source),
        });
    }

    /// Attribute following errors to a module.
    pub fn enter_module(&mut self, name: impl Into<String>) {
        self.modules.push(name.into());
    }

    pub fn leave_module(&mut self) {
        self.modules.pop();
    }

    /// Name of the module being installed.
    #[must_use]
    pub fn current_module(&self) -> Option<&str> {
        self.modules.last().map(String::as_str)
    }

    /// Attach the current module to a location that has none.
    #[must_use]
    pub fn locate(&self, location: SourceLocation) -> SourceLocation {
        if location.module.is_some() {
            return location;
        }
        let module = self.current_module().map(String::from);
        location.with_module(module)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ErrorMessage] {
        &self.errors
    }

    /// Snapshot of the errors recorded so far.
    #[must_use]
    pub fn report(&self) -> CreationReport {
        CreationReport {
            errors: self.errors.clone(),
        }
    }
}

/// Every configuration error of a loader, numbered from one.
#[derive(Debug, Clone)]
pub struct CreationReport {
    errors: Vec<ErrorMessage>,
}

impl CreationReport {
    #[must_use]
    pub fn errors(&self) -> &[ErrorMessage] {
        &self.errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for CreationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{REPORT_HEADER}")?;
        writeln!(f)?;

        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "{}) {}", i + 1, error.message)?;
            if let Some(source) = &error.source {
                writeln!(f, "  at {source}")?;
            }
            if let Some(cause) = &error.cause {
                let mut next: Option<&(dyn StdError + 'static)> = Some(&**cause);
                while let Some(err) = next {
                    let text = err.to_string();
                    if text != error.message {
                        writeln!(f, "  Caused by: {text}")?;
                    }
                    next = err.source();
                }
            }
            writeln!(f)?;
        }

        let count = self.errors.len();
        write!(f, "{count} error{}", if count == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;

    #[test]
    fn test_add_error_records_caller() {
        let mut errors = ErrorAggregator::new();
        errors.add_error("bad pattern");
        let line = line!() - 1;

        let recorded = &errors.errors()[0];
        let source = recorded.source.as_ref().unwrap();
        assert_eq!(recorded.message, "bad pattern");
        assert!(source.file.ends_with("diagnostics.rs"));
        assert_eq!(source.line, line);
        assert_eq!(source.module, None);
    }

    #[test]
    fn test_module_attribution() {
        let mut errors = ErrorAggregator::new();
        errors.enter_module("app::CompanyRules");
        errors.add_error("inside");
        errors.leave_module();
        errors.add_error("outside");

        assert_eq!(
            errors.errors()[0].source.as_ref().unwrap().module.as_deref(),
            Some("app::CompanyRules")
        );
        assert_eq!(errors.errors()[1].source.as_ref().unwrap().module, None);
    }

    #[test]
    fn test_report_format() {
        let mut errors = ErrorAggregator::new();
        errors.add_error("first");
        errors.add_error_with_cause(
            "second",
            Arc::new(HostError::UnknownType("Foo".to_string())),
            SourceLocation {
                module: Some("m".to_string()),
                file: "src/m.rs",
                line: 3,
                column: 5,
            },
        );

        let report = errors.report().to_string();
        assert!(report.starts_with(
            "Unable to create the digester, see the following errors:\n\n1) first\n  at "
        ));
        assert!(report.contains(
            "2) second\n  at m (src/m.rs:3:5)\n  Caused by: Unknown type 'Foo'\n"
        ));
        assert!(report.ends_with("\n2 errors"));
    }

    #[test]
    fn test_report_singular_footer() {
        let mut errors = ErrorAggregator::new();
        errors.add_cause(HostError::Other("boom".to_string()));
        let report = errors.report();
        assert_eq!(report.len(), 1);
        assert!(report.to_string().ends_with("\n1 error"));
        assert!(!report.to_string().contains("Caused by"));
    }
}
