//! Schema Validation Reports
//!
//! The per-module schema pass does not stop at the first problem: every
//! module adds what it finds to one [`ValidationReport`], and the build
//! aborts afterwards if the report holds any error. Warnings and info
//! entries survive into the compiled program so callers can show them.

use std::fmt;

use espgen_core::PlacementError;
use serde::Serialize;

use crate::path::ConfigPath;
use crate::types::Platform;

/// Validation report containing all issues found
#[derive(Debug, Default, Clone, Serialize)]
pub struct ValidationReport {
    /// Validation errors (must be fixed)
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (should be reviewed)
    pub warnings: Vec<ValidationIssue>,

    /// Informational messages
    pub info: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    /// Add a warning
    pub fn add_warning(&mut self, issue: ValidationIssue) {
        log::warn!("{issue}");
        self.warnings.push(issue);
    }

    /// Add info
    pub fn add_info(&mut self, issue: ValidationIssue) {
        self.info.push(issue);
    }

    /// Get total issue count
    pub fn total_issues(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.info.len()
    }

    /// One line per error, in the order they were found
    pub fn summary(&self) -> String {
        match self.errors.len() {
            0 => "no errors".to_string(),
            1 => self.errors[0].to_string(),
            n => {
                let lines: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
                format!("{n} errors:\n  {}", lines.join("\n  "))
            }
        }
    }

    /// Errors of the given type
    pub fn errors_of(&self, issue_type: IssueType) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(move |issue| issue.issue_type == issue_type)
    }
}

/// Individual validation issue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Type of issue
    pub issue_type: IssueType,

    /// Key that caused the issue
    pub path: ConfigPath,

    /// Human-readable message
    pub message: String,

    /// Issue severity
    pub severity: Severity,
}

impl ValidationIssue {
    /// Error-severity issue
    pub fn error(issue_type: IssueType, path: ConfigPath, message: impl Into<String>) -> Self {
        Self { issue_type, path, message: message.into(), severity: Severity::Error }
    }

    /// Warning-severity issue
    pub fn warning(issue_type: IssueType, path: ConfigPath, message: impl Into<String>) -> Self {
        Self { issue_type, path, message: message.into(), severity: Severity::Warning }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Types of validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueType {
    /// Key not known to the module
    UnknownKey,

    /// Key that used to exist and was removed
    RemovedKey,

    /// Required field is missing
    MissingField,

    /// Number outside its accepted range
    OutOfRange,

    /// Value of the right type but not acceptable
    InvalidValue,

    /// Two options cannot be combined
    Conflict,

    /// Option not available on the target platform
    PlatformMismatch,

    /// ID reference that does not resolve
    Reference,

    /// Same name or ID used twice
    Duplicate,

    /// Forced-placement check failed
    Placement,

    /// Default behaviour that may change
    Deprecation,
}

/// Issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Informational only
    Info,

    /// Should be reviewed
    Warning,

    /// Must be fixed
    Error,
}

/// Convert a placement failure into a report entry at `path`
pub fn from_placement_error(path: &ConfigPath, error: &PlacementError) -> ValidationIssue {
    ValidationIssue::error(
        IssueType::Placement,
        path.key(error.key()),
        format!("{}: {}", error.kind(), error),
    )
}

/// Per-module schema pass context
pub struct SchemaContext<'a> {
    /// Target platform
    pub platform: Platform,

    /// Device name from the `esphome` block
    pub device_name: &'a str,

    report: &'a mut ValidationReport,
}

impl<'a> SchemaContext<'a> {
    /// Context writing into `report`
    pub fn new(platform: Platform, device_name: &'a str, report: &'a mut ValidationReport) -> Self {
        Self { platform, device_name, report }
    }

    /// Record an error
    pub fn error(&mut self, issue_type: IssueType, path: ConfigPath, message: impl Into<String>) {
        self.report.add_error(ValidationIssue::error(issue_type, path, message));
    }

    /// Record a warning
    pub fn warning(&mut self, issue_type: IssueType, path: ConfigPath, message: impl Into<String>) {
        self.report.add_warning(ValidationIssue::warning(issue_type, path, message));
    }

    /// Record an informational note
    pub fn info(&mut self, path: ConfigPath, message: impl Into<String>) {
        self.report.add_info(ValidationIssue {
            issue_type: IssueType::InvalidValue,
            path,
            message: message.into(),
            severity: Severity::Info,
        });
    }

    /// Range check, recording an error when `value` is outside `[min, max]`
    pub fn check_range<T>(&mut self, path: ConfigPath, value: T, min: T, max: T) -> bool
    where
        T: PartialOrd + fmt::Display,
    {
        if value < min || value > max {
            self.error(
                IssueType::OutOfRange,
                path,
                format!("Value {value} outside range [{min}, {max}]"),
            );
            return false;
        }
        true
    }

    /// Length check for strings and lists
    pub fn check_len(&mut self, path: ConfigPath, len: usize, min: usize, max: usize, what: &str) -> bool {
        if len < min {
            self.error(IssueType::OutOfRange, path, format!("{what} must be at least {min} long"));
            return false;
        }
        if len > max {
            self.error(IssueType::OutOfRange, path, format!("{what} must be at most {max} long"));
            return false;
        }
        true
    }

    /// Number of errors recorded so far
    pub fn error_count(&self) -> usize {
        self.report.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts() {
        let mut report = ValidationReport::new();
        assert!(report.is_valid());
        report.add_error(ValidationIssue::error(
            IssueType::MissingField,
            ConfigPath::section("wifi"),
            "missing",
        ));
        report.add_warning(ValidationIssue::warning(
            IssueType::Deprecation,
            ConfigPath::section("wifi").key("min_auth_mode"),
            "defaulting",
        ));
        assert!(!report.is_valid());
        assert_eq!(report.total_issues(), 2);
        assert_eq!(report.summary(), "wifi: missing");
    }

    #[test]
    fn range_check_records() {
        let mut report = ValidationReport::new();
        let mut ctx = SchemaContext::new(Platform::Esp8266, "dev", &mut report);
        assert!(ctx.check_range(ConfigPath::section("a"), 5, 1, 14));
        assert!(!ctx.check_range(ConfigPath::section("a"), 15, 1, 14));
        assert_eq!(ctx.error_count(), 1);
        assert_eq!(report.errors[0].issue_type, IssueType::OutOfRange);
    }

    #[test]
    fn placement_issue_points_at_key() {
        let issue = from_placement_error(
            &ConfigPath::section("switch").index(0),
            &PlacementError::MissingGlobalAddr { forced_addr: 3 },
        );
        assert_eq!(issue.path.to_string(), "switch[0].global_addr");
        assert_eq!(issue.message, "ForcedAddrRequiresGlobalAddr: Forced_addr requires global_addr");
    }
}
