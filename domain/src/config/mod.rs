//! Configuration validation value objects
//!
//! Configuration problems are reported as structured issues rather than
//! hard failures: a bad engine section degrades one region's scripting,
//! it never stops the host.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The setting cannot work; the affected feature will be disabled.
    Error,
    /// The setting works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// `[Startup] script_engine` names an engine that is not registered.
    UnknownEngine { name: String },
    /// A value could not be parsed as the expected type.
    InvalidValue {
        section: String,
        key: String,
        expected: &'static str,
    },
    /// A capability flag that no API module consults.
    UnknownCapability { name: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }
}
