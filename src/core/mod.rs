//! Core records shared by every stage of the pipeline.
//!
//! An [`ErrorRecord`] is produced by the parsers, classified into an
//! [`ErrorClass`], and routed to the fixer registered for that class.

pub mod errors;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// The external tool whose output is being healed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// TypeScript compiler diagnostics (ATD)
    #[value(name = "typescript", alias = "ts")]
    TypeScript,
    /// Next.js / webpack / npm build output (ABD)
    Build,
    /// ESLint output (ALD)
    Lint,
}

impl Dialect {
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::TypeScript => "atd",
            Self::Build => "abd",
            Self::Lint => "ald",
        }
    }

    /// Session-local state directory, relative to the project root.
    pub fn session_dir_name(&self) -> String {
        format!(".{}", self.short_name())
    }

    pub fn default_command(&self) -> Vec<String> {
        let parts: &[&str] = match self {
            Self::TypeScript => &["npx", "tsc", "--noEmit", "--pretty", "false"],
            Self::Build => &["npm", "run", "build"],
            Self::Lint => &["npx", "eslint", ".", "--format", "json"],
        };
        parts.iter().map(|s| s.to_string()).collect()
    }

    /// Exit codes that mean "ran fine, maybe reported errors".
    pub fn expected_exit_codes(&self) -> &'static [i32] {
        match self {
            Self::TypeScript => &[0, 1, 2],
            Self::Build | Self::Lint => &[0, 1],
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeScript => "typescript",
            Self::Build => "build",
            Self::Lint => "lint",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// The entity an error is about, pulled out of the message text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    Module {
        specifier: String,
    },
    Parameter {
        name: String,
    },
    Property {
        name: String,
        on_type: Option<String>,
    },
    Export {
        name: String,
        module: String,
        suggestion: Option<String>,
    },
    Package {
        name: String,
        version: Option<String>,
        required_by: Option<String>,
    },
}

impl Subject {
    pub fn module(specifier: impl Into<String>) -> Self {
        Self::Module {
            specifier: specifier.into(),
        }
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter { name: name.into() }
    }

    /// The primary text of the subject, used in tables and prompt files.
    pub fn text(&self) -> &str {
        match self {
            Self::Module { specifier } => specifier,
            Self::Parameter { name }
            | Self::Property { name, .. }
            | Self::Export { name, .. }
            | Self::Package { name, .. } => name,
        }
    }
}

/// One diagnostic reported by the external tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub subject: Option<Subject>,
    pub fixable: bool,
}

impl ErrorRecord {
    pub fn new(
        file: impl Into<String>,
        line: usize,
        column: usize,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            code: code.into(),
            message: message.into(),
            severity: Severity::Error,
            subject: None,
            fixable: false,
        }
    }

    pub fn with_subject(mut self, subject: Option<Subject>) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            file: self.file.clone(),
            line: self.line,
            code: self.code.clone(),
            subject: self.subject.clone(),
        }
    }

    pub fn subject_text(&self) -> Option<&str> {
        self.subject.as_ref().map(Subject::text)
    }

    /// Absolute path of the reported file. Absolute paths pass through.
    pub fn path_in(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.file)
    }
}

/// Identity of a logical error: `(file, line, code, subject)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub file: String,
    pub line: usize,
    pub code: String,
    pub subject: Option<Subject>,
}

/// Drop later duplicates of the same logical error, keeping first-seen order.
pub fn dedupe_records(records: Vec<ErrorRecord>) -> Vec<ErrorRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.key()))
        .collect()
}

pub const LINT_FIXABLE_RULES: &[&str] = &["prefer-const", "semi", "quotes", "no-var", "eqeqeq"];

/// Which fixer family is responsible for an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    UnresolvedModule,
    ImplicitAnyParameter,
    MissingProperty,
    MissingExport,
    MissingDependency,
    DependencyVersionConflict,
    ConfigError,
    LintRule(String),
    Unclassified,
}

impl ErrorClass {
    pub fn of(dialect: Dialect, code: &str) -> Self {
        match (dialect, code) {
            (Dialect::TypeScript, "TS2307" | "TS2792") => Self::UnresolvedModule,
            (Dialect::TypeScript, "TS7006" | "TS7031") => Self::ImplicitAnyParameter,
            (Dialect::TypeScript, "TS2339" | "TS2551") => Self::MissingProperty,
            (Dialect::TypeScript, "TS2305" | "TS2614" | "TS2724") => Self::MissingExport,
            (Dialect::Build, "module_not_found") => Self::UnresolvedModule,
            (Dialect::Build, "export_not_found") => Self::MissingExport,
            (Dialect::Build, "dependency_missing") => Self::MissingDependency,
            (Dialect::Build, "peer_dependency" | "version_conflict") => {
                Self::DependencyVersionConflict
            }
            (Dialect::Build, "invalid_config") => Self::ConfigError,
            (Dialect::Lint, rule) if LINT_FIXABLE_RULES.contains(&rule) => {
                Self::LintRule(rule.to_string())
            }
            _ => Self::Unclassified,
        }
    }

    pub fn is_auto_fixable(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedModule => f.write_str("unresolved-module"),
            Self::ImplicitAnyParameter => f.write_str("implicit-any-parameter"),
            Self::MissingProperty => f.write_str("missing-property"),
            Self::MissingExport => f.write_str("missing-export"),
            Self::MissingDependency => f.write_str("missing-dependency"),
            Self::DependencyVersionConflict => f.write_str("dependency-version-conflict"),
            Self::ConfigError => f.write_str("config-error"),
            Self::LintRule(rule) => write!(f, "lint:{rule}"),
            Self::Unclassified => f.write_str("unclassified"),
        }
    }
}

/// Syntax-level diagnostics mean a fix broke the file rather than failed to help.
pub fn is_syntax_diagnostic(record: &ErrorRecord) -> bool {
    let code = record.code.as_str();
    (code.len() == 6 && code.starts_with("TS1") && code[2..].chars().all(|c| c.is_ascii_digit()))
        || code == "syntax_error"
        || record.message.starts_with("Parsing error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(file: &str, line: usize, code: &str, module: &str) -> ErrorRecord {
        ErrorRecord::new(file, line, 1, code, "msg").with_subject(Some(Subject::module(module)))
    }

    #[test]
    fn test_dedupe_keeps_first_seen_order() {
        let records = vec![
            record("a.ts", 1, "TS2307", "x"),
            record("b.ts", 2, "TS2307", "y"),
            record("a.ts", 1, "TS2307", "x"),
            record("a.ts", 1, "TS2307", "z"),
        ];
        let deduped = dedupe_records(records);
        let subjects: Vec<_> = deduped.iter().filter_map(|r| r.subject_text()).collect();
        assert_eq!(subjects, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_dedupe_ignores_column_and_message() {
        let mut second = record("a.ts", 1, "TS2307", "x");
        second.column = 40;
        second.message = "different".into();
        let deduped = dedupe_records(vec![record("a.ts", 1, "TS2307", "x"), second]);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn test_error_class_mapping() {
        assert_eq!(
            ErrorClass::of(Dialect::TypeScript, "TS2307"),
            ErrorClass::UnresolvedModule
        );
        assert_eq!(
            ErrorClass::of(Dialect::Build, "module_not_found"),
            ErrorClass::UnresolvedModule
        );
        assert_eq!(
            ErrorClass::of(Dialect::Lint, "semi"),
            ErrorClass::LintRule("semi".into())
        );
        assert_eq!(
            ErrorClass::of(Dialect::Lint, "no-unused-vars"),
            ErrorClass::Unclassified
        );
        assert_eq!(
            ErrorClass::of(Dialect::TypeScript, "TS2322"),
            ErrorClass::Unclassified
        );
    }

    #[test]
    fn test_syntax_diagnostic_detection() {
        assert!(is_syntax_diagnostic(&ErrorRecord::new("a.ts", 1, 1, "TS1005", "';' expected.")));
        assert!(!is_syntax_diagnostic(&ErrorRecord::new("a.ts", 1, 1, "TS2307", "x")));
        assert!(is_syntax_diagnostic(&ErrorRecord::new(
            "a.js",
            1,
            1,
            "parse",
            "Parsing error: Unexpected token"
        )));
    }

    #[test]
    fn test_session_dir_names() {
        assert_eq!(Dialect::TypeScript.session_dir_name(), ".atd");
        assert_eq!(Dialect::Build.session_dir_name(), ".abd");
        assert_eq!(Dialect::Lint.session_dir_name(), ".ald");
    }
}
