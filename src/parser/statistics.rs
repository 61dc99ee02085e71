use crate::core::ErrorRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate counts over one parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStatistics {
    pub total: usize,
    /// Codes sorted by descending count, ties broken by first appearance
    pub by_code: Vec<(String, usize)>,
    pub by_file: BTreeMap<String, usize>,
    pub files_affected: usize,
}

impl ErrorStatistics {
    pub fn from_records(records: &[ErrorRecord]) -> Self {
        let mut by_code: Vec<(String, usize)> = Vec::new();
        let mut by_file: BTreeMap<String, usize> = BTreeMap::new();

        for record in records {
            match by_code.iter_mut().find(|(code, _)| *code == record.code) {
                Some((_, count)) => *count += 1,
                None => by_code.push((record.code.clone(), 1)),
            }
            *by_file.entry(record.file.clone()).or_default() += 1;
        }

        // Stable sort keeps discovery order among equal counts.
        by_code.sort_by(|a, b| b.1.cmp(&a.1));

        Self {
            total: records.len(),
            files_affected: by_file.len(),
            by_code,
            by_file,
        }
    }

    pub fn count_for(&self, code: &str) -> usize {
        self.by_code
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Short human description of an error code or rule.
pub fn describe_code(code: &str) -> &'static str {
    match code {
        "TS2307" => "Cannot find module",
        "TS7006" => "Parameter implicitly has 'any' type",
        "TS7031" => "Binding element implicitly has 'any' type",
        "TS2339" => "Property does not exist on type",
        "TS2551" => "Property does not exist (did you mean)",
        "TS2305" => "Module has no exported member",
        "TS2614" => "Module has no exported member (default export)",
        "TS2724" => "Module has no exported member (did you mean)",
        "TS2322" => "Type is not assignable",
        "TS2304" => "Cannot find name",
        "TS2345" => "Argument type is not assignable",
        "TS2571" => "Object is of type 'unknown'",
        "TS2532" => "Object is possibly 'undefined'",
        "TS2769" => "No overload matches this call",
        "TS2792" => "Cannot find module (moduleResolution)",
        "module_not_found" => "Bundler cannot resolve import",
        "dependency_missing" => "Package is not installed",
        "export_not_found" => "Imported name is not exported",
        "peer_dependency" => "Peer dependency mismatch",
        "version_conflict" => "Dependency version conflict",
        "invalid_config" => "Invalid build configuration",
        "syntax_error" => "Syntax error",
        "typescript_error" => "Type error during build",
        "webpack_error" => "Webpack error",
        "file_not_found" => "Referenced file does not exist",
        "prefer-const" => "Variable is never reassigned",
        "semi" => "Semicolon style",
        "quotes" => "Quote style",
        "no-var" => "Unexpected var",
        "eqeqeq" => "Expected strict equality",
        "no-unused-vars" => "Unused variable",
        "no-console" => "Unexpected console statement",
        "parse" => "Parsing error",
        _ => "Unknown error",
    }
}
