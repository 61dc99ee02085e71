//! Next.js / webpack / npm build output.
//!
//! Bundler output is looser than compiler output: the offending file is
//! often printed on its own line before the error, and npm spreads one
//! resolution failure over several `npm ERR!` lines.

use super::OutputParser;
use crate::core::{dedupe_records, ErrorRecord, Severity, Subject};
use once_cell::sync::Lazy;
use regex::Regex;

static FILE_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<file>\.{0,2}/?[\w@$./\[\]()-]+\.(?:tsx?|jsx?|mjs|cjs|css|scss))(?::(?P<line>\d+):(?P<column>\d+))?$")
        .unwrap()
});

static MODULE_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Module not found: (?:Error: )?Can't resolve '(?P<module>[^']+)'(?: in '(?P<dir>[^']+)')?")
        .unwrap()
});

static DEPENDENCY_MISSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Cannot find module '(?P<module>[^']+)'").unwrap());

static EXPORT_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export '(?P<name>[^']+)' \(.*\) was not found in '(?P<module>[^']+)'").unwrap()
});

static ATTEMPTED_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Attempted import error: '(?P<name>[^']+)' is not exported from '(?P<module>[^']+)'")
        .unwrap()
});

static PEER_DEP_MISSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"peer dep.*?:\s*(?P<name>\S+?)@(?P<version>[^,\s]+).*?required by\s*(?P<parent>\S+)")
        .unwrap()
});

static PEER_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"peer (?P<name>@?[^@\s]+)@"?(?P<version>[^"\s]+)"? from (?P<parent>\S+)"#).unwrap()
});

static REQUIRES_PEER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<parent>\S+) requires a peer of (?P<name>@?[^@\s]+)@(?P<version>\S+)").unwrap()
});

static VERSION_CONFLICT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<name>@?[^@\s]+)@(?P<version>\S+).*?conflict.*?(?P<other>@?[^@\s]+@\S+)")
        .unwrap()
});

static INVALID_CONFIG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)invalid.*configuration").unwrap());

static SYNTAX_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SyntaxError: (?P<message>.*)").unwrap());

static TYPE_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:Type error: |error TS\d+: )(?P<message>.*)").unwrap());

static WEBPACK_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ERROR in (?P<message>.*)").unwrap());

static FILE_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ENOENT: no such file or directory, (?:open|stat|scandir) '(?P<path>[^']+)'").unwrap()
});

const CONTINUATION_MARKERS: &[&str] = &["Import trace", "Did you mean", ">", "|"];

#[derive(Debug, Default, Clone, Copy)]
pub struct BuildParser;

/// Package root of a bare specifier: `lodash/fp` -> `lodash`, `@a/b/c` -> `@a/b`.
pub fn package_root(specifier: &str) -> String {
    let mut parts = specifier.split('/');
    match (parts.next(), parts.next()) {
        (Some(scope), Some(name)) if scope.starts_with('@') => format!("{scope}/{name}"),
        (Some(name), _) => name.to_string(),
        _ => specifier.to_string(),
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with('.') || specifier.starts_with('/')
}

#[derive(Default)]
struct Location {
    file: Option<String>,
    line: usize,
    column: usize,
}

fn package_subject(name: &str, version: &str, parent: Option<&str>) -> Subject {
    Subject::Package {
        name: name.to_string(),
        version: Some(version.trim_end_matches([',', '"']).to_string()),
        required_by: parent.map(|p| p.trim_end_matches(',').to_string()),
    }
}

fn config_file_for(message: &str) -> &'static str {
    if message.to_lowercase().contains("tsconfig") {
        "tsconfig.json"
    } else {
        "next.config.js"
    }
}

/// Match one line against the bundler patterns, most specific first.
fn match_line(line: &str, at: &Location) -> Option<ErrorRecord> {
    let file = || at.file.clone().unwrap_or_default();
    let text = line.trim();

    if let Some(c) = MODULE_NOT_FOUND.captures(text) {
        let module = c["module"].to_string();
        let file = at
            .file
            .clone()
            .or_else(|| c.name("dir").map(|d| d.as_str().to_string()))
            .unwrap_or_default();
        return Some(
            ErrorRecord::new(file, at.line, at.column, "module_not_found", text)
                .with_subject(Some(Subject::module(module))),
        );
    }

    if let Some(c) = DEPENDENCY_MISSING.captures(text) {
        let module = &c["module"];
        let record = if is_path_like(module) {
            ErrorRecord::new(file(), at.line, at.column, "module_not_found", text)
                .with_subject(Some(Subject::module(module)))
        } else {
            ErrorRecord::new(file(), at.line, at.column, "dependency_missing", text).with_subject(
                Some(Subject::Package {
                    name: package_root(module),
                    version: None,
                    required_by: None,
                }),
            )
        };
        return Some(record);
    }

    if let Some(c) = EXPORT_NOT_FOUND
        .captures(text)
        .or_else(|| ATTEMPTED_IMPORT.captures(text))
    {
        return Some(
            ErrorRecord::new(file(), at.line, at.column, "export_not_found", text).with_subject(
                Some(Subject::Export {
                    name: c["name"].to_string(),
                    module: c["module"].to_string(),
                    suggestion: None,
                }),
            ),
        );
    }

    let peer = PEER_DEP_MISSING
        .captures(text)
        .or_else(|| PEER_FROM.captures(text))
        .or_else(|| REQUIRES_PEER.captures(text));
    if let Some(c) = peer {
        let severity = if text.contains("WARN") {
            Severity::Warning
        } else {
            Severity::Error
        };
        return Some(
            ErrorRecord::new("package.json", 0, 0, "peer_dependency", text)
                .with_severity(severity)
                .with_subject(Some(package_subject(
                    &c["name"],
                    &c["version"],
                    Some(&c["parent"]),
                ))),
        );
    }

    if text.contains("npm ERR!") && text.to_lowercase().contains("conflict") {
        let subject = VERSION_CONFLICT
            .captures(text)
            .map(|c| package_subject(&c["name"], &c["version"], Some(&c["other"])));
        return Some(
            ErrorRecord::new("package.json", 0, 0, "version_conflict", text).with_subject(subject),
        );
    }

    if INVALID_CONFIG.is_match(text) {
        return Some(ErrorRecord::new(
            config_file_for(text),
            0,
            0,
            "invalid_config",
            text,
        ));
    }

    if let Some(c) = SYNTAX_ERROR.captures(text) {
        return Some(ErrorRecord::new(
            file(),
            at.line,
            at.column,
            "syntax_error",
            &c["message"],
        ));
    }

    if let Some(c) = TYPE_ERROR.captures(text) {
        return Some(ErrorRecord::new(
            file(),
            at.line,
            at.column,
            "typescript_error",
            &c["message"],
        ));
    }

    if let Some(c) = FILE_NOT_FOUND.captures(text) {
        return Some(ErrorRecord::new(
            c["path"].to_string(),
            0,
            0,
            "file_not_found",
            text,
        ));
    }

    if let Some(c) = WEBPACK_ERROR.captures(text) {
        return Some(ErrorRecord::new(
            file(),
            at.line,
            at.column,
            "webpack_error",
            &c["message"],
        ));
    }

    None
}

fn is_continuation(line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    line.starts_with(char::is_whitespace)
        || CONTINUATION_MARKERS
            .iter()
            .any(|marker| line.starts_with(marker))
}

impl OutputParser for BuildParser {
    fn parse(&self, raw: &str) -> Vec<ErrorRecord> {
        let mut records: Vec<ErrorRecord> = Vec::new();
        let mut location = Location::default();
        let mut open = false;

        for line in raw.lines() {
            if let Some(c) = FILE_LOCATION.captures(line.trim()) {
                location = Location {
                    file: Some(c["file"].to_string()),
                    line: c.name("line").and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
                    column: c
                        .name("column")
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(0),
                };
                open = false;
                continue;
            }

            if let Some(record) = match_line(line, &location) {
                records.push(record);
                open = true;
                continue;
            }

            match records.last_mut() {
                Some(last) if open && is_continuation(line) => {
                    last.message.push(' ');
                    last.message.push_str(line.trim());
                }
                _ => open = false,
            }
        }

        dedupe_records(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_module_not_found_uses_preceding_file_line() {
        let output = indoc! {"
            Failed to compile.

            ./src/components/Foo.tsx:3:0
            Module not found: Can't resolve '../ui/button'
              1 | import React from 'react'
            > 3 | import { Button } from '../ui/button'
        "};
        let records = BuildParser.parse(output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file, "./src/components/Foo.tsx");
        assert_eq!(records[0].line, 3);
        assert_eq!(records[0].code, "module_not_found");
        assert_eq!(records[0].subject, Some(Subject::module("../ui/button")));
        assert!(records[0].message.contains("import { Button }"));
    }

    #[test]
    fn test_module_not_found_falls_back_to_directory() {
        let records = BuildParser
            .parse("Module not found: Error: Can't resolve 'sonner@2.0.3' in '/app/src/lib'");
        assert_eq!(records[0].file, "/app/src/lib");
    }

    #[test]
    fn test_dependency_missing_reduces_to_package_root() {
        let records = BuildParser.parse("Error: Cannot find module '@tanstack/react-query/devtools'");
        assert_eq!(records[0].code, "dependency_missing");
        assert_eq!(
            records[0].subject.as_ref().map(|s| s.text()),
            Some("@tanstack/react-query")
        );
    }

    #[test]
    fn test_peer_dependency_forms() {
        let records = BuildParser.parse(indoc! {r#"
            npm ERR! peer react@"^18.2.0" from next@14.0.0
            npm WARN next@14.0.0 requires a peer of react-dom@^18.2.0 but none is installed.
        "#});
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].subject,
            Some(Subject::Package {
                name: "react".into(),
                version: Some("^18.2.0".into()),
                required_by: Some("next@14.0.0".into()),
            })
        );
        assert_eq!(records[1].severity, Severity::Warning);
        assert_eq!(records[1].subject.as_ref().map(|s| s.text()), Some("react-dom"));
    }

    #[test]
    fn test_export_and_config_errors() {
        let records = BuildParser.parse(indoc! {"
            ./src/app/page.tsx
            export 'Buton' (imported as 'Buton') was not found in '@/components/ui/button'
            Invalid next.config.js configuration found
        "});
        assert_eq!(records[0].code, "export_not_found");
        assert_eq!(records[0].file, "./src/app/page.tsx");
        assert_eq!(records[1].code, "invalid_config");
        assert_eq!(records[1].file, "next.config.js");
    }

    #[test]
    fn test_package_root() {
        assert_eq!(package_root("lodash/fp"), "lodash");
        assert_eq!(package_root("@radix-ui/react-dialog/dist"), "@radix-ui/react-dialog");
        assert_eq!(package_root("zod"), "zod");
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(BuildParser.parse("").is_empty());
    }
}
