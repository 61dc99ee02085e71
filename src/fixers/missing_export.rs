//! Repairs named imports the target module does not export.
//!
//! Two rewrites are supported: renaming a misspelled member (and its uses
//! in the importing file), and turning a named import of a default-only
//! module into a default import.

use super::edit::{edit_files, Buffer, Edit};
use super::{Change, FixEnv, FixReport, Fixer};
use crate::context::closest_match;
use crate::core::{ErrorRecord, Subject};
use crate::inference::resolve_import;
use once_cell::sync::Lazy;
use regex::Regex;

static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*export\s+(?:declare\s+)?(?:async\s+)?(?:abstract\s+)?(?:const|let|var|function\*?|class|interface|type|enum)\s+(?P<name>[A-Za-z_$][\w$]*)",
    )
    .unwrap()
});

static EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+(?:type\s+)?\{(?P<members>[^}]*)\}").unwrap());

static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bexport\s+default\b").unwrap());

static EXPORT_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bexport\s+\*\s+from\b").unwrap());

/// What a module file exports, as far as a text scan can tell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportScan {
    pub named: Vec<String>,
    pub has_default: bool,
    /// `export * from` hides names the scan cannot see
    pub re_exports_all: bool,
}

pub fn scan_exports(source: &str) -> ExportScan {
    let mut scan = ExportScan {
        has_default: EXPORT_DEFAULT.is_match(source),
        re_exports_all: EXPORT_STAR.is_match(source),
        ..Default::default()
    };

    for caps in EXPORT_DECL.captures_iter(source) {
        scan.named.push(caps["name"].to_string());
    }
    for caps in EXPORT_LIST.captures_iter(source) {
        for member in caps["members"].split(',') {
            let member = member.trim();
            if member.is_empty() {
                continue;
            }
            let exported = member
                .rsplit_once(" as ")
                .map(|(_, alias)| alias.trim())
                .unwrap_or(member)
                .trim_start_matches("type ")
                .to_string();
            if exported == "default" {
                scan.has_default = true;
            } else {
                scan.named.push(exported);
            }
        }
    }

    scan.named.dedup();
    scan
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportFix {
    Rename { to: String, confidence: f64 },
    ToDefault { confidence: f64 },
}

impl ExportFix {
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Rename { confidence, .. } | Self::ToDefault { confidence } => *confidence,
        }
    }
}

/// Choose a rewrite for `name` missing from a module with `scan` exports.
pub fn choose_fix(name: &str, suggestion: Option<&str>, scan: Option<&ExportScan>) -> Result<ExportFix, String> {
    if let Some(hint) = suggestion {
        return Ok(ExportFix::Rename {
            to: hint.to_string(),
            confidence: 0.9,
        });
    }

    let Some(scan) = scan else {
        return Err("target module could not be resolved".to_string());
    };
    if scan.named.iter().any(|n| n == name) {
        return Err(format!("'{name}' is exported; the error is stale"));
    }
    if let Some(near) = closest_match(scan.named.iter().map(String::as_str), name) {
        let confidence = if near.case_only { 0.95 } else { 0.85 };
        return Ok(ExportFix::Rename {
            to: near.value,
            confidence,
        });
    }
    if scan.has_default && !scan.re_exports_all {
        let confidence = if scan.named.is_empty() { 0.85 } else { 0.7 };
        return Ok(ExportFix::ToDefault { confidence });
    }
    Err(format!("no export close to '{name}'"))
}

fn from_clause(module: &str) -> Option<Regex> {
    Regex::new(&format!(r#"from\s*['"]{}['"]"#, regex::escape(module))).ok()
}

/// Line span `(first, last)` of the import statement that pulls from `module`.
fn import_span(buffer: &Buffer, hint: usize, module: &str) -> Option<(usize, usize)> {
    let from = from_clause(module)?;
    let last = (hint.max(1)..=buffer.len())
        .chain(1..hint.min(buffer.len() + 1))
        .find(|&n| buffer.line(n).is_some_and(|l| from.is_match(l)))?;
    let first = (last.saturating_sub(30).max(1)..=last)
        .rev()
        .find(|&n| buffer.line(n).is_some_and(|l| l.trim_start().starts_with("import")))?;
    Some((first, last))
}

fn word(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?:^|[^\w$.]){}(?:[^\w$]|$)", regex::escape(name))).ok()
}

/// Replace whole-word `from` with `to`, leaving property accesses alone.
fn replace_word(line: &str, from: &str, to: &str) -> String {
    let Some(re) = word(from) else {
        return line.to_string();
    };
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    let mut cursor = 0;
    while let Some(m) = re.find_at(line, cursor) {
        let matched = m.as_str();
        let offset = matched.find(from).unwrap_or(0);
        let start = m.start() + offset;
        out.push_str(&line[last..start]);
        out.push_str(to);
        last = start + from.len();
        cursor = last;
        if cursor >= line.len() {
            break;
        }
    }
    out.push_str(&line[last..]);
    out
}

fn rename(buffer: &mut Buffer, span: (usize, usize), name: &str, to: &str, confidence: f64) -> Vec<Change> {
    let aliased = Regex::new(&format!(r"\b{}\s+as\s+", regex::escape(name)))
        .map(|re| (span.0..=span.1).any(|n| buffer.line(n).is_some_and(|l| re.is_match(l))))
        .unwrap_or(false);
    let Some(matcher) = word(name) else {
        return Vec::new();
    };

    let lines: Vec<usize> = if aliased {
        (span.0..=span.1).collect()
    } else {
        (1..=buffer.len()).collect()
    };

    let note = format!("{name} -> {to}");
    lines
        .into_iter()
        .filter_map(|n| {
            buffer.rewrite_line(n, confidence, &note, |text| {
                matcher.is_match(text).then(|| replace_word(text, name, to))
            })
        })
        .collect()
}

static NAMED_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?P<indent>\s*)import\s+(?P<kind>type\s+)?\{(?P<members>[^}]*)\}\s*from\s*(?P<source>['"][^'"]+['"].*)$"#)
        .unwrap()
});

/// `import { A, B } from 'm'` -> `import A, { B } from 'm'`.
pub fn to_default_import(line: &str, name: &str) -> Option<String> {
    let caps = NAMED_IMPORT.captures(line)?;
    let members: Vec<&str> = caps["members"]
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .collect();
    let target = members.iter().position(|m| {
        m.split_whitespace().next() == Some(name)
    })?;
    let local = members[target]
        .rsplit_once(" as ")
        .map(|(_, alias)| alias.trim())
        .unwrap_or(name);
    let rest: Vec<&str> = members
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target)
        .map(|(_, m)| *m)
        .collect();

    let kind = caps.name("kind").map_or("", |k| k.as_str());
    let indent = &caps["indent"];
    let source = &caps["source"];
    if rest.is_empty() {
        Some(format!("{indent}import {kind}{local} from {source}"))
    } else if kind.is_empty() {
        Some(format!("{indent}import {local}, {{ {} }} from {source}", rest.join(", ")))
    } else {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MissingExportFixer;

impl Fixer for MissingExportFixer {
    fn name(&self) -> &str {
        "missing-export"
    }

    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport {
        let mut report = FixReport::default();

        edit_files(env, errors, &mut report, |error, path, buffer| {
            let Some(Subject::Export {
                name,
                module,
                suggestion,
            }) = &error.subject
            else {
                return Edit::skip("no export name in the message");
            };

            let scan = resolve_import(env.context, path, module)
                .and_then(|target| env.fs.read_to_string(&target).ok())
                .map(|source| scan_exports(&source));
            let fix = match choose_fix(name, suggestion.as_deref(), scan.as_ref()) {
                Ok(fix) => fix,
                Err(reason) => return Edit::skip(reason),
            };
            if !env.allows(fix.confidence()) {
                return Edit::skip(format!("confidence {:.2} below threshold", fix.confidence()));
            }

            let Some(span) = import_span(buffer, error.line, module) else {
                return Edit::skip(format!("no import from '{module}' found"));
            };

            match fix {
                ExportFix::Rename { to, confidence } => {
                    Edit::Applied(rename(buffer, span, name, &to, confidence))
                }
                ExportFix::ToDefault { confidence } => {
                    if span.0 != span.1 {
                        return Edit::skip("multi-line import; convert to a default import by hand");
                    }
                    let note = format!("{name} imported as default");
                    match buffer.rewrite_line(span.0, confidence, &note, |text| {
                        to_default_import(text, name)
                    }) {
                        Some(change) => Edit::Applied(vec![change]),
                        None => Edit::skip("import form cannot take a default binding"),
                    }
                }
            }
        });

        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn export_error(file: &str, line: usize, name: &str, module: &str, suggestion: Option<&str>) -> ErrorRecord {
        ErrorRecord::new(file, line, 10, "TS2305", "has no exported member")
            .with_subject(Some(Subject::Export {
                name: name.into(),
                module: module.into(),
                suggestion: suggestion.map(str::to_string),
            }))
    }

    #[test]
    fn test_scan_exports() {
        let scan = scan_exports(indoc! {"
            export const formatDate = () => {}
            export async function load() {}
            export interface Props {}
            const a = 1, b = 2
            export { a, b as bee }
            export default Widget
        "});
        assert_eq!(scan.named, vec!["formatDate", "load", "Props", "a", "bee"]);
        assert!(scan.has_default);
        assert!(!scan.re_exports_all);
    }

    #[test]
    fn test_choose_fix_order() {
        let scan = ExportScan {
            named: vec!["formatDate".into()],
            has_default: true,
            re_exports_all: false,
        };
        assert_eq!(
            choose_fix("formatdate", None, Some(&scan)),
            Ok(ExportFix::Rename { to: "formatDate".into(), confidence: 0.95 })
        );
        assert_eq!(
            choose_fix("x", Some("y"), None),
            Ok(ExportFix::Rename { to: "y".into(), confidence: 0.9 })
        );
        assert_eq!(
            choose_fix("Widget", None, Some(&scan)),
            Ok(ExportFix::ToDefault { confidence: 0.7 })
        );
        assert!(choose_fix("formatDate", None, Some(&scan)).is_err());
        assert!(choose_fix("x", None, None).is_err());
    }

    #[test]
    fn test_to_default_import() {
        assert_eq!(
            to_default_import("import { Button } from './button'", "Button"),
            Some("import Button from './button'".to_string())
        );
        assert_eq!(
            to_default_import("import { Button, type Props } from \"./button\";", "Button"),
            Some("import Button, { type Props } from \"./button\";".to_string())
        );
        assert_eq!(
            to_default_import("import { Button as B } from './button'", "Button"),
            Some("import B from './button'".to_string())
        );
        assert_eq!(to_default_import("import Foo, { Button } from './b'", "Button"), None);
    }

    #[test]
    fn test_replace_word_skips_property_access() {
        assert_eq!(
            replace_word("formatdate(d) + obj.formatdate + formatdate", "formatdate", "formatDate"),
            "formatDate(d) + obj.formatdate + formatDate"
        );
    }

    #[test]
    fn test_rename_propagates_to_usages() {
        let h = Harness::new(&[
            ("src/lib/utils.ts", "export function formatDate(d: Date) { return '' }\n"),
            (
                "src/page.tsx",
                "import { formatdate } from './lib/utils'\n\nconst label = formatdate(new Date())\n",
            ),
        ]);
        let report = MissingExportFixer.fix_errors(
            &[export_error("src/page.tsx", 1, "formatdate", "./lib/utils", None)],
            &h.env(false),
        );
        assert_eq!(report.fixed, 1);
        assert_eq!(report.changes.len(), 2);
        assert_eq!(
            h.read("src/page.tsx"),
            "import { formatDate } from './lib/utils'\n\nconst label = formatDate(new Date())\n"
        );
    }

    #[test]
    fn test_default_only_module_becomes_default_import() {
        let h = Harness::new(&[
            ("src/components/Card.tsx", "export default function Card() { return null }\n"),
            ("src/page.tsx", "import { Card } from '@/components/Card'\n"),
        ]);
        let report = MissingExportFixer.fix_errors(
            &[export_error("src/page.tsx", 1, "Card", "@/components/Card", None)],
            &h.env(false),
        );
        assert_eq!(report.fixed, 1);
        assert_eq!(h.read("src/page.tsx"), "import Card from '@/components/Card'\n");
    }

    #[test]
    fn test_unresolvable_package_is_skipped() {
        let h = Harness::new(&[("src/a.ts", "import { nope } from 'some-lib'\n")]);
        let report = MissingExportFixer.fix_errors(
            &[export_error("src/a.ts", 1, "nope", "some-lib", None)],
            &h.env(false),
        );
        assert_eq!(report.skipped, 1);
        assert_eq!(h.read("src/a.ts"), "import { nope } from 'some-lib'\n");
    }
}
