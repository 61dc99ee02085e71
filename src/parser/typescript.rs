//! `tsc` diagnostics, in both the plain and the `--pretty` single-line shapes.

use super::OutputParser;
use crate::core::{dedupe_records, ErrorRecord, Severity, Subject};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLAIN_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<file>.+?)\((?P<line>\d+),(?P<column>\d+)\):\s*(?P<severity>error|warning)\s+(?P<code>TS\d+):\s*(?P<message>.*)$",
    )
    .unwrap()
});

static PRETTY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<file>.+?):(?P<line>\d+):(?P<column>\d+)\s+-\s+(?P<severity>error|warning)\s+(?P<code>TS\d+):\s*(?P<message>.*)$",
    )
    .unwrap()
});

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).unwrap());

static MISSING_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:Module\s+)?['"]+(?P<module>[^'"]+)['"]+\s+(?:has no exported member|declares)(?:\s+named)?\s+['"](?P<name>[^'"]+)['"]"#,
    )
    .unwrap()
});

static DID_YOU_MEAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Did you mean '(?P<name>[A-Za-z_$][\w$]*)'\?").unwrap());

static PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Property '(?P<name>[^']+)' does not exist on type '(?P<ty>.+?)'(?:\.|$)").unwrap()
});

static PARAMETER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Parameter|Binding element) '(?P<name>[^']+)' implicitly has an").unwrap()
});

static SQUIGGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*~+\s*$").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct TypeScriptParser;

/// Pull the error's subject out of the message, keyed by diagnostic code.
pub fn extract_subject(code: &str, message: &str) -> Option<Subject> {
    match code {
        "TS2307" | "TS2792" => QUOTED
            .captures(message)
            .map(|c| Subject::module(&c[1])),
        "TS2305" | "TS2614" | "TS2724" => MISSING_EXPORT.captures(message).map(|c| Subject::Export {
            name: c["name"].to_string(),
            module: c["module"].to_string(),
            suggestion: DID_YOU_MEAN
                .captures(message)
                .map(|s| s["name"].to_string()),
        }),
        "TS2339" | "TS2551" => PROPERTY.captures(message).map(|c| Subject::Property {
            name: c["name"].to_string(),
            on_type: Some(c["ty"].to_string()),
        }),
        "TS7006" | "TS7031" => PARAMETER
            .captures(message)
            .map(|c| Subject::parameter(&c["name"])),
        _ => None,
    }
}

fn record_from(caps: &Captures) -> ErrorRecord {
    let code = &caps["code"];
    let message = caps["message"].trim();
    let severity = if &caps["severity"] == "warning" {
        Severity::Warning
    } else {
        Severity::Error
    };

    ErrorRecord::new(
        caps["file"].trim(),
        caps["line"].parse().unwrap_or(0),
        caps["column"].parse().unwrap_or(0),
        code,
        message,
    )
    .with_severity(severity)
    .with_subject(extract_subject(code, message))
}

impl OutputParser for TypeScriptParser {
    fn parse(&self, raw: &str) -> Vec<ErrorRecord> {
        let mut records: Vec<ErrorRecord> = Vec::new();
        let mut open = false;

        for line in raw.lines() {
            let caps = PLAIN_LINE
                .captures(line)
                .or_else(|| PRETTY_LINE.captures(line));

            if let Some(caps) = caps {
                records.push(record_from(&caps));
                open = true;
                continue;
            }

            let is_continuation = line.starts_with(char::is_whitespace) && !line.trim().is_empty();
            match records.last_mut() {
                Some(last) if open && is_continuation => {
                    if !SQUIGGLE.is_match(line) {
                        last.message.push(' ');
                        last.message.push_str(line.trim());
                    }
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
    fn test_parses_plain_diagnostics() {
        let output = indoc! {r#"
            src/components/Foo.tsx(3,24): error TS2307: Cannot find module '../ui/button' or its corresponding type declarations.
            src/app/page.tsx(10,18): error TS7006: Parameter 'item' implicitly has an 'any' type.
            Found 2 errors.
        "#};

        let records = TypeScriptParser.parse(output);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file, "src/components/Foo.tsx");
        assert_eq!(records[0].line, 3);
        assert_eq!(records[0].column, 24);
        assert_eq!(records[0].subject, Some(Subject::module("../ui/button")));
        assert_eq!(records[1].subject, Some(Subject::parameter("item")));
    }

    #[test]
    fn test_parses_pretty_single_line_shape() {
        let records = TypeScriptParser
            .parse("src/a.ts:4:1 - error TS2304: Cannot find name 'foo'.");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "TS2304");
        assert_eq!(records[0].subject, None);
    }

    #[test]
    fn test_continuation_lines_join_previous_message() {
        let output = indoc! {"
            src/a.ts(1,1): error TS2322: Type 'string' is not assignable to type 'number'.
              Type 'x' is not assignable to type 'y'.
            src/b.ts(2,2): error TS2304: Cannot find name 'z'.
        "};
        let records = TypeScriptParser.parse(output);
        assert_eq!(records.len(), 2);
        assert!(records[0].message.ends_with("Type 'x' is not assignable to type 'y'."));
    }

    #[test]
    fn test_property_and_export_subjects() {
        let property = extract_subject(
            "TS2339",
            "Property 'emial' does not exist on type 'Customer'.",
        );
        assert_eq!(
            property,
            Some(Subject::Property {
                name: "emial".into(),
                on_type: Some("Customer".into())
            })
        );

        let export = extract_subject(
            "TS2724",
            r#"Module '"@/lib/utils"' has no exported member named 'formatdate'. Did you mean 'formatDate'?"#,
        );
        assert_eq!(
            export,
            Some(Subject::Export {
                name: "formatdate".into(),
                module: "@/lib/utils".into(),
                suggestion: Some("formatDate".into()),
            })
        );
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let output = "garbage\nsrc/a.ts(1,: error TS\nsrc/b.ts(2,3): error TS2307: Cannot find module 'x'.";
        let records = TypeScriptParser.parse(output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file, "src/b.ts");
    }

    #[test]
    fn test_duplicate_diagnostics_collapse() {
        let line = "src/b.ts(2,3): error TS2307: Cannot find module 'x'.";
        let records = TypeScriptParser.parse(&format!("{line}\n{line}\n"));
        assert_eq!(records.len(), 1);
    }
}
