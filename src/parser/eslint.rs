//! ESLint output: `--format json` first, the default stylish text as fallback.

use super::OutputParser;
use crate::core::{dedupe_records, ErrorRecord, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static STYLISH_WITH_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?P<line>\d+):(?P<column>\d+)\s+(?P<severity>error|warning)\s+(?P<message>.+?)\s{2,}(?P<rule>[@\w/-]+)\s*$")
        .unwrap()
});

static STYLISH_NO_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?P<line>\d+):(?P<column>\d+)\s+(?P<severity>error|warning)\s+(?P<message>.+?)\s*$")
        .unwrap()
});

static JSON_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\s*[\{\]]").unwrap());

/// Code used for messages that carry no rule, i.e. parser failures.
pub const PARSE_FAILURE_CODE: &str = "parse";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResult {
    file_path: String,
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    rule_id: Option<String>,
    #[serde(default)]
    severity: u8,
    #[serde(default)]
    message: String,
    #[serde(default)]
    line: usize,
    #[serde(default)]
    column: usize,
    #[serde(default)]
    fatal: bool,
    #[serde(default)]
    fix: Option<serde_json::Value>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EslintParser;

fn severity_of(level: u8, fatal: bool) -> Severity {
    if level >= 2 || fatal {
        Severity::Error
    } else {
        Severity::Warning
    }
}

fn parse_json(raw: &str) -> Option<Vec<ErrorRecord>> {
    let start = JSON_START.find(raw)?.start();
    let mut stream =
        serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Vec<FileResult>>();
    let files = match stream.next()? {
        Ok(files) => files,
        Err(e) => {
            log::debug!("ESLint JSON output did not parse: {}", e);
            return None;
        }
    };

    let records = files
        .into_iter()
        .flat_map(|file| {
            let path = file.file_path;
            file.messages.into_iter().map(move |m| {
                let code = m
                    .rule_id
                    .unwrap_or_else(|| PARSE_FAILURE_CODE.to_string());
                let mut record = ErrorRecord::new(path.clone(), m.line, m.column, code, m.message)
                    .with_severity(severity_of(m.severity, m.fatal));
                record.fixable = m.fix.is_some();
                record
            })
        })
        .collect();

    Some(records)
}

fn parse_stylish(raw: &str) -> Vec<ErrorRecord> {
    let mut records = Vec::new();
    let mut current_file: Option<String> = None;

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(char::is_whitespace) {
            // Summary lines ("✖ 3 problems", "2 errors and ...") are not file headers.
            let header = line.trim();
            let looks_like_path = header.contains('/') || header.contains('\\') || header.contains('.');
            current_file = (looks_like_path && !header.starts_with('✖')).then(|| header.to_string());
            continue;
        }

        let Some(file) = current_file.as_ref() else {
            continue;
        };

        let (caps, rule) = match STYLISH_WITH_RULE.captures(line) {
            Some(c) => {
                let rule = c["rule"].to_string();
                (c, rule)
            }
            None => match STYLISH_NO_RULE.captures(line) {
                Some(c) => (c, PARSE_FAILURE_CODE.to_string()),
                None => continue,
            },
        };

        let severity = if &caps["severity"] == "error" {
            Severity::Error
        } else {
            Severity::Warning
        };
        records.push(
            ErrorRecord::new(
                file.clone(),
                caps["line"].parse().unwrap_or(0),
                caps["column"].parse().unwrap_or(0),
                rule,
                caps["message"].trim(),
            )
            .with_severity(severity),
        );
    }

    records
}

impl OutputParser for EslintParser {
    fn parse(&self, raw: &str) -> Vec<ErrorRecord> {
        let records = parse_json(raw).unwrap_or_else(|| parse_stylish(raw));
        dedupe_records(records)
    }
}
