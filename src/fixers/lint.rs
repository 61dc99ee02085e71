//! Line-level fixes for a handful of mechanical ESLint rules.

use super::edit::{edit_files, Edit};
use super::{FixEnv, FixReport, Fixer};
use crate::core::ErrorRecord;
use crate::io::{strip_json_comments, strip_trailing_commas};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::path::Path;

static LET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\blet\b").unwrap());
static VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bvar\b").unwrap());
static LOOSE_EQUALITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<pre>[^=!<>])(?P<op>==|!=)(?P<post>[^=])").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    PreferConst,
    Semi,
    Quotes,
    NoVar,
    Eqeqeq,
}

impl LintRule {
    pub const ALL: [LintRule; 5] = [
        Self::PreferConst,
        Self::Semi,
        Self::Quotes,
        Self::NoVar,
        Self::Eqeqeq,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::PreferConst => "prefer-const",
            Self::Semi => "semi",
            Self::Quotes => "quotes",
            Self::NoVar => "no-var",
            Self::Eqeqeq => "eqeqeq",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::PreferConst | Self::Semi | Self::Quotes => 0.95,
            Self::NoVar => 0.75,
            Self::Eqeqeq => 0.6,
        }
    }
}

impl fmt::Display for LintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Single,
    Double,
}

impl QuoteStyle {
    fn char(self) -> char {
        match self {
            Self::Single => '\'',
            Self::Double => '"',
        }
    }
}

/// Project lint preferences relevant to the fixable rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LintPreferences {
    pub quotes: QuoteStyle,
    pub semicolons: bool,
}

impl Default for LintPreferences {
    fn default() -> Self {
        Self {
            quotes: QuoteStyle::Single,
            semicolons: true,
        }
    }
}

/// `"rule": "x"` or `"rule": ["error", "x", ...]` -> `"x"`.
fn rule_option<'v>(rules: &'v Value, rule: &str) -> Option<&'v str> {
    match rules.get(rule)? {
        Value::Array(items) => items.get(1).and_then(Value::as_str),
        Value::String(s) => Some(s),
        _ => None,
    }
}

impl LintPreferences {
    pub fn from_config(config: &Value) -> Self {
        let mut prefs = Self::default();
        let Some(rules) = config.get("rules") else {
            return prefs;
        };
        if rule_option(rules, "quotes") == Some("double") {
            prefs.quotes = QuoteStyle::Double;
        }
        if rule_option(rules, "semi") == Some("never") {
            prefs.semicolons = false;
        }
        prefs
    }

    /// `.eslintrc.json`, then `.eslintrc`, then the `eslintConfig` key of package.json.
    pub fn load(project_root: &Path) -> Self {
        let read = |name: &str| -> Option<Value> {
            let text = std::fs::read_to_string(project_root.join(name)).ok()?;
            serde_json::from_str(&strip_trailing_commas(&strip_json_comments(&text))).ok()
        };
        read(".eslintrc.json")
            .or_else(|| read(".eslintrc"))
            .or_else(|| read("package.json").and_then(|p| p.get("eslintConfig").cloned()))
            .map(|config| Self::from_config(&config))
            .unwrap_or_default()
    }
}

fn byte_at(line: &str, column: usize) -> Option<usize> {
    line.char_indices().nth(column.checked_sub(1)?).map(|(i, _)| i)
}

/// Convert the string literal starting at `start` to `target` quotes.
pub fn requote(line: &str, start: usize, target: QuoteStyle) -> Option<String> {
    let open = line[start..].chars().next()?;
    let want = target.char();
    if !matches!(open, '\'' | '"') || open == want {
        return None;
    }

    let mut body = String::new();
    let mut chars = line[start + 1..].char_indices();
    let mut end = None;
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                if escaped == open {
                    body.push(open);
                } else {
                    body.push('\\');
                    body.push(escaped);
                }
            }
            c if c == open => {
                end = Some(start + 1 + i);
                break;
            }
            c if c == want => {
                body.push('\\');
                body.push(c);
            }
            c => body.push(c),
        }
    }
    let end = end?;
    Some(format!("{}{want}{body}{want}{}", &line[..start], &line[end + 1..]))
}

fn fix_semi(line: &str, message: &str, prefs: LintPreferences) -> Option<String> {
    let add = if message.contains("Missing semicolon") {
        true
    } else if message.contains("Extra semicolon") {
        false
    } else {
        prefs.semicolons
    };
    let trimmed = line.trim_end();
    let trailing = &line[trimmed.len()..];
    match (add, trimmed.ends_with(';')) {
        (true, false) if !trimmed.is_empty() => Some(format!("{trimmed};{trailing}")),
        (false, true) => Some(format!("{}{trailing}", &trimmed[..trimmed.len() - 1])),
        _ => None,
    }
}

fn fix_quotes(line: &str, column: usize, message: &str, prefs: LintPreferences) -> Option<String> {
    let target = if message.contains("singlequote") {
        QuoteStyle::Single
    } else if message.contains("doublequote") {
        QuoteStyle::Double
    } else {
        prefs.quotes
    };
    let from_column = byte_at(line, column).and_then(|start| requote(line, start, target));
    from_column.or_else(|| {
        let other = match target {
            QuoteStyle::Single => '"',
            QuoteStyle::Double => '\'',
        };
        line.find(other).and_then(|start| requote(line, start, target))
    })
}

/// Replace the declaration keyword that owns the 1-based `column`.
///
/// ESLint points `no-var` at the keyword and `prefer-const` at the binding,
/// so the owner is the last keyword starting at or before the column within
/// the same statement.
fn replace_keyword_at(keyword: &Regex, line: &str, column: usize, replacement: &str) -> Option<String> {
    let at = byte_at(line, column)?;
    let found = keyword.find_iter(line).filter(|m| m.start() <= at).last()?;
    if line[found.end()..at.max(found.end())].contains(';') {
        return None;
    }
    Some(format!("{}{replacement}{}", &line[..found.start()], &line[found.end()..]))
}

/// Apply `rule` to one line; `None` when the line has nothing to change.
pub fn fix_line(rule: LintRule, line: &str, column: usize, message: &str, prefs: LintPreferences) -> Option<String> {
    match rule {
        LintRule::PreferConst => replace_keyword_at(&LET, line, column, "const"),
        LintRule::NoVar => replace_keyword_at(&VAR, line, column, "let"),
        LintRule::Eqeqeq => LOOSE_EQUALITY
            .is_match(line)
            .then(|| LOOSE_EQUALITY.replacen(line, 1, "$pre$op=$post").into_owned()),
        LintRule::Semi => fix_semi(line, message, prefs),
        LintRule::Quotes => fix_quotes(line, column, message, prefs),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LintFixer {
    rule: LintRule,
}

impl LintFixer {
    pub fn new(rule: LintRule) -> Self {
        Self { rule }
    }
}

impl Fixer for LintFixer {
    fn name(&self) -> &str {
        self.rule.id()
    }

    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport {
        let mut report = FixReport::default();
        let confidence = self.rule.confidence();
        if !env.allows(confidence) {
            for error in errors {
                report.skip(error, &format!("{} fixes ({confidence:.2}) are below the threshold", self.rule));
            }
            return report;
        }

        let prefs = LintPreferences::load(env.project_root);
        let rule = self.rule;
        edit_files(env, errors, &mut report, |error, _path, buffer| {
            let note = rule.id().to_string();
            match buffer.rewrite_line(error.line, confidence, &note, |text| {
                fix_line(rule, text, error.column, &error.message, prefs)
            }) {
                Some(change) => Edit::Applied(vec![change]),
                None => Edit::skip(format!("{rule}: nothing to change on line {}", error.line)),
            }
        });
        report
    }
}
