//! Manifest-level fixers: missing dependencies and version conflicts.
//!
//! Both only edit `package.json`. Installers are never run; the packages
//! that need installing are reported back in the install list.

use super::edit::edit_json_document;
use super::{Change, FixEnv, FixReport, Fixer};
use crate::core::{ErrorRecord, Subject};
use semver::{Version, VersionReq};
use serde_json::{Map, Value};

pub const MANIFEST: &str = "package.json";

const ADD_CONFIDENCE: f64 = 0.8;
const OVERRIDE_CONFIDENCE: f64 = 0.75;

fn object_entry<'m>(document: &'m mut Map<String, Value>, key: &str) -> Option<&'m mut Map<String, Value>> {
    document
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '^', '~'];

fn is_wildcard(part: &str) -> bool {
    matches!(part, "x" | "X" | "*")
}

/// A declared or installed version (`18.2`, `v18.2.0`, `^18.2.0`) as a full version.
fn pinned_version(text: &str) -> Option<Version> {
    let core = text.trim().trim_start_matches(OPERATOR_CHARS).trim_start_matches('v');
    let (numbers, suffix) = core.split_at(core.find(['-', '+']).unwrap_or(core.len()));
    let mut parts: Vec<&str> = numbers.split('.').collect();
    if parts.len() > 3 {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&format!("{}{suffix}", parts.join("."))).ok()
}

/// One npm comparator in `VersionReq` syntax; `None` when it matches everything.
fn npm_comparator(token: &str) -> Option<String> {
    let (op, version) = token.split_at(token.find(|c: char| !OPERATOR_CHARS.contains(&c)).unwrap_or(token.len()));
    let version = version.trim_start_matches('v');
    let parts: Vec<&str> = version.split('.').collect();
    match parts.iter().position(|p| is_wildcard(p)) {
        Some(0) => None,
        Some(at) if op.is_empty() || op == "=" => Some(format!("{}.*", parts[..at].join("."))),
        Some(at) => Some(format!("{op}{}", parts[..at].join("."))),
        // npm reads a bare version as exact, `VersionReq` as caret.
        None if op.is_empty() => Some(format!("={version}")),
        None => Some(format!("{op}{version}")),
    }
}

/// One `||` alternative of an npm range: `>=16.8.0 <19`, `18.x`, `1.2.3 - 2.0.0`.
fn npm_requirement(alternative: &str) -> Option<VersionReq> {
    let alternative = alternative.trim();
    if alternative.is_empty() || alternative == "latest" {
        return Some(VersionReq::STAR);
    }

    let comparators: Vec<String> = match alternative.split_once(" - ") {
        Some((low, high)) => [format!(">={}", low.trim()), format!("<={}", high.trim())]
            .iter()
            .filter_map(|c| npm_comparator(c))
            .collect(),
        None => {
            let mut comparators = Vec::new();
            let mut pending_op = String::new();
            for token in alternative.split_whitespace() {
                if token.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
                    pending_op.push_str(token);
                    continue;
                }
                let token = format!("{}{token}", std::mem::take(&mut pending_op));
                comparators.extend(npm_comparator(&token));
            }
            comparators
        }
    };

    if comparators.is_empty() {
        return Some(VersionReq::STAR);
    }
    VersionReq::parse(&comparators.join(", ")).ok()
}

/// Whether a pinned version falls in an npm range.
pub fn satisfies(version: &str, range: &str) -> bool {
    let Some(v) = pinned_version(version) else {
        return false;
    };
    range
        .split("||")
        .filter_map(npm_requirement)
        .any(|requirement| requirement.matches(&v))
}

/// Adds packages the build could not find to `dependencies`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingDependencyFixer;

impl Fixer for MissingDependencyFixer {
    fn name(&self) -> &str {
        "missing-dependency"
    }

    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport {
        let mut report = FixReport::default();
        let mut wanted: Vec<(String, String)> = Vec::new();

        for error in errors {
            let name = match &error.subject {
                Some(Subject::Package { name, .. }) => name.clone(),
                Some(Subject::Module { specifier }) => crate::parser::build::package_root(specifier),
                _ => {
                    report.skip(error, "no package name in the message");
                    continue;
                }
            };
            if env.context.is_declared(&name) {
                report.skip(error, &format!("'{name}' is already declared; reinstall"));
                continue;
            }
            if !env.allows(ADD_CONFIDENCE) {
                report.skip(error, "below confidence threshold");
                continue;
            }
            if wanted.iter().any(|(n, _)| *n == name) {
                report.skip(error, "duplicate of an earlier error");
                continue;
            }
            let version = env
                .context
                .installed_version(&name)
                .map(|v| format!("^{v}"))
                .unwrap_or_else(|| "latest".to_string());
            wanted.push((name, version));
        }

        if wanted.is_empty() {
            return report;
        }

        let path = env.project_root.join(MANIFEST);
        let count = wanted.len();
        let packages: Vec<String> = wanted.iter().map(|(n, _)| n.clone()).collect();
        edit_json_document(env, &path, count, &mut report, |document| {
            let Some(deps) = object_entry(document, "dependencies") else {
                return (Vec::new(), 0);
            };
            let changes: Vec<Change> = wanted
                .into_iter()
                .map(|(name, version)| {
                    let line = format!("\"{name}\": \"{version}\"");
                    deps.insert(name, Value::String(version));
                    Change::new(0, "", line, ADD_CONFIDENCE, "dependencies")
                })
                .collect();
            let settled = changes.len();
            (changes, settled)
        });

        if report.fixed > 0 {
            report.install_list = packages;
        }
        report
    }
}

/// A version pin extracted from a conflict message.
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub package: String,
    pub range: String,
}

fn pin_for(error: &ErrorRecord) -> Option<Pin> {
    match &error.subject {
        Some(Subject::Package {
            name,
            version: Some(range),
            ..
        }) => Some(Pin {
            package: name.clone(),
            range: range.clone(),
        }),
        _ => None,
    }
}

/// Pins conflicting packages through `overrides`, or `resolutions` for yarn.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionConflictFixer;

impl VersionConflictFixer {
    pub fn override_key(project_root: &std::path::Path) -> &'static str {
        if project_root.join("yarn.lock").is_file() {
            "resolutions"
        } else {
            "overrides"
        }
    }
}

impl Fixer for VersionConflictFixer {
    fn name(&self) -> &str {
        "dependency-version-conflict"
    }

    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport {
        let mut report = FixReport::default();
        let key = Self::override_key(env.project_root);
        let mut pins: Vec<Pin> = Vec::new();

        for error in errors {
            let Some(pin) = pin_for(error) else {
                report.skip(error, "no package@range in the message");
                continue;
            };
            let declared_ok = env
                .context
                .declared_version(&pin.package)
                .is_some_and(|declared| satisfies(declared, &pin.range));
            if declared_ok {
                report.skip(error, &format!("{} {} already satisfied", pin.package, pin.range));
                continue;
            }
            if !env.allows(OVERRIDE_CONFIDENCE) {
                report.skip(error, "below confidence threshold");
                continue;
            }
            if pins.iter().any(|p| p.package == pin.package) {
                report.skip(error, "package already pinned in this batch");
                continue;
            }
            pins.push(pin);
        }

        if pins.is_empty() {
            return report;
        }

        let path = env.project_root.join(MANIFEST);
        let count = pins.len();
        edit_json_document(env, &path, count, &mut report, |document| {
            let Some(section) = object_entry(document, key) else {
                return (Vec::new(), 0);
            };
            let mut changes = Vec::new();
            for pin in pins {
                let existing = section.get(&pin.package).and_then(Value::as_str);
                if existing.is_some_and(|current| satisfies(current, &pin.range)) {
                    continue;
                }
                let old = existing
                    .map(|v| format!("\"{}\": \"{v}\"", pin.package))
                    .unwrap_or_default();
                let new = format!("\"{}\": \"{}\"", pin.package, pin.range);
                section.insert(pin.package, Value::String(pin.range));
                changes.push(Change::new(0, old, new, OVERRIDE_CONFIDENCE, key));
            }
            let settled = changes.len();
            (changes, settled)
        });

        report
    }
}
