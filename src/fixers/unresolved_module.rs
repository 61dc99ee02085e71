//! Rewrites unresolved import specifiers chosen by intent inference.
//!
//! Only FIX_PATH decisions that pass the confidence gate touch a file.
//! Install decisions are recorded, everything else is left for a human.

use super::edit::{edit_files, Edit};
use super::{FixEnv, FixReport, Fixer};
use crate::core::{ErrorRecord, RecordKey, Subject};
use crate::inference::{install_list, FixDecision, IntentInference, Strategy};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

#[derive(Debug, Default, Clone, Copy)]
pub struct UnresolvedModuleFixer;

/// Import shapes that reference `module` by its exact quoted text.
fn import_patterns(module: &str) -> Vec<Regex> {
    let m = regex::escape(module);
    [
        format!(r#"import\s+.*\s+from\s+['"]{m}['"]"#),
        format!(r#"import\s+['"]{m}['"]"#),
        format!(r#"import\(\s*['"]{m}['"]\s*\)"#),
        format!(r#"from\s+['"]{m}['"]"#),
        format!(r#"require\(\s*['"]{m}['"]\s*\)"#),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

fn references_module(line: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(line))
}

/// Swap the quoted specifier on an import line, keeping the quote style.
pub fn rewrite_import(line: &str, module: &str, corrected: &str) -> Option<String> {
    if !references_module(line, &import_patterns(module)) {
        return None;
    }
    ['\'', '"'].iter().find_map(|q| {
        let needle = format!("{q}{module}{q}");
        line.contains(&needle)
            .then(|| line.replacen(&needle, &format!("{q}{corrected}{q}"), 1))
    })
}

/// The reported line when it holds the import, else the first line that does.
fn find_import_line(buffer: &super::Buffer, hint: usize, module: &str) -> Option<usize> {
    let patterns = import_patterns(module);
    if buffer
        .line(hint)
        .is_some_and(|l| references_module(l, &patterns))
    {
        return Some(hint);
    }
    buffer
        .lines()
        .find(|(_, l)| references_module(l, &patterns))
        .map(|(n, _)| n)
}

/// Bundlers sometimes report the directory the import was resolved from.
/// Expand such a record into one per source file that imports the module.
fn expand_directory_record(project_root: &Path, error: &ErrorRecord, module: &str) -> Vec<ErrorRecord> {
    let dir = error.path_in(project_root);
    if error.file.is_empty() || !dir.is_dir() {
        return vec![error.clone()];
    }

    let patterns = import_patterns(module);
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut files: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
        })
        .collect();
    files.sort();

    files
        .into_iter()
        .filter_map(|path| {
            let content = fs::read_to_string(&path).ok()?;
            let line = content
                .lines()
                .position(|l| references_module(l, &patterns))?;
            let relative = path.strip_prefix(project_root).unwrap_or(&path);
            let mut record = error.clone();
            record.file = relative.display().to_string();
            record.line = line + 1;
            Some(record)
        })
        .collect()
}

impl Fixer for UnresolvedModuleFixer {
    fn name(&self) -> &str {
        "unresolved-module"
    }

    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport {
        let inference = IntentInference::new(env.context, env.alias_prefix);
        let mut report = FixReport::default();
        let mut decisions: Vec<FixDecision> = Vec::new();
        let mut approved: Vec<ErrorRecord> = Vec::new();
        let mut corrections: HashMap<RecordKey, (String, f64, Strategy)> = HashMap::new();

        for error in errors {
            let Some(Subject::Module { specifier }) = &error.subject else {
                report.skip(error, "no module specifier in the message");
                continue;
            };

            let records = if error.file.is_empty() {
                vec![]
            } else {
                expand_directory_record(env.project_root, error, specifier)
            };

            let intent = inference.infer(specifier, &error.file).at_line(error.line);
            let decision = env.selector.select(&intent);
            for step in &decision.intent.reasoning {
                log::debug!("  {specifier}: {step}");
            }

            match (decision.strategy, decision.should_apply, &decision.corrected_value) {
                (Strategy::FixPath, true, Some(corrected)) if !records.is_empty() => {
                    for record in records {
                        corrections.insert(
                            record.key(),
                            (corrected.clone(), decision.confidence, decision.strategy),
                        );
                        approved.push(record);
                    }
                }
                (Strategy::FixPath, true, Some(_)) => {
                    report.skip(error, "cannot locate the importing file");
                }
                (Strategy::InstallNpm, true, _) => {
                    report.skip(error, "recorded for installation");
                }
                _ => {
                    let reason = format!("{}: {}", decision.strategy, decision.reasoning);
                    report.skip(error, &reason);
                }
            }
            decisions.push(decision);
        }

        edit_files(env, &approved, &mut report, |error, _path, buffer| {
            let Some((corrected, confidence, strategy)) = corrections.get(&error.key()) else {
                return Edit::skip("no decision for this record");
            };
            let module = error.subject_text().unwrap_or_default();
            let Some(line) = find_import_line(buffer, error.line, module) else {
                return Edit::skip(format!("no import of '{module}' found"));
            };
            let note = format!("{strategy}: '{module}' -> '{corrected}'");
            match buffer.rewrite_line(line, *confidence, &note, |text| {
                rewrite_import(text, module, corrected)
            }) {
                Some(change) => Edit::Applied(vec![change]),
                None => Edit::skip(format!("import of '{module}' could not be rewritten")),
            }
        });

        report.install_list = install_list(&decisions);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn module_error(file: &str, line: usize, module: &str) -> ErrorRecord {
        ErrorRecord::new(file, line, 20, "TS2307", format!("Cannot find module '{module}'"))
            .with_subject(Some(Subject::module(module)))
    }

    #[test]
    fn test_rewrite_import_keeps_quote_style() {
        assert_eq!(
            rewrite_import(r#"import { Button } from "../ui/button";"#, "../ui/button", "@/components/ui/button"),
            Some(r#"import { Button } from "@/components/ui/button";"#.to_string())
        );
        assert_eq!(
            rewrite_import("const x = await import('sonner@2.0.3')", "sonner@2.0.3", "sonner"),
            Some("const x = await import('sonner')".to_string())
        );
        assert_eq!(rewrite_import("const s = '../ui/button'", "../ui/button", "x"), None);
    }

    #[test]
    fn test_relative_ui_import_is_rewritten() {
        let harness = Harness::new(&[
            (
                "src/components/Foo.tsx",
                indoc! {"
                    import React from 'react'
                    import { Button } from '../ui/button'

                    export const Foo = () => <Button />
                "},
            ),
            ("src/components/ui/button.tsx", "export const Button = 1"),
        ]);

        let report = UnresolvedModuleFixer.fix_errors(
            &[module_error("src/components/Foo.tsx", 2, "../ui/button")],
            &harness.env(false),
        );

        assert_eq!(report.fixed, 1);
        assert_eq!(report.changes[0].file, "src/components/Foo.tsx");
        assert_eq!(report.changes[0].confidence, 1.0);
        assert!(harness
            .read("src/components/Foo.tsx")
            .contains("import { Button } from '@/components/ui/button'"));
    }

    #[test]
    fn test_version_tagged_import_is_stripped() {
        let harness = Harness::new(&[("src/app.tsx", "import { toast } from \"sonner@2.0.3\"\n")]);
        let report = UnresolvedModuleFixer
            .fix_errors(&[module_error("src/app.tsx", 1, "sonner@2.0.3")], &harness.env(false));
        assert_eq!(report.fixed, 1);
        assert_eq!(harness.read("src/app.tsx"), "import { toast } from \"sonner\"\n");
    }

    #[test]
    fn test_declared_package_is_not_touched() {
        let source = "import * as Tooltip from '@radix-ui/react-tooltip'\n";
        let harness = Harness::new(&[
            ("src/app.tsx", source),
            ("package.json", r#"{"dependencies": {"@radix-ui/react-tooltip": "^1.0.0"}}"#),
        ]);
        let report = UnresolvedModuleFixer.fix_errors(
            &[module_error("src/app.tsx", 1, "@radix-ui/react-tooltip")],
            &harness.env(false),
        );
        assert_eq!(report.fixed, 0);
        assert_eq!(report.skipped, 1);
        assert!(report.files_modified.is_empty());
        assert_eq!(harness.read("src/app.tsx"), source);
    }

    #[test]
    fn test_missing_package_goes_to_install_list() {
        let harness = Harness::new(&[("src/a.ts", "import confetti from 'canvas-confetti'\n")]);
        let report = UnresolvedModuleFixer.fix_errors(
            &[
                module_error("src/a.ts", 1, "canvas-confetti"),
                module_error("src/a.ts", 1, "canvas-confetti"),
            ],
            &harness.env(false),
        );
        assert_eq!(report.install_list, vec!["canvas-confetti".to_string()]);
        assert!(report.files_modified.is_empty());
    }

    #[test]
    fn test_import_found_off_the_reported_line() {
        let harness = Harness::new(&[
            (
                "src/components/Foo.tsx",
                "import {\n  Button,\n} from '../ui/button'\n",
            ),
            ("src/components/ui/button.tsx", "export const Button = 1"),
        ]);
        let report = UnresolvedModuleFixer.fix_errors(
            &[module_error("src/components/Foo.tsx", 1, "../ui/button")],
            &harness.env(false),
        );
        assert_eq!(report.fixed, 1);
        assert_eq!(report.changes[0].line, 3);
    }

    #[test]
    fn test_directory_record_is_expanded() {
        let harness = Harness::new(&[
            ("src/pages/index.tsx", "import x from 'sonner@2.0.3'\n"),
            ("src/pages/other.tsx", "export const y = 1\n"),
        ]);
        let record = ErrorRecord::new("src/pages", 0, 0, "module_not_found", "Module not found")
            .with_subject(Some(Subject::module("sonner@2.0.3")));
        let report = UnresolvedModuleFixer.fix_errors(&[record], &harness.env(false));
        assert_eq!(report.fixed, 1);
        assert_eq!(harness.read("src/pages/index.tsx"), "import x from 'sonner'\n");
        assert_eq!(harness.read("src/pages/other.tsx"), "export const y = 1\n");
    }

    #[test]
    fn test_record_without_subject_is_skipped() {
        let harness = Harness::new(&[]);
        let report = UnresolvedModuleFixer.fix_errors(
            &[ErrorRecord::new("a.ts", 1, 1, "TS2307", "garbled")],
            &harness.env(false),
        );
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
    }
}
