//! Scaffolds or completes `tsconfig.json` and `next.config.js`.

use super::edit::{commit_file, edit_json_document, group_by_file};
use super::{Change, FixEnv, FixReport, Fixer};
use crate::core::ErrorRecord;
use serde_json::{json, Map, Value};
use std::path::Path;

pub const TSCONFIG: &str = "tsconfig.json";
pub const NEXT_CONFIG: &str = "next.config.js";

const SCAFFOLD_CONFIDENCE: f64 = 0.9;
const COMPLETE_CONFIDENCE: f64 = 0.85;

const NEXT_CONFIG_TEMPLATE: &str = "/** @type {import('next').NextConfig} */
const nextConfig = {
  reactStrictMode: true,
}

module.exports = nextConfig
";

/// The compiler options a Next.js + TypeScript project starts from.
pub fn default_compiler_options(alias_prefix: &str, alias_dir: &Path) -> Map<String, Value> {
    let alias_glob = format!("{alias_prefix}*");
    let target_glob = format!("./{}/*", alias_dir.display());
    let options = json!({
        "target": "es5",
        "lib": ["dom", "dom.iterable", "esnext"],
        "allowJs": true,
        "skipLibCheck": true,
        "strict": false,
        "noEmit": true,
        "esModuleInterop": true,
        "module": "esnext",
        "moduleResolution": "node",
        "resolveJsonModule": true,
        "isolatedModules": true,
        "jsx": "preserve",
        "incremental": true,
        "baseUrl": ".",
        "paths": { alias_glob: [target_glob] },
    });
    match options {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Add the missing `compilerOptions` keys; existing values are never changed.
fn complete_tsconfig(document: &mut Map<String, Value>, defaults: Map<String, Value>, scaffold: bool) -> Vec<Change> {
    let confidence = if scaffold { SCAFFOLD_CONFIDENCE } else { COMPLETE_CONFIDENCE };
    let options = document
        .entry("compilerOptions".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(options) = options.as_object_mut() else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    for (key, value) in defaults {
        if options.contains_key(&key) {
            continue;
        }
        changes.push(Change::new(
            0,
            "",
            format!("\"{key}\": {value}"),
            confidence,
            "compilerOptions",
        ));
        options.insert(key, value);
    }

    if scaffold {
        document.insert("include".into(), json!(["next-env.d.ts", "**/*.ts", "**/*.tsx"]));
        document.insert("exclude".into(), json!(["node_modules"]));
    }
    changes
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigFixer;

impl ConfigFixer {
    fn fix_tsconfig(&self, env: &FixEnv, count: usize, report: &mut FixReport) {
        let path = env.project_root.join(TSCONFIG);
        let scaffold = !env.fs.is_file(&path);
        let confidence = if scaffold { SCAFFOLD_CONFIDENCE } else { COMPLETE_CONFIDENCE };
        if !env.allows(confidence) {
            report.skipped += count;
            return;
        }

        let alias_dir = env
            .context
            .alias_dir(env.alias_prefix)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| "src".into());
        let defaults = default_compiler_options(env.alias_prefix, &alias_dir);

        let before = report.fixed + report.failed;
        edit_json_document(env, &path, count, report, |document| {
            (complete_tsconfig(document, defaults, scaffold), count)
        });
        if report.fixed + report.failed == before {
            report.skipped += count;
            report
                .notes
                .push(format!("{TSCONFIG} already has every default compiler option"));
        }
    }

    fn fix_next_config(&self, env: &FixEnv, count: usize, report: &mut FixReport) {
        let path = env.project_root.join(NEXT_CONFIG);
        if env.fs.is_file(&path) {
            report.skipped += count;
            report
                .notes
                .push(format!("{NEXT_CONFIG} exists; invalid options need a manual look"));
            return;
        }
        if !env.allows(SCAFFOLD_CONFIDENCE) {
            report.skipped += count;
            return;
        }
        let change = Change::new(1, "", "const nextConfig = { reactStrictMode: true }", SCAFFOLD_CONFIDENCE, "scaffold");
        commit_file(env, &path, None, NEXT_CONFIG_TEMPLATE, vec![change], count, report);
    }
}

impl Fixer for ConfigFixer {
    fn name(&self) -> &str {
        "config-error"
    }

    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport {
        let mut report = FixReport::default();

        for (file, group) in group_by_file(errors) {
            let is_tsconfig = file.ends_with(TSCONFIG)
                || group
                    .iter()
                    .any(|e| e.message.to_lowercase().contains("tsconfig"));
            if is_tsconfig {
                self.fix_tsconfig(env, group.len(), &mut report);
            } else if file.ends_with(NEXT_CONFIG) || file.is_empty() {
                self.fix_next_config(env, group.len(), &mut report);
            } else {
                for error in group {
                    report.skip(error, "not a config file this fixer knows");
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use pretty_assertions::assert_eq;

    fn config_error(file: &str) -> ErrorRecord {
        ErrorRecord::new(file, 0, 0, "invalid_config", "Invalid configuration object")
    }

    #[test]
    fn test_scaffolds_missing_tsconfig() {
        let h = Harness::new(&[]);
        let report = ConfigFixer.fix_errors(&[config_error(TSCONFIG)], &h.env(false));
        assert_eq!(report.fixed, 1);

        let written: Value = serde_json::from_str(&h.read(TSCONFIG)).unwrap();
        assert_eq!(written["compilerOptions"]["moduleResolution"], "node");
        assert_eq!(written["compilerOptions"]["strict"], false);
        assert_eq!(written["compilerOptions"]["paths"]["@/*"][0], "./src/*");
        assert_eq!(written["include"][0], "next-env.d.ts");
    }

    #[test]
    fn test_completes_existing_tsconfig_without_overwriting() {
        let h = Harness::new(&[(
            TSCONFIG,
            "{\n  // strict on purpose\n  \"compilerOptions\": { \"strict\": true, \"target\": \"es2020\", },\n}\n",
        )]);
        let report = ConfigFixer.fix_errors(&[config_error(TSCONFIG)], &h.env(false));
        assert_eq!(report.fixed, 1);

        let written: Value = serde_json::from_str(&h.read(TSCONFIG)).unwrap();
        assert_eq!(written["compilerOptions"]["strict"], true);
        assert_eq!(written["compilerOptions"]["target"], "es2020");
        assert_eq!(written["compilerOptions"]["jsx"], "preserve");
        assert!(written.get("include").is_none());
        assert!(report.changes.iter().all(|c| !c.new.contains("\"strict\"")));
    }

    #[test]
    fn test_scaffolds_next_config_once() {
        let h = Harness::new(&[]);
        let report = ConfigFixer.fix_errors(&[config_error(NEXT_CONFIG)], &h.env(false));
        assert_eq!(report.fixed, 1);
        assert!(h.read(NEXT_CONFIG).contains("module.exports = nextConfig"));

        let again = ConfigFixer.fix_errors(&[config_error(NEXT_CONFIG)], &h.env(false));
        assert_eq!(again.fixed, 0);
        assert_eq!(again.skipped, 1);
    }
}
