//! Fixers: one per error class, all sharing the same write discipline.
//!
//! Every fixer reads a file once, applies its edits in memory, backs the
//! original up and writes once. A fixer never fails as a whole; bad records
//! are logged and counted as skipped.

pub mod backup;
pub mod config;
pub mod dependency;
pub mod edit;
pub mod implicit_any;
pub mod lint;
pub mod missing_export;
pub mod missing_property;
pub mod unresolved_module;

pub use backup::{BackupEntry, BackupStore};
pub use edit::{Buffer, Edit};

use crate::context::ContextStore;
use crate::core::{Dialect, ErrorClass, ErrorRecord};
use crate::inference::StrategySelector;
use crate::io::FileSystem;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot update manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
}

/// One applied (or previewed) substitution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub file: String,
    pub line: usize,
    pub old: String,
    pub new: String,
    pub confidence: f64,
    pub note: String,
}

impl Change {
    pub fn new(
        line: usize,
        old: impl Into<String>,
        new: impl Into<String>,
        confidence: f64,
        note: impl Into<String>,
    ) -> Self {
        Self {
            file: String::new(),
            line,
            old: old.into(),
            new: new.into(),
            confidence,
            note: note.into(),
        }
    }

    pub fn in_file(mut self, file: &str) -> Self {
        self.file = file.to_string();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FixReport {
    pub fixed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub files_modified: BTreeSet<PathBuf>,
    pub changes: Vec<Change>,
    /// Packages recorded for installation; installers are never run
    pub install_list: Vec<String>,
    pub notes: Vec<String>,
}

impl FixReport {
    pub fn skip(&mut self, error: &ErrorRecord, reason: &str) {
        log::debug!(
            "Skipping {} at {}:{}: {}",
            error.code,
            error.file,
            error.line,
            reason
        );
        self.skipped += 1;
        self.notes
            .push(format!("{}:{} {} skipped: {}", error.file, error.line, error.code, reason));
    }
}

/// Everything a fixer needs for one batch.
pub struct FixEnv<'a> {
    pub project_root: &'a Path,
    pub context: &'a ContextStore,
    pub fs: &'a dyn FileSystem,
    pub backups: &'a BackupStore,
    pub selector: StrategySelector,
    pub alias_prefix: &'a str,
    pub dry_run: bool,
}

impl FixEnv<'_> {
    /// Whether a non-import edit at `confidence` passes the gate.
    pub fn allows(&self, confidence: f64) -> bool {
        confidence >= self.selector.threshold()
    }
}

pub trait Fixer {
    fn name(&self) -> &str;

    /// Apply what can safely be applied; never fails as a whole.
    fn fix_errors(&self, errors: &[ErrorRecord], env: &FixEnv) -> FixReport;
}

/// Maps each error class to the one fixer responsible for it.
pub struct FixerRegistry {
    fixers: BTreeMap<ErrorClass, Box<dyn Fixer>>,
}

impl FixerRegistry {
    pub fn for_dialect(dialect: Dialect) -> Self {
        let mut fixers: BTreeMap<ErrorClass, Box<dyn Fixer>> = BTreeMap::new();
        match dialect {
            Dialect::TypeScript => {
                fixers.insert(
                    ErrorClass::UnresolvedModule,
                    Box::new(unresolved_module::UnresolvedModuleFixer),
                );
                fixers.insert(
                    ErrorClass::ImplicitAnyParameter,
                    Box::new(implicit_any::ImplicitAnyFixer),
                );
                fixers.insert(
                    ErrorClass::MissingProperty,
                    Box::new(missing_property::MissingPropertyFixer),
                );
                fixers.insert(
                    ErrorClass::MissingExport,
                    Box::new(missing_export::MissingExportFixer),
                );
            }
            Dialect::Build => {
                fixers.insert(
                    ErrorClass::UnresolvedModule,
                    Box::new(unresolved_module::UnresolvedModuleFixer),
                );
                fixers.insert(
                    ErrorClass::MissingExport,
                    Box::new(missing_export::MissingExportFixer),
                );
                fixers.insert(
                    ErrorClass::MissingDependency,
                    Box::new(dependency::MissingDependencyFixer),
                );
                fixers.insert(
                    ErrorClass::DependencyVersionConflict,
                    Box::new(dependency::VersionConflictFixer),
                );
                fixers.insert(ErrorClass::ConfigError, Box::new(config::ConfigFixer));
            }
            Dialect::Lint => {
                for rule in lint::LintRule::ALL {
                    fixers.insert(
                        ErrorClass::LintRule(rule.id().to_string()),
                        Box::new(lint::LintFixer::new(rule)),
                    );
                }
            }
        }
        Self { fixers }
    }

    pub fn get(&self, class: &ErrorClass) -> Option<&dyn Fixer> {
        self.fixers.get(class).map(Box::as_ref)
    }

    pub fn has(&self, class: &ErrorClass) -> bool {
        self.fixers.contains_key(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ErrorClass> {
        self.fixers.keys()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::io::RealFileSystem;
    use tempfile::TempDir;

    /// Owns what a [`FixEnv`] borrows so tests can build one in a line.
    pub struct Harness {
        pub temp: TempDir,
        pub context: ContextStore,
        pub backups: BackupStore,
        pub fs: RealFileSystem,
    }

    impl Harness {
        pub fn new(files: &[(&str, &str)]) -> Self {
            let temp = TempDir::new().unwrap();
            for (path, content) in files {
                let full = temp.path().join(path);
                std::fs::create_dir_all(full.parent().unwrap()).unwrap();
                std::fs::write(full, content).unwrap();
            }
            let context = ContextStore::build(temp.path());
            let backups = BackupStore::new(temp.path(), temp.path().join(".atd/backups/t/b"));
            Self {
                temp,
                context,
                backups,
                fs: RealFileSystem::new(),
            }
        }

        pub fn env(&self, dry_run: bool) -> FixEnv<'_> {
            FixEnv {
                project_root: self.temp.path(),
                context: &self.context,
                fs: &self.fs,
                backups: &self.backups,
                selector: StrategySelector::default(),
                alias_prefix: "@/",
                dry_run,
            }
        }

        pub fn read(&self, path: &str) -> String {
            std::fs::read_to_string(self.temp.path().join(path)).unwrap()
        }

        pub fn path(&self, path: &str) -> PathBuf {
            self.temp.path().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::Harness;
    use super::*;
    use crate::core::Subject;
    use crate::io::RealFileSystem;
    use std::cell::Cell;

    /// Fails every write to a file whose name contains `poison`.
    struct FlakyFs {
        inner: RealFileSystem,
        poison: &'static str,
        attempts: Cell<usize>,
    }

    impl FileSystem for FlakyFs {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.inner.read_to_string(path)
        }

        fn write(&self, path: &Path, content: &str) -> io::Result<()> {
            let in_backups = path.components().any(|c| c.as_os_str() == ".atd");
            if !in_backups && path.to_string_lossy().contains(self.poison) {
                self.attempts.set(self.attempts.get() + 1);
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.inner.write(path, content)
        }

        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            self.inner.create_dir_all(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.inner.is_file(path)
        }
    }

    fn module_error(file: &str, module: &str) -> ErrorRecord {
        ErrorRecord::new(file, 1, 20, "TS2307", format!("Cannot find module '{module}'"))
            .with_subject(Some(Subject::module(module)))
    }

    #[test]
    fn test_registry_per_dialect() {
        let ts = FixerRegistry::for_dialect(Dialect::TypeScript);
        assert!(ts.has(&ErrorClass::UnresolvedModule));
        assert!(!ts.has(&ErrorClass::MissingDependency));
        assert!(!ts.has(&ErrorClass::Unclassified));

        let lint = FixerRegistry::for_dialect(Dialect::Lint);
        assert!(lint.has(&ErrorClass::LintRule("semi".into())));
        assert_eq!(lint.classes().count(), 5);
    }

    #[test]
    fn test_backup_is_byte_identical_to_original() {
        let original = "import { Button } from '../ui/button'\r\nexport const x = 1\r\n";
        let harness = Harness::new(&[
            ("src/components/Foo.tsx", original),
            ("src/components/ui/button.tsx", "export const Button = 1"),
        ]);
        let env = harness.env(false);
        let report = unresolved_module::UnresolvedModuleFixer
            .fix_errors(&[module_error("src/components/Foo.tsx", "../ui/button")], &env);

        assert_eq!(report.fixed, 1);
        let backup = harness
            .backups
            .backup_path(&harness.path("src/components/Foo.tsx"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), original);
    }

    #[test]
    fn test_failed_write_restores_and_leaves_other_files_alone() {
        let harness = Harness::new(&[
            ("src/a.tsx", "import x from '../ui/button'\n"),
            ("src/poison.tsx", "import y from '../ui/button'\n"),
            ("src/components/ui/button.tsx", "export default 1"),
        ]);
        let flaky = FlakyFs {
            inner: RealFileSystem::new(),
            poison: "poison",
            attempts: Cell::new(0),
        };
        let env = FixEnv {
            fs: &flaky,
            ..harness.env(false)
        };

        let report = unresolved_module::UnresolvedModuleFixer.fix_errors(
            &[
                module_error("src/a.tsx", "../ui/button"),
                module_error("src/poison.tsx", "../ui/button"),
            ],
            &env,
        );

        assert_eq!(report.fixed, 1);
        assert_eq!(report.failed, 1);
        assert!(flaky.attempts.get() >= 1);
        assert_eq!(harness.read("src/poison.tsx"), "import y from '../ui/button'\n");
        assert_eq!(harness.read("src/a.tsx"), "import x from '@/components/ui/button'\n");
        assert!(!report.files_modified.contains(&harness.path("src/poison.tsx")));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let harness = Harness::new(&[
            ("src/a.tsx", "import x from '../ui/button'\n"),
            ("src/components/ui/button.tsx", "export default 1"),
        ]);
        let report = unresolved_module::UnresolvedModuleFixer
            .fix_errors(&[module_error("src/a.tsx", "../ui/button")], &harness.env(true));

        assert_eq!(report.fixed, 1);
        assert_eq!(report.changes.len(), 1);
        assert!(report.files_modified.is_empty());
        assert!(harness.backups.entries().is_empty());
        assert_eq!(harness.read("src/a.tsx"), "import x from '../ui/button'\n");
    }
}
