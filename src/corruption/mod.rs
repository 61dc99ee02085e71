//! Post-batch validation and automatic restoration.
//!
//! After every batch the tool is re-run. The batch is corrupted when the run
//! fails, when the error count rises, or when the touched files gain syntax
//! diagnostics. A corrupted batch is always restored before this returns and
//! always logged, whether or not restoration worked.

use crate::core::{is_syntax_diagnostic, Dialect, ErrorRecord};
use crate::fixers::BackupStore;
use crate::parser;
use crate::session;
use crate::tool::{ToolError, ToolInvocation, ToolRunner};
use crate::vcs::VersionControl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Valid,
    Corrupted,
    NoChange,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "VALID",
            Self::Corrupted => "CORRUPTED",
            Self::NoChange => "NO_CHANGE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorruptionReason {
    ErrorsIncreased,
    ToolCheckFailed,
    SyntaxInvalid,
}

impl fmt::Display for CorruptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ErrorsIncreased => "errors-increased",
            Self::ToolCheckFailed => "tool-check-failed",
            Self::SyntaxInvalid => "syntax-invalid",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreAction {
    AutoReverted,
    RestoreFailed,
}

/// One entry of the append-only corruption log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorruptionEvent {
    pub timestamp: DateTime<Utc>,
    pub commit: Option<String>,
    pub files: Vec<String>,
    pub reason: CorruptionReason,
    pub action_taken: RestoreAction,
    pub success: bool,
    pub baseline_count: usize,
    pub new_count: Option<usize>,
    pub reasoning: Vec<String>,
}

/// Error counts captured before a batch touches anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchBaseline {
    pub error_count: usize,
    pub syntax_error_count: usize,
}

impl BatchBaseline {
    /// Total records, plus syntax diagnostics within `files`.
    pub fn measure(records: &[ErrorRecord], files: &[PathBuf], project_root: &Path) -> Self {
        Self {
            error_count: records.len(),
            syntax_error_count: syntax_errors_in(records, files, project_root),
        }
    }
}

pub fn syntax_errors_in(records: &[ErrorRecord], files: &[PathBuf], project_root: &Path) -> usize {
    let files: BTreeSet<&Path> = files.iter().map(PathBuf::as_path).collect();
    records
        .iter()
        .filter(|r| is_syntax_diagnostic(r) && files.contains(r.path_in(project_root).as_path()))
        .count()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub reason: Option<CorruptionReason>,
    pub baseline_count: usize,
    pub new_count: Option<usize>,
    pub errors_fixed: usize,
    /// Records describing the working tree as it stands now, when known
    pub records: Option<Vec<ErrorRecord>>,
    pub event: Option<CorruptionEvent>,
}

impl ValidationResult {
    pub fn is_corrupted(&self) -> bool {
        self.status == ValidationStatus::Corrupted
    }

    pub fn restore_failed(&self) -> bool {
        self.event.as_ref().is_some_and(|e| !e.success)
    }
}

/// Outcome of one tool run.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCheck {
    Counted(Vec<ErrorRecord>),
    Failed {
        reason: String,
        /// Whatever the tool printed before failing
        output: Option<String>,
    },
}

/// Run the tool once and parse its output.
///
/// A non-zero exit that yields no records from non-empty output is a failed
/// check: the tool said something went wrong and nothing we parse explains it.
pub fn run_tool_check(dialect: Dialect, invocation: &ToolInvocation, runner: &dyn ToolRunner) -> ToolCheck {
    match invocation.run(runner) {
        Ok(output) => {
            let text = output.combined();
            let records = parser::parse(dialect, &text);
            if output.exit_code != 0 && records.is_empty() && !text.trim().is_empty() {
                log::warn!(
                    "`{}` exited with {} but no diagnostics could be parsed",
                    invocation.display(),
                    output.exit_code
                );
                return ToolCheck::Failed {
                    reason: format!("exit code {} with unparseable output", output.exit_code),
                    output: Some(text),
                };
            }
            ToolCheck::Counted(records)
        }
        Err(ToolError::UnexpectedExit { code, output }) => ToolCheck::Failed {
            reason: format!("unexpected exit code {code}"),
            output: Some(output.combined()),
        },
        Err(e) => ToolCheck::Failed {
            reason: e.to_string(),
            output: None,
        },
    }
}

pub struct CorruptionDetector<'a> {
    dialect: Dialect,
    invocation: &'a ToolInvocation,
    runner: &'a dyn ToolRunner,
    project_root: &'a Path,
    log_path: PathBuf,
}

impl<'a> CorruptionDetector<'a> {
    pub fn new(
        dialect: Dialect,
        invocation: &'a ToolInvocation,
        runner: &'a dyn ToolRunner,
        project_root: &'a Path,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dialect,
            invocation,
            runner,
            project_root,
            log_path: log_path.into(),
        }
    }

    pub fn check(&self) -> ToolCheck {
        run_tool_check(self.dialect, self.invocation, self.runner)
    }

    /// Re-run the tool against the batch and restore it if it made things worse.
    pub fn validate_fix_batch(
        &self,
        commit: Option<&str>,
        files: &[PathBuf],
        baseline: BatchBaseline,
        backups: &BackupStore,
        vcs: Option<&mut dyn VersionControl>,
    ) -> ValidationResult {
        let mut reasoning = Vec::new();

        let (reason, new_count) = match self.check() {
            ToolCheck::Failed { reason, .. } => {
                reasoning.push(format!("tool check failed: {reason}"));
                (CorruptionReason::ToolCheckFailed, None)
            }
            ToolCheck::Counted(records) => {
                let new_count = records.len();
                let syntax = syntax_errors_in(&records, files, self.project_root);
                reasoning.push(format!(
                    "error count {} -> {new_count}; syntax errors in touched files {} -> {syntax}",
                    baseline.error_count, baseline.syntax_error_count
                ));

                if new_count > baseline.error_count {
                    (CorruptionReason::ErrorsIncreased, Some(new_count))
                } else if syntax > baseline.syntax_error_count {
                    (CorruptionReason::SyntaxInvalid, Some(new_count))
                } else {
                    let status = if new_count < baseline.error_count {
                        ValidationStatus::Valid
                    } else {
                        ValidationStatus::NoChange
                    };
                    log::info!("Batch {status}: {} -> {new_count} errors", baseline.error_count);
                    return ValidationResult {
                        status,
                        reason: None,
                        baseline_count: baseline.error_count,
                        new_count: Some(new_count),
                        errors_fixed: baseline.error_count - new_count,
                        records: Some(records),
                        event: None,
                    };
                }
            }
        };

        log::warn!("Batch corrupted ({reason}); restoring");
        let success = self.restore(commit, files, backups, vcs, &mut reasoning);

        // Confirm the restored tree is back within the baseline.
        let records = if success {
            match self.check() {
                ToolCheck::Counted(records) => {
                    reasoning.push(format!("after restore: {} errors", records.len()));
                    if records.len() > baseline.error_count {
                        log::error!(
                            "Restored tree still reports {} errors (baseline {})",
                            records.len(),
                            baseline.error_count
                        );
                    }
                    Some(records)
                }
                ToolCheck::Failed { reason, .. } => {
                    reasoning.push(format!("post-restore check failed: {reason}"));
                    None
                }
            }
        } else {
            None
        };

        let event = CorruptionEvent {
            timestamp: Utc::now(),
            commit: commit.map(str::to_string),
            files: files
                .iter()
                .map(|f| crate::fixers::edit::display_path(self.project_root, f))
                .collect(),
            reason,
            action_taken: if success {
                RestoreAction::AutoReverted
            } else {
                RestoreAction::RestoreFailed
            },
            success,
            baseline_count: baseline.error_count,
            new_count,
            reasoning,
        };
        if let Err(e) = session::append_log(&self.log_path, &event) {
            log::error!("Failed to append to {}: {e}", self.log_path.display());
        }

        ValidationResult {
            status: ValidationStatus::Corrupted,
            reason: Some(reason),
            baseline_count: baseline.error_count,
            new_count,
            errors_fixed: 0,
            records,
            event: Some(event),
        }
    }

    /// Revert the batch commit when there is one, otherwise put each file back
    /// from its backup, falling back to the committed version.
    fn restore(
        &self,
        commit: Option<&str>,
        files: &[PathBuf],
        backups: &BackupStore,
        mut vcs: Option<&mut dyn VersionControl>,
        reasoning: &mut Vec<String>,
    ) -> bool {
        if let (Some(commit), Some(vcs)) = (commit, vcs.as_deref_mut()) {
            let is_last = vcs
                .state()
                .and_then(|s| s.last_commit())
                .is_some_and(|last| last.commit == commit);
            if is_last {
                match vcs.rollback_last_batch() {
                    Ok(_) => {
                        reasoning.push(format!("reverted commit {}", crate::vcs::short_id(commit)));
                        return true;
                    }
                    Err(e) => {
                        log::warn!("Revert of {commit} failed: {e}; restoring files instead");
                        reasoning.push(format!("revert failed: {e}"));
                    }
                }
            } else {
                reasoning.push(format!("{commit} is not the last batch commit; restoring files"));
            }
        }

        let mut targets: Vec<PathBuf> = files.to_vec();
        for entry in backups.entries() {
            if !targets.iter().any(|t| t == entry.original()) {
                targets.push(entry.original().to_path_buf());
            }
        }

        let mut success = true;
        for file in &targets {
            let restored = match backups.entry_for(file) {
                Some(entry) => backups.restore(&entry).map_err(|e| e.to_string()),
                None => match vcs.as_deref() {
                    Some(vcs) => vcs.restore_file(file).map_err(|e| e.to_string()),
                    None => Err("no backup and no version control".to_string()),
                },
            };
            match restored {
                Ok(()) => reasoning.push(format!(
                    "restored {}",
                    crate::fixers::edit::display_path(self.project_root, file)
                )),
                Err(e) => {
                    log::error!("Could not restore {}: {e}", file.display());
                    reasoning.push(format!("failed to restore {}: {e}", file.display()));
                    success = false;
                }
            }
        }
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RealFileSystem;
    use crate::testkit::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const TWO_ERRORS: &str = "src/a.ts(1,1): error TS2307: Cannot find module 'x'.\nsrc/b.ts(1,1): error TS2307: Cannot find module 'y'.";
    const ONE_ERROR: &str = "src/b.ts(1,1): error TS2307: Cannot find module 'y'.";
    const THREE_ERRORS: &str = "src/a.ts(1,1): error TS2307: Cannot find module 'x'.\nsrc/a.ts(2,1): error TS1005: ';' expected.\nsrc/b.ts(1,1): error TS2307: Cannot find module 'y'.";

    struct Fixture {
        temp: TempDir,
        invocation: ToolInvocation,
        backups: BackupStore,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("src")).unwrap();
            fs::write(temp.path().join("src/a.ts"), "original\n").unwrap();
            let backups = BackupStore::new(temp.path(), temp.path().join(".atd/backups/s/01"));
            Self {
                invocation: ToolInvocation::new(vec!["tsc".into()], Duration::from_secs(1), vec![0, 1, 2]),
                backups,
                temp,
            }
        }

        /// Simulate a fixer writing `src/a.ts`.
        fn mutate(&self) -> PathBuf {
            let path = self.temp.path().join("src/a.ts");
            self.backups.backup(&RealFileSystem::new(), &path, "original\n").unwrap();
            fs::write(&path, "mutated\n").unwrap();
            path
        }

        fn validate(&self, runner: &ScriptedRunner, baseline: usize) -> ValidationResult {
            let detector = CorruptionDetector::new(
                Dialect::TypeScript,
                &self.invocation,
                runner,
                self.temp.path(),
                self.temp.path().join(".atd/corruption-log.json"),
            );
            let file = self.mutate();
            detector.validate_fix_batch(
                None,
                &[file],
                BatchBaseline {
                    error_count: baseline,
                    syntax_error_count: 0,
                },
                &self.backups,
                None,
            )
        }

        fn content(&self) -> String {
            fs::read_to_string(self.temp.path().join("src/a.ts")).unwrap()
        }

        fn logged(&self) -> Vec<CorruptionEvent> {
            session::read_log(&self.temp.path().join(".atd/corruption-log.json")).unwrap()
        }
    }

    #[test]
    fn test_fewer_errors_is_valid() {
        let fx = Fixture::new();
        let result = fx.validate(&ScriptedRunner::new().then_output(ONE_ERROR, 2), 2);
        assert_eq!(result.status, ValidationStatus::Valid);
        assert_eq!(result.errors_fixed, 1);
        assert_eq!(fx.content(), "mutated\n");
        assert!(fx.logged().is_empty());
    }

    #[test]
    fn test_same_count_is_no_change() {
        let fx = Fixture::new();
        let result = fx.validate(&ScriptedRunner::new().then_output(TWO_ERRORS, 2), 2);
        assert_eq!(result.status, ValidationStatus::NoChange);
        assert_eq!(result.errors_fixed, 0);
    }

    #[test]
    fn test_more_errors_restores_and_logs() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::new()
            .then_output(THREE_ERRORS, 2)
            .then_output(TWO_ERRORS, 2);
        let result = fx.validate(&runner, 2);

        assert_eq!(result.status, ValidationStatus::Corrupted);
        assert_eq!(result.reason, Some(CorruptionReason::ErrorsIncreased));
        assert_eq!(result.new_count, Some(3));
        assert_eq!(fx.content(), "original\n");
        assert_eq!(result.records.as_ref().map(Vec::len), Some(2));

        let log = fx.logged();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action_taken, RestoreAction::AutoReverted);
        assert!(log[0].success);
        assert_eq!(log[0].files, vec!["src/a.ts".to_string()]);
    }

    #[test]
    fn test_tool_failure_is_corruption() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::new()
            .then_crash("segfault")
            .then_output(TWO_ERRORS, 2);
        let result = fx.validate(&runner, 2);
        assert_eq!(result.reason, Some(CorruptionReason::ToolCheckFailed));
        assert_eq!(result.new_count, None);
        assert_eq!(fx.content(), "original\n");
    }

    #[test]
    fn test_timeout_and_unparseable_failure_are_tool_check_failures() {
        let fx = Fixture::new();
        let result = fx.validate(&ScriptedRunner::new().then_timeout().then_output("", 0), 2);
        assert_eq!(result.reason, Some(CorruptionReason::ToolCheckFailed));

        let fx = Fixture::new();
        let result = fx.validate(
            &ScriptedRunner::new()
                .then_output("Error: Debug Failure. False expression.", 1)
                .then_output("", 0),
            2,
        );
        assert_eq!(result.reason, Some(CorruptionReason::ToolCheckFailed));
    }

    #[test]
    fn test_new_syntax_error_in_touched_file_is_syntax_invalid() {
        let fx = Fixture::new();
        let swapped = "src/a.ts(2,1): error TS1005: ';' expected.\nsrc/b.ts(1,1): error TS2307: Cannot find module 'y'.";
        let runner = ScriptedRunner::new().then_output(swapped, 2).then_output(TWO_ERRORS, 2);
        let result = fx.validate(&runner, 2);
        assert_eq!(result.reason, Some(CorruptionReason::SyntaxInvalid));
        assert_eq!(fx.content(), "original\n");
    }

    #[test]
    fn test_baseline_counts_only_touched_syntax_errors() {
        let root = Path::new("/p");
        let records = parser::parse(Dialect::TypeScript, THREE_ERRORS);
        let baseline = BatchBaseline::measure(&records, &[root.join("src/a.ts")], root);
        assert_eq!(baseline.error_count, 3);
        assert_eq!(baseline.syntax_error_count, 1);
        assert_eq!(syntax_errors_in(&records, &[root.join("src/b.ts")], root), 0);
    }
}
