//! The fix pipeline of one session.
//!
//! ```text
//! CHECKPOINT -> ANALYZE -> for each error class:
//!     FIX_BATCH -> COMMIT -> REVALIDATE -> (keep | restore)
//! -> ESCALATION (opt-in) -> REPORT
//! ```
//!
//! Groups are processed strictly one after another. A group is regrouped
//! from the latest validation output, so a batch is always validated against
//! the tree its predecessors actually left behind.

pub mod escalation;

pub use escalation::{
    detect_assistant, respond_from, Acknowledgement, AssistChannel, AssistEndpoint,
    AssistanceRequest, CollaborationEntry, CollaborationOutcome,
};

use crate::classify::Pattern;
use crate::config::DoctorConfig;
use crate::context::ContextStore;
use crate::core::{Dialect, ErrorClass, ErrorRecord, Subject};
use crate::corruption::{
    BatchBaseline, CorruptionDetector, CorruptionEvent, CorruptionReason, ToolCheck,
    ValidationResult, ValidationStatus,
};
use crate::fixers::edit::display_path;
use crate::fixers::{BackupStore, Change, FixEnv, FixReport, FixerRegistry};
use crate::inference::{ClassifiedIntent, IntentInference, StrategySelector};
use crate::io::FileSystem;
use crate::parser::{describe_code, ErrorStatistics};
use crate::session::{self, FixBatch, Session, SessionTally};
use crate::tool::{ToolInvocation, ToolRunner};
use crate::vcs::{VcsError, VersionControl};
use chrono::Utc;
use escalation::PromptInput;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot fix without a rollback path: {0}")]
    NoCheckpoint(#[source] VcsError),

    #[error("no version control available; use --dry-run, or --test-mode on a disposable tree")]
    NoVersionControl,

    #[error("initial analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("nothing selected to fix; pass an error code or ask for all error types")]
    NoScope,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixOptions {
    /// Restrict the session to one error code
    pub only_code: Option<String>,
    /// Every error type with a fixer; one of this or `only_code` is required
    pub all: bool,
    pub dry_run: bool,
    /// Skip the checkpoint; for disposable fixture trees
    pub test_mode: bool,
    pub assist: bool,
}

/// Result of one `analyze` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analysis {
    pub records: Vec<ErrorRecord>,
    pub statistics: ErrorStatistics,
    /// Import-shape breakdown per code, for records about modules
    pub patterns: BTreeMap<String, BTreeMap<Pattern, usize>>,
    /// Why the tool run produced nothing usable
    pub failure: Option<String>,
}

/// How one error-class batch ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub class: ErrorClass,
    pub codes: Vec<String>,
    pub fixed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `None` when nothing was written (dry-run or no applicable edit)
    pub status: Option<ValidationStatus>,
    pub reason: Option<CorruptionReason>,
    pub baseline_count: usize,
    pub new_count: Option<usize>,
    pub commit: Option<String>,
}

impl BatchOutcome {
    pub fn is_corrupted(&self) -> bool {
        self.status == Some(ValidationStatus::Corrupted)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub dialect: Option<Dialect>,
    pub dry_run: bool,
    pub checkpointed: bool,
    pub initial_count: usize,
    pub final_count: Option<usize>,
    pub batches: Vec<BatchOutcome>,
    /// Changes that survived validation (or were previewed, in dry-run)
    pub changes: Vec<Change>,
    pub install_list: Vec<String>,
    pub notes: Vec<String>,
    pub corruptions: Vec<CorruptionEvent>,
    /// A corrupted batch could not be restored; the tree needs `rollback --full`
    pub unrecoverable: bool,
    pub unfixable: Vec<ErrorRecord>,
    pub escalations: Vec<CollaborationEntry>,
    pub intents: Vec<ClassifiedIntent>,
    pub commits: usize,
    pub fix_branch: Option<String>,
    pub elapsed_ms: u64,
}

impl SessionReport {
    pub fn exit_code(&self) -> i32 {
        if self.unrecoverable {
            1
        } else {
            0
        }
    }
}

/// Group records by error class in discovery order, priority codes first.
pub fn plan_groups(
    dialect: Dialect,
    records: &[ErrorRecord],
    priority: &[String],
    only_code: Option<&str>,
) -> Vec<(ErrorClass, Vec<ErrorRecord>)> {
    let mut groups: Vec<(ErrorClass, Vec<ErrorRecord>)> = Vec::new();
    for record in records {
        if only_code.is_some_and(|code| record.code != code) {
            continue;
        }
        let class = ErrorClass::of(dialect, &record.code);
        match groups.iter_mut().find(|(c, _)| *c == class) {
            Some((_, group)) => group.push(record.clone()),
            None => groups.push((class, vec![record.clone()])),
        }
    }

    let rank = |group: &[ErrorRecord]| {
        group
            .iter()
            .filter_map(|r| priority.iter().position(|p| *p == r.code))
            .min()
            .unwrap_or(usize::MAX)
    };
    // Stable: unranked groups keep discovery order.
    groups.sort_by_key(|(_, group)| rank(group));
    groups
}

/// `(code, count)` for the commit message of one batch.
fn commit_counts(group: &[ErrorRecord], report: &FixReport) -> Vec<(String, usize)> {
    let stats = ErrorStatistics::from_records(group);
    if stats.by_code.len() == 1 {
        return vec![(stats.by_code[0].0.clone(), report.fixed)];
    }
    stats.by_code
}

pub struct Orchestrator<'a> {
    session: Session,
    config: DoctorConfig,
    invocation: ToolInvocation,
    runner: &'a dyn ToolRunner,
    fs: &'a dyn FileSystem,
    vcs: Option<Box<dyn VersionControl>>,
    assist: Option<AssistChannel>,
    tally: SessionTally,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        session: Session,
        config: DoctorConfig,
        runner: &'a dyn ToolRunner,
        fs: &'a dyn FileSystem,
    ) -> Self {
        let invocation = config.invocation(session.dialect);
        Self {
            session,
            config,
            invocation,
            runner,
            fs,
            vcs: None,
            assist: None,
            tally: SessionTally::new(),
        }
    }

    pub fn with_vcs(mut self, vcs: Box<dyn VersionControl>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn with_assist(mut self, channel: AssistChannel) -> Self {
        self.assist = Some(channel);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn invocation(&self) -> &ToolInvocation {
        &self.invocation
    }

    fn context(&self) -> ContextStore {
        ContextStore::build_with(self.session.project_root(), &self.config.inference)
    }

    fn detector(&self) -> CorruptionDetector<'_> {
        CorruptionDetector::new(
            self.session.dialect,
            &self.invocation,
            self.runner,
            self.session.project_root(),
            self.session.corruption_log_path(),
        )
    }

    /// Run the tool once, parse and classify. Never fails.
    pub fn analyze(&self) -> Analysis {
        let (records, failure) = match self.detector().check() {
            ToolCheck::Counted(records) => (records, None),
            ToolCheck::Failed { reason, .. } => (Vec::new(), Some(reason)),
        };

        let context = self.context();
        let inference = IntentInference::new(&context, &self.config.inference.alias_prefix);
        let mut patterns: BTreeMap<String, BTreeMap<Pattern, usize>> = BTreeMap::new();
        for record in &records {
            if let Some(Subject::Module { specifier }) = &record.subject {
                let pattern = inference.classifier().classify(specifier);
                *patterns
                    .entry(record.code.clone())
                    .or_default()
                    .entry(pattern)
                    .or_default() += 1;
            }
        }

        Analysis {
            statistics: ErrorStatistics::from_records(&records),
            records,
            patterns,
            failure,
        }
    }

    /// The whole pipeline. Errors only for conditions that stop it before any write.
    pub fn run(&mut self, options: &FixOptions) -> Result<SessionReport, PipelineError> {
        self.tally.reset();
        if !options.all && options.only_code.is_none() {
            return Err(PipelineError::NoScope);
        }
        let dialect = self.session.dialect;
        let mut report = SessionReport {
            session_id: self.session.id.clone(),
            dialect: Some(dialect),
            dry_run: options.dry_run,
            ..Default::default()
        };

        if !options.dry_run && !options.test_mode {
            let vcs = self.vcs.as_mut().ok_or(PipelineError::NoVersionControl)?;
            let state = vcs
                .create_checkpoint(&self.session.id)
                .map_err(PipelineError::NoCheckpoint)?;
            log::info!(
                "Checkpoint {} on {} (baseline {})",
                state.session_id,
                state.fix_branch,
                state.short_baseline()
            );
            report.checkpointed = true;
            report.fix_branch = Some(state.fix_branch);
        }

        let initial = self.detector().check();
        let mut records = match initial {
            ToolCheck::Counted(records) => records,
            ToolCheck::Failed { reason, .. } => {
                if report.checkpointed {
                    self.end_session(&mut report);
                }
                return Err(PipelineError::AnalysisFailed(reason));
            }
        };
        report.initial_count = records.len();
        log::info!("{} errors before fixing", records.len());

        let context = self.context();
        let fixers = FixerRegistry::for_dialect(dialect);
        let only_code = options.only_code.as_deref();
        let mut processed: BTreeSet<ErrorClass> = BTreeSet::new();

        loop {
            let next = plan_groups(dialect, &records, &self.config.orchestrator.priority, only_code)
                .into_iter()
                .find(|(class, _)| fixers.has(class) && !processed.contains(class));
            let Some((class, group)) = next else {
                break;
            };
            processed.insert(class.clone());
            let batch_index = self.tally.next_batch();

            if options.dry_run {
                report.intents.extend(self.preview_intents(&context, &group));
            }

            let Some(fixer) = fixers.get(&class) else {
                continue;
            };
            log::info!("Batch {batch_index}: {} ({} errors)", class, group.len());

            let backups = BackupStore::new(
                self.session.project_root(),
                self.session.batch_backup_dir(batch_index, &class.to_string()),
            );
            let env = FixEnv {
                project_root: self.session.project_root(),
                context: &context,
                fs: self.fs,
                backups: &backups,
                selector: StrategySelector::new(self.config.inference.confidence_threshold),
                alias_prefix: &self.config.inference.alias_prefix,
                dry_run: options.dry_run,
            };
            let fix_report = fixer.fix_errors(&group, &env);
            let outcome = self.settle_batch(
                batch_index,
                &class,
                &group,
                fix_report,
                &backups,
                &mut records,
                &mut report,
            );
            report.batches.push(outcome);

            if report.unrecoverable {
                log::error!("Restoration failed; stopping the session");
                break;
            }
        }

        report.unfixable = records
            .iter()
            .filter(|r| only_code.is_none_or(|code| r.code == code))
            .filter(|r| !fixers.has(&ErrorClass::of(dialect, &r.code)))
            .cloned()
            .collect();

        if options.assist && !options.dry_run && !report.unrecoverable {
            self.escalate(&context, &mut records, &mut report);
        }

        if !options.dry_run {
            report.final_count = Some(records.len());
        }
        if report.checkpointed {
            self.end_session(&mut report);
        }
        report.elapsed_ms = u64::try_from(self.tally.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Session {} finished {} batch(es) in {}ms",
            report.session_id,
            self.tally.batches(),
            report.elapsed_ms
        );
        Ok(report)
    }

    fn preview_intents(&self, context: &ContextStore, group: &[ErrorRecord]) -> Vec<ClassifiedIntent> {
        let inference = IntentInference::new(context, &self.config.inference.alias_prefix);
        group
            .iter()
            .filter_map(|record| match &record.subject {
                Some(Subject::Module { specifier }) => {
                    Some(inference.infer(specifier, &record.file).at_line(record.line))
                }
                _ => None,
            })
            .collect()
    }

    /// Commit, validate and log one applied batch.
    #[allow(clippy::too_many_arguments)]
    fn settle_batch(
        &mut self,
        batch_index: usize,
        class: &ErrorClass,
        group: &[ErrorRecord],
        fix_report: FixReport,
        backups: &BackupStore,
        records: &mut Vec<ErrorRecord>,
        report: &mut SessionReport,
    ) -> BatchOutcome {
        let files: Vec<PathBuf> = fix_report.files_modified.iter().cloned().collect();
        let mut outcome = BatchOutcome {
            class: class.clone(),
            codes: ErrorStatistics::from_records(group)
                .by_code
                .into_iter()
                .map(|(code, _)| code)
                .collect(),
            fixed: fix_report.fixed,
            failed: fix_report.failed,
            skipped: fix_report.skipped,
            status: None,
            reason: None,
            baseline_count: records.len(),
            new_count: None,
            commit: None,
        };

        if report.dry_run || files.is_empty() {
            report.merge_kept(fix_report);
            return outcome;
        }

        let mut batch = FixBatch::new(format!("{batch_index:02}"), class.clone(), records.len());
        batch.mark_applied(
            files.iter().cloned(),
            fix_report.fixed,
            fix_report.failed,
            fix_report.skipped,
        );

        let baseline = BatchBaseline::measure(records, &files, self.session.project_root());
        let counts = commit_counts(group, &fix_report);
        let commit = self.commit(&files, &class.to_string(), &counts, report.checkpointed);
        let validation = self.validate(commit.as_deref(), &files, baseline, backups);

        batch.commit_ref = commit.clone();
        batch.settle(validation.new_count, validation.is_corrupted());
        if let Err(e) = session::append_log(&self.session.fix_history_path(), &batch) {
            log::warn!("Could not record batch {}: {e}", batch.batch_id);
        }

        outcome.status = Some(validation.status);
        outcome.reason = validation.reason;
        outcome.new_count = validation.new_count;
        outcome.commit = commit;
        if validation.is_corrupted() {
            // A reverted batch fixed nothing.
            outcome.failed += outcome.fixed;
            outcome.fixed = 0;
            outcome.commit = None;
            report.notes.extend(fix_report.notes);
        } else {
            report.merge_kept(fix_report);
        }
        self.absorb(validation, records, report);
        outcome
    }

    fn commit(
        &mut self,
        files: &[PathBuf],
        label: &str,
        counts: &[(String, usize)],
        checkpointed: bool,
    ) -> Option<String> {
        if !checkpointed {
            return None;
        }
        let vcs = self.vcs.as_mut()?;
        match vcs.commit_fix_batch(files, label, counts) {
            Ok(Some(commit)) => {
                log::info!("Committed {} as {}", label, crate::vcs::short_id(&commit.commit));
                Some(commit.commit)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Could not commit batch {label}: {e}; validating uncommitted");
                None
            }
        }
    }

    fn validate(
        &mut self,
        commit: Option<&str>,
        files: &[PathBuf],
        baseline: BatchBaseline,
        backups: &BackupStore,
    ) -> ValidationResult {
        let detector = CorruptionDetector::new(
            self.session.dialect,
            &self.invocation,
            self.runner,
            self.session.project_root(),
            self.session.corruption_log_path(),
        );
        let vcs: Option<&mut dyn VersionControl> = match self.vcs.as_mut() {
            Some(vcs) => Some(&mut **vcs),
            None => None,
        };
        detector.validate_fix_batch(commit, files, baseline, backups, vcs)
    }

    /// Fold a validation result into the running record set and report.
    fn absorb(&self, validation: ValidationResult, records: &mut Vec<ErrorRecord>, report: &mut SessionReport) {
        if let Some(current) = validation.records {
            *records = current;
        }
        if let Some(event) = validation.event {
            if !event.success {
                report.unrecoverable = true;
            }
            report.corruptions.push(event);
        }
    }

    /// Hand remaining unfixable errors to the assistant, one at a time.
    fn escalate(
        &mut self,
        context: &ContextStore,
        records: &mut Vec<ErrorRecord>,
        report: &mut SessionReport,
    ) {
        let Some(channel) = self.assist.take() else {
            return;
        };
        let root = self.session.project_root().to_path_buf();
        let assistant = detect_assistant(&root);
        let candidates: Vec<ErrorRecord> = report.unfixable.clone();

        for error in candidates {
            if !self.tally.try_request(self.config.assist.max_requests) {
                log::info!(
                    "Assistance limit of {} reached; {} error(s) left for manual review",
                    self.config.assist.max_requests,
                    report.unfixable.len().saturating_sub(self.tally.assist_requests())
                );
                break;
            }
            let path = error.path_in(&root);
            let source = self.fs.read_to_string(&path).ok();
            let reasoning = vec![
                format!("{} ({}) has no automatic fixer", error.code, describe_code(&error.code)),
                format!("Classified as {}", ErrorClass::of(self.session.dialect, &error.code)),
            ];
            let prompt = escalation::render_prompt(
                &PromptInput {
                    dialect: self.session.dialect,
                    error: &error,
                    reasoning: &reasoning,
                    assistant: &assistant,
                    source: source.as_deref(),
                },
                context,
            );
            let prompt_path = match escalation::write_prompt(&self.session.prompts_dir(), &error, &prompt) {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("Skipping escalation of {}:{}: {e}", error.file, error.line);
                    continue;
                }
            };

            let batch_index = self.tally.next_batch();
            let backups = BackupStore::new(
                &root,
                self.session
                    .batch_backup_dir(batch_index, &format!("assist-{}-{}", error.line, error.code)),
            );
            if let Some(source) = &source {
                if let Err(e) = backups.backup(self.fs, &path, source) {
                    log::warn!("Could not back up {}: {e}", path.display());
                }
            }

            let ack = channel.request(AssistanceRequest {
                error: error.clone(),
                prompt_path: prompt_path.clone(),
                assistant: assistant.clone(),
                reasoning,
            });

            let mut entry = CollaborationEntry {
                timestamp: Utc::now(),
                code: error.code.clone(),
                file: error.file.clone(),
                line: error.line,
                assistant: assistant.clone(),
                prompt: display_path(&root, &prompt_path),
                outcome: CollaborationOutcome::Disconnected,
                files: Vec::new(),
                validation: None,
            };

            let stop = match ack {
                None => true,
                Some(Acknowledgement::Skipped) => {
                    entry.outcome = CollaborationOutcome::Skipped;
                    false
                }
                Some(Acknowledgement::Applied { files }) => {
                    let files: Vec<PathBuf> = files
                        .into_iter()
                        .map(|f| if f.is_absolute() { f } else { root.join(f) })
                        .collect();
                    entry.outcome = CollaborationOutcome::Applied;
                    entry.files = files.iter().map(|f| display_path(&root, f)).collect();

                    let baseline = BatchBaseline::measure(records, &files, &root);
                    let label = format!("assist {}:{}", error.file, error.line);
                    let counts = vec![(error.code.clone(), 1)];
                    let commit = self.commit(&files, &label, &counts, report.checkpointed);
                    let validation = self.validate(commit.as_deref(), &files, baseline, &backups);
                    entry.validation = Some(validation.status);
                    self.absorb(validation, records, report);
                    report.unrecoverable
                }
            };

            if let Err(e) = session::append_log(&self.session.collaboration_log_path(), &entry) {
                log::warn!("Could not record collaboration: {e}");
            }
            report.escalations.push(entry);
            if stop {
                break;
            }
        }

        self.assist = Some(channel);
    }

    /// Leave a session with no surviving commits the way it was found.
    fn end_session(&mut self, report: &mut SessionReport) {
        let Some(vcs) = self.vcs.as_mut() else {
            return;
        };
        report.commits = vcs.state().map(|s| s.commits.len()).unwrap_or(0);
        if report.commits > 0 || report.unrecoverable {
            return;
        }
        match vcs.rollback_to_baseline() {
            Ok(()) => {
                log::info!("No batch commits kept; returned to the original branch");
                report.fix_branch = None;
            }
            Err(e) => log::warn!("Could not return to the original branch: {e}"),
        }
    }
}

impl SessionReport {
    fn merge_kept(&mut self, fix_report: FixReport) {
        self.changes.extend(fix_report.changes);
        for package in fix_report.install_list {
            if !self.install_list.contains(&package) {
                self.install_list.push(package);
            }
        }
        self.notes.extend(fix_report.notes);
    }
}
