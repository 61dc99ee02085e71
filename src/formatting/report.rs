//! Human-readable output of `analyze`, `fix` and `status`.

use super::OutputFormatter;
use crate::core::{Dialect, ErrorClass};
use crate::corruption::ValidationStatus;
use crate::fixers::FixerRegistry;
use crate::orchestrator::{Analysis, BatchOutcome, CollaborationOutcome, SessionReport};
use crate::parser::describe_code;
use crate::vcs::GitState;
use comfy_table::{CellAlignment, ContentArrangement, Table};
use std::fmt::Write;

const BIN: &str = "asymm-doctor";

fn new_table(fmt: &dyn OutputFormatter, header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(fmt.table_preset())
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn align_numbers(table: &mut Table, columns: std::ops::Range<usize>) {
    for index in columns {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
}

/// `analyze` summary: one row per code, most frequent first.
pub fn render_analysis(analysis: &Analysis, dialect: Dialect, fmt: &dyn OutputFormatter) -> String {
    let mut out = String::new();
    let stats = &analysis.statistics;
    let _ = writeln!(
        out,
        "{}",
        fmt.header(&format!(
            "{} analysis: {} errors in {} files",
            dialect.short_name().to_uppercase(),
            stats.total,
            stats.files_affected
        ))
    );

    if let Some(failure) = &analysis.failure {
        let _ = writeln!(
            out,
            "{}",
            fmt.warning(&format!("Tool check failed ({failure}); no diagnostics were recorded"))
        );
        return out;
    }
    if stats.total == 0 {
        let _ = writeln!(out, "{}", fmt.success("No errors reported"));
        return out;
    }

    let fixers = FixerRegistry::for_dialect(dialect);
    let mut auto = 0;
    let mut table = new_table(fmt, vec!["Code", "Count", "Description", "Patterns", "Status"]);
    for (code, count) in &stats.by_code {
        let patterns = analysis
            .patterns
            .get(code)
            .map(|by_pattern| {
                by_pattern
                    .iter()
                    .map(|(pattern, n)| format!("{pattern}: {n}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let fixable = fixers.has(&ErrorClass::of(dialect, code));
        if fixable {
            auto += count;
        }
        table.add_row(vec![
            code.clone(),
            count.to_string(),
            describe_code(code).to_string(),
            patterns,
            if fixable { "AUTO-FIXABLE" } else { "ESCALATE" }.to_string(),
        ]);
    }
    align_numbers(&mut table, 1..2);
    let _ = writeln!(out, "{table}");
    let _ = writeln!(
        out,
        "{} auto-fixable, {} need escalation",
        fmt.success(&auto.to_string()),
        fmt.warning(&(stats.total - auto).to_string())
    );
    out
}

fn batch_result(batch: &BatchOutcome, dry_run: bool) -> String {
    match batch.status {
        Some(ValidationStatus::Corrupted) => "FAILED (reverted)".to_string(),
        Some(status) => status.to_string(),
        None if dry_run => "PREVIEW".to_string(),
        None => "-".to_string(),
    }
}

fn signed_delta(before: usize, after: usize) -> String {
    if after >= before {
        format!("+{}", after - before)
    } else {
        format!("-{}", before - after)
    }
}

/// Final report of a `fix` session.
pub fn render_session(report: &SessionReport, fmt: &dyn OutputFormatter, verbose: bool) -> String {
    let mut out = String::new();
    let name = report
        .dialect
        .map(|d| d.short_name().to_uppercase())
        .unwrap_or_default();
    let mode = if report.dry_run { " (dry run)" } else { "" };
    let _ = writeln!(
        out,
        "{}",
        fmt.header(&format!("{name} fix session {}{mode}", report.session_id))
    );

    for event in &report.corruptions {
        let counts = match event.new_count {
            Some(new) => format!(
                "errors {} -> {new} ({})",
                event.baseline_count,
                signed_delta(event.baseline_count, new)
            ),
            None => format!("tool check failed at baseline {}", event.baseline_count),
        };
        let line = if event.success {
            format!("CORRUPTION DETECTED, reverted: {} [{}]", counts, event.reason)
        } else {
            format!(
                "CORRUPTION DETECTED, restore FAILED: {} [{}]. Run `{BIN} rollback --full`",
                counts, event.reason
            )
        };
        let _ = writeln!(out, "{}", fmt.error(&line));
    }

    if report.batches.is_empty() {
        let _ = writeln!(out, "No auto-fixable errors found");
    } else {
        let mut table = new_table(fmt, vec!["Error type", "Codes", "Fixed", "Failed", "Skipped", "Result"]);
        for batch in &report.batches {
            table.add_row(vec![
                batch.class.to_string(),
                batch.codes.join(", "),
                batch.fixed.to_string(),
                batch.failed.to_string(),
                batch.skipped.to_string(),
                batch_result(batch, report.dry_run),
            ]);
        }
        align_numbers(&mut table, 2..5);
        let _ = writeln!(out, "{table}");
    }

    if !report.changes.is_empty() {
        let heading = if report.dry_run { "Would change:" } else { "Applied changes:" };
        let _ = writeln!(out, "{}", fmt.bold(heading));
        for change in &report.changes {
            let _ = writeln!(
                out,
                "  {}:{}  {} -> {}  {}",
                change.file,
                change.line,
                change.old.trim(),
                change.new.trim(),
                fmt.dim(&format!("({:.2}, {})", change.confidence, change.note))
            );
        }
    }

    if verbose && !report.intents.is_empty() {
        let _ = writeln!(out, "{}", fmt.bold("Inferred intents:"));
        for intent in &report.intents {
            let _ = writeln!(
                out,
                "  {}:{} '{}' {} ({}) -> {} {:.2}: {}",
                intent.file,
                intent.line,
                intent.subject,
                intent.pattern,
                intent.pattern.description(),
                intent.action,
                intent.confidence,
                intent.pattern.action_hint()
            );
        }
    }

    if verbose && !report.notes.is_empty() {
        let _ = writeln!(out, "{}", fmt.bold("Notes:"));
        for note in &report.notes {
            let _ = writeln!(out, "  {}", fmt.dim(note));
        }
    }

    if !report.install_list.is_empty() {
        let _ = writeln!(
            out,
            "{} npm install {}",
            fmt.warning("Packages to install (not run automatically):"),
            report.install_list.join(" ")
        );
    }

    if !report.unfixable.is_empty() {
        let _ = writeln!(
            out,
            "{} errors have no automatic fixer{}",
            report.unfixable.len(),
            if report.escalations.is_empty() {
                format!("; `{BIN} fix --all --assist` prepares prompts for them")
            } else {
                String::new()
            }
        );
    }
    if !report.escalations.is_empty() {
        let applied = report
            .escalations
            .iter()
            .filter(|e| e.outcome == CollaborationOutcome::Applied)
            .count();
        let _ = writeln!(
            out,
            "Assistance: {} requested, {} applied, {} skipped",
            report.escalations.len(),
            applied,
            report.escalations.len() - applied
        );
    }

    match report.final_count {
        Some(after) => {
            let line = format!(
                "Errors: {} -> {after} ({})",
                report.initial_count,
                signed_delta(report.initial_count, after)
            );
            let styled = if after < report.initial_count {
                fmt.success(&line)
            } else {
                fmt.bold(&line)
            };
            let _ = writeln!(out, "{styled}");
        }
        None => {
            let _ = writeln!(out, "Errors: {} (nothing written)", report.initial_count);
        }
    }

    if report.commits > 0 {
        let branch = report.fix_branch.as_deref().unwrap_or("the fix branch");
        let _ = writeln!(
            out,
            "{} batch commit(s) on {branch}. Undo the last batch: `{BIN} rollback --last`; undo the session: `{BIN} rollback --full`",
            report.commits
        );
    }
    out
}

pub fn render_status(state: Option<&GitState>, fmt: &dyn OutputFormatter) -> String {
    let Some(state) = state else {
        return "No active fix session\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(out, "{}", fmt.header(&format!("Session {}", state.session_id)));
    let _ = writeln!(out, "  Baseline:        {}", state.short_baseline());
    let _ = writeln!(out, "  Original branch: {}", state.original_branch);
    let _ = writeln!(out, "  Fix branch:      {}", state.fix_branch);
    let _ = writeln!(out, "  Stashed changes: {}", if state.stashed { "yes" } else { "no" });
    if state.commits.is_empty() {
        let _ = writeln!(out, "  No batch commits");
        return out;
    }
    let mut table = new_table(fmt, vec!["Commit", "Batch", "Fixes", "Time"]);
    for commit in &state.commits {
        table.add_row(vec![
            crate::vcs::short_id(&commit.commit).to_string(),
            commit.batch_name.clone(),
            commit.fixes_count.to_string(),
            commit.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    let _ = writeln!(out, "{table}");
    out
}
