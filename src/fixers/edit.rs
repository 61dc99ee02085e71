//! Shared read-once, edit, back-up, write-once discipline for every fixer.

use super::{Change, FixEnv, FixError, FixReport};
use crate::core::ErrorRecord;
use crate::io::{strip_json_comments, strip_trailing_commas};
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of editing one error inside a file buffer.
#[derive(Debug)]
pub enum Edit {
    Applied(Vec<Change>),
    /// Fixed by an earlier edit of the same buffer
    Covered,
    Skipped(String),
}

impl Edit {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

/// A file's lines, split on `\n` so that joining restores the exact bytes.
#[derive(Debug, Clone)]
pub struct Buffer {
    lines: Vec<String>,
}

impl Buffer {
    pub fn new(content: &str) -> Self {
        Self {
            lines: content.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 1-based line access; `\r` is kept out of the view.
    pub fn line(&self, number: usize) -> Option<&str> {
        let raw = self.lines.get(number.checked_sub(1)?)?;
        Some(raw.strip_suffix('\r').unwrap_or(raw))
    }

    /// Replace a 1-based line, keeping its original line ending.
    pub fn set_line(&mut self, number: usize, content: &str) -> bool {
        let Some(slot) = number.checked_sub(1).and_then(|i| self.lines.get_mut(i)) else {
            return false;
        };
        let cr = if slot.ends_with('\r') { "\r" } else { "" };
        *slot = format!("{content}{cr}");
        true
    }

    pub fn lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, l)| (i + 1, l.strip_suffix('\r').unwrap_or(l)))
    }

    /// Rewrite one line through `f` and describe the change; `None` if unchanged.
    pub fn rewrite_line<F>(&mut self, number: usize, confidence: f64, note: &str, f: F) -> Option<Change>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let old = self.line(number)?.to_string();
        let new = f(&old)?;
        if new == old {
            return None;
        }
        self.set_line(number, &new);
        Some(Change::new(number, old, new, confidence, note))
    }
}

/// Errors grouped by file in first-seen order.
pub fn group_by_file(errors: &[ErrorRecord]) -> Vec<(String, Vec<&ErrorRecord>)> {
    let mut groups: Vec<(String, Vec<&ErrorRecord>)> = Vec::new();
    for error in errors {
        match groups.iter_mut().find(|(file, _)| *file == error.file) {
            Some((_, group)) => group.push(error),
            None => groups.push((error.file.clone(), vec![error])),
        }
    }
    groups
}

/// Read each file once, apply every edit in memory, then back up and write once.
pub fn edit_files<F>(env: &FixEnv, errors: &[ErrorRecord], report: &mut FixReport, mut edit: F)
where
    F: FnMut(&ErrorRecord, &Path, &mut Buffer) -> Edit,
{
    for (file, group) in group_by_file(errors) {
        let path = env.project_root.join(&file);
        let original = match env.fs.read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("{}", FixError::Read { path: path.clone(), source: e });
                report.failed += group.len();
                continue;
            }
        };

        let mut buffer = Buffer::new(&original);
        let mut changes = Vec::new();
        let mut applied = 0;

        for error in group {
            match edit(error, &path, &mut buffer) {
                Edit::Applied(file_changes) if !file_changes.is_empty() => {
                    applied += 1;
                    changes.extend(file_changes);
                }
                Edit::Applied(_) => {
                    report.skip(error, "edit produced no change");
                }
                Edit::Covered => applied += 1,
                Edit::Skipped(reason) => report.skip(error, &reason),
            }
        }

        if applied == 0 {
            continue;
        }

        let updated = buffer.text();
        commit_file(env, &path, Some(&original), &updated, changes, applied, report);
    }
}

/// Back up, then write `updated`; restore `original` if the write fails.
pub fn commit_file(
    env: &FixEnv,
    path: &Path,
    original: Option<&str>,
    updated: &str,
    changes: Vec<Change>,
    error_count: usize,
    report: &mut FixReport,
) -> bool {
    let display = display_path(env.project_root, path);
    let changes: Vec<Change> = changes
        .into_iter()
        .map(|c| c.in_file(&display))
        .collect();

    if env.dry_run {
        report.fixed += error_count;
        report.changes.extend(changes);
        return true;
    }

    match original {
        Some(content) => {
            if let Err(e) = env.backups.backup(env.fs, path, content) {
                log::warn!("{}", FixError::Backup { path: path.to_path_buf(), source: e });
                report.failed += error_count;
                return false;
            }
        }
        None => env.backups.record_created(path),
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = env.fs.create_dir_all(parent) {
            log::warn!("{}", FixError::Write { path: path.to_path_buf(), source: e });
            report.failed += error_count;
            return false;
        }
    }

    if let Err(e) = env.fs.write(path, updated) {
        log::warn!("{}", FixError::Write { path: path.to_path_buf(), source: e });
        if let Some(content) = original {
            if let Err(restore) = env.fs.write(path, content) {
                log::error!("Failed to restore {}: {}", path.display(), restore);
            }
        }
        report.failed += error_count;
        return false;
    }

    report.fixed += error_count;
    report.files_modified.insert(path.to_path_buf());
    report.changes.extend(changes);
    true
}

/// Outcome of mutating a JSON document: the changes and how many errors they settle.
pub type JsonEdit = (Vec<Change>, usize);

/// Load a JSON object (missing file = empty object), mutate it, and write it
/// back with key order preserved. Comments in the original are not kept.
pub fn edit_json_document<F>(env: &FixEnv, path: &Path, error_count: usize, report: &mut FixReport, mutate: F)
where
    F: FnOnce(&mut Map<String, Value>) -> JsonEdit,
{
    let original = match env.fs.read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            log::warn!("{}", FixError::Read { path: path.to_path_buf(), source: e });
            report.failed += error_count;
            return;
        }
    };

    let mut document = match original.as_deref() {
        None => Map::new(),
        Some(text) => match serde_json::from_str(&strip_trailing_commas(&strip_json_comments(text))) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                let error = FixError::Manifest {
                    path: path.to_path_buf(),
                    message: "not a JSON object".to_string(),
                };
                log::warn!("{error}");
                report.failed += error_count;
                return;
            }
        },
    };

    let (changes, settled) = mutate(&mut document);
    if changes.is_empty() {
        return;
    }

    let mut updated = match serde_json::to_string_pretty(&Value::Object(document)) {
        Ok(text) => text,
        Err(e) => {
            log::warn!(
                "{}",
                FixError::Manifest {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            );
            report.failed += settled;
            return;
        }
    };
    updated.push('\n');
    commit_file(env, path, original.as_deref(), &updated, changes, settled, report);
}

pub fn display_path(project_root: &Path, path: &Path) -> String {
    path.strip_prefix(project_root)
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
