//! Version-control safety net: checkpoint, per-batch commits, rollback.
//!
//! Session lifecycle: no checkpoint, then a checkpoint (baseline recorded,
//! working changes stashed, fix branch checked out), then any number of
//! batch commits. Rollback is either surgical (revert the last batch commit)
//! or full (hard reset to the baseline and return to the original branch).

pub mod git;
pub mod state;

pub use git::GitSafety;
pub use state::{short_id, BatchCommit, GitState, STATE_FILE};

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("{0} is not inside a git repository")]
    NotARepository(PathBuf),

    #[error("no checkpoint exists for this session")]
    NoCheckpoint,

    #[error("no fix batch has been committed in this session")]
    NoBatchCommits,

    #[error("reverting would conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid session state: {0}")]
    State(String),
}

/// Commit summary line counts: `(error code, occurrences fixed)`.
pub type CodeCounts = [(String, usize)];

pub trait VersionControl {
    /// Record the baseline, stash working changes and open the fix branch.
    fn create_checkpoint(&mut self, session_id: &str) -> Result<GitState, VcsError>;

    /// Stage exactly `files` and commit them. `None` when nothing changed.
    fn commit_fix_batch(
        &mut self,
        files: &[PathBuf],
        label: &str,
        counts: &CodeCounts,
    ) -> Result<Option<BatchCommit>, VcsError>;

    /// Revert only the most recent batch commit.
    fn rollback_last_batch(&mut self) -> Result<BatchCommit, VcsError>;

    /// Hard reset to the baseline, back onto the original branch, stash re-applied.
    fn rollback_to_baseline(&mut self) -> Result<(), VcsError>;

    /// Put one file back to its committed content; untracked files are left alone.
    fn restore_file(&self, path: &Path) -> Result<(), VcsError>;

    fn state(&self) -> Option<&GitState>;
}

/// `"ATD: {label}"` plus a per-code breakdown and the baseline reference.
pub fn commit_message(prefix: &str, label: &str, counts: &CodeCounts, baseline: &str) -> String {
    let mut message = format!("{prefix}: {label}\n\nErrors fixed:\n");
    for (code, count) in counts {
        message.push_str(&format!("- {code}: {count} occurrences\n"));
    }
    message.push_str(&format!("\nBaseline: {}\n", short_id(baseline)));
    message
}
