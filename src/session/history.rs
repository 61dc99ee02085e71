//! Fix batches and the append-only `fix-history.json`.

use crate::core::ErrorClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `Pending -> Applied -> Validated | Reverted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Applied,
    Validated,
    Reverted,
}

/// The file mutations for one error-type group, validated as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixBatch {
    pub batch_id: String,
    pub error_type: ErrorClass,
    pub label: String,
    pub files_modified: Vec<PathBuf>,
    pub baseline_error_count: usize,
    pub post_fix_error_count: Option<usize>,
    pub commit_ref: Option<String>,
    pub status: BatchStatus,
    pub fixed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timestamp: DateTime<Utc>,
}

impl FixBatch {
    pub fn new(batch_id: impl Into<String>, error_type: ErrorClass, baseline_error_count: usize) -> Self {
        let label = error_type.to_string();
        Self {
            batch_id: batch_id.into(),
            error_type,
            label,
            files_modified: Vec::new(),
            baseline_error_count,
            post_fix_error_count: None,
            commit_ref: None,
            status: BatchStatus::Pending,
            fixed: 0,
            failed: 0,
            skipped: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn mark_applied(&mut self, files: impl IntoIterator<Item = PathBuf>, fixed: usize, failed: usize, skipped: usize) {
        self.files_modified = files.into_iter().collect();
        self.fixed = fixed;
        self.failed = failed;
        self.skipped = skipped;
        self.status = BatchStatus::Applied;
    }

    /// Record the validation outcome. Only an applied batch can settle.
    pub fn settle(&mut self, post_fix_error_count: Option<usize>, reverted: bool) {
        debug_assert_eq!(self.status, BatchStatus::Applied);
        self.post_fix_error_count = post_fix_error_count;
        self.status = if reverted {
            BatchStatus::Reverted
        } else {
            BatchStatus::Validated
        };
    }
}
