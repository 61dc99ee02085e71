//! The persisted `git-state.json` of a fix session.

use super::VcsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const STATE_FILE: &str = "git-state.json";

/// One committed fix batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCommit {
    pub commit: String,
    pub batch_name: String,
    pub fixes_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitState {
    pub session_id: String,
    /// Recorded once at checkpoint time and never rewritten
    pub baseline_commit: String,
    pub original_branch: String,
    pub fix_branch: String,
    #[serde(default)]
    pub stashed: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub commits: Vec<BatchCommit>,
}

impl GitState {
    pub fn short_baseline(&self) -> &str {
        short_id(&self.baseline_commit)
    }

    pub fn last_commit(&self) -> Option<&BatchCommit> {
        self.commits.last()
    }

    pub fn load(path: &Path) -> Result<Option<Self>, VcsError> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| VcsError::State(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), VcsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|e| VcsError::State(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
