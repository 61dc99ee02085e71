//! Session-scoped state on disk: `.atd/`, `.abd/` or `.ald/`.
//!
//! ```text
//! .atd/
//!   registry.json            error registry from the last `analyze`
//!   fix-history.json         append-only batch summaries
//!   corruption-log.json      append-only corruption events
//!   git-state.json           checkpoint and batch commits
//!   backups/<session>/<batch>/...
//!   ai-prompts/error-<line>-<code>.md
//!   collaboration-log.json
//! ```

pub mod history;
pub mod registry;
pub mod tally;

pub use history::{BatchStatus, FixBatch};
pub use registry::{CodeCount, ErrorRegistry};
pub use tally::SessionTally;

use crate::core::errors::{Error, Result};
use crate::core::Dialect;
use crate::vcs::STATE_FILE;
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const REGISTRY_FILE: &str = "registry.json";
pub const FIX_HISTORY_FILE: &str = "fix-history.json";
pub const CORRUPTION_LOG_FILE: &str = "corruption-log.json";
pub const COLLABORATION_LOG_FILE: &str = "collaboration-log.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub dialect: Dialect,
    project_root: PathBuf,
    dir: PathBuf,
}

impl Session {
    /// A new session id from the local time, e.g. `20261019-143005`.
    pub fn new(project_root: &Path, dialect: Dialect) -> Self {
        let id = Local::now().format("%Y%m%d-%H%M%S").to_string();
        Self::with_id(project_root, dialect, id)
    }

    pub fn with_id(project_root: &Path, dialect: Dialect, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dialect,
            project_root: project_root.to_path_buf(),
            dir: project_root.join(dialect.session_dir_name()),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE)
    }

    pub fn fix_history_path(&self) -> PathBuf {
        self.dir.join(FIX_HISTORY_FILE)
    }

    pub fn corruption_log_path(&self) -> PathBuf {
        self.dir.join(CORRUPTION_LOG_FILE)
    }

    pub fn git_state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn collaboration_log_path(&self) -> PathBuf {
        self.dir.join(COLLABORATION_LOG_FILE)
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.dir.join("ai-prompts")
    }

    /// Backup directory of one batch; batches never share a directory.
    pub fn batch_backup_dir(&self, batch_index: usize, label: &str) -> PathBuf {
        let label: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir
            .join("backups")
            .join(&self.id)
            .join(format!("{batch_index:02}-{label}"))
    }
}

/// Read an append-only JSON array log; a missing file is an empty log.
pub fn read_log<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).map_err(|e| Error::file_system("Failed to read log", path, e))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&text)?)
}

/// Append one entry; earlier entries are never rewritten or dropped.
pub fn append_log<T: Serialize + ?Sized>(path: &Path, entry: &T) -> Result<()> {
    let mut entries: Vec<serde_json::Value> = read_log(path)?;
    entries.push(serde_json::to_value(entry)?);
    write_pretty(path, &entries)
}

pub fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::file_system("Failed to create directory", parent, e))?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| Error::file_system("Failed to write", path, e))
}
