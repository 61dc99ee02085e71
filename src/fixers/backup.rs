//! Pre-write backups, namespaced per session and batch.
//!
//! The directory is append-only: a backup is written once, before the first
//! write to a file within the batch, and never overwritten.

use crate::io::FileSystem;
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupEntry {
    /// The file existed; its original content lives at `backup`
    Copied { original: PathBuf, backup: PathBuf },
    /// The file did not exist before the batch created it
    Created { original: PathBuf },
}

impl BackupEntry {
    pub fn original(&self) -> &Path {
        match self {
            Self::Copied { original, .. } | Self::Created { original } => original,
        }
    }
}

#[derive(Debug)]
pub struct BackupStore {
    project_root: PathBuf,
    root: PathBuf,
    entries: RefCell<Vec<BackupEntry>>,
}

impl BackupStore {
    /// `root` is the batch directory, e.g. `.atd/backups/<session>/<batch>`.
    pub fn new(project_root: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            root: root.into(),
            entries: RefCell::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the backup of `original` lives, mirroring the project layout.
    pub fn backup_path(&self, original: &Path) -> PathBuf {
        let relative = original.strip_prefix(&self.project_root).unwrap_or(original);
        let mirrored: PathBuf = relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.root.join(mirrored)
    }

    fn is_tracked(&self, original: &Path) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|entry| entry.original() == original)
    }

    /// Copy the pre-write content aside. Only the first call per file counts.
    pub fn backup(&self, fs: &dyn FileSystem, original: &Path, content: &str) -> io::Result<PathBuf> {
        let backup = self.backup_path(original);
        if self.is_tracked(original) {
            return Ok(backup);
        }
        if let Some(parent) = backup.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.write(&backup, content)?;
        log::debug!("Backed up {} to {}", original.display(), backup.display());
        self.entries.borrow_mut().push(BackupEntry::Copied {
            original: original.to_path_buf(),
            backup: backup.clone(),
        });
        Ok(backup)
    }

    /// Note that `original` is about to be created from nothing.
    pub fn record_created(&self, original: &Path) {
        if !self.is_tracked(original) {
            self.entries.borrow_mut().push(BackupEntry::Created {
                original: original.to_path_buf(),
            });
        }
    }

    pub fn entries(&self) -> Vec<BackupEntry> {
        self.entries.borrow().clone()
    }

    pub fn entry_for(&self, original: &Path) -> Option<BackupEntry> {
        self.entries
            .borrow()
            .iter()
            .find(|entry| entry.original() == original)
            .cloned()
    }

    /// Put one file back the way it was before the batch.
    pub fn restore(&self, entry: &BackupEntry) -> io::Result<()> {
        match entry {
            BackupEntry::Copied { original, backup } => {
                fs::copy(backup, original)?;
            }
            BackupEntry::Created { original } => {
                if original.exists() {
                    fs::remove_file(original)?;
                }
            }
        }
        Ok(())
    }
}
