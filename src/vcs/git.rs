//! libgit2-backed implementation of [`VersionControl`].
//!
//! Like the rest of the crate's git access, a fresh [`Repository`] handle is
//! opened per operation; only the workdir path and the session state are kept.

use super::state::{BatchCommit, GitState};
use super::{commit_message, CodeCounts, VcsError, VersionControl};
use chrono::Utc;
use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode, Oid, Repository, ResetType, Signature};
use std::fs;
use std::path::{Path, PathBuf};

const FALLBACK_NAME: &str = "asymm-doctor";
const FALLBACK_EMAIL: &str = "asymm-doctor@localhost";

pub struct GitSafety {
    workdir: PathBuf,
    state_path: PathBuf,
    /// Short dialect tag (`atd`, `abd`, `ald`) used in branch names and commit subjects
    tag: String,
    state: Option<GitState>,
}

impl GitSafety {
    /// Discover the repository containing `project_root` and load any saved session state.
    pub fn open(project_root: &Path, state_path: impl Into<PathBuf>, tag: &str) -> Result<Self, VcsError> {
        let repo = Repository::discover(project_root)
            .map_err(|_| VcsError::NotARepository(project_root.to_path_buf()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| VcsError::NotARepository(project_root.to_path_buf()))?
            .to_path_buf();
        let state_path = state_path.into();
        let state = GitState::load(&state_path)?;

        Ok(Self {
            workdir,
            state_path,
            tag: tag.to_string(),
            state,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn open_repo(&self) -> Result<Repository, VcsError> {
        Ok(Repository::open(&self.workdir)?)
    }

    fn relative(&self, path: &Path) -> Result<PathBuf, VcsError> {
        if path.is_relative() {
            return Ok(path.to_path_buf());
        }
        if let Ok(rel) = path.strip_prefix(&self.workdir) {
            return Ok(rel.to_path_buf());
        }
        // tempdirs and symlinked checkouts only agree once canonicalized
        let workdir = self.workdir.canonicalize()?;
        let parent = path.parent().unwrap_or(path).canonicalize()?;
        let full = match path.file_name() {
            Some(name) => parent.join(name),
            None => parent,
        };
        full.strip_prefix(&workdir)
            .map(Path::to_path_buf)
            .map_err(|_| VcsError::State(format!("{} is outside the repository", path.display())))
    }

    fn save_state(&self) -> Result<(), VcsError> {
        match &self.state {
            Some(state) => state.save(&self.state_path),
            None => Ok(()),
        }
    }

    fn stash_message(&self, session_id: &str) -> String {
        format!("asymm-doctor checkpoint {session_id}")
    }
}

fn signature(repo: &Repository) -> Result<Signature<'static>, VcsError> {
    match repo.signature() {
        Ok(sig) => Ok(sig),
        Err(_) => Ok(Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
    }
}

fn stash_changes(repo: &mut Repository, sig: &Signature<'_>, message: &str) -> Result<bool, VcsError> {
    match repo.stash_save(sig, message, None) {
        Ok(oid) => {
            log::info!("Stashed working changes as {oid}");
            Ok(true)
        }
        Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn find_stash(repo: &mut Repository, message: &str) -> Result<Option<usize>, VcsError> {
    let mut found = None;
    repo.stash_foreach(|index, stash_message, _| {
        if stash_message.contains(message) {
            found = Some(index);
            false
        } else {
            true
        }
    })?;
    Ok(found)
}

impl VersionControl for GitSafety {
    fn create_checkpoint(&mut self, session_id: &str) -> Result<GitState, VcsError> {
        if let Some(previous) = &self.state {
            log::warn!(
                "Replacing unfinished session {} (baseline {})",
                previous.session_id,
                previous.short_baseline()
            );
        }

        let mut repo = self.open_repo()?;
        let (baseline, original_branch) = {
            let head = repo.head().map_err(|e| match e.code() {
                ErrorCode::UnbornBranch => VcsError::State("repository has no commits yet".into()),
                _ => VcsError::Git(e),
            })?;
            let baseline = head.peel_to_commit()?.id();
            let branch = if repo.head_detached()? {
                "HEAD".to_string()
            } else {
                head.shorthand().unwrap_or("HEAD").to_string()
            };
            (baseline, branch)
        };

        let sig = signature(&repo)?;
        let stashed = stash_changes(&mut repo, &sig, &self.stash_message(session_id))?;

        let fix_branch = format!("{}-fixes-{session_id}", self.tag);
        {
            let commit = repo.find_commit(baseline)?;
            repo.branch(&fix_branch, &commit, true)?;
        }
        repo.set_head(&format!("refs/heads/{fix_branch}"))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        repo.checkout_head(Some(&mut checkout))?;

        let state = GitState {
            session_id: session_id.to_string(),
            baseline_commit: baseline.to_string(),
            original_branch,
            fix_branch,
            stashed,
            timestamp: Utc::now(),
            commits: Vec::new(),
        };
        state.save(&self.state_path)?;
        log::info!(
            "Checkpoint {} on {} (stashed: {})",
            state.short_baseline(),
            state.fix_branch,
            stashed
        );
        self.state = Some(state.clone());
        Ok(state)
    }

    fn commit_fix_batch(
        &mut self,
        files: &[PathBuf],
        label: &str,
        counts: &CodeCounts,
    ) -> Result<Option<BatchCommit>, VcsError> {
        let baseline = match &self.state {
            Some(state) => state.baseline_commit.clone(),
            None => return Err(VcsError::NoCheckpoint),
        };

        let repo = self.open_repo()?;
        let mut index = repo.index()?;
        for file in files {
            let rel = self.relative(file)?;
            if self.workdir.join(&rel).exists() {
                index.add_path(&rel)?;
            } else {
                index.remove_path(&rel)?;
            }
        }
        index.write()?;

        let tree_id = index.write_tree()?;
        let parent = repo.head()?.peel_to_commit()?;
        if parent.tree_id() == tree_id {
            log::debug!("Batch '{label}' left the tree unchanged; nothing to commit");
            return Ok(None);
        }

        let tree = repo.find_tree(tree_id)?;
        let sig = signature(&repo)?;
        let message = commit_message(&self.tag.to_uppercase(), label, counts, &baseline);
        let oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])?;

        let batch = BatchCommit {
            commit: oid.to_string(),
            batch_name: label.to_string(),
            fixes_count: counts.iter().map(|(_, n)| n).sum(),
            timestamp: Utc::now(),
        };
        if let Some(state) = self.state.as_mut() {
            state.commits.push(batch.clone());
        }
        self.save_state()?;
        log::info!("Committed batch '{label}' as {}", super::short_id(&batch.commit));
        Ok(Some(batch))
    }

    fn rollback_last_batch(&mut self) -> Result<BatchCommit, VcsError> {
        let last = self
            .state
            .as_ref()
            .ok_or(VcsError::NoCheckpoint)?
            .last_commit()
            .cloned()
            .ok_or(VcsError::NoBatchCommits)?;

        let repo = self.open_repo()?;
        let target = repo.find_commit(Oid::from_str(&last.commit)?)?;
        repo.revert(&target, None)?;

        let mut index = repo.index()?;
        if index.has_conflicts() {
            let head = repo.head()?.peel_to_commit()?;
            repo.reset(head.as_object(), ResetType::Hard, None)?;
            repo.cleanup_state()?;
            return Err(VcsError::Conflict(format!(
                "commit {} no longer reverts cleanly",
                super::short_id(&last.commit)
            )));
        }

        let tree = repo.find_tree(index.write_tree()?)?;
        let parent = repo.head()?.peel_to_commit()?;
        let sig = signature(&repo)?;
        let message = format!(
            "Revert \"{}\"\n\nThis reverts commit {}.\n",
            target.summary().unwrap_or(&last.batch_name),
            last.commit
        );
        repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])?;
        repo.cleanup_state()?;

        if let Some(state) = self.state.as_mut() {
            state.commits.pop();
        }
        self.save_state()?;
        log::info!("Reverted batch '{}'", last.batch_name);
        Ok(last)
    }

    fn rollback_to_baseline(&mut self) -> Result<(), VcsError> {
        let state = self.state.clone().ok_or(VcsError::NoCheckpoint)?;
        let mut repo = self.open_repo()?;

        let baseline = Oid::from_str(&state.baseline_commit)?;
        {
            let commit = repo.find_commit(baseline)?;
            repo.reset(commit.as_object(), ResetType::Hard, None)?;
        }

        if state.original_branch == "HEAD" {
            repo.set_head_detached(baseline)?;
        } else {
            repo.set_head(&format!("refs/heads/{}", state.original_branch))?;
        }
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_head(Some(&mut checkout))?;

        match repo.find_branch(&state.fix_branch, BranchType::Local) {
            Ok(mut branch) => branch.delete()?,
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if state.stashed {
            match find_stash(&mut repo, &self.stash_message(&state.session_id))? {
                Some(index) => repo
                    .stash_pop(index, None)
                    .map_err(|e| VcsError::Conflict(format!("stashed changes did not re-apply: {e}")))?,
                None => log::warn!("Checkpoint stash for {} is gone", state.session_id),
            }
        }

        if self.state_path.exists() {
            fs::remove_file(&self.state_path)?;
        }
        self.state = None;
        log::info!(
            "Rolled back to baseline {} on {}",
            state.short_baseline(),
            state.original_branch
        );
        Ok(())
    }

    fn restore_file(&self, path: &Path) -> Result<(), VcsError> {
        let repo = self.open_repo()?;
        let rel = self.relative(path)?;
        let tree = repo.head()?.peel_to_tree()?;

        if tree.get_path(&rel).is_err() {
            log::warn!(
                "{} is not tracked at HEAD and has no backup; leaving it in place",
                rel.display()
            );
            return Ok(());
        }

        let mut checkout = CheckoutBuilder::new();
        checkout.force().path(rel.as_path());
        repo.checkout_head(Some(&mut checkout))?;
        Ok(())
    }

    fn state(&self) -> Option<&GitState> {
        self.state.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::IndexAddOption;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const ORIGINAL: &str = "import x from '../ui/button'\n";

    fn commit_all(repo: &Repository, message: &str) {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = repo.signature().unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
    }

    fn init_repo() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        fs::write(temp.path().join("a.ts"), ORIGINAL).unwrap();
        commit_all(&repo, "initial");
        (temp, repo)
    }

    fn safety(temp: &TempDir) -> GitSafety {
        GitSafety::open(temp.path(), temp.path().join(".atd/git-state.json"), "atd").unwrap()
    }

    fn head_branch(repo: &Repository) -> String {
        repo.head().unwrap().shorthand().unwrap().to_string()
    }

    fn counts() -> Vec<(String, usize)> {
        vec![("TS2307".to_string(), 1)]
    }

    #[test]
    fn test_not_a_repository() {
        let temp = TempDir::new().unwrap();
        let result = GitSafety::open(temp.path(), temp.path().join("s.json"), "atd");
        assert!(matches!(result, Err(VcsError::NotARepository(_))));
    }

    #[test]
    fn test_commit_and_surgical_rollback() {
        let (temp, repo) = init_repo();
        let mut vcs = safety(&temp);
        let state = vcs.create_checkpoint("s1").unwrap();
        assert_eq!(head_branch(&repo), "atd-fixes-s1");
        assert!(!state.stashed);

        let file = temp.path().join("a.ts");
        fs::write(&file, "import x from '@/components/ui/button'\n").unwrap();
        let batch = vcs
            .commit_fix_batch(&[file.clone()], "unresolved-module", &counts())
            .unwrap()
            .unwrap();
        assert_eq!(batch.fixes_count, 1);

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert!(head.message().unwrap().starts_with("ATD: unresolved-module"));

        let reloaded = safety(&temp);
        assert_eq!(reloaded.state().unwrap().commits.len(), 1);

        let reverted = vcs.rollback_last_batch().unwrap();
        assert_eq!(reverted.commit, batch.commit);
        assert_eq!(fs::read_to_string(&file).unwrap(), ORIGINAL);
        assert!(vcs.state().unwrap().commits.is_empty());
        assert!(matches!(vcs.rollback_last_batch(), Err(VcsError::NoBatchCommits)));
    }

    #[test]
    fn test_unchanged_batch_commits_nothing() {
        let (temp, _repo) = init_repo();
        let mut vcs = safety(&temp);
        vcs.create_checkpoint("s1").unwrap();
        let result = vcs
            .commit_fix_batch(&[temp.path().join("a.ts")], "noop", &counts())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_full_rollback_restores_branch_and_stash() {
        let (temp, repo) = init_repo();
        let original_branch = head_branch(&repo);
        let file = temp.path().join("a.ts");
        fs::write(&file, "// work in progress\n").unwrap();

        let mut vcs = safety(&temp);
        let state = vcs.create_checkpoint("s2").unwrap();
        assert!(state.stashed);
        assert_eq!(fs::read_to_string(&file).unwrap(), ORIGINAL);

        fs::write(&file, "import x from '@/ui/button'\n").unwrap();
        vcs.commit_fix_batch(&[file.clone()], "batch", &counts())
            .unwrap();

        vcs.rollback_to_baseline().unwrap();
        assert_eq!(head_branch(&repo), original_branch);
        assert_eq!(fs::read_to_string(&file).unwrap(), "// work in progress\n");
        assert!(repo.find_branch("atd-fixes-s2", BranchType::Local).is_err());
        assert!(vcs.state().is_none());
        assert!(!temp.path().join(".atd/git-state.json").exists());
    }

    #[test]
    fn test_restore_file_from_head() {
        let (temp, _repo) = init_repo();
        let vcs = safety(&temp);
        let file = temp.path().join("a.ts");
        fs::write(&file, "broken(\n").unwrap();
        let created = temp.path().join("new.ts");
        fs::write(&created, "export {}\n").unwrap();

        vcs.restore_file(&file).unwrap();
        vcs.restore_file(&created).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), ORIGINAL);
        // Untracked files may be user data; they are never deleted.
        assert_eq!(fs::read_to_string(&created).unwrap(), "export {}\n");
    }

    #[test]
    fn test_commit_without_checkpoint_fails() {
        let (temp, _repo) = init_repo();
        let mut vcs = safety(&temp);
        let result = vcs.commit_fix_batch(&[temp.path().join("a.ts")], "x", &counts());
        assert!(matches!(result, Err(VcsError::NoCheckpoint)));
    }
}
