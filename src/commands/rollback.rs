use super::CommandContext;
use crate::vcs::{short_id, GitSafety, VersionControl};
use anyhow::{Context, Result};

/// Undo the session: the last batch commit, or everything back to the baseline.
pub fn handle_rollback(ctx: &CommandContext, full: bool) -> Result<i32> {
    let session = ctx.session();
    let mut git = GitSafety::open(&ctx.project_root, session.git_state_path(), ctx.dialect.short_name())
        .context("Rollback needs the project's git repository")?;
    let Some(state) = git.state().cloned() else {
        anyhow::bail!("No fix session to roll back in {}", session.dir().display());
    };
    let fmt = ctx.formatting.formatter();

    if full {
        git.rollback_to_baseline()
            .context("Full rollback failed; the fix branch is left as it was")?;
        println!(
            "{}",
            fmt.success(&format!(
                "Reset to baseline {} and returned to {}",
                state.short_baseline(),
                state.original_branch
            ))
        );
    } else {
        let reverted = git
            .rollback_last_batch()
            .context("Reverting the last batch failed")?;
        println!(
            "{}",
            fmt.success(&format!(
                "Reverted batch '{}' ({})",
                reverted.batch_name,
                short_id(&reverted.commit)
            ))
        );
    }
    Ok(0)
}
