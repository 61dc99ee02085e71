use super::CommandContext;
use crate::formatting::render_status;
use crate::session::ErrorRegistry;
use crate::vcs::GitState;
use anyhow::{Context, Result};

pub fn handle_status(ctx: &CommandContext) -> Result<i32> {
    let session = ctx.session();
    let state = GitState::load(&session.git_state_path()).context("Could not read the session state")?;
    let fmt = ctx.formatting.formatter();
    print!("{}", render_status(state.as_ref(), fmt.as_ref()));

    match ErrorRegistry::load(&session.registry_path()) {
        Ok(Some(registry)) => println!(
            "{}",
            fmt.dim(&format!(
                "Last analysis: {} errors ({})",
                registry.total,
                registry.timestamp.format("%Y-%m-%d %H:%M:%S")
            ))
        ),
        Ok(None) => {}
        Err(e) => log::warn!("Ignoring unreadable registry: {e}"),
    }
    Ok(0)
}
