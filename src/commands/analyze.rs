use super::CommandContext;
use crate::formatting::render_analysis;
use crate::io::RealFileSystem;
use crate::orchestrator::{Analysis, Orchestrator};
use crate::session::ErrorRegistry;
use crate::tool::{CommandRunner, ToolRunner};
use anyhow::Result;

/// Run the tool once and save the error registry for the session directory.
pub fn analyze_with(ctx: &CommandContext, runner: &dyn ToolRunner) -> Analysis {
    let fs = RealFileSystem::new();
    let orchestrator = Orchestrator::new(ctx.session(), ctx.config.clone(), runner, &fs);
    log::info!("Running {}", orchestrator.invocation().display());
    let analysis = orchestrator.analyze();

    if analysis.failure.is_none() {
        let path = orchestrator.session().registry_path();
        let registry = ErrorRegistry::from_records(ctx.dialect, &analysis.records);
        if let Err(e) = registry.save(&path) {
            log::warn!("Could not write {}: {e:#}", path.display());
        }
    }
    analysis
}

/// Analysis never changes the tree; a failed tool run is reported, not fatal.
pub fn handle_analyze(ctx: &CommandContext) -> Result<i32> {
    let runner = CommandRunner::new(&ctx.project_root);
    let analysis = analyze_with(ctx, &runner);
    let formatter = ctx.formatting.formatter();
    println!("{}", render_analysis(&analysis, ctx.dialect, formatter.as_ref()));
    Ok(0)
}
