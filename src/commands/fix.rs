use super::CommandContext;
use crate::formatting::render_session;
use crate::io::RealFileSystem;
use crate::orchestrator::{respond_from, AssistChannel, FixOptions, Orchestrator};
use crate::tool::CommandRunner;
use crate::vcs::GitSafety;
use anyhow::{Context, Result};
use std::io;
use std::thread;

pub fn handle_fix(ctx: &CommandContext, options: FixOptions) -> Result<i32> {
    let session = ctx.session();
    let runner = CommandRunner::new(&ctx.project_root);
    let fs = RealFileSystem::new();

    let vcs = if options.dry_run {
        None
    } else {
        match GitSafety::open(&ctx.project_root, session.git_state_path(), ctx.dialect.short_name()) {
            Ok(git) => Some(git),
            Err(e) if options.test_mode => {
                log::info!("Test mode without git: {e}");
                None
            }
            Err(e) => {
                return Err(e).context("Fixing needs a git repository to checkpoint and roll back");
            }
        }
    };

    log::info!("Session {} in {}", session.id, session.dir().display());
    let mut orchestrator = Orchestrator::new(session, ctx.config.clone(), &runner, &fs);
    if let Some(git) = vcs {
        orchestrator = orchestrator.with_vcs(Box::new(git));
    }

    let responder = if options.assist && !options.dry_run {
        let (channel, endpoint) = AssistChannel::pair();
        orchestrator = orchestrator.with_assist(channel);
        Some(thread::spawn(move || {
            respond_from(endpoint, io::stdin().lock(), io::stdout())
        }))
    } else {
        None
    };

    let result = orchestrator.run(&options);
    // The responder exits once the request sender is gone.
    drop(orchestrator);
    if let Some(handle) = responder {
        if handle.join().is_err() {
            log::warn!("Assistance prompt thread panicked");
        }
    }

    let report = result?;
    let formatter = ctx.formatting.formatter();
    println!("{}", render_session(&report, formatter.as_ref(), ctx.verbose));
    Ok(report.exit_code())
}
