use anyhow::Result;
use asymm_doctor::cli::{Cli, Commands};
use asymm_doctor::commands::{self, CommandContext};
use asymm_doctor::orchestrator::FixOptions;
use clap::Parser;

fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let ctx = CommandContext::from_cli(&cli)?;

    match cli.command {
        Commands::Analyze => commands::handle_analyze(&ctx),
        Commands::Fix {
            error_type,
            all,
            dry_run,
            test_mode,
            assist,
        } => {
            let options = FixOptions {
                only_code: error_type,
                all,
                dry_run,
                test_mode,
                assist,
            };
            commands::handle_fix(&ctx, options)
        }
        Commands::Rollback { full, last: _ } => commands::handle_rollback(&ctx, full),
        Commands::Status => commands::handle_status(&ctx),
        Commands::Init { force } => {
            commands::init_config(&ctx.project_root, force)?;
            Ok(0)
        }
    }
}
