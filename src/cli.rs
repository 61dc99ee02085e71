use crate::core::Dialect;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "asymm-doctor")]
#[command(about = "Self-healing fixer for TypeScript, build and lint errors", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Which tool's output to heal (defaults to the config file, then typescript)
    #[arg(short, long, value_enum, global = true, env = "ASYMM_DOCTOR_DIALECT")]
    pub dialect: Option<Dialect>,

    /// Project root
    #[arg(short = 'C', long = "project", global = true, default_value = ".")]
    pub project: PathBuf,

    /// Increase verbosity (-v: previews and debug logs)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Plain output (ASCII tables, no colors)
    #[arg(long, global = true)]
    pub plain: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the tool, classify its errors and write the error registry
    Analyze,

    /// Fix errors batch by batch, validating and reverting each batch
    #[command(group(ArgGroup::new("scope").required(true).args(["error_type", "all"])))]
    Fix {
        /// Only fix this error code (e.g. TS2307, module_not_found, semi)
        #[arg(long = "type", value_name = "CODE")]
        error_type: Option<String>,

        /// Fix every error type that has a fixer
        #[arg(long)]
        all: bool,

        /// Preview changes without writing or committing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the git checkpoint (for disposable fixture trees only)
        #[arg(long)]
        test_mode: bool,

        /// Prepare prompts for errors without a fixer and wait for them to be applied
        #[arg(long)]
        assist: bool,
    },

    /// Undo fix batches of the current session
    #[command(group(ArgGroup::new("mode").required(true).args(["full", "last"])))]
    Rollback {
        /// Reset to the checkpoint baseline and return to the original branch
        #[arg(long)]
        full: bool,

        /// Revert only the most recent batch commit
        #[arg(long)]
        last: bool,
    },

    /// Show the checkpoint and batch commits of the current session
    Status,

    /// Initialize configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}
