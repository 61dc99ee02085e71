//! CLI command implementations.
//!
//! Each submodule handles one subcommand and returns the process exit code:
//!
//! - **analyze**: run the tool once, classify its errors, write the registry
//! - **fix**: checkpoint, fix batch by batch, validate and revert
//! - **rollback**: undo the last batch or the whole session
//! - **status**: show the checkpoint and batch commits
//! - **init**: write a default `.asymm-doctor.toml`

pub mod analyze;
pub mod fix;
pub mod init;
pub mod rollback;
pub mod status;

pub use analyze::{analyze_with, handle_analyze};
pub use fix::handle_fix;
pub use init::init_config;
pub use rollback::handle_rollback;
pub use status::handle_status;

use crate::cli::Cli;
use crate::config::{load_config, DoctorConfig};
use crate::core::Dialect;
use crate::formatting::FormattingConfig;
use crate::session::Session;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Everything a command needs that comes from the command line and the config file.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project_root: PathBuf,
    pub config: DoctorConfig,
    pub dialect: Dialect,
    pub formatting: FormattingConfig,
    pub verbose: bool,
}

impl CommandContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let project_root = cli
            .project
            .canonicalize()
            .with_context(|| format!("Project directory {} not found", cli.project.display()))?;
        let config = load_config(&project_root);
        let dialect = cli
            .dialect
            .unwrap_or_else(|| config.dialect_or(Dialect::TypeScript));
        let formatting = if cli.plain {
            FormattingConfig::plain()
        } else {
            FormattingConfig::from_env()
        };

        Ok(Self {
            project_root,
            config,
            dialect,
            formatting,
            verbose: cli.verbosity > 0,
        })
    }

    /// A fresh session rooted at the project, keyed by the current time.
    pub fn session(&self) -> Session {
        Session::new(&self.project_root, self.dialect)
    }
}
