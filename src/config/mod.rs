//! `.asymm-doctor.toml` configuration.

mod loader;

pub use loader::{directory_ancestors, load_config, parse_and_validate_config, CONFIG_FILE_NAME};

use crate::core::Dialect;
use crate::tool::ToolInvocation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DoctorConfig {
    /// Tool dialect used when `--dialect` is not given
    #[serde(default)]
    pub dialect: Option<Dialect>,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub tool: ToolConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub assist: AssistConfig,
}

impl DoctorConfig {
    pub fn dialect_or(&self, fallback: Dialect) -> Dialect {
        self.dialect.unwrap_or(fallback)
    }

    /// Command line for the external tool, falling back to the dialect default.
    pub fn tool_command(&self, dialect: Dialect) -> Vec<String> {
        match &self.tool.command {
            Some(command) if !command.is_empty() => command.clone(),
            _ => dialect.default_command(),
        }
    }

    /// The configured tool run for `dialect`, with its "ran fine" exit codes.
    pub fn invocation(&self, dialect: Dialect) -> ToolInvocation {
        let expected = self
            .tool
            .expected_exit_codes
            .clone()
            .unwrap_or_else(|| dialect.expected_exit_codes().to_vec());
        ToolInvocation::new(self.tool_command(dialect), self.tool.timeout(), expected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceConfig {
    /// Decisions below this confidence are always skipped
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Import prefix that maps onto `alias_target`
    #[serde(default = "default_alias_prefix")]
    pub alias_prefix: String,

    /// Directory the alias prefix resolves to when tsconfig declares none
    #[serde(default = "default_alias_target")]
    pub alias_target: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            alias_prefix: default_alias_prefix(),
            alias_target: default_alias_target(),
        }
    }
}

impl InferenceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.alias_prefix.is_empty() {
            return Err("alias_prefix must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolConfig {
    /// Overrides the dialect's default command
    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides the dialect's "ran fine" exit codes
    #[serde(default)]
    pub expected_exit_codes: Option<Vec<i32>>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: default_timeout_secs(),
            expected_exit_codes: None,
        }
    }
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OrchestratorConfig {
    /// Error codes processed first, in this order; the rest follow discovery order
    #[serde(default)]
    pub priority: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
        }
    }
}

pub fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_alias_prefix() -> String {
    "@/".to_string()
}

fn default_alias_target() -> String {
    "src".to_string()
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_max_requests() -> usize {
    5
}
