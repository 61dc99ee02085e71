use crate::config::CONFIG_FILE_NAME;
use anyhow::Result;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = r#"# asymm-doctor configuration

# Tool to heal when --dialect is not given: "typescript", "build" or "lint"
dialect = "typescript"

[inference]
# Decisions below this confidence are skipped, never applied
confidence_threshold = 0.7
alias_prefix = "@/"
alias_target = "src"

[tool]
# command = ["npx", "tsc", "--noEmit", "--pretty", "false"]
timeout_secs = 180
# expected_exit_codes = [0, 1, 2]

[orchestrator]
# Error codes fixed first, in this order; discovery order when empty
# priority = ["TS2307", "TS2305"]
priority = []

[assist]
max_requests = 5
"#;

pub fn init_config(project_root: &Path, force: bool) -> Result<PathBuf> {
    let config_path = project_root.join(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!("Configuration file already exists. Use --force to overwrite.");
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)?;
    println!("Created {CONFIG_FILE_NAME} configuration file");

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_and_validate_config, DoctorConfig};
    use crate::core::Dialect;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses() {
        let config: DoctorConfig = parse_and_validate_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.dialect, Some(Dialect::TypeScript));
        assert!(config.orchestrator.priority.is_empty());
        assert_eq!(config.assist.max_requests, 5);
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "dialect = \"lint\"\n").unwrap();

        assert!(init_config(dir.path(), false).is_err());
        let kept = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(kept, "dialect = \"lint\"\n");

        init_config(dir.path(), true).unwrap();
        let written = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(written.contains("[inference]"));
    }
}
