//! Path aliases from `tsconfig.json` / `jsconfig.json`.

use crate::io::{strip_json_comments, strip_trailing_commas};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsConfig {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompilerOptions {
    base_url: Option<String>,
    #[serde(default)]
    paths: BTreeMap<String, Vec<String>>,
}

/// Alias prefix (e.g. `@/`) to directory relative to the project root.
pub type AliasMap = BTreeMap<String, PathBuf>;

fn normalize(dir: &Path) -> PathBuf {
    dir.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

pub fn parse_aliases(tsconfig_text: &str) -> AliasMap {
    let cleaned = strip_trailing_commas(&strip_json_comments(tsconfig_text));
    let config: TsConfig = match serde_json::from_str(&cleaned) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Could not parse tsconfig paths: {}", e);
            return AliasMap::new();
        }
    };

    let base = PathBuf::from(config.compiler_options.base_url.unwrap_or_else(|| ".".into()));

    config
        .compiler_options
        .paths
        .into_iter()
        .filter_map(|(alias, targets)| {
            let target = targets.into_iter().next()?;
            let prefix = alias.trim_end_matches('*').to_string();
            let dir = target.trim_end_matches('*').trim_end_matches('/').to_string();
            Some((prefix, normalize(&base.join(dir))))
        })
        .collect()
}

pub fn load_aliases(project_root: &Path) -> AliasMap {
    ["tsconfig.json", "jsconfig.json"]
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.is_file())
        .and_then(|path| std::fs::read_to_string(path).ok())
        .map(|text| parse_aliases(&text))
        .unwrap_or_default()
}
