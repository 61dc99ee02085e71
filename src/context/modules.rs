//! Installed and declared npm packages.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, String>,
    version: Option<String>,
}

/// Top-level and `@scope/name` package directories under `node_modules`.
pub fn scan_installed(project_root: &Path) -> BTreeSet<String> {
    let node_modules = project_root.join("node_modules");
    if !node_modules.is_dir() {
        return BTreeSet::new();
    }

    WalkDir::new(&node_modules)
        .min_depth(1)
        .max_depth(2)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.')
                && (entry.depth() == 1 || entry.path().parent().is_some_and(is_scope_dir))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir() || entry.path_is_symlink())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            match entry.depth() {
                1 if !name.starts_with('@') => Some(name),
                2 => entry
                    .path()
                    .parent()
                    .and_then(|scope| scope.file_name())
                    .map(|scope| format!("{}/{}", scope.to_string_lossy(), name)),
                _ => None,
            }
        })
        .collect()
}

fn is_scope_dir(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('@'))
}

fn read_manifest(path: &Path) -> Option<Manifest> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            log::warn!("Could not parse {}: {}", path.display(), e);
            None
        }
    }
}

/// Every dependency declared in the root `package.json`, name to version range.
pub fn read_declared(project_root: &Path) -> BTreeMap<String, String> {
    let Some(manifest) = read_manifest(&project_root.join("package.json")) else {
        return BTreeMap::new();
    };
    manifest
        .peer_dependencies
        .into_iter()
        .chain(manifest.dev_dependencies)
        .chain(manifest.dependencies)
        .collect()
}

/// The `version` field of an installed package's manifest.
pub fn installed_version(project_root: &Path, package: &str) -> Option<String> {
    read_manifest(
        &project_root
            .join("node_modules")
            .join(package)
            .join("package.json"),
    )
    .and_then(|manifest| manifest.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scans_plain_and_scoped_packages() {
        let temp = TempDir::new().unwrap();
        let nm = temp.path().join("node_modules");
        fs::create_dir_all(nm.join("react")).unwrap();
        fs::create_dir_all(nm.join("@radix-ui").join("react-dialog")).unwrap();
        fs::create_dir_all(nm.join(".bin")).unwrap();
        fs::create_dir_all(nm.join("react").join("cjs")).unwrap();

        let installed = scan_installed(temp.path());
        let names: Vec<_> = installed.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["@radix-ui/react-dialog", "react"]);
    }

    #[test]
    fn test_reads_declared_and_installed_version() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("package.json"),
            r#"{"dependencies": {"zod": "^3.22.0"}, "devDependencies": {"typescript": "5.4.0"}}"#,
        )
        .unwrap();
        let pkg = temp.path().join("node_modules").join("zod");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), r#"{"name": "zod", "version": "3.22.4"}"#).unwrap();

        let declared = read_declared(temp.path());
        assert_eq!(declared.get("zod").map(String::as_str), Some("^3.22.0"));
        assert!(declared.contains_key("typescript"));
        assert_eq!(installed_version(temp.path(), "zod").as_deref(), Some("3.22.4"));
    }

    #[test]
    fn test_missing_sources_are_empty() {
        let temp = TempDir::new().unwrap();
        assert!(scan_installed(temp.path()).is_empty());
        assert!(read_declared(temp.path()).is_empty());
    }
}
