//! Read-only project knowledge, built once per session.
//!
//! The store is a snapshot: files that change mid-session are not re-read,
//! a new session is required to see them. Every facet degrades to an empty
//! map when its source file is missing, which consumers read as "no
//! suggestion available".

pub mod aliases;
pub mod modules;
pub mod registry;
pub mod schema;

pub use aliases::AliasMap;
pub use registry::{ServiceLinks, ServiceRegistry};
pub use schema::{FieldDef, SchemaModels};

use crate::config::InferenceConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const SCHEMA_PATH: &str = "prisma/schema.prisma";

/// Maximum edit distance accepted for a near-miss suggestion.
pub const MAX_SUGGESTION_DISTANCE: usize = 2;

/// A corrected name proposed for a near miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub value: String,
    /// Differs from the wrong name only in letter case
    pub case_only: bool,
    pub distance: usize,
}

/// Closest candidate to `wrong`: a case-insensitive match first, then the
/// smallest edit distance up to [`MAX_SUGGESTION_DISTANCE`].
pub fn closest_match<'a, I>(candidates: I, wrong: &str) -> Option<Suggestion>
where
    I: IntoIterator<Item = &'a str>,
{
    let wrong_lower = wrong.to_lowercase();
    let mut best: Option<Suggestion> = None;

    for candidate in candidates {
        if candidate == wrong {
            return None;
        }
        let lower = candidate.to_lowercase();
        if lower == wrong_lower {
            return Some(Suggestion {
                value: candidate.to_string(),
                case_only: true,
                distance: 0,
            });
        }
        let distance = strsim::levenshtein(&lower, &wrong_lower);
        let better = best.as_ref().is_none_or(|b| distance < b.distance);
        if distance <= MAX_SUGGESTION_DISTANCE && better {
            best = Some(Suggestion {
                value: candidate.to_string(),
                case_only: false,
                distance,
            });
        }
    }

    best
}

#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    project_root: PathBuf,
    installed: BTreeSet<String>,
    declared: BTreeMap<String, String>,
    aliases: AliasMap,
    models: SchemaModels,
    services: ServiceRegistry,
}

impl ContextStore {
    /// Build with the default `@/` -> `src` alias fallback.
    pub fn build(project_root: &Path) -> Self {
        Self::build_with(project_root, &InferenceConfig::default())
    }

    pub fn build_with(project_root: &Path, inference: &InferenceConfig) -> Self {
        let mut aliases = aliases::load_aliases(project_root);
        aliases
            .entry(inference.alias_prefix.clone())
            .or_insert_with(|| PathBuf::from(&inference.alias_target));

        let models = std::fs::read_to_string(project_root.join(SCHEMA_PATH))
            .map(|text| schema::parse_schema(&text))
            .unwrap_or_default();

        let store = Self {
            project_root: project_root.to_path_buf(),
            installed: modules::scan_installed(project_root),
            declared: modules::read_declared(project_root),
            aliases,
            models,
            services: registry::load_registry(project_root),
        };

        log::debug!(
            "Context: {} installed, {} declared, {} aliases, {} models, {} services",
            store.installed.len(),
            store.declared.len(),
            store.aliases.len(),
            store.models.len(),
            store.services.len()
        );
        store
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Installed under `node_modules` or declared in the manifest.
    pub fn has_module(&self, name: &str) -> bool {
        self.installed.contains(name) || self.declared.contains_key(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    pub fn declared_version(&self, name: &str) -> Option<&str> {
        self.declared.get(name).map(String::as_str)
    }

    pub fn installed_version(&self, name: &str) -> Option<String> {
        modules::installed_version(&self.project_root, name)
    }

    /// Known packages in the same `@scope/` as `name`.
    pub fn scoped_siblings(&self, name: &str) -> Vec<String> {
        let Some((scope, _)) = name.split_once('/') else {
            return Vec::new();
        };
        if !scope.starts_with('@') {
            return Vec::new();
        }
        let prefix = format!("{scope}/");
        self.module_names()
            .filter(|m| m.starts_with(&prefix) && *m != name)
            .map(str::to_string)
            .collect()
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        let declared_only = self
            .declared
            .keys()
            .filter(|k| !self.installed.contains(*k));
        self.installed.iter().chain(declared_only).map(String::as_str)
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// Map an alias-prefixed specifier onto a path under the project root.
    /// The longest matching prefix wins.
    pub fn resolve_alias(&self, specifier: &str) -> Option<PathBuf> {
        self.aliases
            .iter()
            .filter(|(prefix, _)| specifier.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, dir)| self.project_root.join(dir).join(&specifier[prefix.len()..]))
    }

    /// Directory an alias prefix points at, relative to the project root.
    pub fn alias_dir(&self, prefix: &str) -> Option<&Path> {
        self.aliases.get(prefix).map(PathBuf::as_path)
    }

    pub fn models(&self) -> &SchemaModels {
        &self.models
    }

    pub fn model_fields(&self, model_name: &str) -> Option<&[FieldDef]> {
        self.models.get(model_name).map(Vec::as_slice)
    }

    /// Case-insensitive model lookup, returning the canonical name.
    pub fn find_model(&self, name: &str) -> Option<&str> {
        self.models
            .keys()
            .find(|model| model.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn suggest_closest_field(&self, model: &str, wrong_name: &str) -> Option<Suggestion> {
        let fields = self.model_fields(model)?;
        closest_match(fields.iter().map(|f| f.name.as_str()), wrong_name)
    }

    pub fn suggest_closest_module(&self, wrong_name: &str) -> Option<Suggestion> {
        closest_match(self.module_names(), wrong_name)
    }

    /// Prisma client accessor names (`customer` for `model Customer`).
    pub fn model_accessors(&self) -> Vec<String> {
        self.models.keys().map(|m| lower_camel(m)).collect()
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn service(&self, id: &str) -> Option<&ServiceLinks> {
        self.services.get(id)
    }
}

pub fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
