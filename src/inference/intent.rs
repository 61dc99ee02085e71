//! Chain-of-thought inference of what an unresolved import was meant to be.

use crate::classify::{Pattern, PatternClassifier};
use crate::context::ContextStore;
use crate::parser::build::package_root;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    FixPath,
    NeedsInstall,
    FileMissing,
    DeleteImport,
    AlreadyCorrect,
    AlreadyDeclared,
    CheckSubpackage,
    Skip,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FixPath => "fix_path",
            Self::NeedsInstall => "needs_install",
            Self::FileMissing => "file_missing",
            Self::DeleteImport => "delete_import",
            Self::AlreadyCorrect => "already_correct",
            Self::AlreadyDeclared => "already_declared",
            Self::CheckSubpackage => "check_subpackage",
            Self::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// Inference result for one error subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedIntent {
    /// The subject the intent was inferred for
    pub subject: String,
    /// Reporting file of the originating error
    pub file: String,
    pub line: usize,
    pub pattern: Pattern,
    pub action: Action,
    pub corrected_value: Option<String>,
    pub confidence: f64,
    pub reasoning: Vec<String>,
}

impl ClassifiedIntent {
    fn new(subject: &str, file: &str, pattern: Pattern) -> Self {
        Self {
            subject: subject.to_string(),
            file: file.to_string(),
            line: 0,
            pattern,
            action: Action::Skip,
            corrected_value: None,
            confidence: 0.0,
            reasoning: vec![format!("Classified '{subject}' as {pattern}")],
        }
    }

    fn because(mut self, reason: impl Into<String>) -> Self {
        self.reasoning.push(reason.into());
        self
    }

    fn conclude(mut self, action: Action, corrected: Option<String>, confidence: f64) -> Self {
        self.action = action;
        self.corrected_value = corrected;
        self.confidence = confidence;
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

const UI_EXTENSIONS: &[&str] = &[".tsx", ".ts", "/index.tsx", "/index.ts"];
const LIB_EXTENSIONS: &[&str] = &[".ts", ".tsx", "/index.ts", "/index.tsx"];
const HOOK_EXTENSIONS: &[&str] = &[".ts", ".tsx", "/index.ts"];
const MODULE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", "/index.ts", "/index.tsx"];

/// First existing `base + ext`. Reads only.
pub fn probe_module_file(base: &Path, extensions: &[&str]) -> Option<PathBuf> {
    if base.extension().is_some() && base.is_file() {
        return Some(base.to_path_buf());
    }
    let base = base.to_string_lossy();
    extensions
        .iter()
        .map(|ext| PathBuf::from(format!("{base}{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Resolve an import specifier from `importer` to a file on disk.
pub fn resolve_import(
    context: &ContextStore,
    importer: &Path,
    specifier: &str,
) -> Option<PathBuf> {
    let base = if specifier.starts_with("./") || specifier.starts_with("../") {
        importer.parent()?.join(specifier)
    } else {
        context.resolve_alias(specifier)?
    };
    probe_module_file(&base, MODULE_EXTENSIONS)
}

/// Text after the last `/{marker}/`, or after a trailing `/{marker}`.
fn segment_after(subject: &str, marker: &str) -> Option<String> {
    let needle = format!("/{marker}/");
    if let Some(idx) = subject.rfind(&needle) {
        let rest = &subject[idx + needle.len()..];
        return (!rest.is_empty()).then(|| rest.to_string());
    }
    None
}

pub struct IntentInference<'a> {
    classifier: PatternClassifier,
    context: &'a ContextStore,
}

impl<'a> IntentInference<'a> {
    pub fn new(context: &'a ContextStore, alias_prefix: &str) -> Self {
        let classifier = PatternClassifier::new(alias_prefix)
            .with_known_packages(context.module_names().map(package_root));
        Self {
            classifier,
            context,
        }
    }

    pub fn classifier(&self) -> &PatternClassifier {
        &self.classifier
    }

    fn alias(&self) -> &str {
        self.classifier.alias_prefix()
    }

    /// Directory the primary alias resolves to, as an absolute path.
    fn alias_root(&self) -> PathBuf {
        let dir = self
            .context
            .alias_dir(self.alias())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("src"));
        self.context.project_root().join(dir)
    }

    /// Deterministic for a fixed context; filesystem probes are reads only.
    pub fn infer(&self, subject: &str, file_path: &str) -> ClassifiedIntent {
        let pattern = self.classifier.classify(subject);
        let intent = ClassifiedIntent::new(subject, file_path, pattern).because(format!(
            "{}: {}",
            pattern.description(),
            pattern.action_hint()
        ));

        match pattern {
            Pattern::VersionTagged => self.version_tagged(intent),
            Pattern::NpmScoped | Pattern::NpmUnscoped => self.npm(intent),
            Pattern::RelativeUi => self.relative_marker(intent, "ui", "components/ui", UI_EXTENSIONS, 0.6),
            Pattern::RelativeLib => self.relative_marker(intent, "lib", "lib", LIB_EXTENSIONS, 0.5),
            Pattern::RelativeHooks => {
                self.relative_marker(intent, "hooks", "hooks", HOOK_EXTENSIONS, 0.5)
            }
            Pattern::RelativeLocal => intent
                .because("Relative sibling import that no longer resolves")
                .because("Most likely dead code left behind by a refactor")
                .conclude(Action::DeleteImport, None, 0.8),
            Pattern::AbsoluteAlias => self.absolute_alias(intent),
            Pattern::AbsoluteNoPrefix => {
                let corrected = format!("{}{}", self.alias(), subject);
                intent
                    .because(format!("Project path is missing the '{}' prefix", self.alias()))
                    .because(format!("Prefixed path: {corrected}"))
                    .conclude(Action::FixPath, Some(corrected), 0.95)
            }
            Pattern::Unknown => intent
                .because("No rule applies to this shape")
                .conclude(Action::Skip, None, 0.0),
        }
    }

    fn version_tagged(&self, intent: ClassifiedIntent) -> ClassifiedIntent {
        let subject = intent.subject.clone();
        let at = subject.rfind('@').unwrap_or(subject.len());
        let base = subject[..at].to_string();
        intent
            .because(format!("Version suffix '{}' is not part of an import path", &subject[at..]))
            .because(format!("Stripped specifier: {base}"))
            .conclude(Action::FixPath, Some(base), 1.0)
    }

    fn npm(&self, intent: ClassifiedIntent) -> ClassifiedIntent {
        let package = package_root(&intent.subject);

        if self.context.has_module(&package) {
            return intent
                .because(format!("'{package}' is already installed or declared"))
                .because("Likely a stale type cache; reinstall or restart the language server")
                .conclude(Action::AlreadyDeclared, None, 0.9);
        }

        let siblings = self.context.scoped_siblings(&package);
        if let Some(sibling) = siblings.first() {
            return intent
                .because(format!("Same scope already provides '{sibling}'"))
                .because("The wanted export may live in a sibling sub-package")
                .conclude(Action::CheckSubpackage, None, 0.7);
        }

        intent
            .because(format!("'{package}' is neither installed nor declared"))
            .conclude(Action::NeedsInstall, Some(package), 0.8)
    }

    fn relative_marker(
        &self,
        intent: ClassifiedIntent,
        marker: &str,
        alias_dir: &str,
        extensions: &[&str],
        missing_confidence: f64,
    ) -> ClassifiedIntent {
        let Some(rest) = segment_after(&intent.subject, marker) else {
            return intent
                .because(format!("Could not isolate the path after '/{marker}/'"))
                .conclude(Action::Skip, None, 0.0);
        };

        let corrected = format!("{}{}/{}", self.alias(), alias_dir, rest);
        let mut bases = vec![self.alias_root().join(alias_dir).join(&rest)];
        if marker == "lib" {
            bases.push(self.context.project_root().join("lib").join(&rest));
        }

        match bases
            .iter()
            .find_map(|base| probe_module_file(base, extensions))
        {
            Some(found) => intent
                .because(format!("Candidate {corrected}"))
                .because(format!("Found {}", found.display()))
                .conclude(Action::FixPath, Some(corrected), 1.0),
            None => intent
                .because(format!("Candidate {corrected}"))
                .because("No file exists at the candidate path")
                .conclude(Action::FileMissing, Some(corrected), missing_confidence),
        }
    }

    fn absolute_alias(&self, intent: ClassifiedIntent) -> ClassifiedIntent {
        let found = self
            .context
            .resolve_alias(&intent.subject)
            .and_then(|base| probe_module_file(&base, MODULE_EXTENSIONS));

        match found {
            Some(path) => intent
                .because(format!("Target exists at {}", path.display()))
                .because("The path is correct; the failure is environmental")
                .conclude(Action::AlreadyCorrect, None, 1.0),
            None => intent
                .because("Alias path does not resolve to any file")
                .conclude(Action::FileMissing, None, 0.7),
        }
    }
}
