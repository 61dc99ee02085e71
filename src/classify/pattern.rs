use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Packages that look like project paths but are always published modules.
const KNOWN_PACKAGES: &[&str] = &[
    "@radix-ui",
    "@dnd-kit",
    "@tanstack",
    "@hookform",
    "canvas-confetti",
    "sonner",
    "recharts",
    "framer-motion",
    "lucide-react",
    "date-fns",
    "zod",
    "react-hook-form",
    "three",
    "gsap",
    "d3",
    "clsx",
    "tailwind-merge",
];

/// Segments that mark a bare specifier as a project path missing its alias.
const PROJECT_SEGMENTS: &[&str] = &["components", "lib", "hooks", "stores", "types", "utils", "app"];

/// The shape of an import specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    VersionTagged,
    NpmScoped,
    NpmUnscoped,
    RelativeUi,
    RelativeLib,
    RelativeHooks,
    RelativeLocal,
    AbsoluteAlias,
    AbsoluteNoPrefix,
    Unknown,
}

impl Pattern {
    pub const ALL: [Pattern; 10] = [
        Pattern::VersionTagged,
        Pattern::NpmScoped,
        Pattern::NpmUnscoped,
        Pattern::RelativeUi,
        Pattern::RelativeLib,
        Pattern::RelativeHooks,
        Pattern::RelativeLocal,
        Pattern::AbsoluteAlias,
        Pattern::AbsoluteNoPrefix,
        Pattern::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VersionTagged => "version_tagged",
            Self::NpmScoped => "npm_scoped",
            Self::NpmUnscoped => "npm_unscoped",
            Self::RelativeUi => "relative_ui",
            Self::RelativeLib => "relative_lib",
            Self::RelativeHooks => "relative_hooks",
            Self::RelativeLocal => "relative_local",
            Self::AbsoluteAlias => "absolute_alias",
            Self::AbsoluteNoPrefix => "absolute_no_prefix",
            Self::Unknown => "unknown",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::VersionTagged => "Package import with a version suffix (sonner@2.0.3)",
            Self::NpmScoped => "Scoped npm package (@scope/package)",
            Self::NpmUnscoped => "Unscoped npm package",
            Self::RelativeUi => "Relative import of a UI component",
            Self::RelativeLib => "Relative import of a lib utility",
            Self::RelativeHooks => "Relative import of a hook",
            Self::RelativeLocal => "Relative import of a sibling file",
            Self::AbsoluteAlias => "Alias-prefixed project import",
            Self::AbsoluteNoPrefix => "Project path missing its alias prefix",
            Self::Unknown => "Unrecognised import shape",
        }
    }

    pub fn action_hint(&self) -> &'static str {
        match self {
            Self::VersionTagged => "strip the version suffix",
            Self::NpmScoped | Self::NpmUnscoped => "check the dependency manifest",
            Self::RelativeUi | Self::RelativeLib | Self::RelativeHooks => {
                "rewrite to the alias-prefixed path"
            }
            Self::RelativeLocal => "likely dead import, review manually",
            Self::AbsoluteAlias => "verify the target file exists",
            Self::AbsoluteNoPrefix => "add the alias prefix",
            Self::Unknown => "manual review",
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(
            self,
            Self::RelativeUi | Self::RelativeLib | Self::RelativeHooks | Self::RelativeLocal
        )
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an import specifier to exactly one [`Pattern`].
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    alias_prefix: String,
    known_packages: BTreeSet<String>,
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new("@/")
    }
}

fn has_segment(path: &str, segment: &str) -> bool {
    path.contains(&format!("/{segment}/")) || path.ends_with(&format!("/{segment}"))
}

impl PatternClassifier {
    pub fn new(alias_prefix: impl Into<String>) -> Self {
        Self {
            alias_prefix: alias_prefix.into(),
            known_packages: KNOWN_PACKAGES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Treat these names (installed or declared packages) as npm modules too.
    pub fn with_known_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_packages
            .extend(packages.into_iter().map(Into::into));
        self
    }

    pub fn alias_prefix(&self) -> &str {
        &self.alias_prefix
    }

    fn is_known_package(&self, specifier: &str) -> bool {
        let first = specifier.split('/').next().unwrap_or(specifier);
        self.known_packages.contains(first) || self.known_packages.contains(specifier)
    }

    /// Total: every input maps to one pattern, `Unknown` as the fallback.
    pub fn classify(&self, subject: &str) -> Pattern {
        let s = subject.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Pattern::Unknown;
        }

        let alias = self.alias_prefix.as_str();

        // A version suffix after the first character, outside alias paths.
        if s.rfind('@').is_some_and(|at| at > 0) && !s.starts_with(alias) {
            return Pattern::VersionTagged;
        }

        if s.starts_with(alias) {
            return Pattern::AbsoluteAlias;
        }

        if s.starts_with('@') {
            return match s.split_once('/') {
                Some((scope, name)) if scope.len() > 1 && !name.is_empty() => Pattern::NpmScoped,
                _ => Pattern::Unknown,
            };
        }

        if s.starts_with("./") || s.starts_with("../") {
            return if has_segment(s, "ui") {
                Pattern::RelativeUi
            } else if has_segment(s, "hooks") {
                Pattern::RelativeHooks
            } else if has_segment(s, "lib") {
                Pattern::RelativeLib
            } else {
                Pattern::RelativeLocal
            };
        }

        if s.starts_with('.') || s.starts_with('/') || s.starts_with('\\') {
            return Pattern::Unknown;
        }

        if self.is_known_package(s) {
            return Pattern::NpmUnscoped;
        }

        let first = s.split('/').next().unwrap_or(s);
        if s.contains('/') && PROJECT_SEGMENTS.contains(&first) {
            return Pattern::AbsoluteNoPrefix;
        }

        Pattern::NpmUnscoped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classify(s: &str) -> Pattern {
        PatternClassifier::default().classify(s)
    }

    #[test]
    fn test_version_tagged() {
        assert_eq!(classify("sonner@2.0.3"), Pattern::VersionTagged);
        assert_eq!(
            classify("@radix-ui/react-dialog@1.0.5"),
            Pattern::VersionTagged
        );
    }

    #[test]
    fn test_npm_patterns() {
        assert_eq!(classify("@radix-ui/react-tooltip"), Pattern::NpmScoped);
        assert_eq!(classify("react"), Pattern::NpmUnscoped);
        assert_eq!(classify("lucide-react"), Pattern::NpmUnscoped);
        assert_eq!(classify("date-fns/format"), Pattern::NpmUnscoped);
    }

    #[test]
    fn test_relative_patterns() {
        assert_eq!(classify("../ui/button"), Pattern::RelativeUi);
        assert_eq!(classify("../../components/ui"), Pattern::RelativeUi);
        assert_eq!(classify("../hooks/use-toast"), Pattern::RelativeHooks);
        assert_eq!(classify("../../lib/utils"), Pattern::RelativeLib);
        assert_eq!(classify("../lib"), Pattern::RelativeLib);
        assert_eq!(classify("../library/x"), Pattern::RelativeLocal);
        assert_eq!(classify("./helpers"), Pattern::RelativeLocal);
    }

    #[test]
    fn test_alias_patterns() {
        assert_eq!(classify("@/components/ui/button"), Pattern::AbsoluteAlias);
        assert_eq!(classify("components/ui/card"), Pattern::AbsoluteNoPrefix);
        assert_eq!(classify("lib/utils"), Pattern::AbsoluteNoPrefix);
    }

    #[test]
    fn test_custom_alias_prefix() {
        let classifier = PatternClassifier::new("~/");
        assert_eq!(classifier.classify("~/lib/db"), Pattern::AbsoluteAlias);
        assert_eq!(classifier.classify("@/lib/db"), Pattern::Unknown);
    }

    #[test]
    fn test_known_packages_from_context() {
        let classifier = PatternClassifier::default().with_known_packages(["lib"]);
        assert_eq!(classifier.classify("lib/utils"), Pattern::NpmUnscoped);
    }

    #[test]
    fn test_unknown_fallbacks() {
        assert_eq!(classify(""), Pattern::Unknown);
        assert_eq!(classify("@"), Pattern::Unknown);
        assert_eq!(classify(".hidden"), Pattern::Unknown);
        assert_eq!(classify("/abs/path"), Pattern::Unknown);
        assert_eq!(classify("has space"), Pattern::Unknown);
    }

    proptest! {
        #[test]
        fn prop_classification_is_total(s in "\\PC{0,40}") {
            let pattern = classify(&s);
            prop_assert!(Pattern::ALL.contains(&pattern));
            prop_assert_eq!(pattern, classify(&s));
        }
    }
}
