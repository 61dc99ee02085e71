//! Confidence-gated mapping from inferred intent to a fix strategy.
//!
//! Only single-line substitutions are ever auto-applied. Deletions and new
//! files are surfaced for a human to act on.

use super::intent::{Action, ClassifiedIntent};
use crate::classify::Pattern;
use crate::config::default_confidence_threshold;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    FixPath,
    InstallNpm,
    CreateStub,
    DeleteImport,
    Skip,
}

impl Strategy {
    /// Strategies that may run without a human in the loop.
    pub fn is_auto_safe(&self) -> bool {
        matches!(self, Self::FixPath | Self::InstallNpm)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FixPath => "FIX_PATH",
            Self::InstallNpm => "INSTALL_NPM",
            Self::CreateStub => "CREATE_STUB",
            Self::DeleteImport => "DELETE_IMPORT",
            Self::Skip => "SKIP",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixDecision {
    pub strategy: Strategy,
    pub should_apply: bool,
    pub corrected_value: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
    pub intent: ClassifiedIntent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionSummary {
    pub total: usize,
    pub by_strategy: BTreeMap<Strategy, usize>,
    pub high_confidence: usize,
    pub manual_review: usize,
    pub install_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct StrategySelector {
    threshold: f64,
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new(default_confidence_threshold())
    }
}

impl StrategySelector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn select(&self, intent: &ClassifiedIntent) -> FixDecision {
        let decide = |strategy: Strategy, apply: bool, reasoning: &str| FixDecision {
            strategy,
            should_apply: apply && strategy.is_auto_safe(),
            corrected_value: intent.corrected_value.clone(),
            confidence: intent.confidence,
            reasoning: reasoning.to_string(),
            intent: intent.clone(),
        };

        if intent.confidence < self.threshold {
            return decide(
                Strategy::Skip,
                false,
                &format!(
                    "Confidence too low ({:.2} < {:.2})",
                    intent.confidence, self.threshold
                ),
            );
        }

        match intent.action {
            Action::FixPath => decide(Strategy::FixPath, true, "Rewrite the import path"),
            Action::NeedsInstall => decide(
                Strategy::InstallNpm,
                true,
                "Record the package for installation",
            ),
            Action::DeleteImport => decide(
                Strategy::DeleteImport,
                false,
                "Import looks dead; deletion needs confirmation",
            ),
            Action::AlreadyCorrect => decide(
                Strategy::Skip,
                false,
                "Path is already correct; check the environment",
            ),
            Action::AlreadyDeclared => decide(
                Strategy::Skip,
                false,
                "Package already declared; reinstall or restart",
            ),
            Action::CheckSubpackage => decide(
                Strategy::Skip,
                false,
                "Check the sibling sub-packages of this scope",
            ),
            Action::FileMissing => match intent.pattern {
                Pattern::RelativeUi | Pattern::RelativeHooks | Pattern::RelativeLib => decide(
                    Strategy::CreateStub,
                    false,
                    "Target file is missing; create it manually",
                ),
                Pattern::RelativeLocal => decide(
                    Strategy::DeleteImport,
                    false,
                    "Local file is gone; deletion needs confirmation",
                ),
                _ => decide(Strategy::Skip, false, "Target file is missing"),
            },
            Action::Skip => decide(Strategy::Skip, false, "No applicable rule"),
        }
    }

    /// Decisions grouped by strategy, preserving input order within a group.
    pub fn batch_select(&self, intents: &[ClassifiedIntent]) -> BTreeMap<Strategy, Vec<FixDecision>> {
        let mut grouped: BTreeMap<Strategy, Vec<FixDecision>> = BTreeMap::new();
        for intent in intents {
            let decision = self.select(intent);
            grouped.entry(decision.strategy).or_default().push(decision);
        }
        grouped
    }
}

/// Packages to install, deduplicated, sorted, version tags stripped.
pub fn install_list<'a, I>(decisions: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a FixDecision>,
{
    decisions
        .into_iter()
        .filter(|d| d.strategy == Strategy::InstallNpm)
        .filter_map(|d| d.corrected_value.as_deref())
        .map(|package| match package.rfind('@') {
            Some(at) if at > 0 => package[..at].to_string(),
            _ => package.to_string(),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn summarize<'a, I>(decisions: I) -> DecisionSummary
where
    I: IntoIterator<Item = &'a FixDecision>,
{
    let decisions: Vec<&FixDecision> = decisions.into_iter().collect();
    let mut summary = DecisionSummary {
        total: decisions.len(),
        ..Default::default()
    };
    for decision in &decisions {
        *summary.by_strategy.entry(decision.strategy).or_default() += 1;
        if decision.confidence >= 0.9 {
            summary.high_confidence += 1;
        }
        if decision.strategy == Strategy::Skip {
            summary.manual_review += 1;
        }
    }
    summary.install_count = install_list(decisions.iter().copied()).len();
    summary
}
