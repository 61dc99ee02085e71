//! Intent inference and strategy selection for unresolved imports.

pub mod intent;
pub mod strategy;

pub use intent::{probe_module_file, resolve_import, Action, ClassifiedIntent, IntentInference};
pub use strategy::{install_list, summarize, DecisionSummary, FixDecision, Strategy, StrategySelector};
