//! Shape classification of import specifiers.

pub mod pattern;

pub use pattern::{Pattern, PatternClassifier};
