//! Tool output parsers, one per dialect.
//!
//! Parsing never fails: unmatched lines are skipped and the result degrades
//! to fewer records.

pub mod build;
pub mod eslint;
pub mod statistics;
pub mod typescript;

pub use build::BuildParser;
pub use eslint::EslintParser;
pub use statistics::{describe_code, ErrorStatistics};
pub use typescript::TypeScriptParser;

use crate::core::{Dialect, ErrorRecord};

pub trait OutputParser {
    /// Turn raw tool output into deduplicated records, in first-seen order.
    fn parse(&self, raw: &str) -> Vec<ErrorRecord>;
}

pub fn parser_for(dialect: Dialect) -> Box<dyn OutputParser> {
    match dialect {
        Dialect::TypeScript => Box::new(TypeScriptParser),
        Dialect::Build => Box::new(BuildParser),
        Dialect::Lint => Box::new(EslintParser),
    }
}

pub fn parse(dialect: Dialect, raw: &str) -> Vec<ErrorRecord> {
    parser_for(dialect).parse(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_parsing_is_deterministic(raw in "(?s).{0,400}") {
            for dialect in [Dialect::TypeScript, Dialect::Build, Dialect::Lint] {
                prop_assert_eq!(parse(dialect, &raw), parse(dialect, &raw));
            }
        }

        #[test]
        fn prop_compiler_lines_roundtrip_location(
            file in "[a-z]{1,8}/[a-z]{1,8}\\.tsx?",
            line in 1usize..5000,
            column in 1usize..200,
            code in 1000u32..9999,
        ) {
            let raw = format!("{file}({line},{column}): error TS{code}: Something went wrong.");
            let records = parse(Dialect::TypeScript, &raw);
            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(&records[0].file, &file);
            prop_assert_eq!(records[0].line, line);
            prop_assert_eq!(records[0].column, column);
        }
    }

    #[test]
    fn test_empty_input_is_empty_for_every_dialect() {
        for dialect in [Dialect::TypeScript, Dialect::Build, Dialect::Lint] {
            assert!(parse(dialect, "").is_empty());
        }
    }
}
