//! A batch never leaves the tree with more errors than it started with.

mod common;

use asymm_doctor::config::DoctorConfig;
use asymm_doctor::core::Dialect;
use asymm_doctor::corruption::{run_tool_check, CorruptionReason, ToolCheck};
use asymm_doctor::io::RealFileSystem;
use asymm_doctor::orchestrator::FixOptions;
use asymm_doctor::testkit::fixtures::tsc_line;
use asymm_doctor::testkit::{Scripted, ScriptedRunner};
use asymm_doctor::tool::ToolOutput;
use common::{module_error, next_project, orchestrator, FOO};
use proptest::prelude::*;
use std::fs;
use std::path::PathBuf;

/// A tool whose report depends on the file on disk: the original import
/// yields one error, the rewritten one yields `after_fix` errors.
fn disk_backed_tool(root: PathBuf, after_fix: usize) -> ScriptedRunner {
    ScriptedRunner::from_fn(move |_| {
        let content = fs::read_to_string(root.join(FOO)).unwrap_or_default();
        let stdout = if content.contains("'../ui/button'") {
            module_error(FOO, 1, "../ui/button")
        } else {
            (0..after_fix)
                .map(|i| tsc_line(FOO, i + 1, 1, "TS2322", "Type 'string' is not assignable to type 'number'."))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let exit_code = if stdout.is_empty() { 0 } else { 2 };
        Scripted::Output(ToolOutput::new(stdout, "", exit_code))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_error_count_never_rises_above_baseline(after_fix in 0usize..6) {
        let temp = next_project();
        let runner = disk_backed_tool(temp.path().to_path_buf(), after_fix);
        let fs = RealFileSystem::new();

        let report = orchestrator(temp.path(), "prop", &runner, &fs)
            .run(&FixOptions { all: true, test_mode: true, ..Default::default() })
            .unwrap();
        let baseline = report.initial_count;
        prop_assert_eq!(baseline, 1);

        let batch = &report.batches[0];
        if after_fix > baseline {
            prop_assert!(batch.is_corrupted());
            prop_assert_eq!(batch.reason, Some(CorruptionReason::ErrorsIncreased));
        } else {
            prop_assert!(!batch.is_corrupted());
        }

        // Re-run the tool against whatever the session left behind.
        let invocation = DoctorConfig::default().invocation(Dialect::TypeScript);
        match run_tool_check(Dialect::TypeScript, &invocation, &runner) {
            ToolCheck::Counted(records) => prop_assert!(records.len() <= baseline),
            ToolCheck::Failed { reason, .. } => prop_assert!(false, "tool failed: {}", reason),
        }
        prop_assert_eq!(report.final_count.map(|n| n <= baseline), Some(true));
    }
}
