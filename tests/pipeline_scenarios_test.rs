//! End-to-end behaviour of the fix pipeline on a fixture project.

mod common;

use asymm_doctor::classify::Pattern;
use asymm_doctor::config::DoctorConfig;
use asymm_doctor::context::ContextStore;
use asymm_doctor::core::{Dialect, ErrorClass};
use asymm_doctor::corruption::{
    BatchBaseline, CorruptionDetector, CorruptionEvent, CorruptionReason, RestoreAction,
    ValidationStatus,
};
use asymm_doctor::fixers::implicit_any::{infer_parameter_type, FALLBACK_TYPE};
use asymm_doctor::fixers::{BackupStore, FixEnv, Fixer, FixerRegistry};
use asymm_doctor::inference::{Action, IntentInference, Strategy, StrategySelector};
use asymm_doctor::io::RealFileSystem;
use asymm_doctor::orchestrator::FixOptions;
use asymm_doctor::parser;
use asymm_doctor::session;
use asymm_doctor::testkit::fixtures::{tsc_line, write_files};
use asymm_doctor::testkit::ScriptedRunner;
use common::{module_error, next_project, orchestrator, read, FOO};
use pretty_assertions::assert_eq;
use std::fs;
use walkdir::WalkDir;

fn fix_all_in_test_mode() -> FixOptions {
    FixOptions {
        all: true,
        test_mode: true,
        ..Default::default()
    }
}

#[test]
fn test_relative_ui_import_is_rewritten_and_kept() {
    let temp = next_project();
    let context = ContextStore::build(temp.path());
    let intent = IntentInference::new(&context, "@/")
        .infer("../ui/button", FOO)
        .at_line(1);
    assert_eq!(intent.pattern, Pattern::RelativeUi);
    assert_eq!(intent.action, Action::FixPath);
    assert_eq!(intent.corrected_value.as_deref(), Some("@/components/ui/button"));
    assert_eq!(intent.confidence, 1.0);

    let decision = StrategySelector::default().select(&intent);
    assert_eq!(decision.strategy, Strategy::FixPath);
    assert!(decision.should_apply);

    let original = read(temp.path(), FOO);
    let runner = ScriptedRunner::new()
        .then_output(&module_error(FOO, 1, "../ui/button"), 2)
        .then_output("", 0);
    let fs = RealFileSystem::new();
    let report = orchestrator(temp.path(), "s1", &runner, &fs)
        .run(&fix_all_in_test_mode())
        .unwrap();

    assert_eq!(report.initial_count, 1);
    assert_eq!(report.final_count, Some(0));
    assert_eq!(report.batches[0].status, Some(ValidationStatus::Valid));
    assert_eq!(report.batches[0].fixed, 1);
    assert!(report.corruptions.is_empty());
    assert!(read(temp.path(), FOO).starts_with("import { Button } from '@/components/ui/button'\n"));

    // The pre-write copy is byte-identical to what was on disk.
    let backup = WalkDir::new(temp.path().join(".atd/backups"))
        .into_iter()
        .filter_map(Result::ok)
        .find(|e| e.file_name() == "Foo.tsx")
        .expect("backup of Foo.tsx");
    assert_eq!(fs::read_to_string(backup.path()).unwrap(), original);
}

#[test]
fn test_version_tagged_import_is_stripped() {
    let temp = next_project();
    let context = ContextStore::build(temp.path());
    let intent = IntentInference::new(&context, "@/").infer("sonner@2.0.3", FOO);
    assert_eq!(intent.pattern, Pattern::VersionTagged);
    assert_eq!(intent.corrected_value.as_deref(), Some("sonner"));
    assert_eq!(intent.confidence, 1.0);
    assert!(StrategySelector::default().select(&intent).should_apply);

    let runner = ScriptedRunner::new()
        .then_output(&module_error(FOO, 2, "sonner@2.0.3"), 2)
        .then_output("", 0);
    let fs = RealFileSystem::new();
    orchestrator(temp.path(), "s2", &runner, &fs)
        .run(&fix_all_in_test_mode())
        .unwrap();
    assert!(read(temp.path(), FOO).contains("import { toast } from 'sonner'\n"));
}

#[test]
fn test_declared_package_is_never_edited() {
    let temp = next_project();
    write_files(
        temp.path(),
        &[("src/components/Tip.tsx", "import * as Tooltip from '@radix-ui/react-tooltip'\n")],
    )
    .unwrap();

    let context = ContextStore::build(temp.path());
    let intent = IntentInference::new(&context, "@/").infer("@radix-ui/react-tooltip", "src/components/Tip.tsx");
    assert_eq!(intent.action, Action::AlreadyDeclared);
    assert_eq!(intent.confidence, 0.9);
    assert!(!StrategySelector::default().select(&intent).should_apply);

    let before = read(temp.path(), "src/components/Tip.tsx");
    let runner = ScriptedRunner::new().then_output(
        &module_error("src/components/Tip.tsx", 1, "@radix-ui/react-tooltip"),
        2,
    );
    let fs = RealFileSystem::new();
    let report = orchestrator(temp.path(), "s3", &runner, &fs)
        .run(&fix_all_in_test_mode())
        .unwrap();

    assert_eq!(report.batches[0].fixed, 0);
    assert_eq!(report.batches[0].skipped, 1);
    assert!(report.changes.is_empty());
    assert_eq!(read(temp.path(), "src/components/Tip.tsx"), before);
}

#[test]
fn test_batch_that_lowers_the_count_is_valid() {
    let temp = next_project();
    let remaining: Vec<String> = (0..38)
        .map(|i| {
            tsc_line(
                &format!("src/f{}.ts", i % 3),
                i + 1,
                1,
                "TS2304",
                "Cannot find name 'x'.",
            )
        })
        .collect();
    let runner = ScriptedRunner::new().then_output(&remaining.join("\n"), 2);
    let invocation = DoctorConfig::default().invocation(Dialect::TypeScript);
    let detector = CorruptionDetector::new(
        Dialect::TypeScript,
        &invocation,
        &runner,
        temp.path(),
        temp.path().join(".atd/corruption-log.json"),
    );
    let files: Vec<_> = (0..3).map(|i| temp.path().join(format!("src/f{i}.ts"))).collect();
    let backups = BackupStore::new(temp.path(), temp.path().join(".atd/backups/s4/00-batch"));

    let result = detector.validate_fix_batch(
        None,
        &files,
        BatchBaseline {
            error_count: 50,
            syntax_error_count: 0,
        },
        &backups,
        None,
    );

    assert_eq!(result.status, ValidationStatus::Valid);
    assert_eq!(result.errors_fixed, 12);
    assert_eq!(result.new_count, Some(38));
    assert!(result.event.is_none());
}

#[test]
fn test_tool_failure_after_batch_restores_backups() {
    let temp = next_project();
    let fs = RealFileSystem::new();
    let foo = temp.path().join(FOO);
    let original = read(temp.path(), FOO);

    let backups = BackupStore::new(temp.path(), temp.path().join(".atd/backups/s5/00-batch"));
    backups.backup(&fs, &foo, &original).unwrap();
    fs::write(&foo, "import { Button } from '@/components/ui/button\n").unwrap();

    let before = module_error(FOO, 1, "../ui/button");
    let runner = ScriptedRunner::new()
        .then_crash("tsc exited with signal 11")
        .then_output(&before, 2);
    let invocation = DoctorConfig::default().invocation(Dialect::TypeScript);
    let log_path = temp.path().join(".atd/corruption-log.json");
    let detector = CorruptionDetector::new(Dialect::TypeScript, &invocation, &runner, temp.path(), &log_path);

    let result = detector.validate_fix_batch(
        None,
        &[foo.clone()],
        BatchBaseline {
            error_count: 1,
            syntax_error_count: 0,
        },
        &backups,
        None,
    );

    assert_eq!(result.status, ValidationStatus::Corrupted);
    assert_eq!(result.reason, Some(CorruptionReason::ToolCheckFailed));
    assert_eq!(fs::read_to_string(&foo).unwrap(), original);

    let events: Vec<CorruptionEvent> = session::read_log(&log_path).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action_taken, RestoreAction::AutoReverted);
    assert!(events[0].success);
}

#[test]
fn test_pipeline_reports_crashing_batch_as_failed() {
    let temp = next_project();
    let original = read(temp.path(), FOO);
    let before = module_error(FOO, 1, "../ui/button");
    let runner = ScriptedRunner::new()
        .then_output(&before, 2)
        .then_crash("tsc exited with signal 11")
        .then_output(&before, 2);
    let fs = RealFileSystem::new();

    let report = orchestrator(temp.path(), "s5b", &runner, &fs)
        .run(&fix_all_in_test_mode())
        .unwrap();

    let batch = &report.batches[0];
    assert!(batch.is_corrupted());
    assert_eq!(batch.reason, Some(CorruptionReason::ToolCheckFailed));
    assert_eq!(batch.fixed, 0);
    assert!(!report.unrecoverable);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(read(temp.path(), FOO), original);
}

#[test]
fn test_unknown_parameter_context_falls_back_to_unknown() {
    let temp = next_project();
    let source = "export const ids = items.map((item) => item.id)\n";
    write_files(temp.path(), &[("src/list.ts", source)]).unwrap();

    let context = ContextStore::build(temp.path());
    let guess = infer_parameter_type(&context, source.trim_end(), "item");
    assert_eq!(guess.ty, FALLBACK_TYPE);
    assert_ne!(guess.ty, "any");

    let column = source.find("(item)").unwrap() + 2;
    let records = parser::parse(
        Dialect::TypeScript,
        &tsc_line(
            "src/list.ts",
            1,
            column,
            "TS7006",
            "Parameter 'item' implicitly has an 'any' type.",
        ),
    );
    let fs = RealFileSystem::new();
    let backups = BackupStore::new(temp.path(), temp.path().join(".atd/backups/s6/00-batch"));
    let env = FixEnv {
        project_root: temp.path(),
        context: &context,
        fs: &fs,
        backups: &backups,
        selector: StrategySelector::default(),
        alias_prefix: "@/",
        dry_run: false,
    };
    let registry = FixerRegistry::for_dialect(Dialect::TypeScript);
    let fixer = registry.get(&ErrorClass::ImplicitAnyParameter).unwrap();
    let report = fixer.fix_errors(&records, &env);

    assert_eq!(report.fixed, 1);
    assert_eq!(
        read(temp.path(), "src/list.ts"),
        "export const ids = items.map((item: unknown) => item.id)\n"
    );
}
