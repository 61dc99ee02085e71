// Shared fixtures for asymm-doctor integration tests
#![allow(dead_code)]

use asymm_doctor::config::DoctorConfig;
use asymm_doctor::core::Dialect;
use asymm_doctor::io::RealFileSystem;
use asymm_doctor::orchestrator::Orchestrator;
use asymm_doctor::session::Session;
use asymm_doctor::testkit::fixtures::{tsc_line, write_files, NEXT_PROJECT};
use asymm_doctor::testkit::ScriptedRunner;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const FOO: &str = "src/components/Foo.tsx";

/// A small Next.js project: tsconfig alias, a ui button, a schema.
pub fn next_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_files(temp.path(), NEXT_PROJECT).unwrap();
    temp
}

pub fn module_error(file: &str, line: usize, module: &str) -> String {
    tsc_line(
        file,
        line,
        24,
        "TS2307",
        &format!("Cannot find module '{module}' or its corresponding type declarations."),
    )
}

pub fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).unwrap()
}

pub fn orchestrator<'a>(
    root: &Path,
    id: &str,
    runner: &'a ScriptedRunner,
    fs: &'a RealFileSystem,
) -> Orchestrator<'a> {
    let session = Session::with_id(root, Dialect::TypeScript, id);
    Orchestrator::new(session, DoctorConfig::default(), runner, fs)
}
