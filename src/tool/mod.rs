//! Invocation of the external compiler, linter or build command.
//!
//! The rest of the pipeline only sees [`ToolRunner`], so every stage can be
//! driven from captured fixture output in tests.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool did not finish within {0:?}")]
    Timeout(Duration),

    #[error("tool crashed: {0}")]
    Crashed(String),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tool exited with unexpected status {code}")]
    UnexpectedExit { code: i32, output: ToolOutput },

    #[error("no tool command configured")]
    EmptyCommand,
}

/// Captured result of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ToolOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// stdout and stderr as one text blob.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

pub trait ToolRunner {
    /// Run `args[0]` with the remaining arguments, killing it after `timeout`.
    fn run(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolError>;
}

/// A configured command together with what counts as a normal exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub args: Vec<String>,
    pub timeout: Duration,
    pub expected_exit_codes: Vec<i32>,
}

impl ToolInvocation {
    pub fn new(args: Vec<String>, timeout: Duration, expected_exit_codes: Vec<i32>) -> Self {
        Self {
            args,
            timeout,
            expected_exit_codes,
        }
    }

    pub fn display(&self) -> String {
        self.args.join(" ")
    }

    /// Run the tool; an exit code outside the expected set is a failure.
    pub fn run(&self, runner: &dyn ToolRunner) -> Result<ToolOutput, ToolError> {
        log::debug!("Running `{}`", self.display());
        let output = runner.run(&self.args, self.timeout)?;
        if self.expected_exit_codes.contains(&output.exit_code) {
            Ok(output)
        } else {
            Err(ToolError::UnexpectedExit {
                code: output.exit_code,
                output,
            })
        }
    }
}

/// Runs the tool as a child process in the project root.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    cwd: PathBuf,
}

impl CommandRunner {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
        }
    }
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl ToolRunner for CommandRunner {
    fn run(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolError> {
        let (program, rest) = args.split_first().ok_or(ToolError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(rest)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty tool cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    log::warn!("`{}` timed out after {:?}", program, timeout);
                    return Err(ToolError::Timeout(timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(ToolError::Crashed(e.to_string())),
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        match status.code() {
            Some(exit_code) => Ok(ToolOutput {
                stdout,
                stderr,
                exit_code,
            }),
            None => Err(ToolError::Crashed(format!(
                "`{}` was terminated by a signal",
                program
            ))),
        }
    }
}
