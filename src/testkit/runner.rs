//! A [`ToolRunner`] that replays scripted results instead of spawning a process.

use crate::tool::{ToolError, ToolOutput, ToolRunner};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted tool run.
#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    Output(ToolOutput),
    Timeout,
    Crash(String),
}

impl Scripted {
    fn into_result(self, timeout: Duration) -> Result<ToolOutput, ToolError> {
        match self {
            Self::Output(output) => Ok(output),
            Self::Timeout => Err(ToolError::Timeout(timeout)),
            Self::Crash(reason) => Err(ToolError::Crashed(reason)),
        }
    }
}

type Responder = dyn Fn(usize) -> Scripted + Send + Sync;

/// Replays queued runs in order; the last one repeats once the queue is drained.
///
/// ```rust,ignore
/// let runner = ScriptedRunner::new()
///     .then_output("src/a.ts(1,20): error TS2307: Cannot find module '../ui/button'.", 2)
///     .then_output("", 0);
/// ```
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    queue: Arc<Mutex<VecDeque<Scripted>>>,
    last: Arc<Mutex<Option<Scripted>>>,
    responder: Option<Arc<Responder>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute each run from the call index, e.g. from the files on disk.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(usize) -> Scripted + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::default()
        }
    }

    pub fn then(self, run: Scripted) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(run);
        }
        self
    }

    pub fn then_output(self, stdout: &str, exit_code: i32) -> Self {
        self.then(Scripted::Output(ToolOutput::new(stdout, "", exit_code)))
    }

    pub fn then_timeout(self) -> Self {
        self.then(Scripted::Timeout)
    }

    pub fn then_crash(self, reason: &str) -> Self {
        self.then(Scripted::Crash(reason.to_string()))
    }

    /// Arguments of every run so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    fn next(&self, index: usize) -> Scripted {
        if let Some(responder) = &self.responder {
            return responder(index);
        }
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        let mut last = match self.last.lock() {
            Ok(last) => last,
            Err(poisoned) => poisoned.into_inner(),
        };
        match queued {
            Some(run) => {
                *last = Some(run.clone());
                run
            }
            None => last
                .clone()
                .unwrap_or_else(|| Scripted::Output(ToolOutput::default())),
        }
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolError> {
        let index = match self.calls.lock() {
            Ok(mut calls) => {
                calls.push(args.to_vec());
                calls.len() - 1
            }
            Err(_) => 0,
        };
        self.next(index).into_result(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(runner: &ScriptedRunner) -> Result<ToolOutput, ToolError> {
        runner.run(&["tsc".to_string()], Duration::from_secs(1))
    }

    #[test]
    fn test_replays_in_order_then_repeats_last() {
        let runner = ScriptedRunner::new()
            .then_output("first", 2)
            .then_timeout()
            .then_output("last", 0);
        assert_eq!(run(&runner).unwrap().stdout, "first");
        assert!(matches!(run(&runner), Err(ToolError::Timeout(_))));
        assert_eq!(run(&runner).unwrap().stdout, "last");
        assert_eq!(run(&runner).unwrap().stdout, "last");
        assert_eq!(runner.call_count(), 4);
    }

    #[test]
    fn test_responder_sees_call_index() {
        let runner = ScriptedRunner::from_fn(|i| Scripted::Output(ToolOutput::new(i.to_string(), "", 0)));
        assert_eq!(run(&runner).unwrap().stdout, "0");
        assert_eq!(run(&runner).unwrap().stdout, "1");
    }
}
