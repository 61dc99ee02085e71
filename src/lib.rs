//! Self-healing fixer for TypeScript compiler, build and lint errors.
//!
//! One run of the tool is parsed into [`core::ErrorRecord`]s, grouped by
//! [`core::ErrorClass`] and handed to the fixer registered for each class.
//! Every batch is committed on a fix branch, re-validated against the same
//! tool, and reverted when it made things worse.

pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod core;
pub mod corruption;
pub mod fixers;
pub mod formatting;
pub mod inference;
pub mod io;
pub mod orchestrator;
pub mod parser;
pub mod session;
pub mod testkit;
pub mod tool;
pub mod vcs;

pub use crate::config::DoctorConfig;
pub use crate::core::{Dialect, ErrorClass, ErrorRecord};
pub use crate::orchestrator::{Analysis, FixOptions, Orchestrator, PipelineError, SessionReport};
