//! Testing infrastructure: scripted tool runs and project fixtures.
//!
//! The pipeline only talks to the external tool through
//! [`ToolRunner`](crate::tool::ToolRunner), so tests script the tool's output
//! with [`ScriptedRunner`] and run everything else for real against a
//! temporary project written with [`fixtures::write_files`].
//!
//! ```rust,ignore
//! use asymm_doctor::testkit::{fixtures, ScriptedRunner};
//!
//! let temp = tempfile::TempDir::new().unwrap();
//! fixtures::write_files(temp.path(), fixtures::NEXT_PROJECT).unwrap();
//! let runner = ScriptedRunner::new()
//!     .then_output(&fixtures::tsc_line("src/components/Foo.tsx", 1, 24, "TS2307", "Cannot find module '../ui/button'."), 2)
//!     .then_output("", 0);
//! ```

pub mod fixtures;
pub mod runner;

pub use runner::{Scripted, ScriptedRunner};
