//! uitest - a scripted UI-test runner
//!
//! Reads an ordered list of textual commands (`click(#submit)`,
//! `assertEquals(#status, ready)`, ...), executes them one at a time against
//! a document through a [`driver::UiDriver`], and produces a pass/fail
//! [`runner::RunReport`].

pub mod cli;
pub mod commands;
pub mod common;
pub mod driver;
pub mod runner;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use driver::{MemoryDocument, UiDriver};
pub use runner::{ExecutionEngine, RunReport};
