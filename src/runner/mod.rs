//! Script runner
//!
//! Parses a test script into validated steps and executes them one at a
//! time against a [`UiDriver`](crate::driver::UiDriver), producing a
//! [`RunReport`].

pub mod context;
pub mod engine;
pub mod parser;
pub mod registry;
pub mod report;
pub mod waiter;

pub use context::{RunContext, RunState, Step};
pub use engine::ExecutionEngine;
pub use parser::{parse, Command};
pub use registry::{all_commands, find_command, Action, CommandInfo, CommandRegistry};
pub use report::{Outcome, ReportAggregator, RunReport};
pub use waiter::await_element;
