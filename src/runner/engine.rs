//! Execution engine
//!
//! Drains the command queue one step at a time. After every step settles the
//! engine records its outcome and may push synthetic steps to the front of
//! the queue: a focus check after `keyPress`, then the configured delay after
//! anything but a `wait`, so the delay runs first. A lost focus abandons the rest of the queue.

use std::sync::Arc;

use super::context::{RunContext, RunState, Step};
use super::registry::{Action, CommandRegistry};
use super::report::{Outcome, RunReport};
use crate::common::config::RunnerConfig;
use crate::common::{Error, Result};
use crate::driver::UiDriver;

/// Sequential command interpreter for one run
pub struct ExecutionEngine {
    registry: CommandRegistry,
    ctx: RunContext,
    stop_on_failure: bool,
    clear_local_storage: bool,
}

impl ExecutionEngine {
    pub fn new(driver: Arc<dyn UiDriver>, config: &RunnerConfig) -> Self {
        Self {
            registry: CommandRegistry::new(driver),
            ctx: RunContext::new(config),
            stop_on_failure: config.stop_on_failure,
            clear_local_storage: config.clear_local_storage,
        }
    }

    pub fn state(&self) -> RunState {
        self.ctx.state()
    }

    /// Parse and queue a script
    ///
    /// Every line is validated before anything runs; the first bad line
    /// fails the load with its 1-based line number.
    pub fn load<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<usize> {
        if self.ctx.state() != RunState::Idle {
            return Err(Error::Internal(format!(
                "cannot load a script while the run is {}",
                self.ctx.state()
            )));
        }

        self.ctx.set_state(RunState::Loading);

        let mut steps = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match Step::parse(line.as_ref()) {
                Ok(step) => steps.push(step),
                Err(e) => {
                    self.ctx.set_state(RunState::Idle);
                    return Err(e.at_line(i + 1));
                }
            }
        }

        self.ctx.queue.extend(steps);
        tracing::debug!(commands = self.ctx.queue.len(), "Script loaded");
        Ok(self.ctx.queue.len())
    }

    /// Run the loaded script to completion or abort
    ///
    /// Returns `None` when no outcome was recorded.
    pub async fn run(&mut self) -> Result<Option<RunReport>> {
        if self.ctx.state() != RunState::Loading {
            return Err(Error::Internal(format!(
                "cannot run while the run is {}",
                self.ctx.state()
            )));
        }

        self.ctx.set_state(RunState::Running);
        self.ctx.begin_report();
        tracing::info!("Running {} commands", self.ctx.queue.len());

        while let Some(step) = self.ctx.queue.pop_front() {
            let result = self.registry.execute(&step.action, &mut self.ctx).await;
            self.settle(step, result);

            if self.ctx.state() == RunState::Aborted {
                break;
            }
        }

        if self.ctx.state() == RunState::Running {
            self.ctx.set_state(RunState::Completed);
        }

        self.finalize().await
    }

    /// Record the outcome of a settled step and schedule what follows it
    fn settle(&mut self, step: Step, result: Result<String>) {
        let reported = step.is_reported();

        let failure = match result {
            Ok(message) => {
                if reported {
                    tracing::info!("{}", message);
                    self.ctx.record(Outcome::passed(&step.text, message));
                } else {
                    tracing::debug!("{}", message);
                }
                None
            }
            Err(e) => {
                let message = format!("[{}] {}", step.action.name(), e);
                if reported {
                    tracing::warn!("{}", message);
                    self.ctx.record(Outcome::failed(&step.text, message));
                } else {
                    tracing::debug!("{}", message);
                }
                Some(e)
            }
        };

        if step.synthetic {
            if let Action::Wait { ms } = step.action {
                self.ctx.record_delay(std::time::Duration::from_millis(ms));
            }
        }

        if let Some(e) = &failure {
            if e.is_abort() {
                tracing::warn!("{}, abandoning {} commands", e, self.ctx.queue.len());
                self.ctx.abandon_queue(e.to_string());
                return;
            }
            if reported && self.stop_on_failure {
                tracing::warn!("Stopping after failure of {}", step.text);
                self.ctx
                    .abandon_queue(format!("Stopped after failure of {}", step.text));
                return;
            }
        }

        if let Action::KeyPress { key } = &step.action {
            self.ctx.queue.push_front(Step::focus_check(key));
        }

        let is_wait = matches!(step.action, Action::Wait { .. });
        if !is_wait && !self.ctx.delay.is_zero() {
            self.ctx.queue.push_front(Step::delay(self.ctx.delay));
        }
    }

    async fn finalize(&mut self) -> Result<Option<RunReport>> {
        tracing::info!("All tests completed");

        if self.clear_local_storage {
            match self.registry.driver().clear_local_storage().await {
                Ok(()) => tracing::info!("Local storage cleared"),
                Err(e) => tracing::warn!("Failed to clear local storage: {}", e),
            }
        }

        self.ctx.finish_report();
        self.ctx.set_state(RunState::Reported);
        Ok(self.ctx.take_report())
    }
}
