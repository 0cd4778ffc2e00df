//! Per-run state
//!
//! Everything a run mutates (the command queue, the report accumulator,
//! abandoned commands) lives in one [`RunContext`] owned by the engine.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;

use super::parser::{self, Command};
use super::registry::Action;
use super::report::{Outcome, ReportAggregator, RunReport};
use crate::common::config::RunnerConfig;
use crate::common::Result;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Loading,
    Running,
    Aborted,
    Completed,
    Reported,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Loading => write!(f, "loading"),
            RunState::Running => write!(f, "running"),
            RunState::Aborted => write!(f, "aborted"),
            RunState::Completed => write!(f, "completed"),
            RunState::Reported => write!(f, "reported"),
        }
    }
}

/// One queued command
#[derive(Debug, Clone)]
pub struct Step {
    /// Script line, or the rendered command for synthetic steps
    pub text: String,
    pub command: Command,
    pub action: Action,
    /// Injected by the engine rather than read from the script
    pub synthetic: bool,
}

impl Step {
    /// Parse and validate a script line
    pub fn parse(text: &str) -> Result<Self> {
        let command = parser::parse(text)?;
        let action = Action::resolve(&command)?;
        Ok(Self {
            text: text.to_string(),
            command,
            action,
            synthetic: false,
        })
    }

    /// Injected inter-command delay
    pub fn delay(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self::synthetic(
            Command::new("wait", [ms.to_string()]),
            Action::Wait { ms },
        )
    }

    /// Injected focus check after a key press
    pub fn focus_check(key: &str) -> Self {
        Self::synthetic(
            Command::new("checkFocus", [key]),
            Action::CheckFocus {
                key: key.to_string(),
            },
        )
    }

    fn synthetic(command: Command, action: Action) -> Self {
        Self {
            text: command.to_string(),
            command,
            action,
            synthetic: true,
        }
    }

    /// Whether this step produces an outcome in the report
    pub fn is_reported(&self) -> bool {
        !self.synthetic && self.action.is_reported()
    }
}

/// State of a single run
#[derive(Debug)]
pub struct RunContext {
    pub key_map: HashMap<String, u32>,
    pub timeout: Duration,
    pub delay: Duration,
    pub queue: VecDeque<Step>,
    pub incomplete: Vec<String>,
    state: RunState,
    aborted: Option<String>,
    aggregator: Option<ReportAggregator>,
    report: Option<RunReport>,
}

impl RunContext {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            key_map: config.key_map.clone(),
            timeout: config.timeout(),
            delay: config.delay(),
            queue: VecDeque::new(),
            incomplete: Vec::new(),
            state: RunState::Idle,
            aborted: None,
            aggregator: None,
            report: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: RunState) {
        tracing::debug!("Run state: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Why the run stopped early, if it did
    pub fn aborted(&self) -> Option<&str> {
        self.aborted.as_deref()
    }

    /// Start (or restart) recording outcomes
    pub fn begin_report(&mut self) {
        if self.aggregator.is_some() {
            tracing::debug!("Restarting report accumulator");
        }
        self.aggregator = Some(ReportAggregator::start());
    }

    pub fn is_reporting(&self) -> bool {
        self.aggregator.is_some()
    }

    /// Record an outcome; dropped when reporting is off
    pub fn record(&mut self, outcome: Outcome) {
        if let Some(aggregator) = &mut self.aggregator {
            aggregator.record(outcome);
        }
    }

    pub fn record_delay(&mut self, delay: Duration) {
        if let Some(aggregator) = &mut self.aggregator {
            aggregator.record_delay(delay);
        }
    }

    /// Move every queued step into the incomplete list and end the run
    pub fn abandon_queue(&mut self, reason: String) {
        self.incomplete
            .extend(self.queue.drain(..).map(|step| step.text));
        self.aborted = Some(reason);
        self.set_state(RunState::Aborted);
    }

    /// Close the accumulator and keep its report
    ///
    /// Without an active accumulator this only attaches commands abandoned
    /// since a report was generated.
    pub fn finish_report(&mut self) {
        let incomplete = std::mem::take(&mut self.incomplete);
        match self.aggregator.take() {
            Some(aggregator) => {
                self.report = aggregator.finish(incomplete, self.aborted.clone());
            }
            None => {
                if let Some(report) = &mut self.report {
                    report.incomplete.extend(incomplete);
                    if report.aborted.is_none() {
                        report.aborted = self.aborted.clone();
                    }
                }
            }
        }
    }

    pub fn take_report(&mut self) -> Option<RunReport> {
        self.report.take()
    }
}
