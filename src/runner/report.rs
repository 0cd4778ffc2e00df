//! Run reporting
//!
//! The aggregator collects one [`Outcome`] per reported command while a run
//! is in progress; finishing it produces the [`RunReport`].

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Result of one reported command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub succeeded: bool,
    pub message: String,
    /// Script text of the command
    pub command: String,
}

impl Outcome {
    pub fn passed(command: &str, message: String) -> Self {
        Self {
            succeeded: true,
            message,
            command: command.to_string(),
        }
    }

    pub fn failed(command: &str, message: String) -> Self {
        Self {
            succeeded: false,
            message,
            command: command.to_string(),
        }
    }
}

/// Final result of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Outcomes in execution order
    pub outcomes: Vec<Outcome>,
    /// Script lines abandoned before they ran
    pub incomplete: Vec<String>,
    /// Why the run stopped early, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    /// Wall time from the start of reporting to the end of the run
    pub elapsed_ms: u64,
    /// Wall time minus the delays the runner inserted between commands
    pub elapsed_without_delays_ms: u64,
    /// Sum of inserted delays
    pub delays_ms: u64,
}

impl RunReport {
    pub fn passed(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }

    pub fn passed_count(&self) -> usize {
        self.passed().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Every command ran and passed
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && self.incomplete.is_empty() && self.aborted.is_none()
    }

    /// Human-readable summary
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{}", "Testing Report".bold());
        let _ = writeln!(
            out,
            "Finished in {}s ({}s without added delays)",
            self.elapsed_ms.div_ceil(1000),
            self.elapsed_without_delays_ms.div_ceil(1000)
        );
        let _ = writeln!(
            out,
            "{}",
            format!("{} tests passed", self.passed_count()).green()
        );
        let failed = format!("{} tests failed", self.failed_count());
        if self.failed_count() > 0 {
            let _ = writeln!(out, "{}", failed.red());
        } else {
            let _ = writeln!(out, "{}", failed);
        }

        if self.failed_count() > 0 {
            let _ = writeln!(out, "\n{}", "Failed tests".red().bold());
            for outcome in self.failed() {
                let _ = writeln!(out, "  {} {}", "✗".red(), outcome.message);
            }
        }

        if !self.incomplete.is_empty() {
            let header = match &self.aborted {
                Some(reason) => format!("Unable to complete the following tests ({})", reason),
                None => "Unable to complete the following tests".to_string(),
            };
            let _ = writeln!(out, "\n{}", header.yellow().bold());
            for command in &self.incomplete {
                let _ = writeln!(out, "  {}", command.dimmed());
            }
        }

        out
    }
}

/// Accumulates outcomes for the run in progress
#[derive(Debug)]
pub struct ReportAggregator {
    started: Instant,
    outcomes: Vec<Outcome>,
    delays: Duration,
}

impl ReportAggregator {
    /// Start a fresh accumulator, timed from now
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            outcomes: Vec::new(),
            delays: Duration::ZERO,
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    /// Account for a delay the runner inserted
    pub fn record_delay(&mut self, delay: Duration) {
        self.delays += delay;
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Close the accumulator
    ///
    /// Returns `None` when nothing was recorded: empty reports are not rendered.
    pub fn finish(self, incomplete: Vec<String>, aborted: Option<String>) -> Option<RunReport> {
        if self.outcomes.is_empty() {
            tracing::debug!("No outcomes recorded, suppressing report");
            return None;
        }

        let elapsed = self.started.elapsed();
        let without_delays = elapsed.saturating_sub(self.delays);

        Some(RunReport {
            outcomes: self.outcomes,
            incomplete,
            aborted,
            elapsed_ms: elapsed.as_millis() as u64,
            elapsed_without_delays_ms: without_delays.as_millis() as u64,
            delays_ms: self.delays.as_millis() as u64,
        })
    }
}
