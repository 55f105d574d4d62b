//! Mockery Harness - runs the bundled demo suites
//!
//! The binary selects suites from [`demos::catalog`], runs them one after another
//! with [`run_demos`] and maps the outcome to a process exit status.

#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod demos;

use demos::Demo;
use mockery_core::{DiagnosticSink, HarnessError, MockeryError, SuiteReport, TestRunner};
use serde::Serialize;
use tracing::{error, info};

/// Exit status when every suite passed
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status when any item failed
pub const EXIT_FAILURES: u8 = 1;
/// Exit status when a suite misused the harness
pub const EXIT_FATAL: u8 = 2;

/// Reports of every suite run, plus the misuse that stopped the run early
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    /// One report per completed suite
    pub reports: Vec<SuiteReport>,
    /// Rendered fatal misuse, if the run stopped early
    pub fatal: Option<String>,
}

impl RunSummary {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> u8 {
        if self.fatal.is_some() {
            EXIT_FATAL
        } else if self.reports.iter().all(SuiteReport::success) {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURES
        }
    }
}

/// Resolve suite names; no names selects the whole catalog
pub fn select(names: &[String]) -> Result<Vec<Demo>, MockeryError> {
    if names.is_empty() {
        return Ok(demos::catalog().to_vec());
    }
    names
        .iter()
        .map(|name| {
            demos::find(name).ok_or_else(|| MockeryError::not_found(format!("no demo suite named {name}")))
        })
        .collect()
}

/// Run `selected` in order, stopping at the first fatal misuse
pub fn run_demos<S: DiagnosticSink>(runner: &mut TestRunner<S>, selected: &[Demo]) -> RunSummary {
    let mut summary = RunSummary::default();
    for demo in selected {
        info!(suite = demo.name, "Running demo suite");
        match runner.run(&demo.suite()) {
            Ok(report) => summary.reports.push(report),
            Err(err @ HarnessError::Fatal { .. }) => {
                error!(suite = demo.name, error = %err, "Run stopped by fatal misuse");
                summary.fatal = Some(err.to_string());
                break;
            }
        }
    }
    summary
}
