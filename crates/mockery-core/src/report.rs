//! Suite results and diagnostic output

use crate::errors::{Result, TestFailure};
use crate::suite::Role;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Outcome of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Returned normally with nothing left over
    Passed,
    /// Unwound, or left state behind
    Failed,
    /// No body to run
    Skipped,
}

/// Result of one item with every diagnostic it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    /// Item name
    pub name: String,
    /// Item role
    pub role: Role,
    /// Outcome
    pub verdict: Verdict,
    /// Failures, in the order they were detected
    pub failures: Vec<TestFailure>,
}

impl ItemReport {
    /// Whether the item failed
    pub fn failed(&self) -> bool {
        self.verdict == Verdict::Failed
    }
}

/// Result of a suite run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite: String,
    /// Per-item results in run order
    pub items: Vec<ItemReport>,
    /// Items counted as executed: tests, failed setups, failed teardowns of passing tests
    pub tests_executed: usize,
    /// Names of the items counted as failed
    pub failed_tests: Vec<String>,
    /// Setups whose frames were still open when the suite ended
    pub open_setups: Vec<String>,
    /// Blocks still allocated after the last item
    pub leaked_blocks: Vec<TestFailure>,
}

impl SuiteReport {
    /// Create an empty report for `suite`
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            ..Self::default()
        }
    }

    /// Number of failed items
    pub fn failed_count(&self) -> usize {
        self.failed_tests.len()
    }

    /// Whether every item passed, every setup was torn down and nothing leaked
    pub fn success(&self) -> bool {
        self.failed_tests.is_empty() && self.open_setups.is_empty() && self.leaked_blocks.is_empty()
    }

    /// Report for the item named `name`
    pub fn item(&self, name: &str) -> Option<&ItemReport> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Closing lines of a text report
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.open_setups.is_empty() {
            lines.push(format!(
                "Mismatched number of setup/teardown functions: {} setup(s) never torn down ({})",
                self.open_setups.len(),
                self.open_setups.join(", ")
            ));
        }
        if self.failed_tests.is_empty() {
            lines.push(format!("All {} tests passed", self.tests_executed));
        } else {
            lines.push(format!(
                "{} out of {} tests failed!",
                self.failed_tests.len(),
                self.tests_executed
            ));
            lines.extend(self.failed_tests.iter().map(|name| format!("    {name}")));
        }
        for leak in &self.leaked_blocks {
            lines.extend(leak.diagnostic_lines());
        }
        lines
    }

    /// Pretty-printed JSON rendering
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Destination of the runner's diagnostic lines
pub trait DiagnosticSink {
    /// Progress and summary output
    fn message(&mut self, line: &str);

    /// Failure diagnostics
    fn error(&mut self, line: &str);
}

/// Writes messages to stdout and errors to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn message(&mut self, line: &str) {
        let _ = writeln!(std::io::stdout().lock(), "{line}");
    }

    fn error(&mut self, line: &str) {
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }
}

/// Which stream a captured line was sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    /// [`DiagnosticSink::message`]
    Message,
    /// [`DiagnosticSink::error`]
    Error,
}

/// Keeps every line in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Vec<(Stream, String)>,
}

impl MemorySink {
    /// An empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured line with its stream, in emission order
    pub fn lines(&self) -> &[(Stream, String)] {
        &self.lines
    }

    /// Captured lines of one stream
    pub fn stream(&self, stream: Stream) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, line)| line.as_str())
            .collect()
    }

    /// Whether any captured line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, line)| line.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn message(&mut self, line: &str) {
        self.lines.push((Stream::Message, line.to_string()));
    }

    fn error(&mut self, line: &str) {
        self.lines.push((Stream::Error, line.to_string()));
    }
}
