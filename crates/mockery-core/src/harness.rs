//! Suite runner
//!
//! Runs the items of a [`TestSuite`] one at a time, in declaration order, against
//! a fresh [`MockSession`]. Each item body is an abort boundary: a `TestFailure`
//! returned through `?` or a panic marks the item failed and the runner moves on
//! to the next item. A [`FatalMisuse`] ends the whole run.
//!
//! Setups open a state frame holding a [`TestState`] and a heap checkpoint. Tests
//! share the innermost frame's state; a teardown closes the innermost frame and
//! must free everything allocated since its setup's checkpoint. An item with no
//! body is skipped, but a bodiless setup or teardown still opens or closes its
//! frame.

use crate::allocation::Checkpoint;
use crate::config::HarnessConfig;
use crate::errors::{FailureKind, FatalMisuse, HarnessError, TestFailure, TestResult, Unwind};
use crate::report::{ConsoleSink, DiagnosticSink, ItemReport, SuiteReport, Verdict};
use crate::session::MockSession;
use crate::state::TestState;
use crate::suite::{Role, TestFn, TestItem, TestSuite};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Where the runner is in its item cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No suite is running
    Idle,
    /// An item body is executing
    Running {
        /// Name of the item
        item: String,
    },
    /// The last item passed
    Passed,
    /// The last item failed
    Failed,
    /// The suite has finished
    SuiteDone,
}

/// State frame opened by a setup
#[derive(Debug)]
struct Frame {
    setup: String,
    state: TestState,
    checkpoint: Checkpoint,
}

/// Executes suites and reports through a [`DiagnosticSink`]
#[derive(Debug)]
pub struct TestRunner<S: DiagnosticSink = ConsoleSink> {
    config: HarnessConfig,
    sink: S,
    phase: Phase,
}

impl TestRunner<ConsoleSink> {
    /// Runner printing to stdout and stderr
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_sink(config, ConsoleSink)
    }
}

impl<S: DiagnosticSink> TestRunner<S> {
    /// Runner reporting to `sink`
    pub fn with_sink(config: HarnessConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            phase: Phase::Idle,
        }
    }

    /// The diagnostic sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the runner, returning its sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Current phase
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The configuration in use
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run a single test with no setup or teardown
    pub fn run_test<F>(&mut self, name: &str, test: F) -> Result<SuiteReport, HarnessError>
    where
        F: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
    {
        let suite = TestSuite::new(name).test(name, test);
        self.run(&suite)
    }

    /// Run every item of `suite`
    ///
    /// Returns the suite report, or [`HarnessError::Fatal`] when an item misused
    /// the harness; no further items run in that case.
    pub fn run(&mut self, suite: &TestSuite) -> Result<SuiteReport, HarnessError> {
        info!(suite = suite.name(), items = suite.len(), "Running suite");
        let mut session = MockSession::new(&self.config);
        let suite_checkpoint = session.heap().checkpoint();
        let mut frames: Vec<Frame> = Vec::new();
        let mut report = SuiteReport::new(suite.name());
        let mut previous_test_failed = false;

        for item in suite.items() {
            let item_report = match item.role {
                Role::Setup => {
                    let mut frame = Frame {
                        setup: item.name.clone(),
                        state: TestState::new(),
                        checkpoint: session.heap().checkpoint(),
                    };
                    let result = match &item.callback {
                        Some(callback) => {
                            let checkpoint = frame.checkpoint.clone();
                            self.execute(item, callback, &mut session, &mut frame.state, &checkpoint)
                        }
                        None => Ok(self.skip(item)),
                    };
                    frames.push(frame);
                    result?
                }
                Role::Test => match &item.callback {
                    Some(callback) => {
                        let checkpoint = session.heap().checkpoint();
                        let mut scratch = TestState::new();
                        let state = match frames.last_mut() {
                            Some(frame) => &mut frame.state,
                            None => &mut scratch,
                        };
                        self.execute(item, callback, &mut session, state, &checkpoint)?
                    }
                    None => self.skip(item),
                },
                Role::Teardown => {
                    let Some(mut frame) = frames.pop() else {
                        self.phase = Phase::Failed;
                        let source = FatalMisuse::UnpairedTeardown {
                            item: item.name.clone(),
                        };
                        self.sink.error(&source.to_string());
                        return Err(HarnessError::Fatal {
                            item: item.name.clone(),
                            source,
                        });
                    };
                    debug!(teardown = %item.name, setup = %frame.setup, "Closing state frame");
                    match &item.callback {
                        Some(callback) => self.execute(
                            item,
                            callback,
                            &mut session,
                            &mut frame.state,
                            &frame.checkpoint,
                        )?,
                        None => {
                            // The frame still has to reconcile with its setup's checkpoint.
                            let failures =
                                session.finish_item(&item.name, item.role, &frame.checkpoint);
                            if failures.is_empty() {
                                self.skip(item)
                            } else {
                                self.conclude(item, failures)
                            }
                        }
                    }
                }
            };

            if item_report.verdict == Verdict::Skipped {
                report.items.push(item_report);
                continue;
            }

            let failed = item_report.failed();
            let counted = match item.role {
                Role::Test => {
                    previous_test_failed = failed;
                    true
                }
                Role::Setup => {
                    previous_test_failed = false;
                    failed
                }
                Role::Teardown => failed && !previous_test_failed,
            };
            if counted {
                report.tests_executed += 1;
                if failed {
                    report.failed_tests.push(item.name.clone());
                }
            }
            report.items.push(item_report);
        }

        if !frames.is_empty() {
            report.open_setups = frames.into_iter().map(|frame| frame.setup).collect();
            warn!(open = ?report.open_setups, "Setups left without a teardown");
        }

        let leaked = session.heap().diff(&suite_checkpoint);
        if !leaked.is_empty() {
            warn!(suite = suite.name(), blocks = leaked.len(), "Blocks still allocated after the suite");
        }
        report.leaked_blocks = leaked
            .into_iter()
            .map(|record| record.into_leak(suite.name()))
            .collect();

        for line in report.summary_lines() {
            if report.success() {
                self.sink.message(&line);
            } else {
                self.sink.error(&line);
            }
        }
        info!(
            suite = suite.name(),
            executed = report.tests_executed,
            failed = report.failed_count(),
            success = report.success(),
            "Suite finished"
        );
        self.phase = Phase::SuiteDone;
        Ok(report)
    }

    fn execute(
        &mut self,
        item: &TestItem,
        callback: &TestFn,
        session: &mut MockSession,
        state: &mut TestState,
        checkpoint: &Checkpoint,
    ) -> Result<ItemReport, HarnessError> {
        self.phase = Phase::Running {
            item: item.name.clone(),
        };
        if !self.config.quiet {
            self.sink.message(&format!("{}: Starting test", item.name));
        }
        debug!(item = %item.name, role = %item.role, live_blocks = checkpoint.len(), "Running item");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(session, state)));
        let failures = match outcome {
            Ok(Ok(())) => session.finish_item(&item.name, item.role, checkpoint),
            Ok(Err(Unwind::Failed(failure))) => {
                session.abandon_item(item.role, checkpoint);
                vec![failure]
            }
            Ok(Err(Unwind::Fatal(misuse))) => {
                session.abandon_item(item.role, checkpoint);
                self.phase = Phase::Failed;
                self.sink.error(&misuse.to_string());
                warn!(item = %item.name, %misuse, "Fatal harness misuse");
                return Err(HarnessError::Fatal {
                    item: item.name.clone(),
                    source: misuse,
                });
            }
            Err(payload) => {
                session.abandon_item(item.role, checkpoint);
                vec![TestFailure::new(
                    FailureKind::Panic,
                    item.location.clone(),
                    format!("{} panicked: {}", item.name, panic_message(payload.as_ref())),
                )]
            }
        };

        Ok(self.conclude(item, failures))
    }

    /// Emit diagnostics and the verdict line for a finished item
    fn conclude(&mut self, item: &TestItem, failures: Vec<TestFailure>) -> ItemReport {
        for failure in &failures {
            warn!(item = %item.name, kind = %failure.kind, "{}", failure.message);
            for line in failure.diagnostic_lines() {
                self.sink.error(&line);
            }
        }

        let verdict = if failures.is_empty() {
            if !self.config.quiet {
                self.sink
                    .message(&format!("{}: Test completed successfully.", item.name));
            }
            self.phase = Phase::Passed;
            Verdict::Passed
        } else {
            self.sink.error(&format!("{}: Test failed.", item.name));
            self.phase = Phase::Failed;
            Verdict::Failed
        };
        info!(item = %item.name, role = %item.role, ?verdict, "Item finished");

        ItemReport {
            name: item.name.clone(),
            role: item.role,
            verdict,
            failures,
        }
    }

    fn skip(&self, item: &TestItem) -> ItemReport {
        debug!(item = %item.name, role = %item.role, "Skipping item with no body");
        ItemReport {
            name: item.name.clone(),
            role: item.role,
            verdict: Verdict::Skipped,
            failures: Vec::new(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemorySink;

    fn runner() -> TestRunner<MemorySink> {
        TestRunner::with_sink(HarnessConfig::default(), MemorySink::new())
    }

    #[test]
    fn test_phase_progression() {
        let mut runner = runner();
        assert_eq!(runner.phase(), &Phase::Idle);
        let report = runner.run_test("ok", |_, _| Ok(())).unwrap();
        assert!(report.success());
        assert_eq!(runner.phase(), &Phase::SuiteDone);
        assert!(runner.sink().contains("ok: Test completed successfully."));
    }

    #[test]
    fn test_panic_is_contained() {
        let mut runner = runner();
        let suite = TestSuite::new("panics")
            .test("boom", |_, _| panic!("kaboom"))
            .test("after", |_, _| Ok(()));
        let report = runner.run(&suite).unwrap();

        let boom = report.item("boom").unwrap();
        assert_eq!(boom.failures[0].kind, FailureKind::Panic);
        assert_eq!(boom.failures[0].message, "boom panicked: kaboom");
        assert_eq!(report.item("after").unwrap().verdict, Verdict::Passed);
        assert_eq!(report.failed_tests, ["boom"]);
    }

    #[test]
    fn test_quiet_suppresses_progress_lines() {
        let config = HarnessConfig {
            quiet: true,
            ..HarnessConfig::default()
        };
        let mut runner = TestRunner::with_sink(config, MemorySink::new());
        runner.run_test("ok", |_, _| Ok(())).unwrap();
        let sink = runner.into_sink();
        assert!(!sink.contains("Starting test"));
        assert!(sink.contains("All 1 tests passed"));
    }

    #[test]
    fn test_unpaired_teardown_is_fatal() {
        let mut runner = runner();
        let suite = TestSuite::new("broken").teardown("orphan", |_, _| Ok(()));
        let err = runner.run(&suite).unwrap_err();
        assert!(matches!(err.misuse(), FatalMisuse::UnpairedTeardown { item } if item == "orphan"));
    }

    #[test]
    fn test_skipped_items_do_not_count() {
        let mut runner = runner();
        let suite = TestSuite::new("sparse").item(TestItem::empty("nothing", Role::Test));
        let report = runner.run(&suite).unwrap();
        assert_eq!(report.items[0].verdict, Verdict::Skipped);
        assert_eq!(report.tests_executed, 0);
    }
}
