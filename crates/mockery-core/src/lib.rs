//! Mockery Core - mock engine and failure-isolating test runner
//!
//! Test bodies program a [`MockSession`] before exercising code under test:
//!
//! - return values per mocked function ([`MockSession::will_return`]), consumed
//!   in FIFO order by the mock ([`MockSession::mock`]);
//! - predicates per `(function, parameter)` ([`MockSession::expect_value`] and
//!   friends), validated by the mock ([`MockSession::check_expected`]);
//! - tracked heap blocks ([`MockSession::test_malloc`]), diffed after each item
//!   to catch leaks.
//!
//! [`TestRunner`] runs a [`TestSuite`] of setup, test and teardown items. A failing
//! check or assertion aborts only the running item: test bodies return
//! [`TestResult`] and failures travel back to the runner through `?`. State left
//! behind by an item (unconsumed values, unchecked expectations, unfreed blocks)
//! fails that item after it returns.
//!
//! ```
//! use mockery_core::{assert_int_equal, HarnessConfig, MockSession, TestRunner, TestResult, TestSuite};
//! use mockery_core::report::MemorySink;
//!
//! fn add_via_mock(session: &mut MockSession) -> TestResult<i64> {
//!     Ok(session.mock_as::<i64>("lookup")? + 1)
//! }
//!
//! let suite = TestSuite::new("arith").test("adds_one", |session, _| {
//!     session.will_return("lookup", 41);
//!     assert_int_equal!(add_via_mock(session)?, 42);
//!     Ok(())
//! });
//! let mut runner = TestRunner::with_sink(HarnessConfig::default(), MemorySink::new());
//! let report = runner.run(&suite).unwrap();
//! assert!(report.success());
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod allocation;
pub mod assertions;
pub mod config;
pub mod errors;
pub mod expectations;
pub mod harness;
pub mod location;
mod macros;
pub mod report;
pub mod returns;
pub mod session;
pub mod state;
pub mod suite;
pub mod value;

pub use allocation::{Address, AllocationRecord, AllocationTracker, Checkpoint};
pub use config::{HarnessConfig, ReportFormat};
pub use errors::{
    FailureKind, FatalMisuse, HarnessError, MockeryError, Result, TestFailure, TestResult, Unwind,
};
pub use expectations::{ExpectationEvent, ExpectationRegistry, Predicate};
pub use harness::{Phase, TestRunner};
pub use report::{DiagnosticSink, ItemReport, SuiteReport, Verdict};
pub use returns::ValueQueue;
pub use session::MockSession;
pub use state::TestState;
pub use suite::{Role, TestItem, TestSuite};
pub use value::{FromValue, Repeat, Value};
