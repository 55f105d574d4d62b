//! The mock session: queues, expectations and tracked heap for one suite run
//!
//! A [`MockSession`] is created by the runner for every suite run and handed by
//! `&mut` to each test body, which passes it on to its mock collaborators. Test
//! bodies use the registration half (`will_return*`, `expect_*`); mocks use the
//! consumption half (`mock`, `mock_as`, `check_expected`). All registration and
//! consumption methods record their caller's location.

use crate::allocation::{Address, AllocationTracker, Checkpoint};
use crate::config::HarnessConfig;
use crate::errors::{FailureKind, FatalMisuse, TestFailure, TestResult, Unwind};
use crate::expectations::{CheckFn, ExpectationEvent, ExpectationRegistry, Predicate};
use crate::location::SourceLocation;
use crate::returns::ValueQueue;
use crate::suite::Role;
use crate::value::{FromValue, Repeat, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state of one suite run
#[derive(Debug, Default)]
pub struct MockSession {
    returns: ValueQueue,
    expectations: ExpectationRegistry,
    heap: AllocationTracker,
    expecting_assert: bool,
    pending: Vec<TestFailure>,
}

impl MockSession {
    /// Create an empty session configured by `config`
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            heap: AllocationTracker::new(config.heap_limit, config.alloc_fill),
            ..Self::default()
        }
    }

    // --- return values ---------------------------------------------------

    /// Queue `value` as the next return of `function`, usable once
    #[track_caller]
    pub fn will_return(&mut self, function: &str, value: impl Into<Value>) {
        self.queue_return(function, value.into(), Repeat::ONCE, SourceLocation::caller());
    }

    /// Queue `value` as the next return of `function`, usable `count` times
    #[track_caller]
    pub fn will_return_count(&mut self, function: &str, value: impl Into<Value>, count: impl Into<Repeat>) {
        self.queue_return(function, value.into(), count.into(), SourceLocation::caller());
    }

    /// Queue `value` as the return of every further call to `function`
    #[track_caller]
    pub fn will_return_always(&mut self, function: &str, value: impl Into<Value>) {
        self.queue_return(function, value.into(), Repeat::Always, SourceLocation::caller());
    }

    fn queue_return(&mut self, function: &str, value: Value, repeat: Repeat, location: SourceLocation) {
        if let Err(err) = self.returns.push(function, value, repeat, location.clone()) {
            self.pending
                .push(TestFailure::invalid_registration(location, err.to_string()));
        }
    }

    /// Next programmed return value of `function`
    ///
    /// With nothing queued the test never told the mock what to return; this is a
    /// [`FatalMisuse`] and ends the run.
    #[track_caller]
    pub fn mock(&mut self, function: &str) -> Result<Value, FatalMisuse> {
        self.returns.pop(function, &SourceLocation::caller())
    }

    /// Next programmed return value of `function`, converted to `T`
    #[track_caller]
    pub fn mock_as<T: FromValue>(&mut self, function: &str) -> Result<T, FatalMisuse> {
        let location = SourceLocation::caller();
        let value = self.returns.pop(function, &location)?;
        T::from_value(&value).ok_or_else(|| FatalMisuse::ReturnTypeMismatch {
            function: function.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            value: value.to_string(),
            location,
        })
    }

    /// Pending return values of `function`
    pub fn pending_returns(&self, function: &str) -> usize {
        self.returns.pending(function)
    }

    // --- parameter expectations ------------------------------------------

    fn expect(
        &mut self,
        function: &str,
        parameter: &str,
        predicate: Predicate,
        repeat: Repeat,
        location: SourceLocation,
    ) {
        match ExpectationEvent::new(predicate, repeat, location.clone()) {
            Ok(event) => self.expectations.push(function, parameter, event),
            Err(err) => self
                .pending
                .push(TestFailure::invalid_registration(location, err.to_string())),
        }
    }

    /// Expect `parameter` of `function` to equal `value`
    #[track_caller]
    pub fn expect_value(&mut self, function: &str, parameter: &str, value: impl Into<Value>) {
        self.expect_value_count(function, parameter, value, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` to equal `value`, `count` times
    #[track_caller]
    pub fn expect_value_count(
        &mut self,
        function: &str,
        parameter: &str,
        value: impl Into<Value>,
        count: impl Into<Repeat>,
    ) {
        let predicate = Predicate::ExactValue(value.into());
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect `parameter` of `function` to differ from `value`
    #[track_caller]
    pub fn expect_not_value(&mut self, function: &str, parameter: &str, value: impl Into<Value>) {
        self.expect_not_value_count(function, parameter, value, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` to differ from `value`, `count` times
    #[track_caller]
    pub fn expect_not_value_count(
        &mut self,
        function: &str,
        parameter: &str,
        value: impl Into<Value>,
        count: impl Into<Repeat>,
    ) {
        let predicate = Predicate::ExcludedValue(value.into());
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect `parameter` of `function` to be one of `values`
    #[track_caller]
    pub fn expect_in_set<I, V>(&mut self, function: &str, parameter: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.expect_in_set_count(function, parameter, values, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` to be one of `values`, `count` times
    #[track_caller]
    pub fn expect_in_set_count<I, V>(
        &mut self,
        function: &str,
        parameter: &str,
        values: I,
        count: impl Into<Repeat>,
    ) where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let predicate = Predicate::ValueInSet(values.into_iter().map(Into::into).collect());
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect `parameter` of `function` to be none of `values`
    #[track_caller]
    pub fn expect_not_in_set<I, V>(&mut self, function: &str, parameter: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.expect_not_in_set_count(function, parameter, values, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` to be none of `values`, `count` times
    #[track_caller]
    pub fn expect_not_in_set_count<I, V>(
        &mut self,
        function: &str,
        parameter: &str,
        values: I,
        count: impl Into<Repeat>,
    ) where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let predicate = Predicate::ValueNotInSet(values.into_iter().map(Into::into).collect());
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect `parameter` of `function` within `minimum..=maximum`
    #[track_caller]
    pub fn expect_in_range(
        &mut self,
        function: &str,
        parameter: &str,
        minimum: impl Into<i128>,
        maximum: impl Into<i128>,
    ) {
        self.expect_in_range_count(function, parameter, minimum, maximum, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` within `minimum..=maximum`, `count` times
    #[track_caller]
    pub fn expect_in_range_count(
        &mut self,
        function: &str,
        parameter: &str,
        minimum: impl Into<i128>,
        maximum: impl Into<i128>,
        count: impl Into<Repeat>,
    ) {
        let predicate = Predicate::ValueInRange {
            min: minimum.into(),
            max: maximum.into(),
        };
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect `parameter` of `function` outside `minimum..=maximum`
    #[track_caller]
    pub fn expect_not_in_range(
        &mut self,
        function: &str,
        parameter: &str,
        minimum: impl Into<i128>,
        maximum: impl Into<i128>,
    ) {
        self.expect_not_in_range_count(function, parameter, minimum, maximum, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` outside `minimum..=maximum`, `count` times
    #[track_caller]
    pub fn expect_not_in_range_count(
        &mut self,
        function: &str,
        parameter: &str,
        minimum: impl Into<i128>,
        maximum: impl Into<i128>,
        count: impl Into<Repeat>,
    ) {
        let predicate = Predicate::ValueNotInRange {
            min: minimum.into(),
            max: maximum.into(),
        };
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect `parameter` of `function` to be exactly `string`
    #[track_caller]
    pub fn expect_string<'a>(
        &mut self,
        function: &str,
        parameter: &str,
        string: impl Into<Option<&'a str>>,
    ) {
        self.expect_string_count(function, parameter, string, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` to be exactly `string`, `count` times
    #[track_caller]
    pub fn expect_string_count<'a>(
        &mut self,
        function: &str,
        parameter: &str,
        string: impl Into<Option<&'a str>>,
        count: impl Into<Repeat>,
    ) {
        let predicate = Predicate::ExactString(string.into().map(str::to_string));
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect `parameter` of `function` to be any string but `string`
    #[track_caller]
    pub fn expect_not_string<'a>(
        &mut self,
        function: &str,
        parameter: &str,
        string: impl Into<Option<&'a str>>,
    ) {
        self.expect_not_string_count(function, parameter, string, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` to be any string but `string`, `count` times
    #[track_caller]
    pub fn expect_not_string_count<'a>(
        &mut self,
        function: &str,
        parameter: &str,
        string: impl Into<Option<&'a str>>,
        count: impl Into<Repeat>,
    ) {
        let predicate = Predicate::ExcludedString(string.into().map(str::to_string));
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect the leading bytes of `parameter` of `function` to equal `memory`
    #[track_caller]
    pub fn expect_memory(&mut self, function: &str, parameter: &str, memory: impl AsRef<[u8]>) {
        self.expect_memory_count(function, parameter, memory, Repeat::ONCE);
    }

    /// Expect the leading bytes of `parameter` of `function` to equal `memory`, `count` times
    #[track_caller]
    pub fn expect_memory_count(
        &mut self,
        function: &str,
        parameter: &str,
        memory: impl AsRef<[u8]>,
        count: impl Into<Repeat>,
    ) {
        let predicate = Predicate::ExactMemory(memory.as_ref().to_vec());
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect the leading bytes of `parameter` of `function` to differ from `memory`
    #[track_caller]
    pub fn expect_not_memory(&mut self, function: &str, parameter: &str, memory: impl AsRef<[u8]>) {
        self.expect_not_memory_count(function, parameter, memory, Repeat::ONCE);
    }

    /// Expect the leading bytes of `parameter` of `function` to differ from `memory`, `count` times
    #[track_caller]
    pub fn expect_not_memory_count(
        &mut self,
        function: &str,
        parameter: &str,
        memory: impl AsRef<[u8]>,
        count: impl Into<Repeat>,
    ) {
        let predicate = Predicate::ExcludedMemory(memory.as_ref().to_vec());
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Expect `parameter` of `function` to satisfy `check(actual, context)`
    #[track_caller]
    pub fn expect_check<F>(&mut self, function: &str, parameter: &str, check: F, context: impl Into<Value>)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.expect_check_count(function, parameter, check, context, Repeat::ONCE);
    }

    /// Expect `parameter` of `function` to satisfy `check(actual, context)`, `count` times
    #[track_caller]
    pub fn expect_check_count<F>(
        &mut self,
        function: &str,
        parameter: &str,
        check: F,
        context: impl Into<Value>,
        count: impl Into<Repeat>,
    ) where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let check: CheckFn = Arc::new(check);
        let predicate = Predicate::Custom {
            check,
            context: context.into(),
        };
        self.expect(function, parameter, predicate, count.into(), SourceLocation::caller());
    }

    /// Accept any value of `parameter` of `function` once
    #[track_caller]
    pub fn expect_any(&mut self, function: &str, parameter: &str) {
        self.expect_any_count(function, parameter, Repeat::ONCE);
    }

    /// Accept any value of `parameter` of `function`, `count` times
    #[track_caller]
    pub fn expect_any_count(&mut self, function: &str, parameter: &str, count: impl Into<Repeat>) {
        self.expect(function, parameter, Predicate::AnyValue, count.into(), SourceLocation::caller());
    }

    /// Validate the actual value of `parameter` passed to `function`
    #[track_caller]
    pub fn check_expected(
        &mut self,
        function: &str,
        parameter: &str,
        actual: impl Into<Value>,
    ) -> Result<(), TestFailure> {
        self.expectations
            .check(function, parameter, &actual.into(), SourceLocation::caller())
    }

    /// Pending expectations of `parameter` of `function`
    pub fn pending_expectations(&self, function: &str, parameter: &str) -> usize {
        self.expectations.pending(function, parameter)
    }

    // --- assertions raised by code under test ----------------------------

    /// Assertion hook for code under test
    ///
    /// Inside [`MockSession::expect_assert_failure`] a false `result` is the
    /// expected outcome and unwinds back to it; anywhere else it fails the test.
    #[track_caller]
    pub fn mock_assert(&mut self, result: bool, expression: &str) -> Result<(), TestFailure> {
        if result {
            return Ok(());
        }
        let location = SourceLocation::caller();
        if self.expecting_assert {
            Err(TestFailure::new(FailureKind::MockAssertion, location, expression))
        } else {
            Err(TestFailure::assertion(location, format!("ASSERT: {expression}")))
        }
    }

    /// Run `call` expecting it to trip [`MockSession::mock_assert`]
    ///
    /// Returns `Ok` when the assertion fired, fails the test when `call` returned
    /// normally, and passes any other unwind through untouched.
    #[track_caller]
    pub fn expect_assert_failure<T, F>(&mut self, description: &str, call: F) -> TestResult
    where
        F: FnOnce(&mut Self) -> TestResult<T>,
    {
        let location = SourceLocation::caller();
        let outer = std::mem::replace(&mut self.expecting_assert, true);
        let outcome = call(self);
        self.expecting_assert = outer;

        match outcome {
            Err(Unwind::Failed(failure)) if failure.kind == FailureKind::MockAssertion => {
                info!(assertion = %failure.message, "Expected assertion occurred");
                Ok(())
            }
            Err(other) => Err(other),
            Ok(_) => Err(TestFailure::assertion(
                location,
                format!("Expected assert in {description}"),
            )
            .into()),
        }
    }

    // --- tracked heap ----------------------------------------------------

    /// Allocate a tracked block of `size` bytes; `None` when the heap limit is hit
    #[track_caller]
    pub fn test_malloc(&mut self, size: usize) -> Option<Address> {
        self.heap.alloc(size, SourceLocation::caller())
    }

    /// Allocate a zeroed tracked block of `count * size` bytes
    #[track_caller]
    pub fn test_calloc(&mut self, count: usize, size: usize) -> Option<Address> {
        self.heap.calloc(count, size, SourceLocation::caller())
    }

    /// Free a tracked block
    ///
    /// An unknown or null address is reported against the running item when it
    /// returns; the call itself does not unwind.
    #[track_caller]
    pub fn test_free(&mut self, address: Address) {
        let location = SourceLocation::caller();
        if let Err(err) = self.heap.free(address, &location) {
            self.pending.push(err.into_failure(location));
        }
    }

    /// Contents of a live tracked block
    pub fn block(&self, address: Address) -> Option<&[u8]> {
        self.heap.block(address)
    }

    /// Mutable contents of a live tracked block
    pub fn block_mut(&mut self, address: Address) -> Option<&mut [u8]> {
        self.heap.block_mut(address)
    }

    /// The tracked heap
    pub fn heap(&self) -> &AllocationTracker {
        &self.heap
    }

    // --- item lifecycle (driven by the runner) ----------------------------

    /// Post-item checks after a normal return
    ///
    /// Leftover expectations always fail the item. Leftover return values fail
    /// every role except setup, where they carry over to the next item. Test and
    /// teardown items must also have freed everything allocated since `checkpoint`;
    /// leaked blocks are reported and then reclaimed.
    pub(crate) fn finish_item(
        &mut self,
        item: &str,
        role: Role,
        checkpoint: &Checkpoint,
    ) -> Vec<TestFailure> {
        let mut failures = std::mem::take(&mut self.pending);
        failures.extend(
            self.expectations
                .drain_leftovers()
                .into_iter()
                .map(|leftover| leftover.into_failure()),
        );
        if role != Role::Setup {
            failures.extend(
                self.returns
                    .drain_leftovers()
                    .into_iter()
                    .map(|leftover| leftover.into_failure()),
            );
            let leaked = self.heap.reclaim(checkpoint);
            if !leaked.is_empty() {
                debug!(item, blocks = leaked.len(), "Reclaimed leaked blocks");
            }
            failures.extend(leaked.into_iter().map(|record| record.into_leak(item)));
        }
        self.expecting_assert = false;
        failures
    }

    /// Reset after an item unwound; its failure is already known
    pub(crate) fn abandon_item(&mut self, role: Role, checkpoint: &Checkpoint) {
        self.pending.clear();
        self.returns.clear();
        self.expectations.clear();
        self.expecting_assert = false;
        if role != Role::Setup {
            let reclaimed = self.heap.reclaim(checkpoint);
            debug!(blocks = reclaimed.len(), "Reclaimed blocks of failed item");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_will_return_then_mock() {
        let mut session = MockSession::default();
        session.will_return("f", 5);
        assert_eq!(session.mock("f").unwrap(), Value::from(5));
        assert!(matches!(session.mock("f"), Err(FatalMisuse::NoReturnValue { .. })));
    }

    #[test]
    fn test_mock_as_converts_and_rejects() {
        let mut session = MockSession::default();
        session.will_return("age", 30u8);
        session.will_return("name", "alice");
        assert_eq!(session.mock_as::<i32>("age").unwrap(), 30);

        let err = session.mock_as::<u16>("name").unwrap_err();
        assert!(matches!(err, FatalMisuse::ReturnTypeMismatch { ref expected, .. } if expected == "u16"));
    }

    #[test]
    fn test_registration_location_is_caller() {
        let mut session = MockSession::default();
        let line = line!() + 1;
        session.expect_value("f", "x", 1);
        let failure = session.check_expected("f", "x", 2).unwrap_err();
        assert_eq!(
            failure.notes[0],
            format!("Expected parameter declared at {}:{line}", file!())
        );
    }

    #[test]
    fn test_invalid_registrations_become_pending_failures() {
        let mut session = MockSession::default();
        session.will_return_count("f", 1, 0u32);
        session.expect_in_range("f", "x", 10, 1);

        let failures = session.finish_item("t", Role::Test, &Checkpoint::default());
        assert_eq!(failures.len(), 2);
        assert!(failures
            .iter()
            .all(|f| f.kind == FailureKind::InvalidRegistration));
    }

    #[test]
    fn test_setup_carries_return_values_but_not_expectations() {
        let mut session = MockSession::default();
        session.will_return("f", 1);
        session.expect_any("f", "x");

        let checkpoint = session.heap().checkpoint();
        let failures = session.finish_item("setup", Role::Setup, &checkpoint);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::UnconsumedExpectation);
        assert_eq!(session.pending_returns("f"), 1);
    }

    #[test]
    fn test_invalid_free_is_reported_after_return() {
        let mut session = MockSession::default();
        let block = session.test_malloc(8).unwrap();
        session.test_free(block);
        session.test_free(block);

        let failures = session.finish_item("t", Role::Test, &Checkpoint::default());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::InvalidFree);
    }

    #[test]
    fn test_expect_assert_failure() {
        fn guarded(session: &mut MockSession, input: Option<u32>) -> TestResult<u32> {
            session.mock_assert(input.is_some(), "input.is_some()")?;
            Ok(input.unwrap_or_default() * 2)
        }

        let mut session = MockSession::default();
        assert!(session
            .expect_assert_failure("guarded(None)", |s| guarded(s, None))
            .is_ok());

        let missed = session
            .expect_assert_failure("guarded(Some(2))", |s| guarded(s, Some(2)))
            .unwrap_err();
        assert!(missed
            .failure()
            .is_some_and(|f| f.message == "Expected assert in guarded(Some(2))"));

        let unexpected = guarded(&mut session, None).unwrap_err();
        assert_eq!(
            unexpected.failure().map(|f| f.kind),
            Some(FailureKind::AssertionFailure)
        );
    }
}
