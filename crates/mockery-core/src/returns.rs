//! Per-function queues of programmed mock return values

use crate::errors::{FailureKind, FatalMisuse, MockeryError, TestFailure};
use crate::location::SourceLocation;
use crate::value::{Repeat, Value};
use indexmap::IndexMap;
use std::collections::VecDeque;
use tracing::debug;

/// A return value waiting to be consumed by a mock
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedValue {
    /// Payload handed back to the mock
    pub value: Value,
    /// Uses left
    pub remaining: Repeat,
    /// Where the value was registered
    pub location: SourceLocation,
}

/// Queue entries still pending when an item finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leftover {
    /// Function the entries belong to
    pub function: String,
    /// Parameter, for expectation leftovers
    pub parameter: Option<String>,
    /// Declaration sites of the remaining entries, head first
    pub locations: Vec<SourceLocation>,
}

impl Leftover {
    /// Report the leftover as an unconsumed-expectation failure
    pub fn into_failure(self) -> TestFailure {
        let location = self
            .locations
            .first()
            .cloned()
            .unwrap_or_else(SourceLocation::unknown);
        let message = match &self.parameter {
            None => format!("{}() has remaining non-returned values.", self.function),
            Some(parameter) => format!(
                "{}: parameter {parameter} still has values that haven't been checked.",
                self.function
            ),
        };
        let mut failure = TestFailure::new(FailureKind::UnconsumedExpectation, location, message)
            .with_note("Remaining item(s) declared at...");
        for declared in &self.locations {
            failure = failure.with_note(format!("    {declared}"));
        }
        failure
    }
}

/// Ordered return values keyed by function name
#[derive(Debug, Default, Clone)]
pub struct ValueQueue {
    queues: IndexMap<String, VecDeque<QueuedValue>>,
}

impl ValueQueue {
    /// Create an empty queue set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to the tail of `function`'s queue
    pub fn push(
        &mut self,
        function: &str,
        value: Value,
        repeat: Repeat,
        location: SourceLocation,
    ) -> Result<(), MockeryError> {
        if !repeat.is_valid() {
            return Err(MockeryError::invalid(format!(
                "return value for {function}() must be usable at least once"
            )));
        }
        debug!(function, %value, %repeat, "Queued mock return value");
        self.queues
            .entry(function.to_string())
            .or_default()
            .push_back(QueuedValue {
                value,
                remaining: repeat,
                location,
            });
        Ok(())
    }

    /// Take the head value of `function`'s queue
    ///
    /// An empty queue means the test never programmed this call, which is a misuse
    /// of the harness rather than a test verdict.
    pub fn pop(&mut self, function: &str, location: &SourceLocation) -> Result<Value, FatalMisuse> {
        let no_value = || FatalMisuse::NoReturnValue {
            function: function.to_string(),
            location: location.clone(),
        };
        let queue = self.queues.get_mut(function).ok_or_else(no_value)?;
        let head = queue.front_mut().ok_or_else(no_value)?;

        let value = if head.remaining.consume() {
            let exhausted = queue.pop_front().ok_or_else(no_value)?;
            exhausted.value
        } else {
            head.value.clone()
        };
        if queue.is_empty() {
            self.queues.shift_remove(function);
        }
        debug!(function, %value, "Mock consumed return value");
        Ok(value)
    }

    /// Number of entries queued for `function`
    pub fn pending(&self, function: &str) -> usize {
        self.queues.get(function).map_or(0, VecDeque::len)
    }

    /// Head entry for `function`, without consuming it
    pub fn peek(&self, function: &str) -> Option<&QueuedValue> {
        self.queues.get(function).and_then(VecDeque::front)
    }

    /// Whether no values are queued at all
    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    /// Drop `Repeat::Always` entries, then report and clear what is left
    pub fn drain_leftovers(&mut self) -> Vec<Leftover> {
        self.queues
            .drain(..)
            .filter_map(|(function, queue)| {
                let locations: Vec<_> = queue
                    .into_iter()
                    .filter(|entry| !entry.remaining.is_always())
                    .map(|entry| entry.location)
                    .collect();
                (!locations.is_empty()).then_some(Leftover {
                    function,
                    parameter: None,
                    locations,
                })
            })
            .collect()
    }

    /// Discard everything
    pub fn clear(&mut self) {
        self.queues.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> SourceLocation {
        SourceLocation::new("returns.rs", 1)
    }

    #[test]
    fn test_fifo_order_and_repeat() {
        let mut queue = ValueQueue::new();
        queue.push("read", Value::from(1), Repeat::Times(2), here()).unwrap();
        queue.push("read", Value::from(2), Repeat::ONCE, here()).unwrap();

        assert_eq!(queue.pop("read", &here()).unwrap(), Value::from(1));
        assert_eq!(queue.pop("read", &here()).unwrap(), Value::from(1));
        assert_eq!(queue.pop("read", &here()).unwrap(), Value::from(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_pop_is_fatal() {
        let mut queue = ValueQueue::new();
        queue.push("f", Value::from(5), Repeat::ONCE, here()).unwrap();
        assert_eq!(queue.pop("f", &here()).unwrap(), Value::from(5));

        let err = queue.pop("f", &here()).unwrap_err();
        assert!(matches!(err, FatalMisuse::NoReturnValue { ref function, .. } if function == "f"));
    }

    #[test]
    fn test_always_entry_is_never_removed() {
        let mut queue = ValueQueue::new();
        queue.push("clock", Value::from(7u64), Repeat::Always, here()).unwrap();
        queue.push("clock", Value::from(8u64), Repeat::ONCE, here()).unwrap();
        for _ in 0..5 {
            assert_eq!(queue.pop("clock", &here()).unwrap(), Value::from(7u64));
        }
        assert_eq!(queue.pending("clock"), 2);
    }

    #[test]
    fn test_zero_repeat_rejected() {
        let mut queue = ValueQueue::new();
        assert!(queue
            .push("f", Value::from(1), Repeat::Times(0), here())
            .is_err());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_leftovers_skip_always_entries() {
        let mut queue = ValueQueue::new();
        queue.push("a", Value::from(1), Repeat::Always, here()).unwrap();
        queue.push("b", Value::from(2), Repeat::Times(3), SourceLocation::new("t.rs", 9)).unwrap();

        let leftovers = queue.drain_leftovers();
        assert_eq!(leftovers.len(), 1);
        assert_eq!(leftovers[0].function, "b");
        assert!(queue.is_empty());

        let failure = leftovers[0].clone().into_failure();
        assert_eq!(failure.kind, FailureKind::UnconsumedExpectation);
        assert_eq!(failure.location, SourceLocation::new("t.rs", 9));
        assert_eq!(failure.message, "b() has remaining non-returned values.");
    }
}
