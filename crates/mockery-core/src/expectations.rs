//! Per-parameter expectation queues checked by mock shims
//!
//! Each `(function, parameter)` pair owns a FIFO of [`ExpectationEvent`]s. A check
//! evaluates the head event against the actual argument; a pass consumes one use,
//! a rejection or an empty queue becomes a [`TestFailure`] that the mock propagates
//! to the harness with `?`.

use crate::errors::{FailureKind, MockeryError, TestFailure};
use crate::location::SourceLocation;
use crate::returns::Leftover;
use crate::value::{Repeat, Value};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// User predicate: `(actual, context) -> accepted`
pub type CheckFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// What a parameter must satisfy
#[derive(Clone)]
pub enum Predicate {
    /// Equal to the value
    ExactValue(Value),
    /// Anything but the value
    ExcludedValue(Value),
    /// Equal to one of the values
    ValueInSet(Vec<Value>),
    /// Equal to none of the values
    ValueNotInSet(Vec<Value>),
    /// Integral and within `min..=max`
    ValueInRange {
        /// Inclusive lower bound
        min: i128,
        /// Inclusive upper bound
        max: i128,
    },
    /// Integral and outside `min..=max`
    ValueNotInRange {
        /// Inclusive lower bound
        min: i128,
        /// Inclusive upper bound
        max: i128,
    },
    /// Byte-identical string; `None` expects a null argument
    ExactString(Option<String>),
    /// Any string but this one; `None` rejects only a null argument
    ExcludedString(Option<String>),
    /// The first `len` bytes of the argument equal these bytes
    ExactMemory(Vec<u8>),
    /// The first `len` bytes of the argument differ from these bytes
    ExcludedMemory(Vec<u8>),
    /// A user predicate with its registered context
    Custom {
        /// The predicate
        check: CheckFn,
        /// Second argument handed to the predicate
        context: Value,
    },
    /// Anything
    AnyValue,
}

impl Predicate {
    /// Evaluate against an actual argument
    pub fn evaluate(&self, actual: &Value) -> bool {
        match self {
            Self::ExactValue(expected) => actual == expected,
            Self::ExcludedValue(excluded) => actual != excluded,
            Self::ValueInSet(set) => set.iter().any(|v| v == actual),
            Self::ValueNotInSet(set) => !set.iter().any(|v| v == actual),
            Self::ValueInRange { min, max } => actual
                .as_integral()
                .is_some_and(|v| (*min..=*max).contains(&v)),
            Self::ValueNotInRange { min, max } => actual
                .as_integral()
                .is_some_and(|v| !(*min..=*max).contains(&v)),
            Self::ExactString(expected) => string_matches(expected.as_deref(), actual),
            Self::ExcludedString(excluded) => {
                is_string_like(actual) && !string_matches(excluded.as_deref(), actual)
            }
            Self::ExactMemory(expected) => memory_matches(expected, actual),
            Self::ExcludedMemory(excluded) => {
                actual.as_bytes().is_some() && !memory_matches(excluded, actual)
            }
            Self::Custom { check, context } => check(actual, context),
            Self::AnyValue => true,
        }
    }

    /// Explain why `actual` was rejected
    pub fn describe_mismatch(&self, actual: &Value) -> String {
        match self {
            Self::ExactValue(expected) => format!("{actual} != {expected}"),
            Self::ExcludedValue(excluded) => format!("{actual} == {excluded}"),
            Self::ValueInSet(set) => format!("{actual} is not within the set {}", render_set(set)),
            Self::ValueNotInSet(set) => format!("{actual} is in the set {}", render_set(set)),
            Self::ValueInRange { min, max } => {
                format!("{actual} is not within the range {min}-{max}")
            }
            Self::ValueNotInRange { min, max } => {
                format!("{actual} is within the range {min}-{max}")
            }
            Self::ExactString(expected) => {
                format!("{actual} != {}", Value::from(expected.as_deref()))
            }
            Self::ExcludedString(excluded) if is_string_like(actual) => {
                format!("{actual} == {}", Value::from(excluded.as_deref()))
            }
            Self::ExcludedString(_) => format!("{actual} is not a string"),
            Self::ExactMemory(expected) => format!(
                "{} bytes of {actual} and {} differ",
                expected.len(),
                Value::from(expected.as_slice())
            ),
            Self::ExcludedMemory(excluded) => format!(
                "{} bytes of {actual} and {} are the same",
                excluded.len(),
                Value::from(excluded.as_slice())
            ),
            Self::Custom { context, .. } => {
                format!("custom check rejected {actual} (context {context})")
            }
            Self::AnyValue => format!("{actual} rejected by an any-value expectation"),
        }
    }
}

fn string_matches(expected: Option<&str>, actual: &Value) -> bool {
    match (expected, actual) {
        (None, Value::Null) => true,
        (Some(expected), Value::Str(actual)) => expected.as_bytes() == actual.as_bytes(),
        _ => false,
    }
}

fn is_string_like(actual: &Value) -> bool {
    matches!(actual, Value::Str(_) | Value::Null)
}

fn memory_matches(expected: &[u8], actual: &Value) -> bool {
    actual
        .as_bytes()
        .and_then(|bytes| bytes.get(..expected.len()))
        .is_some_and(|prefix| prefix == expected)
}

fn render_set(set: &[Value]) -> String {
    let items: Vec<String> = set.iter().map(ToString::to_string).collect();
    format!("{{{}}}", items.join(", "))
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactValue(v) => f.debug_tuple("ExactValue").field(v).finish(),
            Self::ExcludedValue(v) => f.debug_tuple("ExcludedValue").field(v).finish(),
            Self::ValueInSet(set) => f.debug_tuple("ValueInSet").field(set).finish(),
            Self::ValueNotInSet(set) => f.debug_tuple("ValueNotInSet").field(set).finish(),
            Self::ValueInRange { min, max } => f
                .debug_struct("ValueInRange")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::ValueNotInRange { min, max } => f
                .debug_struct("ValueNotInRange")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::ExactString(s) => f.debug_tuple("ExactString").field(s).finish(),
            Self::ExcludedString(s) => f.debug_tuple("ExcludedString").field(s).finish(),
            Self::ExactMemory(bytes) => f.debug_tuple("ExactMemory").field(bytes).finish(),
            Self::ExcludedMemory(bytes) => f.debug_tuple("ExcludedMemory").field(bytes).finish(),
            Self::Custom { context, .. } => f
                .debug_struct("Custom")
                .field("context", context)
                .finish_non_exhaustive(),
            Self::AnyValue => f.write_str("AnyValue"),
        }
    }
}

/// A queued predicate with its use count and declaration site
#[derive(Debug, Clone)]
pub struct ExpectationEvent {
    /// The predicate
    pub predicate: Predicate,
    /// Uses left
    pub remaining: Repeat,
    /// Where the expectation was registered
    pub location: SourceLocation,
}

impl ExpectationEvent {
    /// Create an event, rejecting zero counts and inverted ranges
    pub fn new(
        predicate: Predicate,
        remaining: Repeat,
        location: SourceLocation,
    ) -> Result<Self, MockeryError> {
        if !remaining.is_valid() {
            return Err(MockeryError::invalid(
                "expectation must be usable at least once",
            ));
        }
        if let Predicate::ValueInRange { min, max } | Predicate::ValueNotInRange { min, max } =
            &predicate
        {
            if min > max {
                return Err(MockeryError::invalid(format!(
                    "range minimum {min} is greater than maximum {max}"
                )));
            }
        }
        Ok(Self {
            predicate,
            remaining,
            location,
        })
    }
}

/// Ordered expectations keyed by `(function, parameter)`
#[derive(Debug, Default, Clone)]
pub struct ExpectationRegistry {
    queues: IndexMap<(String, String), VecDeque<ExpectationEvent>>,
}

impl ExpectationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the tail of the `(function, parameter)` queue
    pub fn push(&mut self, function: &str, parameter: &str, event: ExpectationEvent) {
        debug!(
            function,
            parameter,
            predicate = ?event.predicate,
            remaining = %event.remaining,
            "Queued parameter expectation"
        );
        self.queues
            .entry((function.to_string(), parameter.to_string()))
            .or_default()
            .push_back(event);
    }

    /// Check `actual` against the head expectation of `(function, parameter)`
    ///
    /// On a pass the head loses one use. On a rejection the queue is left as is; the
    /// returned failure aborts the running item.
    pub fn check(
        &mut self,
        function: &str,
        parameter: &str,
        actual: &Value,
        location: SourceLocation,
    ) -> Result<(), TestFailure> {
        let key = (function.to_string(), parameter.to_string());
        let Some(queue) = self.queues.get_mut(&key) else {
            return Err(TestFailure::missing_expectation(function, parameter, location));
        };
        let Some(head) = queue.front_mut() else {
            return Err(TestFailure::missing_expectation(function, parameter, location));
        };

        if !head.predicate.evaluate(actual) {
            debug!(function, parameter, %actual, "Parameter check failed");
            return Err(TestFailure::new(
                FailureKind::ExpectationMismatch,
                location,
                format!(
                    "Check of parameter {parameter}, function {function} failed: {}",
                    head.predicate.describe_mismatch(actual)
                ),
            )
            .with_note(format!("Expected parameter declared at {}", head.location)));
        }

        if head.remaining.consume() {
            queue.pop_front();
        }
        if queue.is_empty() {
            self.queues.shift_remove(&key);
        }
        debug!(function, parameter, %actual, "Parameter check passed");
        Ok(())
    }

    /// Number of events queued for `(function, parameter)`
    pub fn pending(&self, function: &str, parameter: &str) -> usize {
        self.queues
            .get(&(function.to_string(), parameter.to_string()))
            .map_or(0, VecDeque::len)
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    /// Drop `Repeat::Always` events, then report and clear what is left
    pub fn drain_leftovers(&mut self) -> Vec<Leftover> {
        self.queues
            .drain(..)
            .filter_map(|((function, parameter), queue)| {
                let locations: Vec<_> = queue
                    .into_iter()
                    .filter(|event| !event.remaining.is_always())
                    .map(|event| event.location)
                    .collect();
                (!locations.is_empty()).then_some(Leftover {
                    function,
                    parameter: Some(parameter),
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

    fn at(line: u32) -> SourceLocation {
        SourceLocation::new("expectations.rs", line)
    }

    fn event(predicate: Predicate) -> ExpectationEvent {
        ExpectationEvent::new(predicate, Repeat::ONCE, at(1)).unwrap()
    }

    #[test]
    fn test_exact_value_then_missing() {
        let mut registry = ExpectationRegistry::new();
        registry.push("f", "x", event(Predicate::ExactValue(Value::from(10))));

        assert!(registry.check("f", "x", &Value::from(10u16), at(2)).is_ok());
        let failure = registry.check("f", "x", &Value::from(11), at(3)).unwrap_err();
        assert_eq!(failure.kind, FailureKind::MissingExpectation);
        assert_eq!(failure.location, at(3));
    }

    #[test]
    fn test_mismatch_names_parameter_and_declaration() {
        let mut registry = ExpectationRegistry::new();
        registry.push(
            "connect",
            "port",
            ExpectationEvent::new(Predicate::ExactValue(Value::from(80)), Repeat::ONCE, at(40))
                .unwrap(),
        );

        let failure = registry.check("connect", "port", &Value::from(81), at(50)).unwrap_err();
        assert_eq!(failure.kind, FailureKind::ExpectationMismatch);
        assert!(failure.message.contains("parameter port, function connect"));
        assert!(failure.message.contains("81 != 80"));
        assert_eq!(failure.notes, vec!["Expected parameter declared at expectations.rs:40"]);
        // A rejected check leaves the expectation in place
        assert_eq!(registry.pending("connect", "port"), 1);
    }

    #[test]
    fn test_set_and_range_predicates() {
        let set = vec![Value::from(1), Value::from(3), Value::from(5)];
        assert!(Predicate::ValueInSet(set.clone()).evaluate(&Value::from(3u8)));
        assert!(!Predicate::ValueInSet(set.clone()).evaluate(&Value::from(4)));
        assert!(Predicate::ValueNotInSet(set).evaluate(&Value::from(4)));

        let range = Predicate::ValueInRange { min: -5, max: 5 };
        assert!(range.evaluate(&Value::from(-5)));
        assert!(range.evaluate(&Value::from(5)));
        assert!(!range.evaluate(&Value::from(6)));
        assert!(!range.evaluate(&Value::from("5")));

        let outside = Predicate::ValueNotInRange { min: 0, max: 9 };
        assert!(outside.evaluate(&Value::from(10)));
        assert!(!outside.evaluate(&Value::from(0)));
    }

    #[test]
    fn test_string_predicates_treat_null_as_mismatch() {
        let exact = Predicate::ExactString(Some("abc".into()));
        assert!(exact.evaluate(&Value::from("abc")));
        assert!(!exact.evaluate(&Value::from("abcd")));
        assert!(!exact.evaluate(&Value::Null));

        let null = Predicate::ExactString(None);
        assert!(null.evaluate(&Value::Null));
        assert!(!null.evaluate(&Value::from("")));

        let excluded = Predicate::ExcludedString(Some("abc".into()));
        assert!(excluded.evaluate(&Value::from("abd")));
        assert!(excluded.evaluate(&Value::Null));
        assert!(!excluded.evaluate(&Value::from("abc")));
        assert!(!excluded.evaluate(&Value::from(5)));
        assert_eq!(excluded.describe_mismatch(&Value::from(5)), "5 is not a string");
    }

    #[test]
    fn test_memory_predicates_compare_prefix() {
        let exact = Predicate::ExactMemory(vec![1, 2, 3]);
        assert!(exact.evaluate(&Value::from(vec![1, 2, 3, 99])));
        assert!(!exact.evaluate(&Value::from(vec![1, 2])));
        assert!(!exact.evaluate(&Value::from(vec![1, 2, 4])));

        let excluded = Predicate::ExcludedMemory(vec![1, 2, 3]);
        assert!(excluded.evaluate(&Value::from(vec![1, 2, 4])));
        assert!(!excluded.evaluate(&Value::from(vec![1, 2, 3])));
    }

    #[test]
    fn test_custom_predicate_receives_context() {
        let multiple_of: CheckFn = Arc::new(|actual: &Value, context: &Value| {
            match (actual.as_integral(), context.as_integral()) {
                (Some(v), Some(m)) if m != 0 => v % m == 0,
                _ => false,
            }
        });
        let predicate = Predicate::Custom {
            check: multiple_of,
            context: Value::from(4),
        };
        assert!(predicate.evaluate(&Value::from(12)));
        assert!(!predicate.evaluate(&Value::from(13)));
    }

    #[test]
    fn test_repeat_counts_and_any() {
        let mut registry = ExpectationRegistry::new();
        registry.push(
            "f",
            "x",
            ExpectationEvent::new(Predicate::AnyValue, Repeat::Times(2), at(1)).unwrap(),
        );
        assert!(registry.check("f", "x", &Value::from("a"), at(2)).is_ok());
        assert_eq!(registry.pending("f", "x"), 1);
        assert!(registry.check("f", "x", &Value::Null, at(3)).is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_events_rejected() {
        assert!(ExpectationEvent::new(Predicate::AnyValue, Repeat::Times(0), at(1)).is_err());
        assert!(ExpectationEvent::new(
            Predicate::ValueInRange { min: 5, max: 1 },
            Repeat::ONCE,
            at(1)
        )
        .is_err());
    }

    #[test]
    fn test_leftovers_report_parameter() {
        let mut registry = ExpectationRegistry::new();
        registry.push("f", "x", event(Predicate::AnyValue));
        registry.push(
            "f",
            "y",
            ExpectationEvent::new(Predicate::AnyValue, Repeat::Always, at(2)).unwrap(),
        );

        let leftovers = registry.drain_leftovers();
        assert_eq!(leftovers.len(), 1);
        assert_eq!(leftovers[0].parameter.as_deref(), Some("x"));
        assert!(registry.is_empty());
    }
}
