//! Assertions for test bodies
//!
//! Every assertion returns `Result<(), TestFailure>` so a test body aborts with
//! `?`. The macro forms add the `?` and capture the asserted expression's text;
//! both record the caller's location.
//!
//! ```
//! use mockery_core::{assert_int_equal, assert_true, TestResult};
//!
//! fn body() -> TestResult {
//!     assert_int_equal!(2 + 3, 5);
//!     assert_true!("abc".len() == 3);
//!     Ok(())
//! }
//! assert!(body().is_ok());
//! ```

use crate::allocation::Address;
use crate::errors::TestFailure;
use crate::location::SourceLocation;
use crate::value::Value;

fn check(passed: bool, message: impl FnOnce() -> String, location: SourceLocation) -> Result<(), TestFailure> {
    if passed {
        Ok(())
    } else {
        Err(TestFailure::assertion(location, message()))
    }
}

fn is_null_like(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Address(Address::NULL))
}

/// Fail unless `result` is true
#[track_caller]
pub fn assert_true(result: bool, expression: &str) -> Result<(), TestFailure> {
    check(result, || expression.to_string(), SourceLocation::caller())
}

/// Fail unless `result` is false
#[track_caller]
pub fn assert_false(result: bool, expression: &str) -> Result<(), TestFailure> {
    check(!result, || format!("!({expression})"), SourceLocation::caller())
}

/// Fail unless the two integral values are equal
#[track_caller]
pub fn assert_int_equal(a: impl Into<Value>, b: impl Into<Value>) -> Result<(), TestFailure> {
    let (a, b) = (a.into(), b.into());
    check(a == b, || format!("{a} != {b}"), SourceLocation::caller())
}

/// Fail if the two integral values are equal
#[track_caller]
pub fn assert_int_not_equal(a: impl Into<Value>, b: impl Into<Value>) -> Result<(), TestFailure> {
    let (a, b) = (a.into(), b.into());
    check(a != b, || format!("{a} == {b}"), SourceLocation::caller())
}

/// Fail unless the strings are byte-identical; `None` only equals `None`
#[track_caller]
pub fn assert_string_equal<'a, 'b>(
    a: impl Into<Option<&'a str>>,
    b: impl Into<Option<&'b str>>,
) -> Result<(), TestFailure> {
    let (a, b) = (Value::from(a.into()), Value::from(b.into()));
    check(a == b, || format!("{a} != {b}"), SourceLocation::caller())
}

/// Fail if the strings are byte-identical
#[track_caller]
pub fn assert_string_not_equal<'a, 'b>(
    a: impl Into<Option<&'a str>>,
    b: impl Into<Option<&'b str>>,
) -> Result<(), TestFailure> {
    let (a, b) = (Value::from(a.into()), Value::from(b.into()));
    check(a != b, || format!("{a} == {b}"), SourceLocation::caller())
}

/// Fail unless both buffers hold the same bytes
///
/// Each differing offset is listed as a note on the failure.
#[track_caller]
pub fn assert_memory_equal(a: &[u8], b: &[u8]) -> Result<(), TestFailure> {
    let location = SourceLocation::caller();
    if a.len() != b.len() {
        return Err(TestFailure::assertion(
            location,
            format!("buffer lengths differ: {} != {}", a.len(), b.len()),
        ));
    }
    let mut failure: Option<TestFailure> = None;
    for (offset, (x, y)) in a.iter().zip(b).enumerate().filter(|(_, (x, y))| x != y) {
        let note = format!("difference at offset {offset} 0x{x:02x} 0x{y:02x}");
        failure = Some(match failure {
            Some(failure) => failure.with_note(note),
            None => TestFailure::assertion(
                location.clone(),
                format!("{} bytes of [{}] and [{}] differ", a.len(), hex::encode(a), hex::encode(b)),
            )
            .with_note(note),
        });
    }
    failure.map_or(Ok(()), Err)
}

/// Fail if both buffers hold the same bytes
#[track_caller]
pub fn assert_memory_not_equal(a: &[u8], b: &[u8]) -> Result<(), TestFailure> {
    check(
        a != b,
        || format!("{} bytes of [{}] and [{}] are the same", a.len(), hex::encode(a), hex::encode(b)),
        SourceLocation::caller(),
    )
}

/// Fail unless `minimum <= value <= maximum`
#[track_caller]
pub fn assert_in_range(
    value: impl Into<i128>,
    minimum: impl Into<i128>,
    maximum: impl Into<i128>,
) -> Result<(), TestFailure> {
    let (value, minimum, maximum) = (value.into(), minimum.into(), maximum.into());
    check(
        (minimum..=maximum).contains(&value),
        || format!("{value} is not within the range {minimum}-{maximum}"),
        SourceLocation::caller(),
    )
}

/// Fail if `minimum <= value <= maximum`
#[track_caller]
pub fn assert_not_in_range(
    value: impl Into<i128>,
    minimum: impl Into<i128>,
    maximum: impl Into<i128>,
) -> Result<(), TestFailure> {
    let (value, minimum, maximum) = (value.into(), minimum.into(), maximum.into());
    check(
        !(minimum..=maximum).contains(&value),
        || format!("{value} is within the range {minimum}-{maximum}"),
        SourceLocation::caller(),
    )
}

fn render_set(set: &[Value]) -> String {
    let items: Vec<String> = set.iter().map(ToString::to_string).collect();
    format!("{{{}}}", items.join(", "))
}

/// Fail unless `value` equals a member of `set`
#[track_caller]
pub fn assert_in_set<I, V>(value: impl Into<Value>, set: I) -> Result<(), TestFailure>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let value = value.into();
    let set: Vec<Value> = set.into_iter().map(Into::into).collect();
    check(
        set.contains(&value),
        || format!("{value} is not within the set {}", render_set(&set)),
        SourceLocation::caller(),
    )
}

/// Fail if `value` equals a member of `set`
#[track_caller]
pub fn assert_not_in_set<I, V>(value: impl Into<Value>, set: I) -> Result<(), TestFailure>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let value = value.into();
    let set: Vec<Value> = set.into_iter().map(Into::into).collect();
    check(
        !set.contains(&value),
        || format!("{value} was found in the set {}", render_set(&set)),
        SourceLocation::caller(),
    )
}

/// Fail unless `value` is null (`Value::Null`, `None` or [`Address::NULL`])
#[track_caller]
pub fn assert_null(value: impl Into<Value>, expression: &str) -> Result<(), TestFailure> {
    let value = value.into();
    check(
        is_null_like(&value),
        || format!("{expression} is not NULL ({value})"),
        SourceLocation::caller(),
    )
}

/// Fail if `value` is null
#[track_caller]
pub fn assert_non_null(value: impl Into<Value>, expression: &str) -> Result<(), TestFailure> {
    let value = value.into();
    check(
        !is_null_like(&value),
        || format!("{expression} is NULL"),
        SourceLocation::caller(),
    )
}

/// Fail unless `|a - b| <= epsilon`
#[track_caller]
pub fn assert_float_equal(a: f64, b: f64, epsilon: f64) -> Result<(), TestFailure> {
    check(
        (a - b).abs() <= epsilon,
        || format!("{a} != {b} (epsilon {epsilon})"),
        SourceLocation::caller(),
    )
}

/// Fail unconditionally
#[track_caller]
pub fn fail() -> Result<(), TestFailure> {
    Err(TestFailure::assertion(SourceLocation::caller(), "Failure!"))
}

/// Fail unconditionally with a message
#[track_caller]
pub fn fail_msg(message: impl Into<String>) -> Result<(), TestFailure> {
    Err(TestFailure::assertion(SourceLocation::caller(), message))
}

/// `assert_true(cond, "cond")?`
#[macro_export]
macro_rules! assert_true {
    ($cond:expr $(,)?) => {
        $crate::assertions::assert_true($cond, stringify!($cond))?
    };
}

/// `assert_false(cond, "cond")?`
#[macro_export]
macro_rules! assert_false {
    ($cond:expr $(,)?) => {
        $crate::assertions::assert_false($cond, stringify!($cond))?
    };
}

/// `assert_int_equal(a, b)?`
#[macro_export]
macro_rules! assert_int_equal {
    ($a:expr, $b:expr $(,)?) => {
        $crate::assertions::assert_int_equal($a, $b)?
    };
}

/// `assert_int_not_equal(a, b)?`
#[macro_export]
macro_rules! assert_int_not_equal {
    ($a:expr, $b:expr $(,)?) => {
        $crate::assertions::assert_int_not_equal($a, $b)?
    };
}

/// `assert_string_equal(a, b)?`
#[macro_export]
macro_rules! assert_string_equal {
    ($a:expr, $b:expr $(,)?) => {
        $crate::assertions::assert_string_equal($a, $b)?
    };
}

/// `assert_string_not_equal(a, b)?`
#[macro_export]
macro_rules! assert_string_not_equal {
    ($a:expr, $b:expr $(,)?) => {
        $crate::assertions::assert_string_not_equal($a, $b)?
    };
}

/// `assert_memory_equal(a, b)?`
#[macro_export]
macro_rules! assert_memory_equal {
    ($a:expr, $b:expr $(,)?) => {
        $crate::assertions::assert_memory_equal($a, $b)?
    };
}

/// `assert_memory_not_equal(a, b)?`
#[macro_export]
macro_rules! assert_memory_not_equal {
    ($a:expr, $b:expr $(,)?) => {
        $crate::assertions::assert_memory_not_equal($a, $b)?
    };
}

/// `assert_in_range(value, min, max)?`
#[macro_export]
macro_rules! assert_in_range {
    ($value:expr, $min:expr, $max:expr $(,)?) => {
        $crate::assertions::assert_in_range($value, $min, $max)?
    };
}

/// `assert_not_in_range(value, min, max)?`
#[macro_export]
macro_rules! assert_not_in_range {
    ($value:expr, $min:expr, $max:expr $(,)?) => {
        $crate::assertions::assert_not_in_range($value, $min, $max)?
    };
}

/// `assert_in_set(value, set)?`
#[macro_export]
macro_rules! assert_in_set {
    ($value:expr, $set:expr $(,)?) => {
        $crate::assertions::assert_in_set($value, $set)?
    };
}

/// `assert_not_in_set(value, set)?`
#[macro_export]
macro_rules! assert_not_in_set {
    ($value:expr, $set:expr $(,)?) => {
        $crate::assertions::assert_not_in_set($value, $set)?
    };
}

/// `assert_null(value, "value")?`
#[macro_export]
macro_rules! assert_null {
    ($value:expr $(,)?) => {
        $crate::assertions::assert_null($value, stringify!($value))?
    };
}

/// `assert_non_null(value, "value")?`
#[macro_export]
macro_rules! assert_non_null {
    ($value:expr $(,)?) => {
        $crate::assertions::assert_non_null($value, stringify!($value))?
    };
}

/// `assert_float_equal(a, b, epsilon)?`
#[macro_export]
macro_rules! assert_float_equal {
    ($a:expr, $b:expr, $epsilon:expr $(,)?) => {
        $crate::assertions::assert_float_equal($a, $b, $epsilon)?
    };
}

/// Abort the test body as failed
#[macro_export]
macro_rules! fail {
    () => {
        return ::core::result::Result::Err(
            $crate::errors::TestFailure::assertion($crate::location::SourceLocation::caller(), "Failure!")
                .into(),
        )
    };
    ($($arg:tt)+) => {
        return ::core::result::Result::Err(
            $crate::errors::TestFailure::assertion(
                $crate::location::SourceLocation::caller(),
                format!($($arg)+),
            )
            .into(),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FailureKind, TestResult};

    #[test]
    fn test_integral_and_string_assertions() {
        assert!(assert_int_equal(5u8, 5i64).is_ok());
        assert_eq!(assert_int_equal(1, 2).unwrap_err().message, "1 != 2");
        assert!(assert_int_not_equal(1, 2).is_ok());

        assert!(assert_string_equal("abc", "abc").is_ok());
        assert_eq!(
            assert_string_equal("abc", None::<&str>).unwrap_err().message,
            "\"abc\" != NULL"
        );
        assert!(assert_string_not_equal(None::<&str>, "x").is_ok());
    }

    #[test]
    fn test_memory_assertion_lists_offsets() {
        let failure = assert_memory_equal(&[1, 2, 3], &[1, 9, 8]).unwrap_err();
        assert_eq!(failure.message, "3 bytes of [010203] and [010908] differ");
        assert_eq!(
            failure.notes,
            [
                "difference at offset 1 0x02 0x09",
                "difference at offset 2 0x03 0x08"
            ]
        );
        assert!(assert_memory_equal(b"ab", b"ab").is_ok());
        assert!(assert_memory_equal(b"ab", b"abc").is_err());
        assert!(assert_memory_not_equal(b"ab", b"ab").is_err());
    }

    #[test]
    fn test_range_set_and_null() {
        assert!(assert_in_range(5, 0, 10).is_ok());
        assert!(assert_in_range(11, 0, 10).is_err());
        assert!(assert_not_in_range(11, 0, 10).is_ok());

        assert!(assert_in_set(3, [1, 2, 3]).is_ok());
        assert_eq!(
            assert_in_set(4, [1, 2, 3]).unwrap_err().message,
            "4 is not within the set {1, 2, 3}"
        );
        assert!(assert_not_in_set(4, [1, 2, 3]).is_ok());

        assert!(assert_null(None::<u32>, "x").is_ok());
        assert!(assert_null(Address::NULL, "p").is_ok());
        assert!(assert_non_null(Address::from_raw(0x1000), "p").is_ok());
        assert!(assert_non_null(Value::Null, "p").is_err());
    }

    #[test]
    fn test_float_and_fail() {
        assert!(assert_float_equal(0.1 + 0.2, 0.3, 1e-9).is_ok());
        assert!(assert_float_equal(1.0, 1.1, 1e-3).is_err());
        assert_eq!(fail().unwrap_err().message, "Failure!");
        assert_eq!(fail_msg("nope").unwrap_err().kind, FailureKind::AssertionFailure);
    }

    #[test]
    fn test_macros_capture_expression_and_location() {
        fn body(x: i32) -> TestResult {
            assert_true!(x > 3);
            Ok(())
        }
        let line = line!() - 3;
        let failure = body(1).unwrap_err().failure().cloned().unwrap();
        assert_eq!(failure.message, "x > 3");
        assert_eq!(failure.location, SourceLocation::new(file!(), line));

        fn failing() -> TestResult {
            fail!("bad state {}", 7);
        }
        assert_eq!(
            failing().unwrap_err().failure().map(|f| f.message.clone()),
            Some("bad state 7".to_string())
        );
    }
}
