//! Shorthands for mock shims and test bodies
//!
//! Mock shims identify themselves by the name of the function they are written
//! in, and parameters by their binding name:
//!
//! ```
//! use mockery_core::{check_expected, mock, will_return, MockSession, TestResult};
//!
//! fn db_query(session: &mut MockSession, user_id: i64) -> TestResult<i64> {
//!     check_expected!(session, user_id);
//!     Ok(mock!(session as i64))
//! }
//!
//! let mut session = MockSession::default();
//! will_return!(session, db_query, 42);
//! session.expect_value("db_query", "user_id", 7);
//! assert_eq!(db_query(&mut session, 7).unwrap(), 42);
//! ```

/// Read the next programmed return value of the enclosing function
///
/// `mock!(session)` yields a [`crate::Value`]; `mock!(session as T)` converts it.
/// Either form propagates a [`crate::FatalMisuse`] with `?`.
#[macro_export]
macro_rules! mock {
    ($session:ident as $ty:ty) => {
        $session.mock_as::<$ty>($crate::current_function!())?
    };
    ($session:expr) => {
        $session.mock($crate::current_function!())?
    };
}

/// Check a parameter of the enclosing function against its expectations
///
/// The parameter is passed by value; the `?` propagates a failed check.
#[macro_export]
macro_rules! check_expected {
    ($session:expr, $param:ident) => {
        $session.check_expected($crate::current_function!(), stringify!($param), $param)?
    };
}

/// Queue a return value for the named function
#[macro_export]
macro_rules! will_return {
    ($session:expr, $function:ident, $value:expr) => {
        $session.will_return(stringify!($function), $value)
    };
    ($session:expr, $function:ident, $value:expr, $count:expr) => {
        $session.will_return_count(stringify!($function), $value, $count)
    };
}
