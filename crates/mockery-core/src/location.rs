//! Source locations for registrations, checks and failures
//!
//! Registration and check methods are `#[track_caller]`, so the location recorded
//! is the test or mock line that called them rather than a line inside the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// A `file:line` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file path as reported by the compiler
    pub file: String,
    /// 1-based line number, 0 when unknown
    pub line: u32,
}

impl SourceLocation {
    /// Create a location from its parts
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location of the caller, resolved through `#[track_caller]` frames
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }

    /// Placeholder for failures with no attributable source line
    pub fn unknown() -> Self {
        Self::new("<unknown>", 0)
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[doc(hidden)]
pub fn type_name_of<T>(_: &T) -> &'static str {
    std::any::type_name::<T>()
}

/// Reduce the type path of a probe function to the name of its enclosing function
#[doc(hidden)]
pub fn enclosing_function(probe_path: &'static str) -> &'static str {
    let mut path = probe_path.strip_suffix("::__probe").unwrap_or(probe_path);
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    path.rsplit("::").next().unwrap_or(path)
}

/// Name of the enclosing function, the way mock shims identify themselves
///
/// ```
/// fn connect_to_server() -> &'static str {
///     mockery_core::current_function!()
/// }
/// assert_eq!(connect_to_server(), "connect_to_server");
/// ```
#[macro_export]
macro_rules! current_function {
    () => {{
        fn __probe() {}
        $crate::location::enclosing_function($crate::location::type_name_of(&__probe))
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn recorded() -> SourceLocation {
        SourceLocation::caller()
    }

    #[test]
    fn test_caller_location_points_at_call_site() {
        let line = line!() + 1;
        let location = recorded();
        assert_eq!(location.line, line);
        assert!(location.file.ends_with("location.rs"));
    }

    #[test]
    fn test_current_function_in_fn_and_closure() {
        fn db_query() -> &'static str {
            crate::current_function!()
        }
        assert_eq!(db_query(), "db_query");

        let from_closure = || crate::current_function!();
        assert_eq!(
            from_closure(),
            "test_current_function_in_fn_and_closure"
        );
    }

    #[test]
    fn test_current_function_in_method() {
        struct Server;
        impl Server {
            fn connect(&self) -> &'static str {
                crate::current_function!()
            }
        }
        assert_eq!(Server.connect(), "connect");
    }

    #[test]
    fn test_display() {
        assert_eq!(SourceLocation::new("a.rs", 7).to_string(), "a.rs:7");
    }
}
