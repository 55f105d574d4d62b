//! Error taxonomy for the mock engine and the test runner
//!
//! Failures fall into three groups:
//! - [`MockeryError`]: configuration and registration problems outside any test item
//! - [`TestFailure`]: recoverable, localized to the running test item
//! - [`FatalMisuse`]: the harness itself was driven incorrectly; ends the run
//!
//! [`Unwind`] is the control value that carries either of the last two from the
//! failure point back to the harness boundary through `?`.

use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised while configuring the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum MockeryError {
    /// Invalid input or registration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration could not be loaded or failed validation
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },
}

impl MockeryError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Standard Result type for engine configuration
pub type Result<T> = std::result::Result<T, MockeryError>;

impl From<std::io::Error> for MockeryError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::config(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for MockeryError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for MockeryError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Category of a recoverable test failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A parameter check predicate rejected the actual value
    ExpectationMismatch,
    /// A parameter was checked with no expectation queued for it
    MissingExpectation,
    /// An explicit assertion in a test body failed
    AssertionFailure,
    /// Code under test tripped `mock_assert` while an assertion was expected
    MockAssertion,
    /// Queued values or expectations were left over when the item returned
    UnconsumedExpectation,
    /// A tracked block allocated by the item was never freed
    MemoryLeak,
    /// A tracked free of an address with no live block
    InvalidFree,
    /// A registration was rejected (zero repeat count, inverted range)
    InvalidRegistration,
    /// The item panicked
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ExpectationMismatch => "expectation mismatch",
            Self::MissingExpectation => "missing expectation",
            Self::AssertionFailure => "assertion failure",
            Self::MockAssertion => "mock assertion",
            Self::UnconsumedExpectation => "unconsumed expectation",
            Self::MemoryLeak => "memory leak",
            Self::InvalidFree => "invalid free",
            Self::InvalidRegistration => "invalid registration",
            Self::Panic => "panic",
        };
        f.write_str(label)
    }
}

/// A recoverable failure attributed to the running test item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{location}: {message}")]
pub struct TestFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Where the failure was detected, or where the offending state was declared
    pub location: SourceLocation,
    /// Primary diagnostic
    pub message: String,
    /// Follow-up diagnostic lines (declaration sites, byte offsets, ...)
    pub notes: Vec<String>,
}

impl TestFailure {
    /// Create a failure of the given kind
    pub fn new(kind: FailureKind, location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Attach a follow-up diagnostic line
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Create an assertion failure
    pub fn assertion(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::new(FailureKind::AssertionFailure, location, message)
    }

    /// Create a failure for a parameter check with nothing queued
    pub fn missing_expectation(function: &str, parameter: &str, location: SourceLocation) -> Self {
        Self::new(
            FailureKind::MissingExpectation,
            location,
            format!("Could not get value to check parameter {parameter} of function {function}"),
        )
    }

    /// Create a failure for a rejected registration
    pub fn invalid_registration(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidRegistration, location, message)
    }

    /// Render the failure as `<file>:<line>: <message>` followed by indented notes
    pub fn diagnostic_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.notes.len() + 1);
        lines.push(self.to_string());
        lines.extend(self.notes.iter().map(|note| format!("    {note}")));
        lines
    }
}

/// Misuse of the mock harness that no test verdict can express
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum FatalMisuse {
    /// A mock read its return value with nothing queued for it
    #[error("{location}: No entries for symbol {function}() - no return value was queued")]
    NoReturnValue {
        /// Mocked function
        function: String,
        /// Where the mock read happened
        location: SourceLocation,
    },

    /// A queued return value cannot be read as the type the mock asked for
    #[error("{location}: value {value} queued for {function}() cannot be read as {expected}")]
    ReturnTypeMismatch {
        /// Mocked function
        function: String,
        /// Requested Rust type
        expected: String,
        /// Queued value, rendered
        value: String,
        /// Where the mock read happened
        location: SourceLocation,
    },

    /// A teardown item ran with no setup frame open
    #[error("teardown {item} has no matching setup")]
    UnpairedTeardown {
        /// Name of the teardown item
        item: String,
    },
}

/// Non-local exit from a test body back to the harness boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unwind {
    /// The item failed; the run continues with the next item
    #[error(transparent)]
    Failed(#[from] TestFailure),

    /// The harness was misused; the run stops
    #[error(transparent)]
    Fatal(#[from] FatalMisuse),
}

impl Unwind {
    /// The carried test failure, if this is a recoverable unwind
    pub fn failure(&self) -> Option<&TestFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Fatal(_) => None,
        }
    }
}

/// Result type of test bodies and mock shims
pub type TestResult<T = ()> = std::result::Result<T, Unwind>;

/// Errors that end a suite run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    /// A fatal misuse surfaced while running an item
    #[error("fatal misuse in {item}: {source}")]
    Fatal {
        /// Item that was running
        item: String,
        /// The misuse
        #[source]
        source: FatalMisuse,
    },
}

impl HarnessError {
    /// The underlying misuse
    pub fn misuse(&self) -> &FatalMisuse {
        match self {
            Self::Fatal { source, .. } => source,
        }
    }
}
