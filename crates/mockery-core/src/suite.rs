//! Suites: ordered lists of setup, test and teardown items

use crate::errors::TestResult;
use crate::location::SourceLocation;
use crate::session::MockSession;
use crate::state::TestState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an item does within its suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Opens a state frame for the items that follow
    Setup,
    /// A test body
    Test,
    /// Closes the innermost state frame
    Teardown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => f.write_str("setup"),
            Self::Test => f.write_str("test"),
            Self::Teardown => f.write_str("teardown"),
        }
    }
}

/// Body of a suite item
pub type TestFn = Box<dyn Fn(&mut MockSession, &mut TestState) -> TestResult>;

/// One named item of a suite
pub struct TestItem {
    /// Item name, used in diagnostics and summaries
    pub name: String,
    /// What the item does
    pub role: Role,
    /// Body; a missing body counts as an immediate pass
    pub callback: Option<TestFn>,
    /// Where the item was added to its suite
    pub location: SourceLocation,
}

impl TestItem {
    /// Create an item with a body
    #[track_caller]
    pub fn new<F>(name: impl Into<String>, role: Role, callback: F) -> Self
    where
        F: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
    {
        Self {
            name: name.into(),
            role,
            callback: Some(Box::new(callback)),
            location: SourceLocation::caller(),
        }
    }

    /// Create an item with no body
    #[track_caller]
    pub fn empty(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            callback: None,
            location: SourceLocation::caller(),
        }
    }
}

impl fmt::Debug for TestItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestItem")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("callback", &self.callback.is_some())
            .field("location", &self.location)
            .finish()
    }
}

/// A named, ordered list of items run by [`crate::TestRunner`]
#[derive(Debug, Default)]
pub struct TestSuite {
    name: String,
    items: Vec<TestItem>,
}

impl TestSuite {
    /// Create an empty suite
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Suite name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a test
    #[track_caller]
    pub fn test<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
    {
        self.items.push(TestItem::new(name, Role::Test, body));
        self
    }

    /// Append a setup
    #[track_caller]
    pub fn setup<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
    {
        self.items.push(TestItem::new(name, Role::Setup, body));
        self
    }

    /// Append a teardown
    #[track_caller]
    pub fn teardown<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
    {
        self.items.push(TestItem::new(name, Role::Teardown, body));
        self
    }

    /// Append `<name>_setup`, `<name>` and `<name>_teardown`
    #[track_caller]
    pub fn with_setup_teardown<S, T, D>(mut self, name: &str, setup: S, test: T, teardown: D) -> Self
    where
        S: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
        T: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
        D: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
    {
        self.items
            .push(TestItem::new(format!("{name}_setup"), Role::Setup, setup));
        self.items.push(TestItem::new(name, Role::Test, test));
        self.items
            .push(TestItem::new(format!("{name}_teardown"), Role::Teardown, teardown));
        self
    }

    /// Append `<name>_setup` and `<name>` followed by a teardown with no body
    ///
    /// The bodiless teardown still closes the setup's frame and fails on blocks
    /// left allocated since the setup ran.
    #[track_caller]
    pub fn with_setup<S, T>(mut self, name: &str, setup: S, test: T) -> Self
    where
        S: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
        T: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
    {
        self.items
            .push(TestItem::new(format!("{name}_setup"), Role::Setup, setup));
        self.items.push(TestItem::new(name, Role::Test, test));
        self.items
            .push(TestItem::empty(format!("{name}_teardown"), Role::Teardown));
        self
    }

    /// Append a setup with no body, then `<name>` and `<name>_teardown`
    #[track_caller]
    pub fn with_teardown<T, D>(mut self, name: &str, test: T, teardown: D) -> Self
    where
        T: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
        D: Fn(&mut MockSession, &mut TestState) -> TestResult + 'static,
    {
        self.items
            .push(TestItem::empty(format!("{name}_setup"), Role::Setup));
        self.items.push(TestItem::new(name, Role::Test, test));
        self.items
            .push(TestItem::new(format!("{name}_teardown"), Role::Teardown, teardown));
        self
    }

    /// Append a prebuilt item
    pub fn item(mut self, item: TestItem) -> Self {
        self.items.push(item);
        self
    }

    /// Items in run order
    pub fn items(&self) -> &[TestItem] {
        &self.items
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the suite has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_order_and_names() {
        let suite = TestSuite::new("db")
            .test("plain", |_, _| Ok(()))
            .with_setup_teardown("fixture", |_, _| Ok(()), |_, _| Ok(()), |_, _| Ok(()))
            .item(TestItem::empty("noop", Role::Test));

        let names: Vec<_> = suite.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            ["plain", "fixture_setup", "fixture", "fixture_teardown", "noop"]
        );
        let roles: Vec<_> = suite.items().iter().map(|i| i.role).collect();
        assert_eq!(
            roles,
            [Role::Test, Role::Setup, Role::Test, Role::Teardown, Role::Test]
        );
        assert!(suite.items()[4].callback.is_none());
        assert_eq!(suite.items()[0].location.file, file!());
    }

    #[test]
    fn test_half_fixtures_keep_the_triple_shape() {
        let suite = TestSuite::new("half")
            .with_setup("a", |_, _| Ok(()), |_, _| Ok(()))
            .with_teardown("b", |_, _| Ok(()), |_, _| Ok(()));

        let roles: Vec<_> = suite.items().iter().map(|i| i.role).collect();
        assert_eq!(
            roles,
            [Role::Setup, Role::Test, Role::Teardown, Role::Setup, Role::Test, Role::Teardown]
        );
        let bodiless: Vec<_> = suite
            .items()
            .iter()
            .filter(|i| i.callback.is_none())
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(bodiless, ["a_teardown", "b_setup"]);
    }
}
