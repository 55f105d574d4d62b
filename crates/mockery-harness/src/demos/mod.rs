//! Bundled demo suites

use mockery_core::TestSuite;

mod calculator;
mod fixture;
mod forward_progress;
mod linked_list;
mod user_age;

/// A named suite the harness can run
#[derive(Debug, Clone, Copy)]
pub struct Demo {
    /// Name used on the command line
    pub name: &'static str,
    /// One-line summary for `list`
    pub description: &'static str,
    build: fn() -> TestSuite,
}

impl Demo {
    /// Build a fresh copy of the suite
    pub fn suite(&self) -> TestSuite {
        (self.build)()
    }
}

const CATALOG: &[Demo] = &[
    Demo {
        name: "user_age",
        description: "get_user_age against a mocked db_query",
        build: user_age::suite,
    },
    Demo {
        name: "linked_list",
        description: "linked list stored in tracked heap blocks",
        build: linked_list::suite,
    },
    Demo {
        name: "fixture",
        description: "setup/teardown pairs sharing a scratch buffer",
        build: fixture::suite,
    },
    Demo {
        name: "calculator",
        description: "floating point assertions and expected mock asserts",
        build: calculator::suite,
    },
    Demo {
        name: "forward_progress",
        description: "deliberate failures of every kind between passing tests",
        build: forward_progress::suite,
    },
];

/// Every bundled demo, in run order
pub fn catalog() -> &'static [Demo] {
    CATALOG
}

/// Look a demo up by name
pub fn find(name: &str) -> Option<Demo> {
    CATALOG.iter().find(|demo| demo.name == name).copied()
}
