//! Setup allocates a scratch buffer, the test uses it, teardown frees it

use mockery_core::{
    assert_int_equal, assert_memory_equal, assert_non_null, fail, Address, MockSession,
    TestResult, TestState, TestSuite,
};

const BUFFER_SIZE: usize = 1024;

fn setup_buffer(session: &mut MockSession, state: &mut TestState) -> TestResult {
    let buffer = session.test_calloc(1, BUFFER_SIZE);
    assert_non_null!(buffer);
    state.set(buffer.unwrap_or(Address::NULL));
    Ok(())
}

fn teardown_buffer(session: &mut MockSession, state: &mut TestState) -> TestResult {
    if let Some(buffer) = state.take::<Address>() {
        session.test_free(buffer);
    }
    Ok(())
}

fn buffer_of(state: &TestState) -> TestResult<Address> {
    match state.get::<Address>() {
        Some(&buffer) => Ok(buffer),
        None => fail!("setup left no buffer in the test state"),
    }
}

pub(crate) fn suite() -> TestSuite {
    TestSuite::new("fixture")
        .with_setup_teardown(
            "add_function",
            setup_buffer,
            |_, state| {
                buffer_of(state)?;
                let (a, b) = (2, 3);
                assert_int_equal!(a + b, 5);
                Ok(())
            },
            teardown_buffer,
        )
        .with_setup_teardown(
            "buffer_round_trip",
            setup_buffer,
            |session, state| {
                let buffer = buffer_of(state)?;
                let greeting = b"hello, fixture";
                if let Some(bytes) = session.block_mut(buffer) {
                    bytes[..greeting.len()].copy_from_slice(greeting);
                }
                let stored = session.block(buffer).unwrap_or_default();
                assert_int_equal!(stored.len(), BUFFER_SIZE);
                assert_memory_equal!(&stored[..greeting.len()], greeting);
                assert_memory_equal!(&stored[greeting.len()..32], &[0u8; 18]);
                Ok(())
            },
            teardown_buffer,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockery_core::report::MemorySink;
    use mockery_core::{HarnessConfig, Role, TestRunner};

    #[test]
    fn test_fixture_suite_balances_setups_and_teardowns() {
        let mut runner = TestRunner::with_sink(HarnessConfig::default(), MemorySink::new());
        let report = runner.run(&suite()).unwrap();
        assert!(report.success(), "{:?}", report.items);
        assert!(report.open_setups.is_empty());
        assert_eq!(report.tests_executed, 2);
        assert_eq!(
            report.items.iter().filter(|i| i.role == Role::Teardown).count(),
            2
        );
    }
}
