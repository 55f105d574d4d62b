//! A singly linked list whose header and nodes live in tracked blocks
//!
//! Layout, little endian:
//! - list header: `head: u64` at 0, `size: u32` at 8
//! - node: `data: i32` at 0, `next: u64` at 4

use mockery_core::location::SourceLocation;
use mockery_core::{
    assert_false, assert_int_equal, assert_non_null, assert_null, assert_true, Address,
    MockSession, TestFailure, TestResult, TestSuite,
};

const LIST_SIZE: usize = 12;
const NODE_SIZE: usize = 12;

#[track_caller]
fn bad_access(block: Address, offset: usize) -> TestFailure {
    TestFailure::assertion(
        SourceLocation::caller(),
        format!("access at offset {offset} outside tracked block {block}"),
    )
}

fn read<const N: usize>(session: &MockSession, block: Address, offset: usize) -> TestResult<[u8; N]> {
    session
        .block(block)
        .and_then(|bytes| bytes.get(offset..offset + N))
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or_else(|| bad_access(block, offset).into())
}

fn write(session: &mut MockSession, block: Address, offset: usize, value: &[u8]) -> TestResult {
    let slot = session
        .block_mut(block)
        .and_then(|bytes| bytes.get_mut(offset..offset + value.len()))
        .ok_or_else(|| bad_access(block, offset))?;
    slot.copy_from_slice(value);
    Ok(())
}

fn read_address(session: &MockSession, block: Address, offset: usize) -> TestResult<Address> {
    Ok(Address::from_raw(u64::from_le_bytes(read(session, block, offset)?)))
}

fn write_address(session: &mut MockSession, block: Address, offset: usize, value: Address) -> TestResult {
    write(session, block, offset, &value.as_u64().to_le_bytes())
}

fn list_head(session: &MockSession, list: Address) -> TestResult<Address> {
    read_address(session, list, 0)
}

fn list_size(session: &MockSession, list: Address) -> TestResult<u32> {
    Ok(u32::from_le_bytes(read(session, list, 8)?))
}

fn set_list_size(session: &mut MockSession, list: Address, size: u32) -> TestResult {
    write(session, list, 8, &size.to_le_bytes())
}

fn node_data(session: &MockSession, node: Address) -> TestResult<i32> {
    Ok(i32::from_le_bytes(read(session, node, 0)?))
}

fn node_next(session: &MockSession, node: Address) -> TestResult<Address> {
    read_address(session, node, 4)
}

#[track_caller]
fn allocate(session: &mut MockSession, size: usize) -> TestResult<Address> {
    let location = SourceLocation::caller();
    session.test_calloc(1, size).ok_or_else(|| {
        TestFailure::assertion(location, format!("out of tracked memory allocating {size} bytes")).into()
    })
}

fn create_list(session: &mut MockSession) -> TestResult<Address> {
    allocate(session, LIST_SIZE)
}

fn create_node(session: &mut MockSession, data: i32) -> TestResult<Address> {
    let node = allocate(session, NODE_SIZE)?;
    write(session, node, 0, &data.to_le_bytes())?;
    Ok(node)
}

fn add_to_list(session: &mut MockSession, list: Address, data: i32) -> TestResult {
    let node = create_node(session, data)?;
    let head = list_head(session, list)?;
    if head.is_null() {
        write_address(session, list, 0, node)?;
    } else {
        let mut current = head;
        loop {
            let next = node_next(session, current)?;
            if next.is_null() {
                break;
            }
            current = next;
        }
        write_address(session, current, 4, node)?;
    }
    let size = list_size(session, list)?;
    set_list_size(session, list, size + 1)
}

fn find_in_list(session: &MockSession, list: Address, data: i32) -> TestResult<Address> {
    let mut current = list_head(session, list)?;
    while !current.is_null() {
        if node_data(session, current)? == data {
            return Ok(current);
        }
        current = node_next(session, current)?;
    }
    Ok(Address::NULL)
}

fn remove_from_list(session: &mut MockSession, list: Address, data: i32) -> TestResult<bool> {
    let mut previous = Address::NULL;
    let mut current = list_head(session, list)?;
    while !current.is_null() && node_data(session, current)? != data {
        previous = current;
        current = node_next(session, current)?;
    }
    if current.is_null() {
        return Ok(false);
    }

    let next = node_next(session, current)?;
    if previous.is_null() {
        write_address(session, list, 0, next)?;
    } else {
        write_address(session, previous, 4, next)?;
    }
    session.test_free(current);
    let size = list_size(session, list)?;
    set_list_size(session, list, size.saturating_sub(1))?;
    Ok(true)
}

fn destroy_list(session: &mut MockSession, list: Address) -> TestResult {
    let mut current = list_head(session, list)?;
    while !current.is_null() {
        let next = node_next(session, current)?;
        session.test_free(current);
        current = next;
    }
    session.test_free(list);
    Ok(())
}

pub(crate) fn suite() -> TestSuite {
    TestSuite::new("linked_list")
        .test("list_initialization", |session, _| {
            let list = create_list(session)?;
            assert_null!(list_head(session, list)?);
            assert_int_equal!(list_size(session, list)?, 0);
            destroy_list(session, list)
        })
        .test("add_element", |session, _| {
            let list = create_list(session)?;
            add_to_list(session, list, 10)?;
            let head = list_head(session, list)?;
            assert_non_null!(head);
            assert_int_equal!(node_data(session, head)?, 10);
            assert_int_equal!(list_size(session, list)?, 1);
            destroy_list(session, list)
        })
        .test("add_multiple_elements", |session, _| {
            let list = create_list(session)?;
            for data in [10, 20, 30] {
                add_to_list(session, list, data)?;
            }
            let mut current = list_head(session, list)?;
            for expected in [10, 20, 30] {
                assert_int_equal!(node_data(session, current)?, expected);
                current = node_next(session, current)?;
            }
            assert_null!(current);
            assert_int_equal!(list_size(session, list)?, 3);
            destroy_list(session, list)
        })
        .test("find_element", |session, _| {
            let list = create_list(session)?;
            add_to_list(session, list, 10)?;
            add_to_list(session, list, 20)?;

            let node = find_in_list(session, list, 20)?;
            assert_non_null!(node);
            assert_int_equal!(node_data(session, node)?, 20);
            assert_null!(find_in_list(session, list, 30)?);
            destroy_list(session, list)
        })
        .test("remove_element", |session, _| {
            let list = create_list(session)?;
            for data in [10, 20, 30] {
                add_to_list(session, list, data)?;
            }

            assert_true!(remove_from_list(session, list, 20)?);
            assert_int_equal!(list_size(session, list)?, 2);
            assert_null!(find_in_list(session, list, 20)?);

            assert_false!(remove_from_list(session, list, 40)?);
            assert_int_equal!(list_size(session, list)?, 2);
            destroy_list(session, list)
        })
        .test("remove_head", |session, _| {
            let list = create_list(session)?;
            add_to_list(session, list, 10)?;
            add_to_list(session, list, 20)?;

            assert_true!(remove_from_list(session, list, 10)?);
            let head = list_head(session, list)?;
            assert_int_equal!(node_data(session, head)?, 20);
            assert_int_equal!(list_size(session, list)?, 1);
            destroy_list(session, list)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockery_core::report::MemorySink;
    use mockery_core::{FailureKind, HarnessConfig, TestRunner};

    #[test]
    fn test_linked_list_suite_passes_without_leaks() {
        let mut runner = TestRunner::with_sink(HarnessConfig::default(), MemorySink::new());
        let report = runner.run(&suite()).unwrap();
        assert!(report.success(), "{:?}", report.items);
        assert_eq!(report.tests_executed, 6);
    }

    #[test]
    fn test_forgetting_destroy_reports_every_block() {
        let mut runner = TestRunner::with_sink(HarnessConfig::default(), MemorySink::new());
        let report = runner
            .run_test("no_destroy", |session, _| {
                let list = create_list(session)?;
                add_to_list(session, list, 1)?;
                add_to_list(session, list, 2)?;
                Ok(())
            })
            .unwrap();
        let item = report.item("no_destroy").unwrap();
        assert_eq!(item.failures.len(), 3);
        assert!(item.failures.iter().all(|f| f.kind == FailureKind::MemoryLeak));
    }

    #[test]
    fn test_heap_limit_surfaces_as_failure() {
        let config = HarnessConfig {
            heap_limit: Some(LIST_SIZE + NODE_SIZE),
            ..HarnessConfig::default()
        };
        let mut runner = TestRunner::with_sink(config, MemorySink::new());
        let report = runner
            .run_test("too_big", |session, _| {
                let list = create_list(session)?;
                add_to_list(session, list, 1)?;
                add_to_list(session, list, 2)?;
                destroy_list(session, list)
            })
            .unwrap();
        let failure = &report.item("too_big").unwrap().failures[0];
        assert_eq!(failure.message, "out of tracked memory allocating 12 bytes");
    }
}
