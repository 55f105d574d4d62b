//! Deliberately failing items interleaved with passing ones
//!
//! Every failure category the runner reports shows up here once; the passing
//! string-length items between them show that the run keeps going.

use mockery_core::{
    assert_float_equal, assert_int_equal, assert_non_null, assert_null, assert_true, MockSession,
    TestSuite,
};

fn my_strlen(s: &str) -> usize {
    s.bytes().take_while(|&b| b != 0).count()
}

fn allocate_array(session: &mut MockSession, len: usize) -> Option<mockery_core::Address> {
    if len == 0 {
        return None;
    }
    session.test_malloc(len * std::mem::size_of::<i32>())
}

pub(crate) fn suite() -> TestSuite {
    TestSuite::new("forward_progress")
        .test("float_comparison_too_strict", |_, _| {
            let result = 2.0_f64.sqrt();
            assert_float_equal!(1.4142, result, 1e-4);
            assert_float_equal!(1.4142, result, 1e-5);
            Ok(())
        })
        .test("strlen_empty", |_, _| {
            assert_int_equal!(my_strlen(""), 0);
            Ok(())
        })
        .test("use_after_free", |session, _| {
            let array = allocate_array(session, 5);
            assert_non_null!(array);
            if let Some(array) = array {
                session.test_free(array);
                assert_true!(session.block(array).is_some());
            }
            Ok(())
        })
        .test("strlen_single_char", |_, _| {
            assert_int_equal!(my_strlen("a"), 1);
            Ok(())
        })
        .test("forgets_to_free", |session, _| {
            assert_null!(allocate_array(session, 0));
            assert_non_null!(allocate_array(session, 10));
            Ok(())
        })
        .test("strlen_multi_char", |_, _| {
            assert_int_equal!(my_strlen("hello"), 5);
            Ok(())
        })
        .test("double_free", |session, _| {
            if let Some(array) = allocate_array(session, 2) {
                session.test_free(array);
                session.test_free(array);
            }
            Ok(())
        })
        .test("unconsumed_return_value", |session, _| {
            session.will_return("read_config", "verbose=1");
            Ok(())
        })
        .test("strlen_with_space", |_, _| {
            assert_int_equal!(my_strlen("hello world"), 11);
            Ok(())
        })
}
