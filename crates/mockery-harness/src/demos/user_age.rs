//! Looking up a user's age through a mocked database query

use mockery_core::{
    assert_int_equal, check_expected, mock, MockSession, TestResult, TestSuite,
};

/// Mocked collaborator: validates the SQL, then hands back `(status, age)`
fn db_query(session: &mut MockSession, sql: &str) -> TestResult<(i32, i64)> {
    check_expected!(session, sql);
    let age = mock!(session as i64);
    let status = mock!(session as i32);
    Ok((status, age))
}

/// Code under test
fn get_user_age(session: &mut MockSession, username: &str) -> TestResult<i64> {
    let sql = format!("SELECT age FROM users WHERE name='{username}'");
    let (status, age) = db_query(session, &sql)?;
    Ok(if status != 0 { -1 } else { age })
}

pub(crate) fn suite() -> TestSuite {
    TestSuite::new("user_age")
        .test("get_user_age_success", |session, _| {
            session.expect_string("db_query", "sql", "SELECT age FROM users WHERE name='Alice'");
            session.will_return("db_query", 30);
            session.will_return("db_query", 0);

            assert_int_equal!(get_user_age(session, "Alice")?, 30);
            Ok(())
        })
        .test("get_user_age_query_error", |session, _| {
            session.expect_any("db_query", "sql");
            session.will_return("db_query", 0);
            session.will_return("db_query", -5);

            assert_int_equal!(get_user_age(session, "Bob")?, -1);
            Ok(())
        })
        .test("get_user_age_repeated_lookups", |session, _| {
            session.expect_check_count(
                "db_query",
                "sql",
                |sql, table| match (sql.as_str(), table.as_str()) {
                    (Some(sql), Some(table)) => sql.contains(table),
                    _ => false,
                },
                "FROM users",
                3u32,
            );
            for age in [21, 34, 55] {
                session.will_return("db_query", age);
                session.will_return("db_query", 0);
            }

            for (name, age) in [("Ann", 21), ("Ben", 34), ("Cy", 55)] {
                assert_int_equal!(get_user_age(session, name)?, age);
            }
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockery_core::report::MemorySink;
    use mockery_core::{HarnessConfig, TestRunner};

    #[test]
    fn test_user_age_suite_passes() {
        let mut runner = TestRunner::with_sink(HarnessConfig::default(), MemorySink::new());
        let report = runner.run(&suite()).unwrap();
        assert!(report.success(), "{:?}", report.failed_tests);
        assert_eq!(report.tests_executed, 3);
    }

    #[test]
    fn test_wrong_user_fails_the_sql_check() {
        let mut runner = TestRunner::with_sink(HarnessConfig::default(), MemorySink::new());
        let report = runner
            .run_test("wrong_user", |session, _| {
                session.expect_string("db_query", "sql", "SELECT age FROM users WHERE name='Alice'");
                session.will_return("db_query", 30);
                session.will_return("db_query", 0);
                get_user_age(session, "Mallory")?;
                Ok(())
            })
            .unwrap();
        assert_eq!(report.failed_tests, ["wrong_user"]);
        assert!(runner.sink().contains("Check of parameter sql, function db_query failed"));
    }
}
