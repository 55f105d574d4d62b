//! Floating point calculator with an error code for division by zero

use mockery_core::{
    assert_float_equal, assert_int_equal, assert_true, MockSession, TestResult, TestSuite,
};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
enum CalcError {
    Success = 0,
    DivideByZero = -1,
}

#[derive(Debug)]
struct Calculator {
    result: f64,
    error: CalcError,
}

impl Calculator {
    fn new() -> Self {
        Self {
            result: 0.0,
            error: CalcError::Success,
        }
    }

    fn add(&mut self, value: f64) {
        self.result += value;
    }

    fn subtract(&mut self, value: f64) {
        self.result -= value;
    }

    fn multiply(&mut self, value: f64) {
        self.result *= value;
    }

    fn divide(&mut self, value: f64) -> CalcError {
        if value.abs() < EPSILON {
            self.error = CalcError::DivideByZero;
            return self.error;
        }
        self.result /= value;
        CalcError::Success
    }

    /// Square root; a negative input is a caller bug reported through `mock_assert`
    fn sqrt(&mut self, session: &mut MockSession) -> TestResult<f64> {
        session.mock_assert(self.result >= 0.0, "self.result >= 0.0")?;
        self.result = self.result.sqrt();
        Ok(self.result)
    }
}

pub(crate) fn suite() -> TestSuite {
    TestSuite::new("calculator")
        .test("initial_value", |_, _| {
            let calc = Calculator::new();
            assert_float_equal!(calc.result, 0.0, EPSILON);
            assert_int_equal!(calc.error as i32, CalcError::Success as i32);
            Ok(())
        })
        .test("add", |_, _| {
            let mut calc = Calculator::new();
            calc.add(5.0);
            assert_float_equal!(calc.result, 5.0, EPSILON);
            Ok(())
        })
        .test("subtract", |_, _| {
            let mut calc = Calculator::new();
            calc.subtract(3.0);
            assert_float_equal!(calc.result, -3.0, EPSILON);
            Ok(())
        })
        .test("multiply", |_, _| {
            let mut calc = Calculator::new();
            calc.add(2.0);
            calc.multiply(4.0);
            assert_float_equal!(calc.result, 8.0, EPSILON);
            Ok(())
        })
        .test("divide", |_, _| {
            let mut calc = Calculator::new();
            calc.add(10.0);
            assert_int_equal!(calc.divide(2.0) as i32, CalcError::Success as i32);
            assert_float_equal!(calc.result, 5.0, EPSILON);
            Ok(())
        })
        .test("divide_by_zero", |_, _| {
            let mut calc = Calculator::new();
            calc.add(5.0);
            assert_int_equal!(calc.divide(0.0) as i32, CalcError::DivideByZero as i32);
            assert_true!(calc.error == CalcError::DivideByZero);
            Ok(())
        })
        .test("sqrt_of_negative_asserts", |session, _| {
            let mut calc = Calculator::new();
            calc.subtract(4.0);
            session.expect_assert_failure("calc.sqrt()", |s| calc.sqrt(s))?;

            calc.multiply(-4.0);
            assert_float_equal!(calc.sqrt(session)?, 4.0, EPSILON);
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockery_core::report::MemorySink;
    use mockery_core::{HarnessConfig, TestRunner};

    #[test]
    fn test_calculator_suite_passes() {
        let mut runner = TestRunner::with_sink(HarnessConfig::default(), MemorySink::new());
        let report = runner.run(&suite()).unwrap();
        assert!(report.success(), "{:?}", report.failed_tests);
        assert_eq!(report.tests_executed, 7);
    }

    #[test]
    fn test_unexpected_assert_fails_the_test() {
        let mut session = MockSession::default();
        let mut calc = Calculator::new();
        calc.subtract(1.0);
        let failure = calc.sqrt(&mut session).unwrap_err();
        assert_eq!(
            failure.failure().map(|f| f.message.as_str()),
            Some("ASSERT: self.result >= 0.0")
        );
    }
}
