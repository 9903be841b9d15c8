//! In-kernel test harness.
//!
//! Suites are declared with [`define_test_suite!`](crate::define_test_suite)
//! and run on the booted kernel by the `builtin-tests` build. Host-side unit
//! tests use the ordinary `#[test]` machinery instead.

pub mod harness;

pub use harness::{HarnessClock, TestRunSummary, TestSuiteDesc, TestSuiteResult, run_suites};

/// Result of a single test execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    /// Preconditions not met (e.g. hardware missing); counted as passing.
    Skipped,
}

impl TestResult {
    #[inline]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass | Self::Skipped)
    }
}

impl From<bool> for TestResult {
    fn from(ok: bool) -> Self {
        if ok { Self::Pass } else { Self::Fail }
    }
}

/// Run one test function, logging its outcome.
pub fn run_single_test(name: &str, test: impl FnOnce() -> TestResult) -> TestResult {
    crate::klog_debug!("TEST {} ...", name);
    let result = test();
    match result {
        TestResult::Pass => crate::klog_debug!("TEST {} ok", name),
        TestResult::Skipped => crate::klog_info!("TEST {} skipped", name),
        TestResult::Fail => crate::klog_error!("TEST {} FAILED", name),
    }
    result
}

/// Return a passing test result.
#[macro_export]
macro_rules! pass {
    () => {
        $crate::testing::TestResult::Pass
    };
}

/// Return a failing test result with optional message.
///
/// ```ignore
/// if ticks < 100 {
///     return fail!("slept only {} ticks", ticks);
/// }
/// ```
#[macro_export]
macro_rules! fail {
    () => {
        $crate::testing::TestResult::Fail
    };
    ($msg:expr) => {{
        $crate::klog_info!("TEST FAIL: {}", $msg);
        $crate::testing::TestResult::Fail
    }};
    ($fmt:expr, $($arg:tt)*) => {{
        $crate::klog_info!(concat!("TEST FAIL: ", $fmt), $($arg)*);
        $crate::testing::TestResult::Fail
    }};
}

/// Fail the enclosing test unless `cond` holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr) => {
        if !$cond {
            return $crate::fail!(concat!("ensure failed: ", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return $crate::fail!($($arg)*);
        }
    };
}

/// Define a test suite for the kernel test harness.
///
/// Generates a runner function and a static `TestSuiteDesc` named
/// `<NAME>_SUITE_DESC`:
///
/// ```ignore
/// define_test_suite!(heap, [
///     test_heap_reuse,
///     test_pmalloc_exhaustion,
/// ]);
/// ```
#[macro_export]
macro_rules! define_test_suite {
    ($suite_name:ident, [$($test_fn:path),* $(,)?]) => {
        $crate::paste::paste! {
            fn [<run_ $suite_name _suite>]() -> $crate::testing::TestSuiteResult {
                let mut result = $crate::testing::TestSuiteResult::new(stringify!($suite_name));
                $(
                    let outcome = $crate::testing::run_single_test(stringify!($test_fn), $test_fn);
                    result.record(outcome);
                )*
                result
            }

            pub static [<$suite_name:upper _SUITE_DESC>]: $crate::testing::TestSuiteDesc =
                $crate::testing::TestSuiteDesc {
                    name: stringify!($suite_name),
                    run: [<run_ $suite_name _suite>],
                };
        }
    };
}
