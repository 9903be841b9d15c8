//! Suite descriptors and result aggregation for the in-kernel harness.

use crate::klog_info;

/// Maximum number of suites a summary keeps per-suite results for.
pub const HARNESS_MAX_SUITES: usize = 16;

/// Millisecond clock used to time suites.
pub type HarnessClock = fn() -> u32;

#[derive(Clone, Copy, Debug)]
pub struct TestSuiteResult {
    pub name: &'static str,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub elapsed_ms: u32,
}

impl TestSuiteResult {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            total: 0,
            passed: 0,
            failed: 0,
            elapsed_ms: 0,
        }
    }

    pub fn record(&mut self, outcome: super::TestResult) {
        self.total += 1;
        if outcome.is_pass() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Static descriptor for a test suite, created by `define_test_suite!`.
#[derive(Clone, Copy)]
pub struct TestSuiteDesc {
    pub name: &'static str,
    pub run: fn() -> TestSuiteResult,
}

/// Aggregated results from running all test suites.
#[derive(Clone, Copy, Debug)]
pub struct TestRunSummary {
    pub suites: [Option<TestSuiteResult>; HARNESS_MAX_SUITES],
    pub suite_count: usize,
    pub total_tests: u32,
    pub passed: u32,
    pub failed: u32,
    pub elapsed_ms: u32,
}

impl Default for TestRunSummary {
    fn default() -> Self {
        Self {
            suites: [None; HARNESS_MAX_SUITES],
            suite_count: 0,
            total_tests: 0,
            passed: 0,
            failed: 0,
            elapsed_ms: 0,
        }
    }
}

impl TestRunSummary {
    pub fn add_suite_result(&mut self, result: &TestSuiteResult) {
        if self.suite_count < HARNESS_MAX_SUITES {
            self.suites[self.suite_count] = Some(*result);
        }
        self.suite_count += 1;
        self.total_tests = self.total_tests.saturating_add(result.total);
        self.passed = self.passed.saturating_add(result.passed);
        self.failed = self.failed.saturating_add(result.failed);
        self.elapsed_ms = self.elapsed_ms.saturating_add(result.elapsed_ms);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Run every suite in order and log a summary.
pub fn run_suites(suites: &[&TestSuiteDesc], clock: HarnessClock) -> TestRunSummary {
    let mut summary = TestRunSummary::default();
    for desc in suites {
        klog_info!("SUITE {}", desc.name);
        let start = clock();
        let mut result = (desc.run)();
        result.elapsed_ms = clock().wrapping_sub(start);
        klog_info!(
            "SUITE {}: {}/{} passed ({} ms)",
            result.name, result.passed, result.total, result.elapsed_ms
        );
        summary.add_suite_result(&result);
    }
    klog_info!(
        "TESTS: {} suites, {} passed, {} failed",
        summary.suite_count, summary.passed, summary.failed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::super::TestResult;
    use super::*;

    fn always_pass() -> TestResult {
        TestResult::Pass
    }

    fn always_fail() -> TestResult {
        TestResult::Fail
    }

    crate::define_test_suite!(sample, [always_pass, always_fail]);

    fn zero_clock() -> u32 {
        0
    }

    #[test]
    fn suite_macro_counts_outcomes() {
        let summary = run_suites(&[&SAMPLE_SUITE_DESC], zero_clock);
        assert_eq!(summary.suite_count, 1);
        assert_eq!(summary.total_tests, 2);
        assert_eq!(summary.passed, 1);
        assert!(!summary.all_passed());
        assert_eq!(SAMPLE_SUITE_DESC.name, "sample");
    }
}
