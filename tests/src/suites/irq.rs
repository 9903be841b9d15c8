use keel_abi::{IrqError, PIT_IRQ_LINE};
use keel_drivers::irq::{irq_get_stats, irq_install_handler};
use keel_drivers::pit;
use keel_drivers::vectors::{HANDLERS, NO_CONTEXT};
use keel_lib::testing::TestResult;
use keel_lib::{InterruptFrame, define_test_suite, ensure, fail, pass};

fn test_timer_line_counts_deliveries() -> TestResult {
    let Some(before) = irq_get_stats(PIT_IRQ_LINE) else {
        return fail!("no stats for IRQ0");
    };
    pit::sleep_interrupt(10);
    let Some(after) = irq_get_stats(PIT_IRQ_LINE) else {
        return fail!("no stats for IRQ0");
    };
    ensure!(
        after.count.wrapping_sub(before.count) >= 10,
        "{} deliveries in 10 ms",
        after.count.wrapping_sub(before.count)
    );
    ensure!(HANDLERS.hits(keel_abi::irq_vector(PIT_IRQ_LINE)) > 0);
    pass!()
}

fn ignore(_frame: &mut InterruptFrame, _ctx: *mut core::ffi::c_void) {}

fn test_out_of_range_line_is_rejected() -> TestResult {
    ensure!(irq_install_handler(16, ignore, NO_CONTEXT, "bogus") == Err(IrqError::InvalidLine));
    ensure!(irq_get_stats(16).is_none());
    pass!()
}

define_test_suite!(irq, [
    test_timer_line_counts_deliveries,
    test_out_of_range_line_is_rejected,
]);
