use keel_abi::PIT_DEFAULT_FREQUENCY_HZ;
use keel_drivers::pit;
use keel_lib::testing::TestResult;
use keel_lib::{cpu, define_test_suite, ensure, pass};

fn test_pit_runs_at_one_kilohertz() -> TestResult {
    ensure!(
        pit::pit_frequency() == PIT_DEFAULT_FREQUENCY_HZ,
        "frequency {} Hz",
        pit::pit_frequency()
    );
    pass!()
}

fn test_sleep_100ms_takes_100_to_103_ticks() -> TestResult {
    ensure!(cpu::interrupts_enabled(), "interrupts are off");
    let t0 = pit::ticks_now();
    pit::sleep_interrupt(100);
    let elapsed = pit::ticks_now().wrapping_sub(t0);
    ensure!((100..=103).contains(&elapsed), "slept {} ticks", elapsed);
    pass!()
}

fn test_zero_sleep_returns_immediately() -> TestResult {
    let t0 = pit::ticks_now();
    pit::sleep_interrupt(0);
    ensure!(pit::ticks_now().wrapping_sub(t0) <= 1);
    pass!()
}

fn test_ticks_never_go_backwards() -> TestResult {
    let mut last = pit::ticks_now();
    for _ in 0..1000 {
        let now = pit::ticks_now();
        ensure!(now.wrapping_sub(last) < u32::MAX / 2, "{} after {}", now, last);
        last = now;
    }
    pass!()
}

fn test_busy_sleep_with_interrupts_enabled() -> TestResult {
    ensure!(cpu::interrupts_enabled(), "interrupts are off");
    let t0 = pit::ticks_now();
    pit::sleep_busy(20);
    let elapsed = pit::ticks_now().wrapping_sub(t0);
    ensure!(elapsed >= 20, "busy sleep of 20 ms took {} ticks", elapsed);
    pass!()
}

/// TSC cycles per millisecond, measured against the tick.
fn tsc_per_ms() -> u64 {
    let start = cpu::read_tsc();
    pit::sleep_interrupt(20);
    (cpu::read_tsc() - start) / 20
}

fn test_busy_sleep_with_interrupts_masked() -> TestResult {
    let per_ms = tsc_per_ms();
    ensure!(per_ms > 0, "TSC is not running");

    let flags = cpu::save_flags_cli();
    let t0 = pit::ticks_now();
    let start = cpu::read_tsc();
    pit::sleep_busy(20);
    let cycles = cpu::read_tsc() - start;
    let frozen = pit::ticks_now() == t0;
    cpu::restore_flags(flags);

    ensure!(frozen, "tick advanced with interrupts masked");
    // Allow for calibration jitter.
    let elapsed_ms = cycles / per_ms;
    ensure!(elapsed_ms >= 18, "masked busy sleep of 20 ms took ~{} ms", elapsed_ms);
    ensure!(cpu::interrupts_enabled());
    pass!()
}

define_test_suite!(timer, [
    test_pit_runs_at_one_kilohertz,
    test_sleep_100ms_takes_100_to_103_ticks,
    test_zero_sleep_returns_immediately,
    test_ticks_never_go_backwards,
    test_busy_sleep_with_interrupts_enabled,
    test_busy_sleep_with_interrupts_masked,
]);
