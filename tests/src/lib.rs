//! In-kernel end-to-end suites, run on the booted machine by the
//! `builtin-tests` kernel build.

#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]

use keel_abi::Port;
use keel_drivers::{pit, println};
use keel_lib::io::{HardwarePorts, PortIo};
use keel_lib::testing::{TestRunSummary, TestSuiteDesc, run_suites};
use keel_lib::{cpu, klog_info};

mod suites;

pub static SYSTEM_SUITES: [&TestSuiteDesc; 7] = [
    &suites::descriptors::DESCRIPTORS_SUITE_DESC,
    &suites::timer::TIMER_SUITE_DESC,
    &suites::keyboard::KEYBOARD_SUITE_DESC,
    &suites::heap::HEAP_SUITE_DESC,
    &suites::paging::PAGING_SUITE_DESC,
    &suites::exceptions::EXCEPTIONS_SUITE_DESC,
    &suites::irq::IRQ_SUITE_DESC,
];

/// QEMU `isa-debug-exit` codes; QEMU exits with `(code << 1) | 1`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

fn harness_clock() -> u32 {
    pit::uptime_ms() as u32
}

/// Run every system suite and show the totals on screen.
pub fn tests_run_all() -> TestRunSummary {
    klog_info!("TESTS: starting {} suites", SYSTEM_SUITES.len());
    let summary = run_suites(&SYSTEM_SUITES, harness_clock);
    println!(
        "tests: {} passed, {} failed, {} ms",
        summary.passed, summary.failed, summary.elapsed_ms
    );
    summary
}

/// Report `summary` to the emulator and stop. Halts if no debug-exit
/// device is present.
pub fn tests_request_shutdown(summary: &TestRunSummary) -> ! {
    let code = if summary.all_passed() {
        QemuExitCode::Success
    } else {
        QemuExitCode::Failed
    };
    klog_info!("TESTS: exiting with {:?}", code);
    // SAFETY: port 0xF4 is only claimed by the emulator's exit device.
    let mut io = unsafe { HardwarePorts::new() };
    io.outb(Port::QEMU_DEBUG_EXIT, code as u8);
    cpu::halt_loop()
}
