//! Exceptions recovered by registered handlers.
//!
//! Each probe registers a handler that records what it saw and moves the
//! saved EIP past the faulting instruction, so execution resumes in the
//! test body.

use core::ffi::c_void;
use core::sync::atomic::{AtomicU32, Ordering};

use keel_abi::{EXCEPTION_DIVIDE_ERROR, EXCEPTION_PAGE_FAULT, PageFaultErrorCode};
use keel_drivers::vectors::{register_exception_handler, unregister_handler};
use keel_lib::testing::TestResult;
use keel_lib::{InterruptFrame, cpu, define_test_suite, ensure, fail, pass};

/// Shared between a test body and its handler through the context pointer.
struct TrapProbe {
    hits: AtomicU32,
    error_code: AtomicU32,
    cr2: AtomicU32,
    /// Bytes to advance EIP by; zero for traps, which already point past
    /// the instruction.
    skip: u32,
}

impl TrapProbe {
    const fn new(skip: u32) -> Self {
        Self {
            hits: AtomicU32::new(0),
            error_code: AtomicU32::new(0),
            cr2: AtomicU32::new(0),
            skip,
        }
    }

    fn context(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }
}

fn record_and_skip(frame: &mut InterruptFrame, context: *mut c_void) {
    // SAFETY: every registration below passes a `TrapProbe` that outlives it.
    let probe = unsafe { &*(context as *const TrapProbe) };
    probe.hits.fetch_add(1, Ordering::SeqCst);
    probe.error_code.store(frame.error_code, Ordering::SeqCst);
    if frame.vector == EXCEPTION_PAGE_FAULT as u32 {
        probe.cr2.store(cpu::read_cr2(), Ordering::SeqCst);
    }
    frame.eip = frame.eip.wrapping_add(probe.skip);
}

/// `div ecx` with ECX = 0; F7 F1 is two bytes.
#[cfg(target_arch = "x86")]
fn divide_by_zero() {
    // SAFETY: the registered handler skips the faulting instruction.
    unsafe {
        core::arch::asm!(
            "xor edx, edx",
            "div ecx",
            inout("eax") 1u32 => _,
            in("ecx") 0u32,
            out("edx") _,
        );
    }
}

#[cfg(target_arch = "x86")]
fn software_int0() {
    // SAFETY: vector 0 has a handler for the duration of the call.
    unsafe { core::arch::asm!("int 0") };
}

/// `mov eax, [eax]` with EAX = 0x00900000; 8B 00 is two bytes.
#[cfg(target_arch = "x86")]
fn load_from_unmapped() {
    // SAFETY: the registered handler skips the faulting instruction.
    unsafe {
        core::arch::asm!("mov eax, [eax]", inout("eax") 0x0090_0000u32 => _);
    }
}

#[cfg(not(target_arch = "x86"))]
fn divide_by_zero() {}
#[cfg(not(target_arch = "x86"))]
fn software_int0() {}
#[cfg(not(target_arch = "x86"))]
fn load_from_unmapped() {}

fn with_handler(vector: u8, probe: &TrapProbe, body: fn()) -> TestResult {
    if register_exception_handler(vector, record_and_skip, probe.context(), "probe").is_err() {
        return fail!("could not register vector {}", vector);
    }
    body();
    unregister_handler(vector);
    pass!()
}

fn test_divide_error_is_recovered() -> TestResult {
    let probe = TrapProbe::new(2);
    if !with_handler(EXCEPTION_DIVIDE_ERROR, &probe, divide_by_zero).is_pass() {
        return fail!();
    }
    ensure!(probe.hits.load(Ordering::SeqCst) == 1, "handler ran {} times", probe.hits.load(Ordering::SeqCst));
    pass!()
}

fn test_int0_reaches_divide_handler() -> TestResult {
    let probe = TrapProbe::new(0);
    if !with_handler(EXCEPTION_DIVIDE_ERROR, &probe, software_int0).is_pass() {
        return fail!();
    }
    ensure!(probe.hits.load(Ordering::SeqCst) == 1);
    ensure!(probe.error_code.load(Ordering::SeqCst) == 0);
    pass!()
}

fn test_unmapped_load_page_faults() -> TestResult {
    let probe = TrapProbe::new(2);
    if !with_handler(EXCEPTION_PAGE_FAULT, &probe, load_from_unmapped).is_pass() {
        return fail!();
    }
    let code = PageFaultErrorCode::from_bits_truncate(probe.error_code.load(Ordering::SeqCst));
    ensure!(probe.hits.load(Ordering::SeqCst) == 1);
    ensure!(
        probe.cr2.load(Ordering::SeqCst) == 0x0090_0000,
        "CR2=0x{:x}",
        probe.cr2.load(Ordering::SeqCst)
    );
    ensure!(!code.contains(PageFaultErrorCode::PROTECTION), "error code {:?}", code);
    ensure!(!code.contains(PageFaultErrorCode::WRITE));
    pass!()
}

define_test_suite!(exceptions, [
    test_divide_error_is_recovered,
    test_int0_reaches_divide_handler,
    test_unmapped_load_page_faults,
]);
