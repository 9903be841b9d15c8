//! CPU exception dispatch (vectors 0..32).
//!
//! A handler registered on the vector wins. Without one the exception is
//! reported on serial and screen and the machine halts; nothing is retried.

use core::fmt;

use keel_abi::{EXCEPTION_PAGE_FAULT, PageFaultErrorCode, exception_has_error_code, exception_name};
use keel_drivers::vectors::HANDLERS;
use keel_lib::kdiag::dump_interrupt_frame;
use keel_lib::{InterruptFrame, cpu, klog_error};

use crate::kernel_panic::kernel_panic_fmt;

/// One-line description of an unhandled exception.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultSummary {
    pub vector: u32,
    pub error_code: u32,
    /// Faulting linear address, for page faults.
    pub fault_address: Option<u32>,
}

impl FaultSummary {
    pub fn new(frame: &InterruptFrame, fault_address: Option<u32>) -> Self {
        Self {
            vector: frame.vector,
            error_code: frame.error_code,
            fault_address,
        }
    }

    pub fn name(&self) -> &'static str {
        exception_name(self.vector)
    }

    fn has_error_code(&self) -> bool {
        u8::try_from(self.vector).is_ok_and(exception_has_error_code)
    }
}

impl fmt::Display for FaultSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(addr) = self.fault_address {
            let code = PageFaultErrorCode::from_bits_truncate(self.error_code);
            return write!(
                f,
                "{} at 0x{:08x} ({}, {}, {})",
                self.name(),
                addr,
                code.cause_str(),
                code.access_str(),
                code.mode_str()
            );
        }
        if self.has_error_code() {
            write!(f, "{} (vector {}, error 0x{:x})", self.name(), self.vector, self.error_code)
        } else {
            write!(f, "{} (vector {})", self.name(), self.vector)
        }
    }
}

fn report_page_fault(addr: u32, error_code: u32) {
    let code = PageFaultErrorCode::from_bits_truncate(error_code);
    klog_error!(
        "  fault address 0x{:08x}: {}, {} access, {} mode",
        addr,
        code.cause_str(),
        code.access_str(),
        code.mode_str()
    );
    if code.contains(PageFaultErrorCode::RESERVED_BIT) {
        klog_error!("  reserved bit set in a paging entry");
    }
    if code.contains(PageFaultErrorCode::INSTRUCTION_FETCH) {
        klog_error!("  caused by an instruction fetch");
    }
}

fn report_unhandled(frame: &InterruptFrame, summary: &FaultSummary) {
    klog_error!(
        "EXCEPTION: vector {} ({}) error=0x{:x}",
        summary.vector,
        summary.name(),
        summary.error_code
    );
    if let Some(addr) = summary.fault_address {
        report_page_fault(addr, summary.error_code);
    }
    dump_interrupt_frame(frame);
}

pub fn exception_dispatch(frame: &mut InterruptFrame) {
    if HANDLERS.invoke(frame) {
        return;
    }
    let cr2 = (frame.vector == EXCEPTION_PAGE_FAULT as u32).then(cpu::read_cr2);
    let summary = FaultSummary::new(frame, cr2);
    report_unhandled(frame, &summary);
    kernel_panic_fmt(format_args!("{}", summary))
}
