//! Interrupt descriptor table and the Rust side of the common trampoline.
//!
//! All 256 vectors get a gate. Exceptions go to [`crate::exceptions`],
//! PIC vectors to the IRQ dispatcher, and anything else to whatever
//! handler was registered on the vector.

use core::mem::size_of;

use keel_abi::{
    EXCEPTION_VECTOR_COUNT, IDT_ENTRIES, IDT_GATE_INTERRUPT, IDT_GATE_PRESENT, SegmentSelector,
    is_irq_vector,
};
use keel_drivers::irq;
use keel_drivers::vectors::HANDLERS;
use keel_lib::kdiag::dump_interrupt_frame;
use keel_lib::{InterruptFrame, IrqCell, klog_debug, klog_error};

use crate::exceptions;
use crate::gdt::DescriptorTablePointer;
use crate::kernel_panic::{kernel_panic, kernel_panic_fmt};

#[cfg(target_arch = "x86")]
core::arch::global_asm!(include_str!("../idt_handlers.s"));

/// 32-bit gate descriptor.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

const _: () = assert!(size_of::<IdtEntry>() == 8);

impl IdtEntry {
    pub const MISSING: Self = Self::new(0, 0, 0);

    pub const fn new(handler: u32, selector: u16, type_attr: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector,
            zero: 0,
            type_attr,
            offset_high: (handler >> 16) as u16,
        }
    }

    /// Present ring-0 interrupt gate in the kernel code segment.
    pub const fn interrupt_gate(handler: u32) -> Self {
        Self::new(handler, SegmentSelector::KERNEL_CODE.bits(), IDT_GATE_INTERRUPT)
    }

    pub const fn offset(&self) -> u32 {
        ((self.offset_high as u32) << 16) | self.offset_low as u32
    }

    pub const fn selector(&self) -> u16 {
        self.selector
    }

    pub const fn type_attr(&self) -> u8 {
        self.type_attr
    }

    pub const fn is_present(&self) -> bool {
        self.type_attr & IDT_GATE_PRESENT != 0
    }

    pub const fn dpl(&self) -> u8 {
        (self.type_attr >> 5) & 0x3
    }

    pub const fn gate_type(&self) -> u8 {
        self.type_attr & 0x0F
    }
}

static IDT: IrqCell<[IdtEntry; IDT_ENTRIES]> = IrqCell::new([IdtEntry::MISSING; IDT_ENTRIES]);

#[cfg(target_arch = "x86")]
unsafe extern "C" {
    static isr_stub_table: [u32; IDT_ENTRIES];
}

#[cfg(target_arch = "x86")]
fn stub_address(vector: usize) -> u32 {
    // SAFETY: the table is immutable data emitted by idt_handlers.s.
    unsafe { isr_stub_table[vector] }
}

#[cfg(not(target_arch = "x86"))]
fn stub_address(_vector: usize) -> u32 {
    0
}

#[cfg(target_arch = "x86")]
unsafe fn load_idt(pointer: &DescriptorTablePointer) {
    // SAFETY: the caller hands over a fully populated static table.
    unsafe {
        core::arch::asm!("lidt [{}]", in(reg) pointer, options(readonly, nostack, preserves_flags));
    }
}

#[cfg(not(target_arch = "x86"))]
unsafe fn load_idt(_pointer: &DescriptorTablePointer) {}

pub fn idt_set_gate(vector: u8, handler: u32, selector: u16, type_attr: u8) {
    IDT.with(|idt| idt[vector as usize] = IdtEntry::new(handler, selector, type_attr));
}

pub fn idt_get_gate(vector: u8) -> IdtEntry {
    IDT.with(|idt| idt[vector as usize])
}

/// Make every gate in `idt` an interrupt gate to `stub(vector)`.
pub fn populate_gates(idt: &mut [IdtEntry], stub: impl Fn(usize) -> u32) {
    for (vector, gate) in idt.iter_mut().enumerate() {
        *gate = IdtEntry::interrupt_gate(stub(vector));
    }
}

/// Point every vector at its stub, load the table, then remap the PICs.
pub fn idt_init() {
    let pointer = IDT.with(|idt| {
        populate_gates(idt, stub_address);
        DescriptorTablePointer {
            limit: (size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
            base: idt.as_ptr() as usize as u32,
        }
    });
    // SAFETY: `IDT` is static and every gate now targets a stub.
    unsafe { load_idt(&pointer) };
    klog_debug!("IDT: {} gates loaded", IDT_ENTRIES);

    irq::irq_init();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorClass {
    Exception,
    Irq,
    Other,
}

pub const fn classify_vector(vector: u32) -> VectorClass {
    if vector < EXCEPTION_VECTOR_COUNT as u32 {
        VectorClass::Exception
    } else if is_irq_vector(vector) {
        VectorClass::Irq
    } else {
        VectorClass::Other
    }
}

fn unknown_vector(frame: &mut InterruptFrame) {
    if HANDLERS.invoke(frame) {
        return;
    }
    klog_error!("interrupt: no handler for vector {}", frame.vector);
    dump_interrupt_frame(frame);
    kernel_panic_fmt(format_args!("unexpected interrupt vector {}", frame.vector));
}

/// Called by `isr_common` with the frame it built on the stack.
#[unsafe(no_mangle)]
pub extern "C" fn interrupt_dispatch(frame: *mut InterruptFrame) {
    // SAFETY: the trampoline passes a pointer to the live frame, which
    // nothing else references until we return.
    let Some(frame) = (unsafe { frame.as_mut() }) else {
        kernel_panic("interrupt dispatch without a frame");
    };
    match classify_vector(frame.vector) {
        VectorClass::Exception => exceptions::exception_dispatch(frame),
        VectorClass::Irq => irq::irq_dispatch(frame),
        VectorClass::Other => unknown_vector(frame),
    }
}

#[cfg(test)]
mod tests {
    use core::ffi::c_void;
    use core::sync::atomic::{AtomicU32, Ordering};

    use keel_abi::{IDT_TYPE_INTERRUPT_32, IRQ_BASE_VECTOR};
    use keel_drivers::vectors::{NO_CONTEXT, register_handler, unregister_handler};

    use super::*;

    #[test]
    fn gate_encoding_splits_offset() {
        let gate = IdtEntry::interrupt_gate(0x0010_2345);
        assert_eq!(gate.offset(), 0x0010_2345);
        assert_eq!(gate.selector(), 0x08);
        assert_eq!(gate.type_attr(), 0x8E);
        assert!(gate.is_present());
        assert_eq!(gate.dpl(), 0);
        assert_eq!(gate.gate_type(), IDT_TYPE_INTERRUPT_32);
        assert!(!IdtEntry::MISSING.is_present());
    }

    #[test]
    fn every_gate_targets_its_stub() {
        let mut idt = [IdtEntry::MISSING; IDT_ENTRIES];
        populate_gates(&mut idt, |vector| 0x0010_0000 + vector as u32 * 16);
        for (vector, gate) in idt.iter().enumerate() {
            assert!(gate.is_present(), "vector {vector}");
            assert_eq!(gate.offset(), 0x0010_0000 + vector as u32 * 16);
            assert_eq!(gate.selector(), 0x08);
            assert_eq!(gate.dpl(), 0);
            assert_eq!(gate.gate_type(), 0xE);
        }
    }

    #[test]
    fn set_gate_overrides_one_vector() {
        idt_set_gate(0xA0, 0xDEAD_BEEF, 0x08, IDT_GATE_INTERRUPT);
        let gate = idt_get_gate(0xA0);
        assert_eq!(gate.offset(), 0xDEAD_BEEF);
        assert_eq!(gate.type_attr(), 0x8E);
    }

    #[test]
    fn vectors_are_classified_by_range() {
        assert_eq!(classify_vector(0), VectorClass::Exception);
        assert_eq!(classify_vector(31), VectorClass::Exception);
        assert_eq!(classify_vector(IRQ_BASE_VECTOR as u32), VectorClass::Irq);
        assert_eq!(classify_vector(47), VectorClass::Irq);
        assert_eq!(classify_vector(48), VectorClass::Other);
        assert_eq!(classify_vector(0x80), VectorClass::Other);
    }

    static SOFT_HITS: AtomicU32 = AtomicU32::new(0);

    fn count_soft(frame: &mut InterruptFrame, _ctx: *mut c_void) {
        SOFT_HITS.fetch_add(frame.vector, Ordering::SeqCst);
    }

    #[test]
    fn software_vector_reaches_registered_handler() {
        register_handler(0x90, count_soft, NO_CONTEXT, "soft");
        let mut frame = InterruptFrame::synthetic(0x90, 0);
        interrupt_dispatch(&mut frame);
        assert_eq!(SOFT_HITS.load(Ordering::SeqCst), 0x90);
        unregister_handler(0x90);
    }
}
