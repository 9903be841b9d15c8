//! Interrupt vector map and IDT gate encoding.
//!
//! Vectors 0-31 are reserved for CPU exceptions, the two 8259A PICs are
//! remapped onto 32-47, and everything above is free for software use.

// =============================================================================
// Gate attributes
// =============================================================================

/// Number of IDT gates.
pub const IDT_ENTRIES: usize = 256;

/// Present bit of the gate type/attribute byte.
pub const IDT_GATE_PRESENT: u8 = 0x80;

/// 32-bit interrupt gate type (IF cleared on entry).
pub const IDT_TYPE_INTERRUPT_32: u8 = 0x0E;

/// Present, DPL 0, 32-bit interrupt gate.
pub const IDT_GATE_INTERRUPT: u8 = IDT_GATE_PRESENT | IDT_TYPE_INTERRUPT_32;

// =============================================================================
// Vector map
// =============================================================================

pub const EXCEPTION_DIVIDE_ERROR: u8 = 0;
pub const EXCEPTION_DEBUG: u8 = 1;
pub const EXCEPTION_NMI: u8 = 2;
pub const EXCEPTION_BREAKPOINT: u8 = 3;
pub const EXCEPTION_OVERFLOW: u8 = 4;
pub const EXCEPTION_BOUND_RANGE: u8 = 5;
pub const EXCEPTION_INVALID_OPCODE: u8 = 6;
pub const EXCEPTION_DEVICE_NOT_AVAIL: u8 = 7;
pub const EXCEPTION_DOUBLE_FAULT: u8 = 8;
pub const EXCEPTION_INVALID_TSS: u8 = 10;
pub const EXCEPTION_SEGMENT_NOT_PRES: u8 = 11;
pub const EXCEPTION_STACK_FAULT: u8 = 12;
pub const EXCEPTION_GENERAL_PROTECTION: u8 = 13;
pub const EXCEPTION_PAGE_FAULT: u8 = 14;
pub const EXCEPTION_FPU_ERROR: u8 = 16;
pub const EXCEPTION_ALIGNMENT_CHECK: u8 = 17;
pub const EXCEPTION_MACHINE_CHECK: u8 = 18;
pub const EXCEPTION_SIMD_FP_EXCEPTION: u8 = 19;
pub const EXCEPTION_CONTROL_PROTECTION: u8 = 21;
pub const EXCEPTION_VMM_COMMUNICATION: u8 = 29;
pub const EXCEPTION_SECURITY: u8 = 30;

/// Number of vectors reserved for CPU exceptions.
pub const EXCEPTION_VECTOR_COUNT: u8 = 32;

/// Base vector for hardware IRQs (IRQ0 maps to this vector).
pub const IRQ_BASE_VECTOR: u8 = 32;

/// Base vector of the slave PIC (IRQ8).
pub const IRQ_SLAVE_BASE_VECTOR: u8 = IRQ_BASE_VECTOR + 8;

/// Number of legacy IRQ lines behind the cascaded PICs.
pub const IRQ_LINES: usize = 16;

/// One past the last IRQ vector.
pub const IRQ_VECTOR_END: u8 = IRQ_BASE_VECTOR + IRQ_LINES as u8;

/// Vector that legacy IRQ `line` is delivered on after remapping.
#[inline]
pub const fn irq_vector(line: u8) -> u8 {
    IRQ_BASE_VECTOR + line
}

/// Whether `vector` is one of the remapped PIC vectors.
#[inline]
pub const fn is_irq_vector(vector: u32) -> bool {
    vector >= IRQ_BASE_VECTOR as u32 && vector < IRQ_VECTOR_END as u32
}

/// Whether the CPU pushes an error code when delivering `vector`.
pub const fn exception_has_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10..=14 | 17 | 21 | 29 | 30)
}

/// Human-readable name of a CPU exception vector.
pub fn exception_name(vector: u32) -> &'static str {
    match vector {
        0 => "Divide Error",
        1 => "Debug",
        2 => "Non-Maskable Interrupt",
        3 => "Breakpoint",
        4 => "Overflow",
        5 => "Bound Range Exceeded",
        6 => "Invalid Opcode",
        7 => "Device Not Available",
        8 => "Double Fault",
        9 => "Coprocessor Segment Overrun",
        10 => "Invalid TSS",
        11 => "Segment Not Present",
        12 => "Stack-Segment Fault",
        13 => "General Protection Fault",
        14 => "Page Fault",
        16 => "x87 Floating-Point Exception",
        17 => "Alignment Check",
        18 => "Machine Check",
        19 => "SIMD Floating-Point Exception",
        20 => "Virtualization Exception",
        21 => "Control Protection Exception",
        28 => "Hypervisor Injection Exception",
        29 => "VMM Communication Exception",
        30 => "Security Exception",
        15 | 22..=27 | 31 => "Reserved",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_attribute_is_0x8e() {
        assert_eq!(IDT_GATE_INTERRUPT, 0x8E);
    }

    #[test]
    fn irq_lines_map_onto_32_through_47() {
        for line in 0..IRQ_LINES as u8 {
            assert_eq!(irq_vector(line), 0x20 + line);
            assert!(is_irq_vector(irq_vector(line) as u32));
        }
        assert!(!is_irq_vector(31));
        assert!(!is_irq_vector(48));
        assert_eq!(IRQ_SLAVE_BASE_VECTOR, 40);
    }

    #[test]
    fn error_code_vectors() {
        let with_code: [u8; 10] = [8, 10, 11, 12, 13, 14, 17, 21, 29, 30];
        for v in 0..32u8 {
            assert_eq!(exception_has_error_code(v), with_code.contains(&v), "vector {v}");
        }
    }

    #[test]
    fn exception_names() {
        assert_eq!(exception_name(0), "Divide Error");
        assert_eq!(exception_name(14), "Page Fault");
        assert_eq!(exception_name(15), "Reserved");
        assert_eq!(exception_name(200), "Unknown");
    }
}
