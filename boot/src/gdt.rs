//! Flat 32-bit global descriptor table: null, kernel code, kernel data.

use keel_abi::{
    GDT_ACCESS_KERNEL_CODE, GDT_ACCESS_KERNEL_DATA, GDT_ENTRY_COUNT, GDT_FLAGS_32BIT,
    GDT_LIMIT_4GIB, SegmentSelector,
};
use keel_lib::{cpu, klog_debug};

/// One 8-byte segment descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct GdtEntry(u64);

impl GdtEntry {
    pub const NULL: Self = Self(0);

    /// `limit` is 20 bits; `flags` is the upper nibble of byte 6.
    pub const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        let base = base as u64;
        let limit = limit as u64;
        Self(
            (limit & 0xFFFF)
                | ((base & 0x00FF_FFFF) << 16)
                | ((access as u64) << 40)
                | (((limit >> 16) & 0xF) << 48)
                | (((flags as u64) & 0xF) << 52)
                | (((base >> 24) & 0xFF) << 56),
        )
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn base(self) -> u32 {
        (((self.0 >> 16) & 0x00FF_FFFF) | (((self.0 >> 56) & 0xFF) << 24)) as u32
    }

    pub const fn limit(self) -> u32 {
        ((self.0 & 0xFFFF) | (((self.0 >> 48) & 0xF) << 16)) as u32
    }

    pub const fn access(self) -> u8 {
        (self.0 >> 40) as u8
    }

    pub const fn flags(self) -> u8 {
        ((self.0 >> 52) & 0xF) as u8
    }
}

pub const fn build_gdt() -> [GdtEntry; GDT_ENTRY_COUNT] {
    [
        GdtEntry::NULL,
        GdtEntry::new(0, GDT_LIMIT_4GIB, GDT_ACCESS_KERNEL_CODE, GDT_FLAGS_32BIT),
        GdtEntry::new(0, GDT_LIMIT_4GIB, GDT_ACCESS_KERNEL_DATA, GDT_FLAGS_32BIT),
    ]
}

/// Operand of `lgdt`/`lidt`.
#[repr(C, packed)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: u32,
}

// Never written after link time: every present descriptor has its accessed
// bit preset, so segment loads do not store into it.
static GDT: [GdtEntry; GDT_ENTRY_COUNT] = build_gdt();

#[cfg(target_arch = "x86")]
unsafe fn load_gdt(pointer: &DescriptorTablePointer) {
    use core::arch::asm;

    // SAFETY: the caller provides a valid table whose selectors 0x08/0x10
    // are flat ring-0 code/data.
    unsafe {
        asm!(
            "lgdt ({ptr})",
            "pushl ${code}",
            "leal 2f, %eax",
            "pushl %eax",
            "lret",
            "2:",
            "movw ${data}, %ax",
            "movw %ax, %ds",
            "movw %ax, %es",
            "movw %ax, %fs",
            "movw %ax, %gs",
            "movw %ax, %ss",
            ptr = in(reg) pointer,
            code = const SegmentSelector::KERNEL_CODE.bits() as u32,
            data = const SegmentSelector::KERNEL_DATA.bits() as u32,
            out("eax") _,
            options(att_syntax, preserves_flags)
        );
    }
}

#[cfg(not(target_arch = "x86"))]
unsafe fn load_gdt(_pointer: &DescriptorTablePointer) {}

/// Load the flat GDT and reload every segment register from it.
pub fn gdt_init() {
    let pointer = DescriptorTablePointer {
        limit: (core::mem::size_of_val(&GDT) - 1) as u16,
        base: GDT.as_ptr() as usize as u32,
    };
    // SAFETY: `GDT` is static and matches the selectors used everywhere.
    unsafe { load_gdt(&pointer) };
    klog_debug!(
        "GDT: loaded {} descriptors, CS=0x{:02x} DS=0x{:02x}",
        GDT_ENTRY_COUNT,
        cpu::read_cs(),
        cpu::read_ds()
    );
}

pub fn gdt_entry(index: usize) -> Option<GdtEntry> {
    GDT.get(index).copied()
}

/// Whether CS/DS/SS hold the kernel selectors.
pub fn gdt_selectors_loaded() -> bool {
    cpu::read_cs() == SegmentSelector::KERNEL_CODE.bits()
        && cpu::read_ds() == SegmentSelector::KERNEL_DATA.bits()
        && cpu::read_ss() == SegmentSelector::KERNEL_DATA.bits()
}
