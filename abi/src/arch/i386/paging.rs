//! Two-level 32-bit paging structures (no PAE).

use bitflags::bitflags;

/// Size of a small page.
pub const PAGE_SIZE_4KB: u32 = 0x1000;

/// Bytes covered by one page table (one PDE).
pub const PAGE_TABLE_SPAN: u32 = 0x40_0000;

/// Entries in a page directory or page table.
pub const PAGING_ENTRIES: usize = 1024;

/// Mask selecting the frame address of a PDE/PTE.
pub const PAGE_FRAME_MASK: u32 = !0xFFF;

/// CR0.PG: paging enable.
pub const CR0_PAGING: u32 = 1 << 31;

bitflags! {
    /// Flags shared by page-directory and page-table entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct PageFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const CACHE_DISABLE = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
        /// PDE only: entry maps a 4 MiB page.
        const HUGE = 1 << 7;
        const GLOBAL = 1 << 8;

        /// Supervisor read/write mapping used for the identity window.
        const KERNEL_RW = Self::PRESENT.bits() | Self::WRITABLE.bits();
    }
}

bitflags! {
    /// Error code pushed with vector 14.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct PageFaultErrorCode: u32 {
        /// Protection violation (set) vs. not-present page (clear).
        const PROTECTION = 1 << 0;
        const WRITE = 1 << 1;
        const USER = 1 << 2;
        const RESERVED_BIT = 1 << 3;
        const INSTRUCTION_FETCH = 1 << 4;
    }
}

impl PageFaultErrorCode {
    pub fn access_str(self) -> &'static str {
        if self.contains(Self::WRITE) { "write" } else { "read" }
    }

    pub fn cause_str(self) -> &'static str {
        if self.contains(Self::PROTECTION) {
            "protection violation"
        } else {
            "page not present"
        }
    }

    pub fn mode_str(self) -> &'static str {
        if self.contains(Self::USER) { "user" } else { "supervisor" }
    }
}

/// Page-directory slot for `vaddr`.
#[inline]
pub const fn pd_index(vaddr: u32) -> usize {
    (vaddr >> 22) as usize
}

/// Page-table slot for `vaddr`.
#[inline]
pub const fn pt_index(vaddr: u32) -> usize {
    ((vaddr >> 12) & 0x3FF) as usize
}
