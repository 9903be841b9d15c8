//! Global Descriptor Table (GDT) definitions.
//!
//! Segment selectors encode the descriptor table index, table indicator
//! (GDT/LDT), and requested privilege level (RPL). keel installs a flat
//! model: one null descriptor and ring-0 code and data segments spanning
//! the full 4 GiB address space.

/// IA-32 segment selector.
///
/// Layout (16 bits):
/// - Bits 0-1: Requested Privilege Level (RPL)
/// - Bit 2: Table Indicator (0 = GDT, 1 = LDT)
/// - Bits 3-15: Descriptor index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SegmentSelector(pub u16);

impl SegmentSelector {
    /// Null selector (index 0, GDT, RPL 0).
    pub const NULL: Self = Self(0);

    /// Kernel code segment (GDT index 1, RPL 0) = 0x08.
    pub const KERNEL_CODE: Self = Self::new(1, false, 0);

    /// Kernel data segment (GDT index 2, RPL 0) = 0x10.
    pub const KERNEL_DATA: Self = Self::new(2, false, 0);

    /// Create a new segment selector.
    ///
    /// # Arguments
    /// * `index` - Descriptor table index (0-8191)
    /// * `ldt` - Use LDT instead of GDT
    /// * `rpl` - Requested privilege level (0-3)
    #[inline]
    pub const fn new(index: u16, ldt: bool, rpl: u8) -> Self {
        let ti = if ldt { 1 << 2 } else { 0 };
        Self((index << 3) | ti | (rpl as u16 & 0x3))
    }

    /// Get the descriptor table index.
    #[inline]
    pub const fn index(self) -> u16 {
        self.0 >> 3
    }

    /// Check if this selector references the LDT.
    #[inline]
    pub const fn is_ldt(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// Get the requested privilege level (0-3).
    #[inline]
    pub const fn rpl(self) -> u8 {
        (self.0 & 0x3) as u8
    }

    /// Get the raw selector value for loading into a segment register.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

/// Number of descriptors in the kernel GDT.
pub const GDT_ENTRY_COUNT: usize = 3;

// =========================================================================
// GDT Descriptor Access Byte Fields
// =========================================================================

/// Present bit in GDT access byte (bit 7).
pub const GDT_ACCESS_PRESENT: u8 = 1 << 7;

/// DPL = 0 (Ring 0 / Kernel) in GDT access byte (bits 5-6).
pub const GDT_ACCESS_DPL_KERNEL: u8 = 0 << 5;

/// Segment type bit (bit 4) - 1 for code/data segment.
pub const GDT_ACCESS_SEGMENT: u8 = 1 << 4;

/// Code segment type: executable, readable, non-conforming.
pub const GDT_ACCESS_CODE_TYPE: u8 = 0b1010;

/// Data segment type: writable, expand-up.
pub const GDT_ACCESS_DATA_TYPE: u8 = 0b0010;

/// Accessed bit (bit 0). The CPU sets it on the first segment load unless
/// it is already set, and the kernel GDT lives in read-only data.
pub const GDT_ACCESS_ACCESSED: u8 = 1 << 0;

/// Access byte of the ring-0 code segment (0x9B).
pub const GDT_ACCESS_KERNEL_CODE: u8 = GDT_ACCESS_PRESENT
    | GDT_ACCESS_DPL_KERNEL
    | GDT_ACCESS_SEGMENT
    | GDT_ACCESS_CODE_TYPE
    | GDT_ACCESS_ACCESSED;

/// Access byte of the ring-0 data segment (0x93).
pub const GDT_ACCESS_KERNEL_DATA: u8 = GDT_ACCESS_PRESENT
    | GDT_ACCESS_DPL_KERNEL
    | GDT_ACCESS_SEGMENT
    | GDT_ACCESS_DATA_TYPE
    | GDT_ACCESS_ACCESSED;

// =========================================================================
// GDT Flags (bits 52-55 of descriptor)
// =========================================================================

/// Granularity flag (G=1) - limit in 4KB units.
pub const GDT_FLAG_GRANULARITY: u8 = 1 << 3;

/// Default operation size flag (D/B=1) - 32-bit segment.
pub const GDT_FLAG_SIZE_32: u8 = 1 << 2;

/// Combined flags for flat 32-bit segments: G=1, D/B=1 = 0xC.
pub const GDT_FLAGS_32BIT: u8 = GDT_FLAG_GRANULARITY | GDT_FLAG_SIZE_32;

/// 20-bit limit covering 4 GiB with 4 KiB granularity.
pub const GDT_LIMIT_4GIB: u32 = 0xF_FFFF;
