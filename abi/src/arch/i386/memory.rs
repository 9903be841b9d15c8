//! Fixed physical memory layout.
//!
//! The kernel runs identity mapped, so every address here is both physical
//! and virtual. All regions must stay below [`IDENTITY_MAP_END`].

/// Load address of the kernel image (set by the linker script).
pub const KERNEL_LOAD_ADDRESS: u32 = 0x0010_0000;

/// End of the identity-mapped window set up at boot (8 MiB).
pub const IDENTITY_MAP_END: u32 = 0x0080_0000;

/// Number of page tables backing the identity window.
pub const IDENTITY_MAP_TABLES: usize = 2;

/// Page directory location.
pub const PAGE_DIRECTORY_PHYS: u32 = 0x0040_0000;

/// First identity-map page table; the rest follow contiguously.
pub const PAGE_TABLES_PHYS: u32 = 0x0040_1000;

/// One past the last byte of the paging structures.
pub const PAGING_REGION_END: u32 = PAGE_TABLES_PHYS + IDENTITY_MAP_TABLES as u32 * 0x1000;

/// Gap left between the kernel image and the byte heap.
pub const HEAP_GUARD: u32 = 0x1000;

/// Size of the first-fit byte heap.
pub const KERNEL_HEAP_BYTES: u32 = 0x0020_0000;

/// Page-aligned slots in the pheap.
pub const PHEAP_PAGES: usize = 32;

/// VGA text framebuffer.
pub const VGA_TEXT_BUFFER: u32 = 0x000B_8000;
