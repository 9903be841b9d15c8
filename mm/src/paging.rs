//! Identity-mapped two-level paging for the low 8 MiB.

use keel_abi::{
    BootError, CR0_PAGING, IDENTITY_MAP_END, IDENTITY_MAP_TABLES, PAGE_DIRECTORY_PHYS, PAGE_FRAME_MASK,
    PAGE_SIZE_4KB, PAGE_TABLE_SPAN, PAGE_TABLES_PHYS, PAGING_ENTRIES, PageFlags, pd_index,
    pt_index,
};
use keel_lib::{cpu, klog_debug, klog_info};

/// A page directory or page table.
#[repr(C, align(4096))]
#[derive(Clone)]
pub struct PageTable {
    entries: [u32; PAGING_ENTRIES],
}

impl PageTable {
    pub const fn zeroed() -> Self {
        Self {
            entries: [0; PAGING_ENTRIES],
        }
    }

    #[inline]
    pub fn entry(&self, index: usize) -> u32 {
        self.entries[index]
    }

    #[inline]
    pub fn set_entry(&mut self, index: usize, entry: u32) {
        self.entries[index] = entry;
    }

    pub fn clear(&mut self) {
        self.entries.fill(0);
    }

    pub fn present_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| **e & PageFlags::PRESENT.bits() != 0)
            .count()
    }
}

#[inline]
pub const fn make_entry(frame: u32, flags: PageFlags) -> u32 {
    (frame & PAGE_FRAME_MASK) | flags.bits()
}

#[inline]
pub const fn entry_frame(entry: u32) -> u32 {
    entry & PAGE_FRAME_MASK
}

#[inline]
pub const fn entry_flags(entry: u32) -> PageFlags {
    PageFlags::from_bits_truncate(entry & !PAGE_FRAME_MASK)
}

/// Fill `table` so entry `i` maps `base + i * 4 KiB` to itself.
pub fn identity_map_table(table: &mut PageTable, base: u32, flags: PageFlags) {
    for i in 0..PAGING_ENTRIES {
        let frame = base + (i as u32) * PAGE_SIZE_4KB;
        table.set_entry(i, make_entry(frame, flags));
    }
}

/// Point directory slot `index` at the page table living at `table_phys`.
pub fn install_table(pd: &mut PageTable, index: usize, table_phys: u32, flags: PageFlags) {
    pd.set_entry(index, make_entry(table_phys, flags));
}

/// Walk `pd` for `vaddr`. `resolve` maps a page-table frame to the table
/// stored there. Returns the physical address, or `None` where the MMU
/// would raise a not-present fault.
pub fn translate<'a>(
    pd: &'a PageTable,
    vaddr: u32,
    resolve: impl Fn(u32) -> Option<&'a PageTable>,
) -> Option<u32> {
    let pde = pd.entry(pd_index(vaddr));
    if pde & PageFlags::PRESENT.bits() == 0 {
        return None;
    }
    if pde & PageFlags::HUGE.bits() != 0 {
        return Some((pde & !(PAGE_TABLE_SPAN - 1)) | (vaddr & (PAGE_TABLE_SPAN - 1)));
    }
    let table = resolve(entry_frame(pde))?;
    let pte = table.entry(pt_index(vaddr));
    if pte & PageFlags::PRESENT.bits() == 0 {
        return None;
    }
    Some(entry_frame(pte) | (vaddr & (PAGE_SIZE_4KB - 1)))
}

/// Build the identity window in `pd` using `tables` for the page tables.
/// `tables_phys` is the physical address of `tables[0]`.
pub fn build_identity_window(pd: &mut PageTable, tables: &mut [PageTable], tables_phys: u32) {
    pd.clear();
    for (i, table) in tables.iter_mut().enumerate() {
        identity_map_table(table, i as u32 * PAGE_TABLE_SPAN, PageFlags::KERNEL_RW);
        install_table(
            pd,
            i,
            tables_phys + i as u32 * PAGE_SIZE_4KB,
            PageFlags::KERNEL_RW,
        );
    }
}

/// The directory and tables are written at fixed frames; an image ending
/// past `PAGE_DIRECTORY_PHYS` would be overwritten by them.
pub fn check_image_clear(image_end: usize) -> Result<(), BootError> {
    if image_end > PAGE_DIRECTORY_PHYS as usize {
        return Err(BootError::ImageOverlapsPaging(image_end as u32));
    }
    Ok(())
}

pub fn paging_enabled() -> bool {
    cpu::read_cr0() & CR0_PAGING != 0
}

/// Set up the identity window at its fixed location, load CR3 and turn
/// paging on.
///
/// # Safety
/// Must run once, before paging is enabled, with the page directory and
/// table frames unused by anything else.
pub unsafe fn init_paging() {
    // SAFETY: the caller guarantees these frames are free; with paging off
    // physical addresses are directly addressable.
    let (pd, tables) = unsafe {
        (
            &mut *(PAGE_DIRECTORY_PHYS as usize as *mut PageTable),
            core::slice::from_raw_parts_mut(
                PAGE_TABLES_PHYS as usize as *mut PageTable,
                IDENTITY_MAP_TABLES,
            ),
        )
    };
    build_identity_window(pd, tables, PAGE_TABLES_PHYS);
    klog_debug!(
        "paging: PD at 0x{:08x}, {} tables at 0x{:08x}",
        PAGE_DIRECTORY_PHYS, IDENTITY_MAP_TABLES, PAGE_TABLES_PHYS
    );

    // SAFETY: the directory identity maps everything currently executing.
    unsafe {
        cpu::write_cr3(PAGE_DIRECTORY_PHYS);
        cpu::write_cr0(cpu::read_cr0() | CR0_PAGING);
    }
    klog_info!("paging: identity mapped 0x00000000..0x{:08x}", IDENTITY_MAP_END);
}

/// Translate through the live page directory. `None` while paging is off or
/// when `vaddr` is unmapped.
pub fn translate_current(vaddr: u32) -> Option<u32> {
    if !paging_enabled() {
        return None;
    }
    let cr3 = cpu::read_cr3() & PAGE_FRAME_MASK;
    // SAFETY: with paging on, CR3 names our directory, and every table it
    // references sits inside the identity window.
    let pd = unsafe { &*(cr3 as usize as *const PageTable) };
    translate(pd, vaddr, |frame| {
        (frame < IDENTITY_MAP_END).then(|| unsafe { &*(frame as usize as *const PageTable) })
    })
}
