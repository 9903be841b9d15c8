use keel_abi::{IDENTITY_MAP_END, PAGE_FRAME_MASK, PAGE_SIZE_4KB, PageFlags, pd_index, pt_index};
use keel_lib::testing::TestResult;
use keel_lib::{cpu, define_test_suite, ensure, pass};
use keel_mm::paging::{self, PageTable, entry_frame};

fn test_paging_is_enabled() -> TestResult {
    ensure!(paging::paging_enabled());
    ensure!(cpu::read_cr3() & PAGE_FRAME_MASK == keel_abi::PAGE_DIRECTORY_PHYS);
    pass!()
}

fn test_every_low_page_has_an_identity_pte() -> TestResult {
    // SAFETY: CR3 names the directory built at boot, inside the window.
    let pd = unsafe { &*((cpu::read_cr3() & PAGE_FRAME_MASK) as usize as *const PageTable) };
    let expected_flags = PageFlags::KERNEL_RW.bits();
    let mut vaddr = 0u32;
    while vaddr < IDENTITY_MAP_END {
        let pde = pd.entry(pd_index(vaddr));
        ensure!(pde & PageFlags::PRESENT.bits() != 0, "PDE for 0x{:x} missing", vaddr);
        // SAFETY: page tables live inside the identity window.
        let table = unsafe { &*(entry_frame(pde) as usize as *const PageTable) };
        let pte = table.entry(pt_index(vaddr));
        ensure!(
            pte == (vaddr & PAGE_FRAME_MASK) | expected_flags,
            "PTE for 0x{:x} is 0x{:x}",
            vaddr,
            pte
        );
        vaddr += PAGE_SIZE_4KB;
    }
    pass!()
}

fn test_translation_matches_identity() -> TestResult {
    for vaddr in [0x0000_0000u32, 0x000B_8000, 0x0010_0000, 0x0040_0000, 0x007F_FFFF] {
        ensure!(
            paging::translate_current(vaddr) == Some(vaddr),
            "0x{:x} -> {:?}",
            vaddr,
            paging::translate_current(vaddr)
        );
    }
    ensure!(paging::translate_current(IDENTITY_MAP_END).is_none());
    ensure!(paging::translate_current(0x0090_0000).is_none());
    pass!()
}

define_test_suite!(paging, [
    test_paging_is_enabled,
    test_every_low_page_has_an_identity_pte,
    test_translation_matches_identity,
]);
