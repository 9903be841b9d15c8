use keel_mm::kernel_heap::HEADER_SIZE;
use keel_mm::{free, heap_check_consistency, heap_stats, malloc, pfree, pmalloc};
use keel_lib::testing::TestResult;
use keel_lib::{define_test_suite, ensure, fail, pass};

fn test_freed_block_is_reused_first_fit() -> TestResult {
    let (Some(a), Some(b)) = (malloc(32), malloc(32)) else {
        return fail!("initial allocations failed");
    };
    free(a.as_ptr());
    let Some(c) = malloc(32) else {
        return fail!("reallocation failed");
    };
    let reused = c == a;
    free(b.as_ptr());
    free(c.as_ptr());
    ensure!(reused, "a={:p} c={:p}", a, c);
    ensure!(heap_check_consistency());
    pass!()
}

fn test_allocation_lies_inside_the_heap() -> TestResult {
    let Some(p) = malloc(100) else {
        return fail!("malloc(100) failed");
    };
    let stats = heap_stats();
    let addr = p.as_ptr() as usize;
    free(p.as_ptr());
    ensure!(
        addr >= stats.heap_begin + HEADER_SIZE && addr < stats.last_alloc,
        "0x{:x} outside 0x{:x}..0x{:x}",
        addr,
        stats.heap_begin,
        stats.last_alloc
    );
    pass!()
}

fn test_zero_size_and_null_free() -> TestResult {
    ensure!(malloc(0).is_none());
    let before = heap_stats();
    free(core::ptr::null_mut());
    ensure!(heap_stats() == before);
    pass!()
}

fn test_allocations_are_zeroed() -> TestResult {
    let Some(p) = malloc(64) else {
        return fail!("malloc(64) failed");
    };
    // SAFETY: `p` owns 64 bytes until freed below.
    let bytes = unsafe { core::slice::from_raw_parts_mut(p.as_ptr(), 64) };
    let zeroed = bytes.iter().all(|&b| b == 0);
    bytes.fill(0xA5);
    free(p.as_ptr());
    ensure!(zeroed);
    pass!()
}

fn test_pmalloc_exhausts_then_recovers() -> TestResult {
    let stats = heap_stats();
    let free_pages = stats.pages_total - stats.pages_used;
    let mut pages = [core::ptr::null_mut::<u8>(); keel_abi::PHEAP_PAGES];
    for slot in pages.iter_mut().take(free_pages) {
        match pmalloc(4096) {
            Some(page) => *slot = page.as_ptr(),
            None => return fail!("pmalloc failed early"),
        }
    }
    let extra = pmalloc(4096);
    for &page in pages.iter().take(free_pages) {
        pfree(page);
    }
    ensure!(extra.is_none(), "pmalloc past capacity succeeded");
    ensure!(heap_stats().pages_used == stats.pages_used);
    ensure!(pmalloc(8192).is_none());
    pass!()
}

define_test_suite!(heap, [
    test_freed_block_is_reused_first_fit,
    test_allocation_lies_inside_the_heap,
    test_zero_size_and_null_free,
    test_allocations_are_zeroed,
    test_pmalloc_exhausts_then_recovers,
]);
