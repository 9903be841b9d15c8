//! First-fit byte heap plus a page-granular sibling ("pheap").
//!
//! Blocks are laid out back to back from `heap_begin`:
//!
//! ```text
//! | status:u8 | size:u32 | payload (size bytes) | pad (4 bytes) | next header ...
//! ```
//!
//! `last_alloc` is the high-water mark; everything below it is a sequence of
//! well-formed blocks. Freed blocks are reused first-fit and are never split.

use core::mem::size_of;
use core::ptr::{self, NonNull};

use keel_abi::{
    HEAP_GUARD, HeapError, IDENTITY_MAP_END, KERNEL_HEAP_BYTES, PAGE_DIRECTORY_PHYS,
    PAGE_SIZE_4KB, PAGING_REGION_END, PHEAP_PAGES,
};
use keel_lib::{InitFlag, align_up, klog_debug, klog_info};
use spin::Mutex;

const BLOCK_FREE: u8 = 0;
const BLOCK_USED: u8 = 1;

/// Gap after each payload.
pub const BLOCK_PAD: usize = 4;

const PAGE: usize = PAGE_SIZE_4KB as usize;

#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
struct BlockHeader {
    status: u8,
    size: u32,
}

pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Bytes a block with `size` payload bytes occupies.
#[inline]
pub const fn block_footprint(size: usize) -> usize {
    HEADER_SIZE + size + BLOCK_PAD
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapLayout {
    pub heap_begin: usize,
    pub heap_end: usize,
    pub pheap_begin: usize,
    pub pheap_end: usize,
}

impl HeapLayout {
    /// Regions placed after an image ending at `image_end`.
    pub const fn after_image(image_end: usize, heap_bytes: usize, pheap_pages: usize) -> Self {
        let heap_begin = align_up(image_end + HEAP_GUARD as usize, PAGE);
        let heap_end = heap_begin + heap_bytes;
        Self {
            heap_begin,
            heap_end,
            pheap_begin: heap_end,
            pheap_end: heap_end + pheap_pages * PAGE,
        }
    }

    /// Both regions must sit inside the identity window and clear of the
    /// paging structures.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.pheap_end > IDENTITY_MAP_END as usize {
            return Err(HeapError::OutOfWindow);
        }
        let paging = PAGE_DIRECTORY_PHYS as usize..PAGING_REGION_END as usize;
        if self.heap_begin < paging.end && paging.start < self.pheap_end {
            return Err(HeapError::Overlap);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub heap_begin: usize,
    pub heap_end: usize,
    pub pheap_begin: usize,
    pub pheap_end: usize,
    pub last_alloc: usize,
    pub memory_used: usize,
    pub pages_used: usize,
    pub pages_total: usize,
}

pub struct KernelHeap {
    layout: HeapLayout,
    last_alloc: usize,
    memory_used: usize,
    pheap_desc: [u8; PHEAP_PAGES],
}

impl KernelHeap {
    pub const fn new() -> Self {
        Self {
            layout: HeapLayout {
                heap_begin: 0,
                heap_end: 0,
                pheap_begin: 0,
                pheap_end: 0,
            },
            last_alloc: 0,
            memory_used: 0,
            pheap_desc: [BLOCK_FREE; PHEAP_PAGES],
        }
    }

    /// Adopt `layout`. Nothing in the regions is touched until allocation.
    ///
    /// # Safety
    /// Both regions must be mapped, writable and otherwise unused for as
    /// long as this heap hands out memory. `pheap_begin` must be page
    /// aligned.
    pub unsafe fn init_region(&mut self, layout: HeapLayout) -> Result<(), HeapError> {
        debug_assert!(layout.pheap_begin % PAGE == 0);
        if (layout.pheap_end - layout.pheap_begin) / PAGE > PHEAP_PAGES {
            return Err(HeapError::TooManyPages);
        }
        self.layout = layout;
        self.last_alloc = layout.heap_begin;
        self.memory_used = 0;
        self.pheap_desc = [BLOCK_FREE; PHEAP_PAGES];
        Ok(())
    }

    fn pheap_pages(&self) -> usize {
        (self.layout.pheap_end - self.layout.pheap_begin) / PAGE
    }

    #[inline]
    fn header_at(addr: usize) -> BlockHeader {
        // SAFETY: callers only pass block starts below `last_alloc`.
        unsafe { ptr::read_unaligned(addr as *const BlockHeader) }
    }

    #[inline]
    fn write_header(addr: usize, header: BlockHeader) {
        // SAFETY: as above, or the start of a block being carved.
        unsafe { ptr::write_unaligned(addr as *mut BlockHeader, header) }
    }

    fn claim(&mut self, addr: usize, size: u32) -> NonNull<u8> {
        Self::write_header(
            addr,
            BlockHeader {
                status: BLOCK_USED,
                size,
            },
        );
        self.memory_used += block_footprint(size as usize);
        let payload = (addr + HEADER_SIZE) as *mut u8;
        // SAFETY: the payload lies inside the block just claimed.
        unsafe {
            ptr::write_bytes(payload, 0, size as usize);
            NonNull::new_unchecked(payload)
        }
    }

    /// First-fit allocation of `size` zeroed bytes.
    pub fn malloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 || size > u32::MAX as usize {
            return None;
        }
        let mut cursor = self.layout.heap_begin;
        while cursor < self.last_alloc {
            let header = Self::header_at(cursor);
            let block_size = header.size as usize;
            if header.status == BLOCK_FREE && block_size >= size {
                return Some(self.claim(cursor, header.size));
            }
            cursor += block_footprint(block_size);
        }

        let end = self.last_alloc.checked_add(block_footprint(size))?;
        if end > self.layout.heap_end {
            klog_debug!("heap: out of memory for {} bytes", size);
            return None;
        }
        let block = self.last_alloc;
        self.last_alloc = end;
        Some(self.claim(block, size as u32))
    }

    /// Release a block from [`malloc`](Self::malloc). Null and foreign
    /// pointers are ignored. A free successor below `last_alloc` is merged.
    pub fn free(&mut self, ptr: *mut u8) {
        let addr = ptr as usize;
        if ptr.is_null()
            || addr < self.layout.heap_begin + HEADER_SIZE
            || addr >= self.last_alloc
        {
            return;
        }
        let block = addr - HEADER_SIZE;
        let mut header = Self::header_at(block);
        if header.status != BLOCK_USED {
            return;
        }
        self.memory_used = self
            .memory_used
            .saturating_sub(block_footprint(header.size as usize));

        header.status = BLOCK_FREE;
        let next = block + block_footprint(header.size as usize);
        if next < self.last_alloc {
            let neighbour = Self::header_at(next);
            if neighbour.status == BLOCK_FREE {
                header.size += (HEADER_SIZE + BLOCK_PAD) as u32 + neighbour.size;
            }
        }
        Self::write_header(block, header);
    }

    /// One 4 KiB page from the pheap. `size` above a page is refused.
    pub fn pmalloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size > PAGE {
            return None;
        }
        let pages = self.pheap_pages();
        let slot = self.pheap_desc[..pages]
            .iter()
            .position(|&s| s == BLOCK_FREE)?;
        self.pheap_desc[slot] = BLOCK_USED;
        let page = self.layout.pheap_begin + slot * PAGE;
        // SAFETY: the page lies inside the pheap handed to `init_region`.
        unsafe {
            ptr::write_bytes(page as *mut u8, 0, PAGE);
            Some(NonNull::new_unchecked(page as *mut u8))
        }
    }

    /// Release a pheap page. Pointers outside the pheap or not on a page
    /// boundary are ignored.
    pub fn pfree(&mut self, ptr: *mut u8) {
        let addr = ptr as usize;
        if addr < self.layout.pheap_begin || addr >= self.layout.pheap_end {
            return;
        }
        let offset = addr - self.layout.pheap_begin;
        if offset % PAGE != 0 {
            return;
        }
        self.pheap_desc[offset / PAGE] = BLOCK_FREE;
    }

    pub fn stats(&self) -> HeapStats {
        let pages_total = self.pheap_pages();
        HeapStats {
            heap_begin: self.layout.heap_begin,
            heap_end: self.layout.heap_end,
            pheap_begin: self.layout.pheap_begin,
            pheap_end: self.layout.pheap_end,
            last_alloc: self.last_alloc,
            memory_used: self.memory_used,
            pages_used: self.pheap_desc[..pages_total]
                .iter()
                .filter(|&&s| s == BLOCK_USED)
                .count(),
            pages_total,
        }
    }

    /// Walk every block below `last_alloc` and check the layout invariants.
    pub fn check_consistency(&self) -> bool {
        let mut cursor = self.layout.heap_begin;
        let mut used = 0usize;
        while cursor < self.last_alloc {
            let header = Self::header_at(cursor);
            if header.status > BLOCK_USED {
                return false;
            }
            let footprint = block_footprint(header.size as usize);
            if header.status == BLOCK_USED {
                used += footprint;
            }
            cursor += footprint;
        }
        cursor == self.last_alloc && self.last_alloc <= self.layout.heap_end && used == self.memory_used
    }
}

impl Default for KernelHeap {
    fn default() -> Self {
        Self::new()
    }
}

static KERNEL_HEAP: Mutex<KernelHeap> = Mutex::new(KernelHeap::new());
static HEAP_READY: InitFlag = InitFlag::new();

/// Adopt `layout` and raise `ready` once the heap can serve requests. The
/// flag stays clear if the region is refused.
///
/// # Safety
/// As for [`KernelHeap::init_region`].
unsafe fn install(heap: &mut KernelHeap, ready: &InitFlag, layout: HeapLayout) -> Result<(), HeapError> {
    if ready.is_set() {
        return Err(HeapError::AlreadyInitialized);
    }
    // SAFETY: forwarded from the caller.
    unsafe { heap.init_region(layout)? };
    ready.mark_set();
    Ok(())
}

/// Place the heap and pheap after the kernel image.
///
/// # Safety
/// `image_end` must be the true end of the loaded image and the memory
/// from there up to the pheap end must be identity mapped and unused.
pub unsafe fn init_kernel_memory(image_end: usize) -> Result<(), HeapError> {
    let layout = HeapLayout::after_image(image_end, KERNEL_HEAP_BYTES as usize, PHEAP_PAGES);
    layout.validate()?;
    // SAFETY: validated against the identity window; the caller vouches the
    // memory is otherwise unused.
    unsafe { install(&mut KERNEL_HEAP.lock(), &HEAP_READY, layout)? };
    klog_info!(
        "heap: 0x{:08x}..0x{:08x}, pheap {} pages at 0x{:08x}",
        layout.heap_begin, layout.heap_end, PHEAP_PAGES, layout.pheap_begin
    );
    Ok(())
}

pub fn heap_initialized() -> bool {
    HEAP_READY.is_set()
}

/// Zeroed allocation from the kernel heap; `None` on exhaustion or before
/// the heap is set up.
pub fn malloc(size: usize) -> Option<NonNull<u8>> {
    if !heap_initialized() {
        return None;
    }
    KERNEL_HEAP.lock().malloc(size)
}

pub fn free(ptr: *mut u8) {
    if heap_initialized() {
        KERNEL_HEAP.lock().free(ptr);
    }
}

pub fn pmalloc(size: usize) -> Option<NonNull<u8>> {
    if !heap_initialized() {
        return None;
    }
    KERNEL_HEAP.lock().pmalloc(size)
}

pub fn pfree(ptr: *mut u8) {
    if heap_initialized() {
        KERNEL_HEAP.lock().pfree(ptr);
    }
}

pub fn heap_stats() -> HeapStats {
    KERNEL_HEAP.lock().stats()
}

/// Walk the block chain; `false` if a header is corrupt.
pub fn heap_check_consistency() -> bool {
    KERNEL_HEAP.lock().check_consistency()
}

pub fn print_memory_layout() {
    let stats = heap_stats();
    klog_info!("memory layout:");
    klog_info!("  heap   0x{:08x}..0x{:08x}", stats.heap_begin, stats.heap_end);
    klog_info!("  pheap  0x{:08x}..0x{:08x}", stats.pheap_begin, stats.pheap_end);
    klog_info!("  high-water 0x{:08x}, {} bytes in use", stats.last_alloc, stats.memory_used);
    klog_info!("  pages  {}/{} in use", stats.pages_used, stats.pages_total);
}
