#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]

pub mod kernel_heap;
pub mod paging;
pub mod symbols;

pub use kernel_heap::{
    HeapStats, free, heap_check_consistency, heap_stats, init_kernel_memory, malloc, pfree, pmalloc, print_memory_layout,
};
pub use paging::{PageTable, check_image_clear, init_paging, translate, translate_current};
