#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]

pub mod early_init;
pub mod exceptions;
pub mod gdt;
pub mod idt;
pub mod kernel_panic;
pub mod multiboot2;

pub use early_init::{
    BOOT_STEPS, boot_init_run_all, boot_mark_initialized, get_initialization_progress,
    is_kernel_initialized, kernel_main,
};
pub use kernel_panic::{kernel_panic, kernel_panic_fmt};
pub use multiboot2::{BasicMemInfo, BootInfo};
