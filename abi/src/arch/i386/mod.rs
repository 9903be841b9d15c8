//! IA-32 protected-mode definitions.

pub mod gdt;
pub mod idt;
pub mod memory;
pub mod paging;
pub mod ports;

pub use gdt::*;
pub use idt::*;
pub use memory::*;
pub use paging::*;
pub use ports::*;
