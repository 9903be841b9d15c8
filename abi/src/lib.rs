//! keel hardware-facing definitions.
//!
//! Plain constants and `Copy` data types shared by every kernel crate:
//! I/O port numbers, descriptor encodings, the interrupt vector map,
//! paging flags, the fixed physical memory layout and Multiboot2 values.
//! Nothing in here touches hardware.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod arch;
pub mod error;
pub mod multiboot2;

pub use arch::i386::*;
pub use error::*;
pub use multiboot2::*;
