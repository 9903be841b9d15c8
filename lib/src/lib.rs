#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]

pub mod alignment;
pub mod cpu;
pub mod init_flag;
pub mod io;
pub mod irq_cell;
pub mod kdiag;
pub mod klog;
pub mod ring_buffer;
pub mod testing;

pub use alignment::{align_down, align_down_u32, align_up, align_up_u32};
pub use init_flag::InitFlag;
pub use irq_cell::IrqCell;
pub use kdiag::InterruptFrame;
pub use klog::{KlogLevel, klog_get_level, klog_set_level};
pub use ring_buffer::RingBuffer;

// Re-exported for `define_test_suite!`.
pub use paste;
