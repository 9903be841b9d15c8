#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]

pub mod irq;
pub mod keyboard;
pub mod pic;
pub mod pit;
pub mod serial;
pub mod speaker;
pub mod vectors;
pub mod vga;

use keel_lib::io::HardwarePorts;

/// Port handle for the drivers' hardware entry points.
#[inline(always)]
pub(crate) fn hardware_ports() -> HardwarePorts {
    // SAFETY: the kernel runs at CPL 0 on a single core and these drivers
    // are the only code touching the legacy devices.
    unsafe { HardwarePorts::new() }
}
