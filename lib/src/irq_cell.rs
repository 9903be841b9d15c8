//! Interior mutability for state shared with interrupt handlers.
//!
//! There is one CPU. The foreground mutates an `IrqCell` with interrupts
//! masked, and handlers only run with IF clear, so exclusive access follows
//! from the interrupt flag alone and no lock word is needed.

use core::cell::UnsafeCell;

use crate::cpu;

pub struct IrqCell<T> {
    value: UnsafeCell<T>,
    // Hosted test threads run concurrently, so masking IF is not enough.
    #[cfg(not(target_arch = "x86"))]
    host_lock: spin::Mutex<()>,
}

// SAFETY: single core; every access goes through `with`, which runs with
// interrupts disabled, so accesses never overlap.
unsafe impl<T: Send> Sync for IrqCell<T> {}

impl<T> IrqCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
            #[cfg(not(target_arch = "x86"))]
            host_lock: spin::Mutex::new(()),
        }
    }

    /// Run `f` with exclusive access, interrupts masked for the duration.
    ///
    /// `f` must not call `with` on the same cell.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let flags = cpu::save_flags_cli();
        #[cfg(not(target_arch = "x86"))]
        let _guard = self.host_lock.lock();
        // SAFETY: interrupts are masked, so nothing else touches the value
        // until `f` returns.
        let result = f(unsafe { &mut *self.value.get() });
        cpu::restore_flags(flags);
        result
    }
}
