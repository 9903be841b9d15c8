//! CPU control primitives.
//!
//! On the kernel target these are single instructions. Hosted builds (unit
//! tests on a development machine) get a software model of the interrupt
//! flag and control registers so that code paths which mask interrupts can
//! run unprivileged.

/// EFLAGS.IF
pub const EFLAGS_IF: u32 = 1 << 9;

#[cfg(target_arch = "x86")]
mod imp {
    use core::arch::asm;

    use super::EFLAGS_IF;

    #[inline(always)]
    pub fn hlt() {
        unsafe {
            asm!("hlt", options(nomem, nostack, preserves_flags));
        }
    }

    #[inline(always)]
    pub fn pause() {
        unsafe {
            asm!("pause", options(nomem, nostack, preserves_flags));
        }
    }

    #[inline(always)]
    pub fn enable_interrupts() {
        unsafe {
            asm!("sti", options(nostack));
        }
    }

    #[inline(always)]
    pub fn disable_interrupts() {
        unsafe {
            asm!("cli", options(nostack));
        }
    }

    /// `sti; hlt` back to back: the interrupt shadow of `sti` guarantees no
    /// IRQ slips in between, so a pending tick always wakes the `hlt`.
    #[inline(always)]
    pub fn enable_interrupts_and_wait() {
        unsafe {
            asm!("sti", "hlt", options(nostack));
        }
    }

    #[inline(always)]
    pub fn read_eflags() -> u32 {
        let flags: u32;
        unsafe {
            asm!("pushfd", "pop {}", out(reg) flags, options(preserves_flags));
        }
        flags
    }

    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        read_eflags() & EFLAGS_IF != 0
    }

    /// Disable interrupts and return the previous EFLAGS.
    #[inline(always)]
    pub fn save_flags_cli() -> u32 {
        let flags = read_eflags();
        disable_interrupts();
        flags
    }

    /// Re-enable interrupts if `flags` had IF set.
    #[inline(always)]
    pub fn restore_flags(flags: u32) {
        if flags & EFLAGS_IF != 0 {
            enable_interrupts();
        }
    }

    /// Time-stamp counter.
    #[inline(always)]
    pub fn read_tsc() -> u64 {
        let low: u32;
        let high: u32;
        unsafe {
            asm!("rdtsc", out("eax") low, out("edx") high, options(nomem, nostack, preserves_flags));
        }
        ((high as u64) << 32) | low as u64
    }

    #[inline(always)]
    pub fn read_cr0() -> u32 {
        let value: u32;
        unsafe {
            asm!("mov {}, cr0", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    /// # Safety
    /// Changing CR0 alters paging and protection for the whole machine.
    #[inline(always)]
    pub unsafe fn write_cr0(value: u32) {
        unsafe {
            asm!("mov cr0, {}", in(reg) value, options(nostack, preserves_flags));
        }
    }

    #[inline(always)]
    pub fn read_cr2() -> u32 {
        let value: u32;
        unsafe {
            asm!("mov {}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    #[inline(always)]
    pub fn read_cr3() -> u32 {
        let value: u32;
        unsafe {
            asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    /// # Safety
    /// `value` must be the physical address of a valid page directory.
    #[inline(always)]
    pub unsafe fn write_cr3(value: u32) {
        unsafe {
            asm!("mov cr3, {}", in(reg) value, options(nostack, preserves_flags));
        }
    }

    #[inline(always)]
    pub fn read_cs() -> u16 {
        let value: u16;
        unsafe {
            asm!("mov {:x}, cs", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    #[inline(always)]
    pub fn read_ds() -> u16 {
        let value: u16;
        unsafe {
            asm!("mov {:x}, ds", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    #[inline(always)]
    pub fn read_ss() -> u16 {
        let value: u16;
        unsafe {
            asm!("mov {:x}, ss", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }
}

#[cfg(not(target_arch = "x86"))]
mod imp {
    use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

    use keel_abi::SegmentSelector;

    use super::EFLAGS_IF;

    static INTERRUPTS: AtomicBool = AtomicBool::new(false);
    static CR0: AtomicU32 = AtomicU32::new(0);
    static CR3: AtomicU32 = AtomicU32::new(0);
    static TSC: AtomicU64 = AtomicU64::new(0);

    pub fn hlt() {
        core::hint::spin_loop();
    }

    pub fn pause() {
        core::hint::spin_loop();
    }

    pub fn enable_interrupts() {
        INTERRUPTS.store(true, Ordering::SeqCst);
    }

    pub fn disable_interrupts() {
        INTERRUPTS.store(false, Ordering::SeqCst);
    }

    pub fn enable_interrupts_and_wait() {
        enable_interrupts();
        hlt();
    }

    pub fn read_eflags() -> u32 {
        if INTERRUPTS.load(Ordering::SeqCst) { EFLAGS_IF } else { 0 }
    }

    pub fn interrupts_enabled() -> bool {
        INTERRUPTS.load(Ordering::SeqCst)
    }

    pub fn save_flags_cli() -> u32 {
        if INTERRUPTS.swap(false, Ordering::SeqCst) { EFLAGS_IF } else { 0 }
    }

    pub fn restore_flags(flags: u32) {
        if flags & EFLAGS_IF != 0 {
            enable_interrupts();
        }
    }

    /// Advances by one per read.
    pub fn read_tsc() -> u64 {
        TSC.fetch_add(1, Ordering::SeqCst)
    }

    pub fn read_cr0() -> u32 {
        CR0.load(Ordering::SeqCst)
    }

    /// # Safety
    /// Mirrors the kernel signature; the hosted model has no side effects.
    pub unsafe fn write_cr0(value: u32) {
        CR0.store(value, Ordering::SeqCst);
    }

    pub fn read_cr2() -> u32 {
        0
    }

    pub fn read_cr3() -> u32 {
        CR3.load(Ordering::SeqCst)
    }

    /// # Safety
    /// Mirrors the kernel signature; the hosted model has no side effects.
    pub unsafe fn write_cr3(value: u32) {
        CR3.store(value, Ordering::SeqCst);
    }

    pub fn read_cs() -> u16 {
        SegmentSelector::KERNEL_CODE.bits()
    }

    pub fn read_ds() -> u16 {
        SegmentSelector::KERNEL_DATA.bits()
    }

    pub fn read_ss() -> u16 {
        SegmentSelector::KERNEL_DATA.bits()
    }
}

pub use imp::*;

/// Halt forever with interrupts disabled.
#[inline(always)]
pub fn halt_loop() -> ! {
    loop {
        disable_interrupts();
        hlt();
    }
}

