use core::sync::atomic::{AtomicU32, Ordering};

use keel_abi::{
    IrqError, PIT_BASE_FREQUENCY_HZ, PIT_COMMAND_ACCESS_LOHI, PIT_COMMAND_BINARY,
    PIT_COMMAND_CHANNEL0, PIT_COMMAND_MODE_SQUARE, PIT_DEFAULT_FREQUENCY_HZ, PIT_IRQ_LINE, Port,
};
use keel_lib::io::PortIo;
use keel_lib::{InterruptFrame, cpu, klog_debug, klog_info};

use crate::hardware_ports;
use crate::irq;
use crate::vectors::NO_CONTEXT;

/// Channel 0, lobyte/hibyte, mode 3, binary (0x36).
pub const PIT_TICK_COMMAND: u8 =
    PIT_COMMAND_CHANNEL0 | PIT_COMMAND_ACCESS_LOHI | PIT_COMMAND_MODE_SQUARE | PIT_COMMAND_BINARY;

/// Counter-latch command for channel 0.
const PIT_LATCH_CHANNEL0: u8 = 0x00;

/// Wrapping tick counter. Written only by the IRQ0 handler.
pub struct TickCounter {
    ticks: AtomicU32,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    pub const fn starting_at(ticks: u32) -> Self {
        Self {
            ticks: AtomicU32::new(ticks),
        }
    }

    /// Advance by one, wrapping at 2^32.
    #[inline]
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    #[inline]
    pub fn elapsed_since(&self, start: u32) -> u32 {
        self.now().wrapping_sub(start)
    }

    /// Call `idle` until `ticks` ticks have passed. Modular subtraction keeps
    /// this correct across the 32-bit wrap.
    pub fn wait_ticks(&self, ticks: u32, mut idle: impl FnMut()) {
        if ticks == 0 {
            return;
        }
        let start = self.now();
        while self.elapsed_since(start) < ticks {
            idle();
        }
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

static TICKS: TickCounter = TickCounter::new();
static CURRENT_FREQUENCY_HZ: AtomicU32 = AtomicU32::new(0);
static CURRENT_RELOAD_DIVISOR: AtomicU32 = AtomicU32::new(0);

/// Channel divisor for `frequency_hz`, clamped to what the 16-bit counter
/// can express. Zero selects the default rate.
pub fn divisor_for(frequency_hz: u32) -> u16 {
    let frequency_hz = match frequency_hz {
        0 => PIT_DEFAULT_FREQUENCY_HZ,
        f => f.min(PIT_BASE_FREQUENCY_HZ),
    };
    (PIT_BASE_FREQUENCY_HZ / frequency_hz).clamp(1, 0xFFFF) as u16
}

/// Ticks needed to cover `ms` milliseconds at `frequency_hz`, rounded up.
pub fn ms_to_ticks(ms: u32, frequency_hz: u32) -> u32 {
    let ticks = (ms as u64 * frequency_hz as u64).div_ceil(1000);
    ticks.min(u32::MAX as u64) as u32
}

pub fn program_channel0<P: PortIo>(io: &mut P, divisor: u16) {
    io.outb(Port::PIT_COMMAND, PIT_TICK_COMMAND);
    io.outb(Port::PIT_CHANNEL0, (divisor & 0xFF) as u8);
    io.outb(Port::PIT_CHANNEL0, (divisor >> 8) as u8);
}

fn read_channel0_count<P: PortIo>(io: &mut P) -> u16 {
    io.outb(Port::PIT_COMMAND, PIT_LATCH_CHANNEL0);
    let low = io.inb(Port::PIT_CHANNEL0);
    let high = io.inb(Port::PIT_CHANNEL0);
    ((high as u16) << 8) | low as u16
}

fn timer_irq_handler(_frame: &mut InterruptFrame, _context: *mut core::ffi::c_void) {
    TICKS.tick();
}

pub fn pit_set_frequency(frequency_hz: u32) {
    let divisor = divisor_for(frequency_hz);
    let mut io = hardware_ports();
    program_channel0(&mut io, divisor);
    io.io_wait();

    let actual = PIT_BASE_FREQUENCY_HZ / divisor as u32;
    CURRENT_FREQUENCY_HZ.store(actual, Ordering::SeqCst);
    CURRENT_RELOAD_DIVISOR.store(divisor as u32, Ordering::SeqCst);
    klog_debug!("PIT: divisor {} -> {} Hz", divisor, actual);
}

/// Program channel 0 and hook IRQ0. Interrupts stay disabled; the tick
/// starts once the caller executes `sti`.
pub fn init_pit(frequency_hz: u32) -> Result<(), IrqError> {
    pit_set_frequency(frequency_hz);
    irq::irq_install_handler(PIT_IRQ_LINE, timer_irq_handler, NO_CONTEXT, "pit")?;
    klog_info!("PIT: {} Hz tick on IRQ{}", pit_frequency(), PIT_IRQ_LINE);
    Ok(())
}

pub fn pit_frequency() -> u32 {
    match CURRENT_FREQUENCY_HZ.load(Ordering::SeqCst) {
        0 => PIT_DEFAULT_FREQUENCY_HZ,
        f => f,
    }
}

#[inline]
pub fn ticks_now() -> u32 {
    TICKS.now()
}

pub fn uptime_ms() -> u64 {
    ticks_now() as u64 * 1000 / pit_frequency() as u64
}

/// Busy-wait without ever halting.
///
/// With interrupts enabled this spins on the tick counter. With interrupts
/// masked the counter is frozen, so the wait polls the channel 0 count
/// instead.
pub fn sleep_busy(ms: u32) {
    if ms == 0 {
        return;
    }
    if cpu::interrupts_enabled() {
        TICKS.wait_ticks(ms_to_ticks(ms, pit_frequency()), cpu::pause);
    } else {
        poll_delay_ms(ms);
    }
}

/// Sleep by halting between ticks. Needs IRQ0 unmasked; enables interrupts.
pub fn sleep_interrupt(ms: u32) {
    TICKS.wait_ticks(
        ms_to_ticks(ms, pit_frequency()),
        cpu::enable_interrupts_and_wait,
    );
}

/// Channel 0 count units covering `ms` milliseconds. Mode 3 decrements
/// the count by two per oscillator cycle.
pub fn countdown_units_for_ms(ms: u32) -> u64 {
    ms as u64 * PIT_BASE_FREQUENCY_HZ as u64 * 2 / 1000
}

/// Count units between two latched readings of a down-counter that
/// reloads to `reload` after reaching zero.
pub fn countdown_elapsed(last: u32, current: u32, reload: u32) -> u32 {
    if current <= last {
        last - current
    } else {
        last + reload.saturating_sub(current)
    }
}

fn poll_delay_ms(ms: u32) {
    let reload = match CURRENT_RELOAD_DIVISOR.load(Ordering::SeqCst) {
        0 => 0x1_0000,
        d => d,
    };
    let needed = countdown_units_for_ms(ms);
    let mut io = hardware_ports();
    let mut last = read_channel0_count(&mut io) as u32;
    let mut elapsed: u64 = 0;
    while elapsed < needed {
        let current = read_channel0_count(&mut io) as u32;
        elapsed += countdown_elapsed(last, current, reload) as u64;
        last = current;
        cpu::pause();
    }
}
