use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use keel_abi::{Port, UART_LSR_TX_EMPTY, UART_REG_LSR};

use crate::init_flag::InitFlag;
use crate::io;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KlogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl KlogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => KlogLevel::Error,
            1 => KlogLevel::Warn,
            2 => KlogLevel::Info,
            3 => KlogLevel::Debug,
            _ => KlogLevel::Trace,
        }
    }

    /// Parse the value of a `klog=` boot argument.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "error" => Some(KlogLevel::Error),
            "warn" => Some(KlogLevel::Warn),
            "info" => Some(KlogLevel::Info),
            "debug" => Some(KlogLevel::Debug),
            "trace" => Some(KlogLevel::Trace),
            _ => None,
        }
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(KlogLevel::Info as u8);
static SERIAL_READY: InitFlag = InitFlag::new();

/// Bounded wait for the transmitter; a wedged UART must not hang the kernel.
const TX_SPIN_LIMIT: u32 = 100_000;

#[inline(always)]
fn is_enabled(level: KlogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

#[inline(always)]
fn putc(byte: u8) {
    if !SERIAL_READY.is_set_relaxed() {
        return;
    }
    let lsr = Port::COM1.offset(UART_REG_LSR).number();
    unsafe {
        for _ in 0..TX_SPIN_LIMIT {
            if io::inb(lsr) & UART_LSR_TX_EMPTY != 0 {
                break;
            }
            core::hint::spin_loop();
        }
        io::outb(Port::COM1.number(), byte);
    }
}

fn write_bytes(bytes: &[u8]) {
    for &b in bytes {
        if b == b'\n' {
            putc(b'\r');
        }
        putc(b);
    }
}

pub fn log_args(level: KlogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    let _ = fmt::write(&mut KlogWriter, args);
    write_bytes(b"\n");
}

/// `fmt::Write` adapter over the serial sink, for callers that format
/// multi-part lines themselves.
pub struct KlogWriter;

impl fmt::Write for KlogWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_bytes(s.as_bytes());
        Ok(())
    }
}

/// Start routing log output to COM1. Called by the serial driver once the
/// UART is programmed.
pub fn klog_attach_serial() {
    SERIAL_READY.mark_set();
}

pub fn klog_serial_attached() -> bool {
    SERIAL_READY.is_set()
}

pub fn klog_set_level(level: KlogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn klog_get_level() -> KlogLevel {
    KlogLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}

#[macro_export]
macro_rules! klog_error {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_warn {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_info {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_debug {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_trace {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Trace, ::core::format_args!($($arg)*))
    };
}
