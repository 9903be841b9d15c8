use core::fmt::{self, Write};

use keel_drivers::serial::serial_emergency_write;
use keel_drivers::vga::{self, VGA_WIDTH};
use keel_lib::init_flag::StateFlag;
use keel_lib::{cpu, klog_error};

static PANIC_IN_PROGRESS: StateFlag = StateFlag::new();

/// Fixed-size single-line text buffer. Input beyond the capacity is
/// dropped, and line breaks become spaces.
pub struct LineBuffer {
    bytes: [u8; VGA_WIDTH],
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; VGA_WIDTH],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }

    pub fn is_full(&self) -> bool {
        self.len == self.bytes.len()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            let ch = if ch == '\n' || ch == '\r' { ' ' } else { ch };
            let width = ch.len_utf8();
            if self.len + width > self.bytes.len() {
                break;
            }
            ch.encode_utf8(&mut self.bytes[self.len..self.len + width]);
            self.len += width;
        }
        Ok(())
    }
}

fn log_register_snapshot() {
    klog_error!(
        "CR0={:08x} CR2={:08x} CR3={:08x} EFLAGS={:08x}",
        cpu::read_cr0(),
        cpu::read_cr2(),
        cpu::read_cr3(),
        cpu::read_eflags()
    );
}

/// Report a fatal error on serial and screen, then halt with interrupts
/// disabled. Never returns.
pub fn kernel_panic(message: &str) -> ! {
    kernel_panic_fmt(format_args!("{}", message))
}

pub fn kernel_panic_fmt(args: fmt::Arguments<'_>) -> ! {
    cpu::disable_interrupts();

    if !PANIC_IN_PROGRESS.enter() {
        serial_emergency_write("\nKERNEL PANIC while panicking; halting\n");
        cpu::halt_loop();
    }

    let mut line = LineBuffer::new();
    let _ = write!(line, "KERNEL PANIC: {}", args);

    serial_emergency_write("\n=== KERNEL PANIC ===\n");
    serial_emergency_write(line.as_str());
    serial_emergency_write("\n");
    log_register_snapshot();
    serial_emergency_write("System halted.\n");

    vga::write_fatal(line.as_str());
    cpu::halt_loop()
}
