use core::fmt::{self, Write};

use keel_abi::{
    Port, UART_DIVISOR_38400, UART_FCR_ENABLE_CLEAR_14, UART_LCR_8N1, UART_LCR_DLAB,
    UART_LSR_TX_EMPTY, UART_MCR_DTR_RTS_OUT2, UART_REG_DATA, UART_REG_FCR, UART_REG_IER,
    UART_REG_LCR, UART_REG_LSR, UART_REG_MCR,
};
use keel_lib::io::PortIo;
use keel_lib::klog::klog_attach_serial;
use keel_lib::klog_info;
use spin::Mutex;

use crate::hardware_ports;

const UART_REG_SCRATCH: u16 = 7;
const SCRATCH_PROBE: u8 = 0xAE;
const TX_SPIN_LIMIT: u32 = 100_000;

/// Program a 16550 at `base` for 38400 baud 8N1 with FIFOs enabled and
/// interrupts off.
pub fn configure_uart<P: PortIo>(io: &mut P, base: Port) {
    io.outb(base.offset(UART_REG_IER), 0x00);
    io.outb(base.offset(UART_REG_LCR), UART_LCR_DLAB);
    io.outb(base.offset(UART_REG_DATA), (UART_DIVISOR_38400 & 0xFF) as u8);
    io.outb(base.offset(UART_REG_IER), (UART_DIVISOR_38400 >> 8) as u8);
    io.outb(base.offset(UART_REG_LCR), UART_LCR_8N1);
    io.outb(base.offset(UART_REG_FCR), UART_FCR_ENABLE_CLEAR_14);
    io.outb(base.offset(UART_REG_MCR), UART_MCR_DTR_RTS_OUT2);
}

/// A floating bus reads back 0xFF, so a scratch-register echo tells us
/// whether a UART answers at `base`.
pub fn probe_uart<P: PortIo>(io: &mut P, base: Port) -> bool {
    io.outb(base.offset(UART_REG_SCRATCH), SCRATCH_PROBE);
    io.inb(base.offset(UART_REG_SCRATCH)) == SCRATCH_PROBE
}

pub struct SerialPort<P: PortIo> {
    io: P,
    base: Port,
}

impl<P: PortIo> SerialPort<P> {
    pub const fn new(io: P, base: Port) -> Self {
        Self { io, base }
    }

    pub fn init(&mut self) -> bool {
        if !probe_uart(&mut self.io, self.base) {
            return false;
        }
        configure_uart(&mut self.io, self.base);
        true
    }

    pub fn write_byte(&mut self, byte: u8) {
        let lsr = self.base.offset(UART_REG_LSR);
        for _ in 0..TX_SPIN_LIMIT {
            if self.io.inb(lsr) & UART_LSR_TX_EMPTY != 0 {
                break;
            }
            core::hint::spin_loop();
        }
        self.io.outb(self.base.offset(UART_REG_DATA), byte);
    }
}

impl<P: PortIo> Write for SerialPort<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(b);
        }
        Ok(())
    }
}

// SAFETY: constructing the port handle is sound; all access goes through
// the mutex.
static SERIAL: Mutex<SerialPort<keel_lib::io::HardwarePorts>> =
    Mutex::new(SerialPort::new(unsafe { keel_lib::io::HardwarePorts::new() }, Port::COM1));

/// Bring up COM1 and route kernel logging to it. Returns `false` when no
/// UART answers; logging then stays silent.
pub fn init_serial() -> bool {
    let present = SERIAL.lock().init();
    if present {
        klog_attach_serial();
        klog_info!("serial: COM1 at 38400 8N1");
    }
    present
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    let _ = SERIAL.lock().write_fmt(args);
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! serial_println {
    () => {
        $crate::serial_print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

/// Write to COM1 without taking the port lock. Panic path only.
pub fn serial_emergency_write(s: &str) {
    let mut port = SerialPort::new(hardware_ports(), Port::COM1);
    let _ = port.write_str(s);
}
