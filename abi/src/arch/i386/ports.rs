//! Legacy PC I/O port addresses and the device register bits behind them.
//!
//! `Port` keeps the raw numbers grouped by device so that drivers never
//! spell a bare `u16` for a port.

/// x86 I/O port address.
///
/// Ports are accessed via IN/OUT instructions. This newtype groups all
/// known port addresses and prevents accidentally using other u16 values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Port(pub u16);

impl Port {
    // =========================================================================
    // Legacy PIC (8259A pair)
    // =========================================================================

    /// Master PIC command port.
    pub const PIC1_COMMAND: Self = Self(0x20);

    /// Master PIC data (mask) port.
    pub const PIC1_DATA: Self = Self(0x21);

    /// Slave PIC command port.
    pub const PIC2_COMMAND: Self = Self(0xA0);

    /// Slave PIC data (mask) port.
    pub const PIC2_DATA: Self = Self(0xA1);

    // =========================================================================
    // Programmable Interval Timer (8253/8254)
    // =========================================================================

    /// PIT channel 0 data port (system tick).
    pub const PIT_CHANNEL0: Self = Self(0x40);

    /// PIT channel 2 data port (PC speaker).
    pub const PIT_CHANNEL2: Self = Self(0x42);

    /// PIT command/mode register.
    pub const PIT_COMMAND: Self = Self(0x43);

    // =========================================================================
    // PS/2 controller (8042) and speaker gate
    // =========================================================================

    /// PS/2 data port.
    pub const PS2_DATA: Self = Self(0x60);

    /// Keyboard controller port B; bits 0-1 gate the PC speaker.
    pub const SPEAKER_GATE: Self = Self(0x61);

    /// PS/2 status port (read) / command port (write).
    pub const PS2_STATUS: Self = Self(0x64);

    // =========================================================================
    // VGA
    // =========================================================================

    /// CRT controller index register.
    pub const VGA_CRTC_INDEX: Self = Self(0x3D4);

    /// CRT controller data register.
    pub const VGA_CRTC_DATA: Self = Self(0x3D5);

    // =========================================================================
    // Serial (8250/16550 UART)
    // =========================================================================

    /// COM1 serial port base address.
    pub const COM1: Self = Self(0x3F8);

    // =========================================================================
    // Misc
    // =========================================================================

    /// POST diagnostic port, written to burn roughly one microsecond.
    pub const IO_DELAY: Self = Self(0x80);

    /// QEMU `isa-debug-exit` device.
    pub const QEMU_DEBUG_EXIT: Self = Self(0xF4);

    /// Get the raw port number for IN/OUT instructions.
    #[inline]
    pub const fn number(self) -> u16 {
        self.0
    }

    /// Create an offset port (e.g., COM1 + register offset).
    #[inline]
    pub const fn offset(self, off: u16) -> Self {
        Self(self.0 + off)
    }
}

// =============================================================================
// PIC
// =============================================================================

/// ICW1: initialization, ICW4 will follow.
pub const PIC_ICW1_INIT_ICW4: u8 = 0x11;
/// ICW3 for the master: a slave sits on IR2.
pub const PIC_ICW3_MASTER_HAS_SLAVE_ON_IR2: u8 = 0x04;
/// ICW3 for the slave: cascade identity 2.
pub const PIC_ICW3_SLAVE_CASCADE_ID: u8 = 0x02;
/// ICW4: 8086/88 mode.
pub const PIC_ICW4_8086: u8 = 0x01;
/// Non-specific End of Interrupt.
pub const PIC_EOI: u8 = 0x20;
/// OCW3: next read of the command port returns the in-service register.
pub const PIC_OCW3_READ_ISR: u8 = 0x0B;
/// Master IRQ line the slave is cascaded on.
pub const PIC_CASCADE_IRQ: u8 = 2;

// =============================================================================
// PIT
// =============================================================================

/// PIT input clock (Hz).
pub const PIT_BASE_FREQUENCY_HZ: u32 = 1_193_180;

/// System tick rate (Hz).
pub const PIT_DEFAULT_FREQUENCY_HZ: u32 = 1000;

/// Select channel 0 (PIT command).
pub const PIT_COMMAND_CHANNEL0: u8 = 0x00;
/// Select channel 2 (PIT command).
pub const PIT_COMMAND_CHANNEL2: u8 = 0x80;
/// Access mode: low byte then high byte (PIT command).
pub const PIT_COMMAND_ACCESS_LOHI: u8 = 0x30;
/// Operating mode 3: square wave generator (PIT command).
pub const PIT_COMMAND_MODE_SQUARE: u8 = 0x06;
/// Binary counting mode (PIT command).
pub const PIT_COMMAND_BINARY: u8 = 0x00;

/// PIT is connected to legacy IRQ 0.
pub const PIT_IRQ_LINE: u8 = 0;

/// Speaker gate bits in port 0x61: timer 2 gate and speaker data enable.
pub const SPEAKER_GATE_MASK: u8 = 0x03;

// =============================================================================
// PS/2
// =============================================================================

/// Output buffer full (status register).
pub const PS2_STATUS_OUTPUT_FULL: u8 = 0x01;

/// The keyboard is connected to legacy IRQ 1.
pub const KEYBOARD_IRQ_LINE: u8 = 1;

// =============================================================================
// UART Register Offsets (relative to COMx base)
// =============================================================================

/// Transmitter Holding Register (write) / Receiver Buffer Register (read).
pub const UART_REG_DATA: u16 = 0;
/// Interrupt Enable Register; divisor high byte while DLAB is set.
pub const UART_REG_IER: u16 = 1;
/// FIFO Control Register (write).
pub const UART_REG_FCR: u16 = 2;
/// Line Control Register.
pub const UART_REG_LCR: u16 = 3;
/// Modem Control Register.
pub const UART_REG_MCR: u16 = 4;
/// Line Status Register.
pub const UART_REG_LSR: u16 = 5;

/// Divisor Latch Access Bit (LCR).
pub const UART_LCR_DLAB: u8 = 0x80;
/// 8 data bits, no parity, one stop bit (LCR).
pub const UART_LCR_8N1: u8 = 0x03;
/// Enable and clear both FIFOs, 14-byte threshold (FCR).
pub const UART_FCR_ENABLE_CLEAR_14: u8 = 0xC7;
/// DTR | RTS | OUT2 (MCR).
pub const UART_MCR_DTR_RTS_OUT2: u8 = 0x0B;
/// Transmitter holding register empty (LSR).
pub const UART_LSR_TX_EMPTY: u8 = 0x20;
/// 115200 / 38400.
pub const UART_DIVISOR_38400: u16 = 3;

// =============================================================================
// VGA CRTC
// =============================================================================

/// Cursor location high byte register index.
pub const VGA_CRTC_CURSOR_HIGH: u8 = 0x0E;
/// Cursor location low byte register index.
pub const VGA_CRTC_CURSOR_LOW: u8 = 0x0F;
