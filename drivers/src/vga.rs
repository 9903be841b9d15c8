//! 80x25 VGA text-mode terminal.

use core::fmt;
use core::ptr::NonNull;

use keel_abi::{Port, VGA_CRTC_CURSOR_HIGH, VGA_CRTC_CURSOR_LOW, VGA_TEXT_BUFFER};
use keel_lib::io::PortIo;
use spin::Mutex;

use crate::hardware_ports;

pub const VGA_WIDTH: usize = 80;
pub const VGA_HEIGHT: usize = 25;
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[inline]
pub const fn attribute(fg: Color, bg: Color) -> u8 {
    ((bg as u8) << 4) | (fg as u8)
}

#[inline]
const fn cell(ch: u8, attr: u8) -> u16 {
    ((attr as u16) << 8) | ch as u16
}

pub const DEFAULT_ATTRIBUTE: u8 = attribute(Color::LightGray, Color::Black);
pub const FATAL_ATTRIBUTE: u8 = attribute(Color::White, Color::Red);

/// Typed handle over the 80x25 cell array.
pub struct VgaBuffer {
    cells: NonNull<u16>,
}

// SAFETY: the buffer is memory-mapped device memory, not thread-local data.
unsafe impl Send for VgaBuffer {}

impl VgaBuffer {
    /// # Safety
    /// `cells` must point to `VGA_WIDTH * VGA_HEIGHT` writable `u16`s that
    /// stay valid for the lifetime of the handle.
    pub const unsafe fn from_raw(cells: NonNull<u16>) -> Self {
        Self { cells }
    }

    #[inline]
    fn index(x: usize, y: usize) -> Option<usize> {
        (x < VGA_WIDTH && y < VGA_HEIGHT).then_some(y * VGA_WIDTH + x)
    }

    /// Out-of-range coordinates are ignored.
    pub fn put_cell(&mut self, x: usize, y: usize, ch: u8, attr: u8) {
        if let Some(i) = Self::index(x, y) {
            // SAFETY: `i` is in bounds per the construction contract.
            unsafe { self.cells.as_ptr().add(i).write_volatile(cell(ch, attr)) }
        }
    }

    pub fn get_cell(&self, x: usize, y: usize) -> Option<(u8, u8)> {
        let i = Self::index(x, y)?;
        // SAFETY: as above.
        let raw = unsafe { self.cells.as_ptr().add(i).read_volatile() };
        Some((raw as u8, (raw >> 8) as u8))
    }

    fn copy_row(&mut self, from: usize, to: usize) {
        for x in 0..VGA_WIDTH {
            if let Some((ch, attr)) = self.get_cell(x, from) {
                self.put_cell(x, to, ch, attr);
            }
        }
    }

    fn fill_row(&mut self, y: usize, attr: u8) {
        for x in 0..VGA_WIDTH {
            self.put_cell(x, y, b' ', attr);
        }
    }
}

pub struct Terminal {
    buffer: VgaBuffer,
    col: usize,
    row: usize,
    attr: u8,
}

impl Terminal {
    pub const fn new(buffer: VgaBuffer) -> Self {
        Self {
            buffer,
            col: 0,
            row: 0,
            attr: DEFAULT_ATTRIBUTE,
        }
    }

    pub fn set_color(&mut self, fg: Color, bg: Color) {
        self.attr = attribute(fg, bg);
    }

    pub fn position(&self) -> (usize, usize) {
        (self.col, self.row)
    }

    pub fn cursor_offset(&self) -> u16 {
        (self.row * VGA_WIDTH + self.col) as u16
    }

    pub fn buffer(&self) -> &VgaBuffer {
        &self.buffer
    }

    pub fn clear(&mut self) {
        for y in 0..VGA_HEIGHT {
            self.buffer.fill_row(y, self.attr);
        }
        self.col = 0;
        self.row = 0;
    }

    fn scroll(&mut self) {
        for y in 1..VGA_HEIGHT {
            self.buffer.copy_row(y, y - 1);
        }
        self.buffer.fill_row(VGA_HEIGHT - 1, self.attr);
    }

    fn newline(&mut self) {
        self.col = 0;
        if self.row + 1 < VGA_HEIGHT {
            self.row += 1;
        } else {
            self.scroll();
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.newline(),
            b'\r' => self.col = 0,
            b'\t' => {
                let next = (self.col / TAB_WIDTH + 1) * TAB_WIDTH;
                while self.col < next.min(VGA_WIDTH) {
                    self.write_byte(b' ');
                }
            }
            0x08 => {
                if self.col > 0 {
                    self.col -= 1;
                    self.buffer.put_cell(self.col, self.row, b' ', self.attr);
                }
            }
            byte => {
                if self.col >= VGA_WIDTH {
                    self.newline();
                }
                // Non-printable bytes show as a filled block.
                let ch = if (0x20..0x7F).contains(&byte) { byte } else { 0xFE };
                self.buffer.put_cell(self.col, self.row, ch, self.attr);
                self.col += 1;
            }
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// Move the hardware cursor to the current position.
    pub fn sync_cursor<P: PortIo>(&self, io: &mut P) {
        let offset = self.cursor_offset().min((VGA_WIDTH * VGA_HEIGHT - 1) as u16);
        io.outb(Port::VGA_CRTC_INDEX, VGA_CRTC_CURSOR_HIGH);
        io.outb(Port::VGA_CRTC_DATA, (offset >> 8) as u8);
        io.outb(Port::VGA_CRTC_INDEX, VGA_CRTC_CURSOR_LOW);
        io.outb(Port::VGA_CRTC_DATA, (offset & 0xFF) as u8);
    }
}

impl fmt::Write for Terminal {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

const fn text_buffer() -> VgaBuffer {
    // SAFETY: 0xB8000 is identity mapped for the kernel's whole lifetime.
    unsafe { VgaBuffer::from_raw(NonNull::new_unchecked(VGA_TEXT_BUFFER as *mut u16)) }
}

pub static TERMINAL: Mutex<Terminal> = Mutex::new(Terminal::new(text_buffer()));

pub fn vga_clear() {
    let mut term = TERMINAL.lock();
    term.clear();
    term.sync_cursor(&mut hardware_ports());
}

pub fn vga_set_color(fg: Color, bg: Color) {
    TERMINAL.lock().set_color(fg, bg);
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    use fmt::Write;
    let mut term = TERMINAL.lock();
    let _ = term.write_fmt(args);
    term.sync_cursor(&mut hardware_ports());
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::vga::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::vga::_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

/// Paint `msg` white-on-red across row 0 without touching the terminal
/// lock, which may be held by the code that faulted.
pub fn write_fatal(msg: &str) {
    let mut buffer = text_buffer();
    write_fatal_to(&mut buffer, msg);
}

fn write_fatal_to(buffer: &mut VgaBuffer, msg: &str) {
    buffer.fill_row(0, FATAL_ATTRIBUTE);
    for (x, b) in msg.bytes().take(VGA_WIDTH).enumerate() {
        buffer.put_cell(x, 0, b, FATAL_ATTRIBUTE);
    }
}
