//! PS/2 set-1 keyboard: scancode decoding and the character ring.
//!
//! IRQ1 is the only producer of [`CHAR_BUFFER`]; the foreground drains it
//! through [`poll_char`] and [`try_read`].

use core::sync::atomic::{AtomicU32, Ordering};

use keel_abi::{IrqError, KEYBOARD_IRQ_LINE, PS2_STATUS_OUTPUT_FULL, Port};
use keel_lib::io::PortIo;
use keel_lib::{InterruptFrame, IrqCell, RingBuffer, klog_debug, klog_info, klog_trace};

use crate::hardware_ports;
use crate::irq;
use crate::vectors::NO_CONTEXT;

pub const KEYBOARD_BUFFER_SIZE: usize = 256;

const SCANCODE_EXTENDED_PREFIX: u8 = 0xE0;
const SCANCODE_BREAK_BIT: u8 = 0x80;

const KEY_ESCAPE: u8 = 0x01;
const KEY_BACKSPACE: u8 = 0x0E;
const KEY_TAB: u8 = 0x0F;
const KEY_ENTER: u8 = 0x1C;
const KEY_CTRL: u8 = 0x1D;
const KEY_LEFT_SHIFT: u8 = 0x2A;
const KEY_RIGHT_SHIFT: u8 = 0x36;
const KEY_ALT: u8 = 0x38;
const KEY_SPACE: u8 = 0x39;
const KEY_CAPS_LOCK: u8 = 0x3A;

const SCANCODE_PLAIN: [u8; 0x80] = [
    0x00, 0x00, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x00, 0x00,
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', 0x00, 0x00, b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0x00, b'\\', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0x00, b'*', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, b'7', b'8', b'9', b'-', b'4', b'5', b'6', b'+', b'1',
    b'2', b'3', b'0', b'.', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const SCANCODE_SHIFTED: [u8; 0x80] = [
    0x00, 0x00, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x00, 0x00,
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', 0x00, 0x00, b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0x00, b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0x00, b'*', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, b'7', b'8', b'9', b'-', b'4', b'5', b'6', b'+', b'1',
    b'2', b'3', b'0', b'.', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub shift_left: bool,
    pub shift_right: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub caps_lock: bool,
}

impl ModifierState {
    pub const fn new() -> Self {
        Self {
            shift_left: false,
            shift_right: false,
            ctrl: false,
            alt: false,
            caps_lock: false,
        }
    }

    #[inline]
    pub const fn shift(&self) -> bool {
        self.shift_left || self.shift_right
    }
}

#[inline(always)]
fn is_break_code(scancode: u8) -> bool {
    scancode & SCANCODE_BREAK_BIT != 0
}

#[inline(always)]
fn make_code(scancode: u8) -> u8 {
    scancode & !SCANCODE_BREAK_BIT
}

/// Scancode state machine. Feed it raw bytes from port 0x60.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScancodeDecoder {
    modifiers: ModifierState,
    extended: bool,
}

impl ScancodeDecoder {
    pub const fn new() -> Self {
        Self {
            modifiers: ModifierState::new(),
            extended: false,
        }
    }

    pub fn modifiers(&self) -> ModifierState {
        self.modifiers
    }

    pub fn set_modifiers(&mut self, modifiers: ModifierState) {
        self.modifiers = modifiers;
    }

    /// Consume one byte and return the character it produces, if any.
    pub fn feed(&mut self, scancode: u8) -> Option<u8> {
        if scancode == SCANCODE_EXTENDED_PREFIX {
            self.extended = true;
            return None;
        }
        let extended = core::mem::take(&mut self.extended);
        let pressed = !is_break_code(scancode);
        let code = make_code(scancode);

        if self.update_modifier(code, pressed, extended) {
            return None;
        }
        // Cursor and navigation keys have no character form.
        if !pressed || extended {
            return None;
        }
        self.translate(code)
    }

    fn update_modifier(&mut self, code: u8, pressed: bool, extended: bool) -> bool {
        let mods = &mut self.modifiers;
        match code {
            // E0 2A / E0 AA are fake shifts emitted around extended keys.
            KEY_LEFT_SHIFT | KEY_RIGHT_SHIFT if extended => {}
            KEY_LEFT_SHIFT => mods.shift_left = pressed,
            KEY_RIGHT_SHIFT => mods.shift_right = pressed,
            KEY_CTRL => mods.ctrl = pressed,
            KEY_ALT => mods.alt = pressed,
            KEY_CAPS_LOCK => {
                if pressed {
                    mods.caps_lock = !mods.caps_lock;
                }
            }
            _ => return false,
        }
        true
    }

    fn translate(&self, code: u8) -> Option<u8> {
        match code {
            KEY_ENTER => return Some(b'\n'),
            KEY_BACKSPACE => return Some(0x08),
            KEY_TAB => return Some(b'\t'),
            KEY_ESCAPE => return Some(0x1B),
            KEY_SPACE => return Some(b' '),
            _ => {}
        }
        let base = *SCANCODE_PLAIN.get(code as usize)?;
        if base == 0 {
            return None;
        }
        if base.is_ascii_lowercase() {
            let upper = self.modifiers.shift() || self.modifiers.caps_lock;
            return Some(if upper { base.to_ascii_uppercase() } else { base });
        }
        if self.modifiers.shift() {
            let shifted = SCANCODE_SHIFTED[code as usize];
            if shifted != 0 {
                return Some(shifted);
            }
        }
        Some(base)
    }
}

static DECODER: IrqCell<ScancodeDecoder> = IrqCell::new(ScancodeDecoder::new());
static CHAR_BUFFER: RingBuffer<KEYBOARD_BUFFER_SIZE> = RingBuffer::new();
static DROPPED: AtomicU32 = AtomicU32::new(0);

/// Decode `scancode` and queue its character. A full buffer drops the byte.
pub fn handle_scancode(scancode: u8) {
    let decoded = DECODER.with(|decoder| decoder.feed(scancode));
    klog_trace!("KBD: scancode 0x{:02x} -> {:?}", scancode, decoded);
    if let Some(byte) = decoded {
        if !CHAR_BUFFER.push(byte) {
            DROPPED.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Read the data port if the controller reports a pending byte.
pub fn read_scancode<P: PortIo>(io: &mut P) -> Option<u8> {
    if io.inb(Port::PS2_STATUS) & PS2_STATUS_OUTPUT_FULL == 0 {
        return None;
    }
    Some(io.inb(Port::PS2_DATA))
}

fn keyboard_irq_handler(_frame: &mut InterruptFrame, _context: *mut core::ffi::c_void) {
    if let Some(scancode) = read_scancode(&mut hardware_ports()) {
        handle_scancode(scancode);
    }
}

pub fn poll_char() -> Option<u8> {
    CHAR_BUFFER.pop()
}

/// Move up to `out.len()` queued characters into `out`.
pub fn try_read(out: &mut [u8]) -> usize {
    CHAR_BUFFER.pop_into(out)
}

pub fn keyboard_has_input() -> bool {
    !CHAR_BUFFER.is_empty()
}

pub fn keyboard_modifiers() -> ModifierState {
    DECODER.with(|decoder| decoder.modifiers())
}

pub fn keyboard_set_modifiers(modifiers: ModifierState) {
    DECODER.with(|decoder| decoder.set_modifiers(modifiers));
}

/// Characters lost to a full buffer since boot.
pub fn keyboard_dropped() -> u32 {
    DROPPED.load(Ordering::Relaxed)
}

/// Drain stale controller output, reset decoder state and hook IRQ1.
pub fn init_keyboard() -> Result<(), IrqError> {
    let mut io = hardware_ports();
    let mut flushed = 0;
    while read_scancode(&mut io).is_some() && flushed < 16 {
        flushed += 1;
    }
    if flushed > 0 {
        klog_debug!("KBD: flushed {} stale bytes", flushed);
    }

    DECODER.with(|decoder| *decoder = ScancodeDecoder::new());
    CHAR_BUFFER.clear();
    irq::irq_install_handler(KEYBOARD_IRQ_LINE, keyboard_irq_handler, NO_CONTEXT, "keyboard")?;
    klog_info!("KBD: PS/2 keyboard on IRQ{}", KEYBOARD_IRQ_LINE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use keel_lib::io::mock::RecordingPorts;

    use super::*;

    fn decode(decoder: &mut ScancodeDecoder, bytes: &[u8]) -> Vec<u8> {
        bytes.iter().filter_map(|&b| decoder.feed(b)).collect()
    }

    #[test]
    fn make_code_a_with_and_without_shift() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(decoder.feed(0x1E), Some(b'a'));

        decoder.set_modifiers(ModifierState {
            shift_left: true,
            ..ModifierState::new()
        });
        assert_eq!(decoder.feed(0x1E), Some(b'A'));
    }

    #[test]
    fn shift_press_and_release() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(decode(&mut decoder, &[0x2A, 0x10, 0xAA, 0x10]), b"Qq");
        assert!(!decoder.modifiers().shift());
    }

    #[test]
    fn caps_lock_affects_letters_only() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(decode(&mut decoder, &[0x3A, 0xBA, 0x1E, 0x02]), b"A1");
        // Caps and shift together still give upper case.
        assert_eq!(decode(&mut decoder, &[0x36, 0x1E, 0x02, 0xB6]), b"A!");
        assert_eq!(decode(&mut decoder, &[0x3A, 0xBA, 0x1E]), b"a");
    }

    #[test]
    fn special_keys_and_break_codes() {
        let mut decoder = ScancodeDecoder::new();
        assert_eq!(
            decode(&mut decoder, &[0x1C, 0x0E, 0x0F, 0x01, 0x39, 0x9C, 0x9E]),
            b"\n\x08\t\x1b "
        );
    }

    #[test]
    fn extended_keys_produce_nothing() {
        let mut decoder = ScancodeDecoder::new();
        // Up arrow make/break, then right ctrl press.
        assert_eq!(decode(&mut decoder, &[0xE0, 0x48, 0xE0, 0xC8, 0xE0, 0x1D]), b"");
        assert!(decoder.modifiers().ctrl);
        // Fake shift around an extended key is ignored.
        assert_eq!(decode(&mut decoder, &[0xE0, 0x2A, 0x1E]), b"a");
    }

    #[test]
    fn ctrl_and_alt_are_tracked() {
        let mut decoder = ScancodeDecoder::new();
        decode(&mut decoder, &[0x1D, 0x38]);
        assert!(decoder.modifiers().ctrl && decoder.modifiers().alt);
        decode(&mut decoder, &[0x9D, 0xB8]);
        assert_eq!(decoder.modifiers(), ModifierState::new());
    }

    #[test]
    fn status_bit_gates_data_read() {
        let mut io = RecordingPorts::new();
        io.push_input(Port::PS2_STATUS, 0x00);
        assert_eq!(read_scancode(&mut io), None);

        io.push_input(Port::PS2_STATUS, PS2_STATUS_OUTPUT_FULL);
        io.push_input(Port::PS2_DATA, 0x1E);
        assert_eq!(read_scancode(&mut io), Some(0x1E));
    }

    #[test]
    fn irq_path_fills_buffer_and_drops_on_overflow() {
        // The only test touching the global decoder and ring.
        for &b in &[0x2A, 0x10, 0xAA, 0x10] {
            handle_scancode(b);
        }
        assert_eq!(poll_char(), Some(b'Q'));
        assert!(keyboard_has_input());

        let capacity = CHAR_BUFFER.capacity();
        for _ in 0..capacity + 3 {
            handle_scancode(0x1E);
        }
        assert_eq!(keyboard_dropped(), 4);

        let mut out = [0u8; 8];
        assert_eq!(try_read(&mut out[..1]), 1);
        assert_eq!(out[0], b'q');
        let mut rest = vec![0u8; KEYBOARD_BUFFER_SIZE];
        assert_eq!(try_read(&mut rest), capacity - 1);
        assert_eq!(poll_char(), None);
    }
}
