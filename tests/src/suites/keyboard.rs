//! Key echo through the live IRQ1 path.
//!
//! The 8042 "write keyboard output buffer" command (0xD2) makes the
//! controller present a byte as if the keyboard had sent it, raising IRQ1.
//! Controllers that ignore the command leave the suite skipped.

use keel_abi::Port;
use keel_drivers::keyboard::{self, ModifierState};
use keel_drivers::pit;
use keel_lib::io::{HardwarePorts, PortIo};
use keel_lib::testing::TestResult;
use keel_lib::{define_test_suite, ensure, pass};

const PS2_STATUS_INPUT_FULL: u8 = 0x02;
const PS2_CMD_WRITE_KEYBOARD_OUTPUT: u8 = 0xD2;
const INJECT_TIMEOUT_MS: u32 = 20;

fn ports() -> HardwarePorts {
    // SAFETY: single CPU at CPL 0; the keyboard IRQ handler only reads.
    unsafe { HardwarePorts::new() }
}

fn wait_input_clear(io: &mut HardwarePorts) -> bool {
    for _ in 0..10_000 {
        if io.inb(Port::PS2_STATUS) & PS2_STATUS_INPUT_FULL == 0 {
            return true;
        }
        io.io_wait();
    }
    false
}

/// Feed `codes` through the controller and collect what the IRQ handler
/// queued. `None` if the controller did not cooperate.
fn inject(codes: &[u8], out: &mut [u8]) -> Option<usize> {
    let mut io = ports();
    let before = keel_drivers::irq::irq_get_stats(1)?.count;
    for &code in codes {
        if !wait_input_clear(&mut io) {
            return None;
        }
        io.outb(Port::PS2_STATUS, PS2_CMD_WRITE_KEYBOARD_OUTPUT);
        if !wait_input_clear(&mut io) {
            return None;
        }
        io.outb(Port::PS2_DATA, code);
        pit::sleep_interrupt(2);
    }
    let deadline = pit::ticks_now().wrapping_add(INJECT_TIMEOUT_MS);
    while keel_drivers::irq::irq_get_stats(1)?.count.wrapping_sub(before) < codes.len() as u32 {
        if pit::ticks_now().wrapping_sub(deadline) < u32::MAX / 2 {
            return None;
        }
        pit::sleep_interrupt(1);
    }
    Some(keyboard::try_read(out))
}

fn drain() {
    while keyboard::poll_char().is_some() {}
}

fn test_make_code_echoes_lowercase_a() -> TestResult {
    drain();
    keyboard::keyboard_set_modifiers(ModifierState::default());
    let mut out = [0u8; 4];
    let Some(n) = inject(&[0x1E, 0x9E], &mut out) else {
        return TestResult::Skipped;
    };
    ensure!(&out[..n] == b"a", "got {:?}", &out[..n]);
    pass!()
}

fn test_shift_modifier_gives_uppercase_a() -> TestResult {
    drain();
    keyboard::keyboard_set_modifiers(ModifierState {
        shift_left: true,
        ..ModifierState::default()
    });
    let mut out = [0u8; 4];
    let result = inject(&[0x1E, 0x9E], &mut out);
    keyboard::keyboard_set_modifiers(ModifierState::default());
    let Some(n) = result else {
        return TestResult::Skipped;
    };
    ensure!(&out[..n] == b"A", "got {:?}", &out[..n]);
    pass!()
}

fn test_shift_press_release_sequence() -> TestResult {
    drain();
    keyboard::keyboard_set_modifiers(ModifierState::default());
    let mut out = [0u8; 4];
    let Some(n) = inject(&[0x2A, 0x10, 0xAA, 0x10], &mut out) else {
        return TestResult::Skipped;
    };
    ensure!(&out[..n] == b"Qq", "got {:?}", &out[..n]);
    ensure!(!keyboard::keyboard_modifiers().shift());
    pass!()
}

fn test_decoder_path_without_controller() -> TestResult {
    drain();
    keyboard::keyboard_set_modifiers(ModifierState::default());
    for code in [0x2A, 0x10, 0xAA, 0x10, 0x1C] {
        keyboard::handle_scancode(code);
    }
    let mut out = [0u8; 4];
    let n = keyboard::try_read(&mut out);
    ensure!(&out[..n] == b"Qq\n", "got {:?}", &out[..n]);
    pass!()
}

define_test_suite!(keyboard, [
    test_make_code_echoes_lowercase_a,
    test_shift_modifier_gives_uppercase_a,
    test_shift_press_release_sequence,
    test_decoder_path_without_controller,
]);
