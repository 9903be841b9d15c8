//! PC speaker driven from PIT channel 2.

use keel_abi::{
    PIT_BASE_FREQUENCY_HZ, PIT_COMMAND_ACCESS_LOHI, PIT_COMMAND_BINARY, PIT_COMMAND_CHANNEL2,
    PIT_COMMAND_MODE_SQUARE, Port, SPEAKER_GATE_MASK,
};
use keel_lib::io::PortIo;
use keel_lib::klog_debug;

use crate::hardware_ports;
use crate::pit;

/// Channel 2, lobyte/hibyte, mode 3, binary (0xB6).
pub const SPEAKER_TONE_COMMAND: u8 =
    PIT_COMMAND_CHANNEL2 | PIT_COMMAND_ACCESS_LOHI | PIT_COMMAND_MODE_SQUARE | PIT_COMMAND_BINARY;

/// Start a square wave at `frequency_hz`. Zero silences the speaker.
pub fn play_tone<P: PortIo>(io: &mut P, frequency_hz: u32) {
    if frequency_hz == 0 {
        stop_tone(io);
        return;
    }
    let divisor = (PIT_BASE_FREQUENCY_HZ / frequency_hz).clamp(1, 0xFFFF);
    io.outb(Port::PIT_COMMAND, SPEAKER_TONE_COMMAND);
    io.outb(Port::PIT_CHANNEL2, (divisor & 0xFF) as u8);
    io.outb(Port::PIT_CHANNEL2, (divisor >> 8) as u8);

    let gate = io.inb(Port::SPEAKER_GATE);
    if gate & SPEAKER_GATE_MASK != SPEAKER_GATE_MASK {
        io.outb(Port::SPEAKER_GATE, gate | SPEAKER_GATE_MASK);
    }
}

pub fn stop_tone<P: PortIo>(io: &mut P) {
    let gate = io.inb(Port::SPEAKER_GATE);
    io.outb(Port::SPEAKER_GATE, gate & !SPEAKER_GATE_MASK);
}

pub fn speaker_play(frequency_hz: u32) {
    play_tone(&mut hardware_ports(), frequency_hz);
}

pub fn speaker_stop() {
    stop_tone(&mut hardware_ports());
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Note {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

impl Note {
    pub const fn new(frequency_hz: u32, duration_ms: u32) -> Self {
        Self {
            frequency_hz,
            duration_ms,
        }
    }

    pub const fn rest(duration_ms: u32) -> Self {
        Self::new(0, duration_ms)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Song {
    pub name: &'static str,
    pub notes: &'static [Note],
}

impl Song {
    pub fn duration_ms(&self) -> u32 {
        self.notes.iter().map(|n| n.duration_ms).sum()
    }
}

/// Play each note for its duration, silencing the speaker between notes.
/// `sleep` receives each duration in milliseconds.
pub fn play_notes<P: PortIo>(io: &mut P, notes: &[Note], mut sleep: impl FnMut(u32)) {
    for note in notes {
        play_tone(io, note.frequency_hz);
        sleep(note.duration_ms);
        stop_tone(io);
    }
}

/// Play `song` on the speaker. Needs the PIT tick running.
pub fn play_song(song: &Song) {
    klog_debug!("speaker: playing '{}' ({} ms)", song.name, song.duration_ms());
    play_notes(&mut hardware_ports(), song.notes, pit::sleep_interrupt);
}
