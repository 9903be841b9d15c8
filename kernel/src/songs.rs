//! Tunes for the PC speaker.

use keel_drivers::speaker::{Note, Song};

const C5: u32 = 523;
const D5: u32 = 587;
const E5: u32 = 659;
const F5: u32 = 698;
const G5: u32 = 784;
const A5: u32 = 880;
const G4: u32 = 392;
const C6: u32 = 1047;

const fn n(frequency_hz: u32, duration_ms: u32) -> Note {
    Note::new(frequency_hz, duration_ms)
}

const fn r(duration_ms: u32) -> Note {
    Note::rest(duration_ms)
}

static STARTUP_NOTES: [Note; 8] = [
    n(C5, 90),
    n(E5, 90),
    n(G5, 90),
    n(C6, 180),
    r(40),
    n(G5, 90),
    n(C6, 260),
    r(60),
];

/// Played once bring-up finishes.
pub static STARTUP_JINGLE: Song = Song {
    name: "startup",
    notes: &STARTUP_NOTES,
};

static OPENING_NOTES: [Note; 17] = [
    n(E5, 120),
    r(40),
    n(E5, 120),
    r(80),
    n(E5, 120),
    r(80),
    n(C5, 120),
    n(E5, 120),
    n(G5, 240),
    r(240),
    n(G4, 240),
    r(120),
    n(A5, 120),
    n(G5, 120),
    n(F5, 120),
    n(D5, 120),
    n(C5, 240),
];

pub static OPENING_THEME: Song = Song {
    name: "opening",
    notes: &OPENING_NOTES,
};

#[cfg(feature = "builtin-tests")]
static SHUTDOWN_NOTES: [Note; 5] = [n(A5, 120), n(F5, 120), n(D5, 120), n(C5, 300), r(60)];

/// Played by the test build before it exits QEMU.
#[cfg(feature = "builtin-tests")]
pub static SHUTDOWN_JINGLE: Song = Song {
    name: "shutdown",
    notes: &SHUTDOWN_NOTES,
};
