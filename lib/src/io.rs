//! x86 I/O port access.
//!
//! Two layers:
//! - raw `outb`/`inb`/`outw`/`inw`/`io_wait` instructions,
//! - the `PortIo` trait that drivers are written against, implemented by
//!   [`HardwarePorts`] in the kernel and by `mock::RecordingPorts` in tests.
//!
//! None of the asm blocks use `nomem`: port writes have memory-visible side
//! effects (DMA, EOI) and must not be reordered around surrounding accesses.

use core::arch::asm;

use keel_abi::Port as PortNumber;

#[inline(always)]
pub unsafe fn outb(port: u16, value: u8) {
    unsafe {
        asm!("out dx, al", in("dx") port, in("al") value, options(nostack, preserves_flags));
    }
}

#[inline(always)]
pub unsafe fn inb(port: u16) -> u8 {
    let value: u8;
    unsafe {
        asm!("in al, dx", out("al") value, in("dx") port, options(nostack, preserves_flags));
    }
    value
}

#[inline(always)]
pub unsafe fn outw(port: u16, value: u16) {
    unsafe {
        asm!("out dx, ax", in("dx") port, in("ax") value, options(nostack, preserves_flags));
    }
}

#[inline(always)]
pub unsafe fn inw(port: u16) -> u16 {
    let value: u16;
    unsafe {
        asm!("in ax, dx", out("ax") value, in("dx") port, options(nostack, preserves_flags));
    }
    value
}

/// I/O delay via port 0x80 (POST diagnostic port).
///
/// # Safety
/// Should only be called in contexts where port I/O is appropriate.
#[inline(always)]
pub unsafe fn io_wait() {
    unsafe { outb(PortNumber::IO_DELAY.number(), 0) }
}

/// Port access as seen by device drivers.
///
/// The unsafety of port I/O is discharged once, when the implementor is
/// constructed, so driver logic can be plain safe code.
pub trait PortIo {
    fn outb(&mut self, port: PortNumber, value: u8);
    fn inb(&mut self, port: PortNumber) -> u8;
    fn outw(&mut self, port: PortNumber, value: u16);
    fn inw(&mut self, port: PortNumber) -> u16;

    /// ~1 µs delay between writes to slow legacy devices.
    fn io_wait(&mut self) {
        self.outb(PortNumber::IO_DELAY, 0);
    }
}

/// The real I/O address space.
#[derive(Debug)]
pub struct HardwarePorts {
    _private: (),
}

impl HardwarePorts {
    /// # Safety
    /// The caller must run at CPL 0 and must own the devices it touches
    /// through this handle for the duration of its use.
    #[inline(always)]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortIo for HardwarePorts {
    #[inline(always)]
    fn outb(&mut self, port: PortNumber, value: u8) {
        unsafe { outb(port.number(), value) }
    }

    #[inline(always)]
    fn inb(&mut self, port: PortNumber) -> u8 {
        unsafe { inb(port.number()) }
    }

    #[inline(always)]
    fn outw(&mut self, port: PortNumber, value: u16) {
        unsafe { outw(port.number(), value) }
    }

    #[inline(always)]
    fn inw(&mut self, port: PortNumber) -> u16 {
        unsafe { inw(port.number()) }
    }
}

#[cfg(any(test, feature = "mock-io"))]
pub mod mock {
    //! Recording port backend for host tests.
    //!
    //! Every access is appended to an event log. Reads are answered from a
    //! per-port input queue first, then from a latch holding the last value
    //! written to that port, then 0.

    use keel_abi::Port as PortNumber;

    use super::PortIo;

    pub const MAX_EVENTS: usize = 512;
    const MAX_PORTS: usize = 32;
    const MAX_QUEUED: usize = 64;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum PortEvent {
        Out8(u16, u8),
        Out16(u16, u16),
        In8(u16),
        In16(u16),
    }

    pub struct RecordingPorts {
        events: [PortEvent; MAX_EVENTS],
        len: usize,
        latches: [(u16, u16); MAX_PORTS],
        latch_count: usize,
        queued: [(u16, u8); MAX_QUEUED],
        queued_count: usize,
    }

    impl Default for RecordingPorts {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RecordingPorts {
        pub const fn new() -> Self {
            Self {
                events: [PortEvent::In8(0); MAX_EVENTS],
                len: 0,
                latches: [(0, 0); MAX_PORTS],
                latch_count: 0,
                queued: [(0, 0); MAX_QUEUED],
                queued_count: 0,
            }
        }

        pub fn events(&self) -> &[PortEvent] {
            &self.events[..self.len]
        }

        pub fn clear_events(&mut self) {
            self.len = 0;
        }

        /// Byte writes in order, without the `io_wait` scratch writes.
        pub fn byte_writes(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
            self.events().iter().filter_map(|ev| match *ev {
                PortEvent::Out8(port, value) if port != PortNumber::IO_DELAY.number() => {
                    Some((port, value))
                }
                _ => None,
            })
        }

        /// Byte values written to one port, in order.
        pub fn writes_to(&self, port: PortNumber) -> impl Iterator<Item = u8> + '_ {
            self.byte_writes()
                .filter(move |&(p, _)| p == port.number())
                .map(|(_, v)| v)
        }

        pub fn io_wait_count(&self) -> usize {
            self.events()
                .iter()
                .filter(|ev| matches!(ev, PortEvent::Out8(p, _) if *p == PortNumber::IO_DELAY.number()))
                .count()
        }

        /// Current latched value of a port.
        pub fn latch(&self, port: PortNumber) -> u16 {
            self.latches[..self.latch_count]
                .iter()
                .find(|(p, _)| *p == port.number())
                .map(|&(_, v)| v)
                .unwrap_or(0)
        }

        /// Preset the value reads of `port` return.
        pub fn set_latch(&mut self, port: PortNumber, value: u16) {
            let port = port.number();
            if let Some(slot) = self.latches[..self.latch_count]
                .iter_mut()
                .find(|(p, _)| *p == port)
            {
                slot.1 = value;
                return;
            }
            assert!(self.latch_count < MAX_PORTS, "too many distinct ports");
            self.latches[self.latch_count] = (port, value);
            self.latch_count += 1;
        }

        /// Queue a one-shot byte for the next read of `port`.
        pub fn push_input(&mut self, port: PortNumber, value: u8) {
            assert!(self.queued_count < MAX_QUEUED, "input queue full");
            self.queued[self.queued_count] = (port.number(), value);
            self.queued_count += 1;
        }

        fn take_input(&mut self, port: u16) -> Option<u8> {
            let idx = self.queued[..self.queued_count]
                .iter()
                .position(|(p, _)| *p == port)?;
            let value = self.queued[idx].1;
            self.queued.copy_within(idx + 1..self.queued_count, idx);
            self.queued_count -= 1;
            Some(value)
        }

        fn record(&mut self, event: PortEvent) {
            assert!(self.len < MAX_EVENTS, "port event log full");
            self.events[self.len] = event;
            self.len += 1;
        }
    }

    impl PortIo for RecordingPorts {
        fn outb(&mut self, port: PortNumber, value: u8) {
            self.record(PortEvent::Out8(port.number(), value));
            self.set_latch(port, value as u16);
        }

        fn inb(&mut self, port: PortNumber) -> u8 {
            self.record(PortEvent::In8(port.number()));
            match self.take_input(port.number()) {
                Some(value) => value,
                None => self.latch(port) as u8,
            }
        }

        fn outw(&mut self, port: PortNumber, value: u16) {
            self.record(PortEvent::Out16(port.number(), value));
            self.set_latch(port, value);
        }

        fn inw(&mut self, port: PortNumber) -> u16 {
            self.record(PortEvent::In16(port.number()));
            self.latch(port)
        }
    }
}
