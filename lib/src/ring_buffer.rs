//! Single-producer single-consumer byte ring.
//!
//! The producer owns `head`, the consumer owns `tail`. One slot is always
//! left empty so that `head == tail` means empty and `head + 1 == tail`
//! (mod N) means full. N must be a power of two so the modulus is a mask.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct RingBuffer<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: a slot is written by the producer strictly before `head` is
// published past it and read by the consumer strictly before `tail` is
// published past it, so the two sides never touch the same slot at once.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    const MASK: usize = {
        assert!(N.is_power_of_two() && N >= 2, "ring capacity must be a power of two");
        N - 1
    };

    pub const fn new() -> Self {
        let _ = Self::MASK;
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Usable slots (one less than the backing array).
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Producer side. Returns `false` and leaves the ring untouched when full.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) & Self::MASK;
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        unsafe {
            (*self.buf.get())[head] = byte;
        }
        self.head.store(next, Ordering::Release);
        true
    }

    /// Consumer side.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let byte = unsafe { (*self.buf.get())[tail] };
        self.tail.store((tail + 1) & Self::MASK, Ordering::Release);
        Some(byte)
    }

    /// Consumer side: drain into `out`, returning the count copied.
    pub fn pop_into(&self, out: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < out.len() {
            match self.pop() {
                Some(byte) => {
                    out[copied] = byte;
                    copied += 1;
                }
                None => break,
            }
        }
        copied
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & Self::MASK
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Raw `(head, tail)` indices.
    pub fn indices(&self) -> (usize, usize) {
        (
            self.head.load(Ordering::Acquire),
            self.tail.load(Ordering::Acquire),
        )
    }

    /// Drop everything queued. Consumer side only.
    pub fn clear(&self) {
        self.tail
            .store(self.head.load(Ordering::Acquire), Ordering::Release);
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let ring: RingBuffer<8> = RingBuffer::new();
        let (head, tail) = ring.indices();
        assert_eq!(head, tail);
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_ring_rejects_and_keeps_state() {
        let ring: RingBuffer<4> = RingBuffer::new();
        assert!(ring.push(b'a'));
        assert!(ring.push(b'b'));
        assert!(ring.push(b'c'));
        assert!(ring.is_full());

        let before = ring.indices();
        assert!(!ring.push(b'd'));
        assert_eq!(ring.indices(), before);

        assert_eq!(ring.pop(), Some(b'a'));
        assert_eq!(ring.pop(), Some(b'b'));
        assert_eq!(ring.pop(), Some(b'c'));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn occupancy_tracks_enqueues_minus_dequeues_across_wrap() {
        let ring: RingBuffer<8> = RingBuffer::new();
        let mut pushed = 0usize;
        let mut popped = 0usize;
        for round in 0..50u8 {
            for i in 0..(round % 5) {
                if ring.push(round.wrapping_add(i)) {
                    pushed += 1;
                }
            }
            for _ in 0..(round % 3) {
                if ring.pop().is_some() {
                    popped += 1;
                }
            }
            let (head, tail) = ring.indices();
            assert_eq!(pushed - popped, head.wrapping_sub(tail) % 8);
            assert_eq!(ring.len(), pushed - popped);
        }
    }

    #[test]
    fn pop_into_preserves_order() {
        let ring: RingBuffer<16> = RingBuffer::new();
        for &b in b"hello" {
            ring.push(b);
        }
        let mut out = [0u8; 3];
        assert_eq!(ring.pop_into(&mut out), 3);
        assert_eq!(&out, b"hel");
        let mut rest = [0u8; 8];
        assert_eq!(ring.pop_into(&mut rest), 2);
        assert_eq!(&rest[..2], b"lo");
    }
}
