//! Single-producer/single-consumer value ring with overwrite-on-full.
//!
//! The producer is the edge callback, which may run at interrupt priority,
//! so nothing here blocks or takes a lock. Cursors are monotonic counters:
//! `write_head` is only stored by the producer, `read_tail` is advanced by
//! the consumer and, when the ring is full, by the producer dropping the
//! oldest value. Both sides advance `read_tail` with compare-exchange, so a
//! consumer that lost the race to an overwrite simply retries on the next
//! slot.
//!
//! Positions can also be addressed relative to the last [`reset`]: the
//! `n`-th value pushed since then is readable with [`take_at`] until it is
//! consumed or overwritten. The channel table keeps all rings reset
//! together, so equal positions on different rings belong to the same frame.
//!
//! [`reset`]: RingChannel::reset
//! [`take_at`]: RingChannel::take_at

use portable_atomic::{AtomicU16, AtomicUsize, Ordering};

use crate::config::RING_CAPACITY;

/// Raw decoded pulse width in the capture source's time unit.
pub type PulseWidth = u16;

const MASK: usize = RING_CAPACITY - 1;

/// Narrow a raw delta to a [`PulseWidth`], saturating at `u16::MAX`.
#[inline]
#[must_use]
pub const fn saturate_width(value: u32) -> PulseWidth {
    if value > PulseWidth::MAX as u32 {
        PulseWidth::MAX
    } else {
        value as PulseWidth
    }
}

/// Bounded ring of pulse widths for one channel.
///
/// `push` never fails: on a full ring it overwrites the oldest value, so the
/// most recent width is never lost to back-pressure.
pub struct RingChannel {
    slots: [AtomicU16; RING_CAPACITY],
    /// Total values ever pushed (producer-owned).
    write_head: AtomicUsize,
    /// Total values consumed or dropped.
    read_tail: AtomicUsize,
    /// `write_head` at the last reset.
    origin: AtomicUsize,
}

impl RingChannel {
    /// Create an empty ring.
    #[must_use]
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const EMPTY_SLOT: AtomicU16 = AtomicU16::new(0);
        Self {
            slots: [EMPTY_SLOT; RING_CAPACITY],
            write_head: AtomicUsize::new(0),
            read_tail: AtomicUsize::new(0),
            origin: AtomicUsize::new(0),
        }
    }

    /// Append a value. Producer context only.
    ///
    /// Widths that do not fit in [`PulseWidth`] saturate.
    pub fn push(&self, value: u32) {
        let value = saturate_width(value);
        let head = self.write_head.load(Ordering::Relaxed);
        let tail = self.read_tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) >= RING_CAPACITY {
            // Full: drop the oldest. Failure means the consumer just took it,
            // which frees the same slot.
            let _ = self.read_tail.compare_exchange(
                tail,
                tail.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }

        self.slots[head & MASK].store(value, Ordering::Relaxed);
        self.write_head
            .store(head.wrapping_add(1), Ordering::Release);
    }

    /// Take the oldest buffered value. Consumer context only.
    pub fn pop(&self) -> Option<PulseWidth> {
        loop {
            let tail = self.read_tail.load(Ordering::Acquire);
            let head = self.write_head.load(Ordering::Acquire);
            if tail == head {
                return None;
            }

            let value = self.slots[tail & MASK].load(Ordering::Relaxed);
            if self
                .read_tail
                .compare_exchange(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return Some(value);
            }
        }
    }

    /// Take the value at `position` (counted from the last reset) and drop
    /// everything older. Consumer context only.
    ///
    /// Returns `None`, consuming nothing, when that value is no longer or
    /// not yet buffered.
    pub fn take_at(&self, position: usize) -> Option<PulseWidth> {
        let target = self.origin.load(Ordering::Acquire).wrapping_add(position);
        loop {
            let tail = self.read_tail.load(Ordering::Acquire);
            let head = self.write_head.load(Ordering::Acquire);
            // Relative to `tail`, so a stale origin can never move the
            // cursor past `head`
            if target.wrapping_sub(tail) >= head.wrapping_sub(tail) {
                return None;
            }

            let value = self.slots[target & MASK].load(Ordering::Relaxed);
            if self
                .read_tail
                .compare_exchange(
                    tail,
                    target.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return Some(value);
            }
        }
    }

    /// Number of values pushed since the last reset, consumed or not.
    #[inline]
    #[must_use]
    pub fn pushed(&self) -> usize {
        let head = self.write_head.load(Ordering::Acquire);
        head.wrapping_sub(self.origin.load(Ordering::Acquire))
    }

    /// Whether nothing is buffered right now.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of buffered values at the time of the call.
    #[must_use]
    pub fn len(&self) -> usize {
        let tail = self.read_tail.load(Ordering::Acquire);
        let head = self.write_head.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(RING_CAPACITY)
    }

    /// Discard everything buffered. Producer context only.
    pub fn reset(&self) {
        let head = self.write_head.load(Ordering::Relaxed);
        self.origin.store(head, Ordering::Release);
        self.read_tail.store(head, Ordering::Release);
    }
}

impl Default for RingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for RingChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingChannel")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ring() {
        let ring = RingChannel::new();
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_fifo_order() {
        let ring = RingChannel::new();
        ring.push(102);
        ring.push(199);
        ring.push(295);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pop(), Some(102));
        assert_eq!(ring.pop(), Some(199));
        assert_eq!(ring.pop(), Some(295));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        let ring = RingChannel::new();
        for value in 0..(RING_CAPACITY as u32 + 2) {
            ring.push(value);
        }
        assert_eq!(ring.len(), RING_CAPACITY);
        // The two oldest values were dropped, the newest survived
        assert_eq!(ring.pop(), Some(2));
        let mut last = None;
        while let Some(value) = ring.pop() {
            last = Some(value);
        }
        assert_eq!(last, Some(RING_CAPACITY as u16 + 1));
    }

    #[test]
    fn test_reset_discards_buffered() {
        let ring = RingChannel::new();
        ring.push(1);
        ring.push(2);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);

        ring.push(3);
        assert_eq!(ring.pop(), Some(3));
    }

    #[test]
    fn test_wide_values_saturate() {
        let ring = RingChannel::new();
        ring.push(70_000);
        assert_eq!(ring.pop(), Some(u16::MAX));
    }

    #[test]
    fn test_cursor_wraparound() {
        let ring = RingChannel::new();
        let start = usize::MAX - 1;
        ring.write_head.store(start, Ordering::Relaxed);
        ring.read_tail.store(start, Ordering::Relaxed);

        for value in 10..16 {
            ring.push(value);
        }
        assert_eq!(ring.len(), RING_CAPACITY);
        assert_eq!(ring.pop(), Some(12));
        assert_eq!(ring.pop(), Some(13));
        assert_eq!(ring.pop(), Some(14));
        assert_eq!(ring.pop(), Some(15));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_take_at_skips_older_values() {
        let ring = RingChannel::new();
        ring.push(7);
        ring.reset();
        for value in [110, 210, 310] {
            ring.push(value);
        }
        assert_eq!(ring.pushed(), 3);

        assert_eq!(ring.take_at(1), Some(210));
        assert_eq!(ring.len(), 1);
        // Already consumed
        assert_eq!(ring.take_at(1), None);
        assert_eq!(ring.take_at(0), None);
        // Not pushed yet
        assert_eq!(ring.take_at(3), None);
        assert_eq!(ring.pop(), Some(310));
    }

    #[test]
    fn test_take_at_overwritten_value() {
        let ring = RingChannel::new();
        for value in 0..(RING_CAPACITY as u32 + 1) {
            ring.push(value);
        }
        assert_eq!(ring.take_at(0), None);
        assert_eq!(ring.len(), RING_CAPACITY);
        assert_eq!(ring.take_at(RING_CAPACITY), Some(RING_CAPACITY as u16));
        assert!(ring.is_empty());
    }
}
