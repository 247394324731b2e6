//! Preallocated per-channel storage shared between the edge callback and
//! the reader.
//!
//! The table never allocates: all [`MAX_CHANNELS`] rings exist for the
//! lifetime of the table and a channel-count change only resets cursors and
//! republishes `active_count`. A generation counter, odd while a
//! reconfiguration is in progress, lets a reader detect that the table
//! changed under its drain.

use portable_atomic::{fence, AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::config::MAX_CHANNELS;
use crate::ring::RingChannel;

/// Fixed set of channel rings plus the published channel count.
pub struct ChannelTable {
    channels: [RingChannel; MAX_CHANNELS],
    active_count: AtomicUsize,
    truncated: AtomicBool,
    generation: AtomicU32,
}

impl ChannelTable {
    /// Create a table with no active channels.
    #[must_use]
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const EMPTY_RING: RingChannel = RingChannel::new();
        Self {
            channels: [EMPTY_RING; MAX_CHANNELS],
            active_count: AtomicUsize::new(0),
            truncated: AtomicBool::new(false),
            generation: AtomicU32::new(0),
        }
    }

    /// Switch to `requested` channels. Producer context only.
    ///
    /// Every ring is emptied before the new count is published. Counts
    /// above [`MAX_CHANNELS`] are clamped and raise [`is_truncated`].
    ///
    /// Returns the count actually published.
    ///
    /// [`is_truncated`]: Self::is_truncated
    pub fn reconfigure(&self, requested: usize) -> usize {
        let active = requested.min(MAX_CHANNELS);
        self.rewrite(|| {
            self.active_count.store(active, Ordering::Relaxed);
            self.truncated
                .store(requested > MAX_CHANNELS, Ordering::Relaxed);
        });
        active
    }

    /// Empty every ring but keep the channel count. Producer context only.
    ///
    /// Used after a frame that ended before all channels were written, so
    /// that all rings count frames from the same point again.
    pub fn realign(&self) {
        self.rewrite(|| {});
    }

    fn rewrite(&self, update: impl FnOnce()) {
        let generation = self.generation.load(Ordering::Relaxed);

        self.generation
            .store(generation.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        for ring in &self.channels {
            ring.reset();
        }
        update();

        self.generation
            .store(generation.wrapping_add(2), Ordering::Release);
    }

    /// Snapshot of the number of active channels.
    ///
    /// May change between two calls; pair it with [`generation`] to detect
    /// that.
    ///
    /// [`generation`]: Self::generation
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Acquire)
    }

    /// Whether the last detected channel count exceeded [`MAX_CHANNELS`].
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated.load(Ordering::Acquire)
    }

    /// Ring of channel `index`, if that channel is currently active.
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&RingChannel> {
        if index < self.active_count() {
            self.channels.get(index)
        } else {
            None
        }
    }

    /// Ring of channel `index` regardless of the active count.
    ///
    /// The decoder uses this after it has already bounded `index` by the
    /// count it published itself.
    #[inline]
    pub(crate) fn slot(&self, index: usize) -> Option<&RingChannel> {
        self.channels.get(index)
    }

    /// Current reconfiguration generation. Odd while a reconfiguration is
    /// in progress.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether the table is unchanged since `generation` was read.
    ///
    /// Call after the reads that must be consistent with that generation.
    #[inline]
    #[must_use]
    pub fn is_stable_since(&self, generation: u32) -> bool {
        fence(Ordering::Acquire);
        generation % 2 == 0 && self.generation.load(Ordering::Relaxed) == generation
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ChannelTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelTable")
            .field("active_count", &self.active_count())
            .field("truncated", &self.is_truncated())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let table = ChannelTable::new();
        assert_eq!(table.active_count(), 0);
        assert!(table.channel(0).is_none());
        assert!(!table.is_truncated());
    }

    #[test]
    fn test_reconfigure_publishes_count() {
        let table = ChannelTable::new();
        assert_eq!(table.reconfigure(8), 8);
        assert_eq!(table.active_count(), 8);
        assert!(table.channel(7).is_some());
        assert!(table.channel(8).is_none());
    }

    #[test]
    fn test_reconfigure_resets_rings() {
        let table = ChannelTable::new();
        table.reconfigure(4);
        table.slot(0).unwrap().push(150);
        table.slot(3).unwrap().push(120);

        table.reconfigure(4);
        assert!(table.channel(0).unwrap().is_empty());
        assert!(table.channel(3).unwrap().is_empty());
    }

    #[test]
    fn test_reconfigure_clamps_and_flags() {
        let table = ChannelTable::new();
        assert_eq!(table.reconfigure(MAX_CHANNELS + 3), MAX_CHANNELS);
        assert_eq!(table.active_count(), MAX_CHANNELS);
        assert!(table.is_truncated());

        table.reconfigure(2);
        assert!(!table.is_truncated());
    }

    #[test]
    fn test_zero_channels_is_legal() {
        let table = ChannelTable::new();
        assert_eq!(table.reconfigure(0), 0);
        assert_eq!(table.active_count(), 0);
        assert!(table.channel(0).is_none());
    }

    #[test]
    fn test_generation_detects_reconfigure() {
        let table = ChannelTable::new();
        let before = table.generation();
        assert!(table.is_stable_since(before));

        table.reconfigure(3);
        assert!(!table.is_stable_since(before));

        let after = table.generation();
        assert_eq!(after % 2, 0);
        assert!(table.is_stable_since(after));
    }

    #[test]
    fn test_realign_keeps_count() {
        let table = ChannelTable::new();
        table.reconfigure(MAX_CHANNELS + 1);
        let channel = table.channel(0).unwrap();
        channel.push(150);
        channel.push(160);
        let before = table.generation();

        table.realign();
        assert!(!table.is_stable_since(before));
        assert_eq!(table.active_count(), MAX_CHANNELS);
        assert!(table.is_truncated());
        assert!(channel.is_empty());
        assert_eq!(channel.pushed(), 0);
    }
}
