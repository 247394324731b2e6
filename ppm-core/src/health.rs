//! Link health classification driven by the watchdog tick.
//!
//! The lost-tick counter and the last-frame timestamp share one 64-bit
//! atomic (`ticks << 0 | frame_ms << 32`), so a tick, a frame completion and
//! a read never observe half of the other's update.

use portable_atomic::{AtomicU64, Ordering};

use crate::config::DecoderConfig;

/// Three-level link status.
///
/// `Lost` sits between the other two as hysteresis: a single missed frame
/// reads as `Lost`, not as an immediate `ReallyLost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Health {
    Ok,
    Lost,
    ReallyLost,
}

impl Health {
    /// Whether the decoded values can be trusted.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Health::Ok)
    }
}

impl core::fmt::Display for Health {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Health::Ok => write!(f, "ok"),
            Health::Lost => write!(f, "lost"),
            Health::ReallyLost => write!(f, "really lost"),
        }
    }
}

/// Decoder facts the classification depends on, read by the caller from
/// the decoder side of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    pub active_channels: usize,
    pub decoding: bool,
}

const TICKS_MASK: u64 = 0xFFFF_FFFF;

/// Tick-driven staleness tracker.
pub struct HealthMonitor {
    /// Lost ticks in the low half, last frame time (ms) in the high half.
    state: AtomicU64,
    really_lost_ticks: u32,
    really_lost_ms: u32,
}

impl HealthMonitor {
    #[must_use]
    pub const fn new(config: &DecoderConfig) -> Self {
        Self {
            state: AtomicU64::new(0),
            really_lost_ticks: config.really_lost_ticks(),
            really_lost_ms: config.really_lost_ms(),
        }
    }

    /// Watchdog tick. Counts one more period without a completed frame.
    pub fn on_tick(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let ticks = (state & TICKS_MASK) as u32;
                Some((state & !TICKS_MASK) | u64::from(ticks.saturating_add(1)))
            });
    }

    /// A full frame was decoded at `now_ms`.
    pub fn on_frame_complete(&self, now_ms: u32) {
        self.state
            .store(u64::from(now_ms) << 32, Ordering::Release);
    }

    /// Stamp `now_ms` as the last frame time without clearing lost ticks.
    pub fn mark_frame_time(&self, now_ms: u32) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                Some((state & TICKS_MASK) | (u64::from(now_ms) << 32))
            });
    }

    /// Back to the start-up state.
    pub fn reset(&self) {
        self.state.store(0, Ordering::Release);
    }

    /// `(lost_ticks, last_frame_ms)` read together.
    #[must_use]
    pub fn load(&self) -> (u32, u32) {
        let state = self.state.load(Ordering::Acquire);
        ((state & TICKS_MASK) as u32, (state >> 32) as u32)
    }

    #[inline]
    #[must_use]
    pub fn lost_ticks(&self) -> u32 {
        self.load().0
    }

    /// Classify the link at `now_ms`.
    #[must_use]
    pub fn classify(&self, link: LinkState, now_ms: u32) -> Health {
        let (lost_ticks, last_frame_ms) = self.load();
        let has_channels = link.active_channels > 0;

        if lost_ticks == 0 && has_channels && link.decoding {
            return Health::Ok;
        }

        let recent = now_ms.wrapping_sub(last_frame_ms) < self.really_lost_ms;
        if lost_ticks < self.really_lost_ticks && has_channels && (link.decoding || recent) {
            Health::Lost
        } else {
            Health::ReallyLost
        }
    }
}

impl core::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (lost_ticks, last_frame_ms) = self.load();
        f.debug_struct("HealthMonitor")
            .field("lost_ticks", &lost_ticks)
            .field("last_frame_ms", &last_frame_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECODING: LinkState = LinkState {
        active_channels: 8,
        decoding: true,
    };

    const SEARCHING: LinkState = LinkState {
        active_channels: 8,
        decoding: false,
    };

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(&DecoderConfig::LEGACY)
    }

    #[test]
    fn test_ok_right_after_frame() {
        let health = monitor();
        health.on_frame_complete(500);
        assert_eq!(health.classify(DECODING, 500), Health::Ok);
    }

    #[test]
    fn test_never_synced_is_really_lost() {
        let health = monitor();
        let link = LinkState {
            active_channels: 0,
            decoding: false,
        };
        assert_eq!(health.classify(link, 0), Health::ReallyLost);
    }

    #[test]
    fn test_zero_channels_is_really_lost_even_when_decoding() {
        let health = monitor();
        let link = LinkState {
            active_channels: 0,
            decoding: true,
        };
        assert_eq!(health.classify(link, 0), Health::ReallyLost);
    }

    #[test]
    fn test_hysteresis_between_lost_and_really_lost() {
        let health = monitor();
        health.on_frame_complete(0);
        let threshold = DecoderConfig::LEGACY.really_lost_ticks();

        for k in 1..threshold {
            health.on_tick();
            assert_eq!(health.lost_ticks(), k);
            assert_eq!(health.classify(DECODING, 0), Health::Lost);
        }

        health.on_tick();
        assert_eq!(health.classify(DECODING, 0), Health::ReallyLost);
        health.on_tick();
        assert_eq!(health.classify(DECODING, 0), Health::ReallyLost);
    }

    #[test]
    fn test_frame_clears_lost_ticks() {
        let health = monitor();
        health.on_tick();
        health.on_tick();
        health.on_frame_complete(200);
        assert_eq!(health.lost_ticks(), 0);
        assert_eq!(health.load(), (0, 200));
    }

    #[test]
    fn test_searching_uses_wall_clock_bound() {
        let health = monitor();
        health.mark_frame_time(1_000);

        // Not decoding, but the last frame is recent
        assert_eq!(health.classify(SEARCHING, 1_500), Health::Lost);
        // Past REALLY_LOST_MS
        assert_eq!(health.classify(SEARCHING, 2_000), Health::ReallyLost);
    }

    #[test]
    fn test_mark_frame_time_keeps_ticks() {
        let health = monitor();
        health.on_tick();
        health.on_tick();
        health.mark_frame_time(42);
        assert_eq!(health.load(), (2, 42));
    }

    #[test]
    fn test_timestamp_wraparound() {
        let health = monitor();
        health.mark_frame_time(u32::MAX - 100);
        assert_eq!(health.classify(SEARCHING, 200), Health::Lost);
    }

    #[test]
    fn test_reset() {
        let health = monitor();
        health.on_tick();
        health.mark_frame_time(99);
        health.reset();
        assert_eq!(health.load(), (0, 0));
    }

    #[test]
    fn test_is_valid() {
        assert!(Health::Ok.is_valid());
        assert!(!Health::Lost.is_valid());
        assert!(!Health::ReallyLost.is_valid());
    }
}
