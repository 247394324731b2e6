//! Decoder tuning constants.
//!
//! All durations handed to the decoder are edge deltas in the capture
//! source's time unit (10 µs for the legacy thresholds). Wall-clock bounds
//! are in milliseconds.

/// Upper bound on the number of decoded channels.
///
/// Sizes the statically allocated channel table. A detected channel count
/// above this is clamped and flagged, see [`ChannelTable::reconfigure`].
///
/// [`ChannelTable::reconfigure`]: crate::table::ChannelTable::reconfigure
pub const MAX_CHANNELS: usize = 16;

/// Number of buffered values per channel.
///
/// Must be a power of two so cursor wrap-around stays aligned with slot
/// indices.
pub const RING_CAPACITY: usize = 4;

const _: () = assert!(RING_CAPACITY.is_power_of_two());

/// Reasons a [`DecoderConfig`] is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `min_sync >= max_sync`, the sync band would be empty.
    EmptySyncBand,
    /// `resync_gap < max_sync`, a valid sync gap would force re-detection.
    ResyncBelowSyncBand,
    /// The watchdog tick frequency is zero.
    ZeroTickRate,
    /// `really_lost_ticks` is zero, `Lost` could never be reported.
    ZeroLostThreshold,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EmptySyncBand => write!(f, "sync band is empty"),
            Self::ResyncBelowSyncBand => write!(f, "resync gap below sync band"),
            Self::ZeroTickRate => write!(f, "tick rate is zero"),
            Self::ZeroLostThreshold => write!(f, "really-lost threshold is zero"),
        }
    }
}

/// Thresholds for sync detection and link health.
///
/// Every value of this type has passed [`DecoderConfig::new`], so the
/// decoder never re-checks it at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderConfig {
    min_sync: u32,
    max_sync: u32,
    resync_gap: u32,
    tick_hz: u32,
    really_lost_ticks: u32,
    really_lost_ms: u32,
}

impl DecoderConfig {
    /// Thresholds of the legacy OMAP driver: 10 µs units, a sync gap of
    /// 10 ms to 40 ms, re-detection above 40 ms, a 10 Hz watchdog and one
    /// second until the link is considered really lost.
    pub const LEGACY: Self = Self {
        min_sync: 1000,
        max_sync: 4000,
        resync_gap: 4000,
        tick_hz: 10,
        really_lost_ticks: 10,
        really_lost_ms: 1000,
    };

    /// Build a validated configuration.
    ///
    /// Being `const`, this can be evaluated in a `const` item so a bad
    /// firmware configuration fails the build instead of the device.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] the values violate.
    pub const fn new(
        min_sync: u32,
        max_sync: u32,
        resync_gap: u32,
        tick_hz: u32,
        really_lost_ticks: u32,
        really_lost_ms: u32,
    ) -> Result<Self, ConfigError> {
        if min_sync >= max_sync {
            return Err(ConfigError::EmptySyncBand);
        }
        if resync_gap < max_sync {
            return Err(ConfigError::ResyncBelowSyncBand);
        }
        if tick_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if really_lost_ticks == 0 {
            return Err(ConfigError::ZeroLostThreshold);
        }
        Ok(Self {
            min_sync,
            max_sync,
            resync_gap,
            tick_hz,
            really_lost_ticks,
            really_lost_ms,
        })
    }

    /// Inclusive lower edge of the sync band.
    #[inline]
    #[must_use]
    pub const fn min_sync(&self) -> u32 {
        self.min_sync
    }

    /// Exclusive upper edge of the sync band.
    #[inline]
    #[must_use]
    pub const fn max_sync(&self) -> u32 {
        self.max_sync
    }

    /// Deltas strictly above this reset the decoder.
    #[inline]
    #[must_use]
    pub const fn resync_gap(&self) -> u32 {
        self.resync_gap
    }

    #[inline]
    #[must_use]
    pub const fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    #[inline]
    #[must_use]
    pub const fn really_lost_ticks(&self) -> u32 {
        self.really_lost_ticks
    }

    #[inline]
    #[must_use]
    pub const fn really_lost_ms(&self) -> u32 {
        self.really_lost_ms
    }

    /// Watchdog period in milliseconds, rounded down, at least 1.
    #[inline]
    #[must_use]
    pub const fn tick_period_ms(&self) -> u32 {
        let period = 1000 / self.tick_hz;
        if period == 0 {
            1
        } else {
            period
        }
    }

    /// Whether `delta` falls in the half-open sync band `[min_sync, max_sync)`.
    #[inline]
    #[must_use]
    pub const fn is_sync_gap(&self, delta: u32) -> bool {
        delta >= self.min_sync && delta < self.max_sync
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::LEGACY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_is_valid() {
        let legacy = DecoderConfig::LEGACY;
        let rebuilt = DecoderConfig::new(
            legacy.min_sync(),
            legacy.max_sync(),
            legacy.resync_gap(),
            legacy.tick_hz(),
            legacy.really_lost_ticks(),
            legacy.really_lost_ms(),
        );
        assert_eq!(rebuilt, Ok(legacy));
    }

    #[test]
    fn test_sync_band_is_half_open() {
        let config = DecoderConfig::LEGACY;
        assert!(!config.is_sync_gap(999));
        assert!(config.is_sync_gap(1000));
        assert!(config.is_sync_gap(3999));
        assert!(!config.is_sync_gap(4000));
    }

    #[test]
    fn test_rejects_empty_sync_band() {
        assert_eq!(
            DecoderConfig::new(4000, 4000, 5000, 10, 10, 1000),
            Err(ConfigError::EmptySyncBand)
        );
        assert_eq!(
            DecoderConfig::new(5000, 4000, 5000, 10, 10, 1000),
            Err(ConfigError::EmptySyncBand)
        );
    }

    #[test]
    fn test_rejects_resync_inside_band() {
        assert_eq!(
            DecoderConfig::new(1000, 4000, 3000, 10, 10, 1000),
            Err(ConfigError::ResyncBelowSyncBand)
        );
    }

    #[test]
    fn test_rejects_zero_rates() {
        assert_eq!(
            DecoderConfig::new(1000, 4000, 4000, 0, 10, 1000),
            Err(ConfigError::ZeroTickRate)
        );
        assert_eq!(
            DecoderConfig::new(1000, 4000, 4000, 10, 0, 1000),
            Err(ConfigError::ZeroLostThreshold)
        );
    }

    #[test]
    fn test_tick_period() {
        assert_eq!(DecoderConfig::LEGACY.tick_period_ms(), 100);
        let fast = DecoderConfig::new(1000, 4000, 4000, 2000, 10, 1000).unwrap();
        assert_eq!(fast.tick_period_ms(), 1);
    }

    #[test]
    fn test_const_construction() {
        const CONFIG: DecoderConfig = match DecoderConfig::new(300, 2500, 4000, 50, 25, 500) {
            Ok(config) => config,
            Err(_) => panic!("invalid decoder configuration"),
        };
        assert_eq!(CONFIG.min_sync(), 300);
        assert_eq!(CONFIG.tick_period_ms(), 20);
    }
}
