//! The shared decoder object and its read side.
//!
//! [`DecoderCore`] bundles the channel table, the health monitor and the
//! published decoder state. It is built with a `const fn` so firmware can
//! place it in a `static` and hand `&'static` references to the edge
//! callback, the tick callback and the reader.

use heapless::Vec;
use portable_atomic::{AtomicBool, Ordering};

use crate::config::{DecoderConfig, MAX_CHANNELS};
use crate::decoder::{DecoderState, PulseDecoder, StateCell};
use crate::health::{Health, HealthMonitor, LinkState};
use crate::ring::PulseWidth;
use crate::table::ChannelTable;

/// Values drained from every active channel, in channel order.
pub type ChannelValues = Vec<PulseWidth, MAX_CHANNELS>;

/// Result of a read: link health plus, when available, one value per
/// active channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub health: Health,
    /// Empty unless `health` is [`Health::Ok`] and every channel had a value.
    pub values: ChannelValues,
}

impl Report {
    /// A report carrying no values.
    #[must_use]
    pub const fn health_only(health: Health) -> Self {
        Self {
            health,
            values: Vec::new(),
        }
    }

    /// Whether the report carries trustworthy values.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.health.is_valid() && !self.values.is_empty()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Report {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Report {{ health: {}, values: {} }}",
            self.health,
            self.values.as_slice()
        );
    }
}

/// Decoder state shared by the edge, tick and reader contexts.
pub struct DecoderCore {
    config: DecoderConfig,
    table: ChannelTable,
    health: HealthMonitor,
    state: StateCell,
    decoder_taken: AtomicBool,
}

impl DecoderCore {
    #[must_use]
    pub const fn new(config: DecoderConfig) -> Self {
        Self {
            health: HealthMonitor::new(&config),
            config,
            table: ChannelTable::new(),
            state: StateCell::new(),
            decoder_taken: AtomicBool::new(false),
        }
    }

    /// Hand out the producer handle. Returns `None` once it is taken.
    pub fn take_decoder(&self) -> Option<PulseDecoder<'_>> {
        if self.decoder_taken.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(PulseDecoder::new(self))
        }
    }

    /// Watchdog tick entry point.
    #[inline]
    pub fn on_tick(&self) {
        self.health.on_tick();
    }

    /// Current link health.
    #[must_use]
    pub fn classify(&self, now_ms: u32) -> Health {
        let link = LinkState {
            active_channels: self.table.active_count(),
            decoding: self.state() == DecoderState::Decoding,
        };
        self.health.classify(link, now_ms)
    }

    /// Read the newest complete frame.
    ///
    /// Never blocks. Values are only returned when the link is `Ok` and a
    /// frame newer than the last one read has all its channels buffered;
    /// otherwise, or when the channel configuration changed during the read,
    /// the report carries health only. Older buffered frames are dropped.
    /// Does not touch the decoder state or the channel count.
    #[must_use]
    pub fn snapshot(&self, now_ms: u32) -> Report {
        let health = self.classify(now_ms);
        if health != Health::Ok {
            return Report::health_only(health);
        }

        let generation = self.table.generation();
        match self.drain(generation) {
            Some(values) if self.table.is_stable_since(generation) => Report { health, values },
            _ => Report::health_only(health),
        }
    }

    fn drain(&self, generation: u32) -> Option<ChannelValues> {
        if generation % 2 != 0 {
            return None;
        }

        // The last channel is written last, so its count is the number of
        // frames every channel has a value for
        let active = self.table.active_count();
        let frame = self
            .table
            .channel(active.checked_sub(1)?)?
            .pushed()
            .checked_sub(1)?;

        let mut values = ChannelValues::new();
        for index in 0..active {
            let value = self.table.channel(index)?.take_at(frame)?;
            values.push(value).ok()?;
        }
        Some(values)
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state.load()
    }

    #[inline]
    #[must_use]
    pub fn active_channels(&self) -> usize {
        self.table.active_count()
    }

    /// Whether the detected channel count was clamped to [`MAX_CHANNELS`].
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.table.is_truncated()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Tear down: consume the producer handle and return to the start-up
    /// state. [`take_decoder`](Self::take_decoder) succeeds again afterwards.
    ///
    /// A decoder taken from another core is handed back untouched.
    pub fn shutdown<'a>(&self, decoder: PulseDecoder<'a>) -> Result<(), PulseDecoder<'a>> {
        if !core::ptr::eq(decoder.core(), self) {
            return Err(decoder);
        }

        drop(decoder);
        self.table.reconfigure(0);
        self.health.reset();
        self.state.store(DecoderState::Searching);
        self.decoder_taken.store(false, Ordering::Release);
        Ok(())
    }

    #[inline]
    pub(crate) fn table(&self) -> &ChannelTable {
        &self.table
    }

    #[inline]
    pub(crate) fn health(&self) -> &HealthMonitor {
        &self.health
    }

    #[inline]
    pub(crate) fn publish_state(&self, state: DecoderState) {
        self.state.store(state);
    }
}

impl core::fmt::Debug for DecoderCore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DecoderCore")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("table", &self.table)
            .field("health", &self.health)
            .finish()
    }
}
