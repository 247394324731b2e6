//! PPM edge-delta state machine.
//!
//! One [`PulseDecoder`] exists per [`DecoderCore`] and it is the only writer
//! of the channel table. Every falling edge is fed to [`PulseDecoder::on_edge`]
//! with the time elapsed since the previous edge:
//!
//! ```text
//!          sync          p < MIN_SYNC         sync
//! Searching ───► Syncing ────────────► Syncing ───► Decoding
//!     ▲   p = 1             p += 1        reconfigure(p - 1)
//!     │                                                 │
//!     └──── delta > resync gap (any state) ◄────────────┘
//! ```
//!
//! While decoding, a sync gap starts a new frame and every other delta is
//! stored in the ring of the next channel. A sync gap that cuts a frame short
//! empties all rings, which keeps them in step frame by frame.

use portable_atomic::{AtomicU8, Ordering};

use crate::config::MAX_CHANNELS;
use crate::ring::{saturate_width, PulseWidth};
use crate::snapshot::DecoderCore;

/// Externally visible decoder phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DecoderState {
    /// No candidate sync gap seen yet.
    Searching = 0,
    /// Counting channel pulses after a candidate sync gap.
    Syncing = 1,
    /// Channel count locked, values are being stored.
    Decoding = 2,
}

impl DecoderState {
    #[inline]
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Syncing,
            2 => Self::Decoding,
            _ => Self::Searching,
        }
    }
}

/// Atomic cell publishing a [`DecoderState`] to other contexts.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(DecoderState::Searching as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> DecoderState {
        DecoderState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, state: DecoderState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// What a single edge did to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeEvent {
    /// The delta exceeded the resync gap; everything was reset.
    Resync,
    /// First sync gap while searching.
    SyncCandidate,
    /// A channel pulse counted while syncing.
    Counted,
    /// Second sync gap: the channel count is now published.
    Locked { channels: usize, truncated: bool },
    /// Sync gap while decoding: the previous frame is complete.
    FrameStart,
    /// A width was stored for channel `index`.
    Channel { index: usize, width: PulseWidth },
    /// More pulses than channels without a sync gap; back to searching.
    Overrun,
    /// The edge carried no information in the current state.
    Ignored,
}

/// Producer handle of a [`DecoderCore`].
///
/// Obtained once from [`DecoderCore::take_decoder`]. Must be driven from a
/// single context that never re-enters it.
pub struct PulseDecoder<'a> {
    core: &'a DecoderCore,
    state: DecoderState,
    /// Pulses seen since the candidate sync gap, the gap itself included.
    pulses: usize,
    frame_index: usize,
    active: usize,
    truncated: bool,
}

impl<'a> PulseDecoder<'a> {
    pub(crate) fn new(core: &'a DecoderCore) -> Self {
        Self {
            core,
            state: core.state(),
            pulses: 0,
            frame_index: 0,
            active: core.active_channels(),
            truncated: core.is_truncated(),
        }
    }

    /// Feed one falling edge, `delta` time units after the previous one.
    pub fn on_edge(&mut self, delta: u32, now_ms: u32) -> EdgeEvent {
        let config = *self.core.config();

        if delta > config.resync_gap() {
            debug!("ppm: resync after gap of {}", delta);
            self.resync();
            return EdgeEvent::Resync;
        }

        let is_sync = config.is_sync_gap(delta);
        match self.state {
            DecoderState::Searching | DecoderState::Syncing => self.search(delta, is_sync),
            DecoderState::Decoding => self.decode(delta, is_sync, now_ms),
        }
    }

    fn search(&mut self, delta: u32, is_sync: bool) -> EdgeEvent {
        if is_sync {
            if self.pulses == 0 {
                self.pulses = 1;
                self.set_state(DecoderState::Syncing);
                return EdgeEvent::SyncCandidate;
            }
            return self.lock(self.pulses - 1);
        }

        if delta < self.core.config().min_sync() && self.pulses > 0 {
            self.pulses = self.pulses.saturating_add(1);
            return EdgeEvent::Counted;
        }

        EdgeEvent::Ignored
    }

    fn lock(&mut self, detected: usize) -> EdgeEvent {
        let table = self.core.table();
        self.active = table.reconfigure(detected);
        self.truncated = table.is_truncated();
        self.pulses = 0;
        self.frame_index = 0;
        self.set_state(DecoderState::Decoding);

        if self.truncated {
            warn!(
                "ppm: {} channels detected, clamped to {}",
                detected,
                MAX_CHANNELS
            );
        } else {
            info!("ppm: locked on {} channels", self.active);
        }

        EdgeEvent::Locked {
            channels: self.active,
            truncated: self.truncated,
        }
    }

    fn decode(&mut self, delta: u32, is_sync: bool, now_ms: u32) -> EdgeEvent {
        if is_sync {
            if self.frame_index != 0 && self.frame_index < self.active {
                // Short frame: the first channels got one value more than
                // the rest
                debug!(
                    "ppm: short frame, {} of {} channels",
                    self.frame_index,
                    self.active
                );
                self.core.table().realign();
            }
            self.frame_index = 0;
            self.core.health().on_frame_complete(now_ms);
            return EdgeEvent::FrameStart;
        }

        if self.frame_index < self.active {
            let index = self.frame_index;
            if let Some(ring) = self.core.table().slot(index) {
                ring.push(delta);
            }
            self.frame_index += 1;
            return EdgeEvent::Channel {
                index,
                width: saturate_width(delta),
            };
        }

        if self.truncated {
            return EdgeEvent::Ignored;
        }

        debug!("ppm: frame overrun after {} pulses", self.frame_index);
        self.pulses = 0;
        self.frame_index = 0;
        self.core.health().mark_frame_time(now_ms);
        self.set_state(DecoderState::Searching);
        EdgeEvent::Overrun
    }

    /// Drop the channel configuration and search for sync again.
    ///
    /// Happens on its own after an over-long gap; call it directly when the
    /// edge source reports a failure.
    pub fn resync(&mut self) {
        self.pulses = 0;
        self.frame_index = 0;
        self.active = self.core.table().reconfigure(0);
        self.truncated = false;
        self.core.health().reset();
        self.set_state(DecoderState::Searching);
    }

    /// Local view of the state, identical to [`DecoderCore::state`].
    #[inline]
    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Position of the next channel within the current frame.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    #[inline]
    #[must_use]
    pub fn core(&self) -> &'a DecoderCore {
        self.core
    }

    fn set_state(&mut self, state: DecoderState) {
        self.state = state;
        self.core.publish_state(state);
    }
}

impl core::fmt::Debug for PulseDecoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseDecoder")
            .field("state", &self.state)
            .field("pulses", &self.pulses)
            .field("frame_index", &self.frame_index)
            .field("active", &self.active)
            .field("truncated", &self.truncated)
            .finish()
    }
}
