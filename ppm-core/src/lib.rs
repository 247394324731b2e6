//! Platform-agnostic PPM decoding for RC receivers.
//!
//! A PPM receiver emits one falling edge per channel pulse; the time between
//! edges encodes the channel value and a long gap marks the end of a frame.
//! This crate turns those edge deltas into per-channel values and a link
//! health status without allocating and without ever blocking, so the edge
//! and tick entry points can run at interrupt priority.
//!
//! # Overview
//!
//! - [`config`]: Tuning thresholds ([`DecoderConfig`], [`MAX_CHANNELS`])
//! - [`ring`]: Lock-free overwrite-on-full ring ([`RingChannel`])
//! - [`table`]: Preallocated channel storage ([`ChannelTable`])
//! - [`decoder`]: Edge state machine ([`PulseDecoder`])
//! - [`health`]: Link health classification ([`Health`], [`HealthMonitor`])
//! - [`snapshot`]: Shared core and reader ([`DecoderCore`], [`Report`])
//! - [`input`] / [`output`]: Edge source and report sink traits
//! - [`bridge`]: Async glue ([`EdgePump`], [`ReportBridge`])
//!
//! # Example
//!
//! ```rust
//! use ppm_core::{DecoderConfig, DecoderCore, Health};
//!
//! static CORE: DecoderCore = DecoderCore::new(DecoderConfig::LEGACY);
//!
//! let mut decoder = CORE.take_decoder().unwrap();
//! for delta in [1500, 120, 180, 1500, 130, 170, 1500] {
//!     decoder.on_edge(delta, 0);
//! }
//!
//! let report = CORE.snapshot(0);
//! assert_eq!(report.health, Health::Ok);
//! assert_eq!(report.values.as_slice(), &[130, 170]);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: defmt formatting and logging (for embedded targets)
//! - **`log`**: Logging through the `log` crate
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.
//! Compare-and-swap on targets without native CAS (e.g. `thumbv6m`) comes
//! from `portable-atomic`; enable its `critical-section` feature there.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod logging;

pub mod bridge;
pub mod config;
pub mod decoder;
pub mod health;
pub mod input;
pub mod output;
pub mod ring;
pub mod snapshot;
pub mod table;

// Re-export main types at crate root
pub use bridge::{BridgeError, EdgePump, ReportBridge};
pub use config::{ConfigError, DecoderConfig, MAX_CHANNELS, RING_CAPACITY};
pub use decoder::{DecoderState, EdgeEvent, PulseDecoder};
pub use health::{Health, HealthMonitor, LinkState};
pub use input::{Edge, EdgeSource, InputError};
pub use output::{OutputError, ReportSink};
pub use ring::{saturate_width, PulseWidth, RingChannel};
pub use snapshot::{ChannelValues, DecoderCore, Report};
pub use table::ChannelTable;
