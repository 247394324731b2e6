//! Glue between the decoder and its collaborators.
//!
//! [`EdgePump`] moves edges from an [`EdgeSource`] into the decoder and runs
//! in the high-priority context. [`ReportBridge`] takes snapshots and forwards
//! them to a [`ReportSink`] from the normal-priority context.

use crate::decoder::{EdgeEvent, PulseDecoder};
use crate::health::Health;
use crate::input::{EdgeSource, InputError};
use crate::output::{OutputError, ReportSink};
use crate::snapshot::{DecoderCore, Report};

/// Feeds edges from a source into the decoder.
///
/// # Error Handling
///
/// An input error forces a resync, so a broken capture is treated the same
/// way as a silent line.
pub struct EdgePump<'a, S> {
    decoder: PulseDecoder<'a>,
    source: S,
}

impl<'a, S: EdgeSource> EdgePump<'a, S> {
    pub fn new(decoder: PulseDecoder<'a>, source: S) -> Self {
        Self { decoder, source }
    }

    /// Run the pump indefinitely.
    pub async fn run(&mut self) -> ! {
        loop {
            let _ = self.process_one().await;
        }
    }

    /// Wait for one edge and feed it to the decoder.
    pub async fn process_one(&mut self) -> Result<EdgeEvent, BridgeError> {
        match self.source.next_edge().await {
            Ok(edge) => Ok(self.decoder.on_edge(edge.delta, edge.at_ms)),
            Err(e) => {
                debug!("ppm: edge source failed, resyncing");
                self.decoder.resync();
                Err(BridgeError::Input(e))
            }
        }
    }

    pub fn decoder(&self) -> &PulseDecoder<'a> {
        &self.decoder
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Decompose the pump, e.g. to hand the decoder to
    /// [`DecoderCore::shutdown`].
    pub fn into_parts(self) -> (PulseDecoder<'a>, S) {
        (self.decoder, self.source)
    }
}

/// Forwards decoder snapshots to a sink.
pub struct ReportBridge<'a, O> {
    core: &'a DecoderCore,
    sink: O,
    last_health: Option<Health>,
}

impl<'a, O: ReportSink> ReportBridge<'a, O> {
    pub fn new(core: &'a DecoderCore, sink: O) -> Self {
        Self {
            core,
            sink,
            last_health: None,
        }
    }

    /// Take one snapshot at `now_ms` and send it.
    ///
    /// The report is returned even when it was sent, so callers can act on
    /// the health (e.g. drive a status LED).
    pub async fn process_one(&mut self, now_ms: u32) -> Result<Report, BridgeError> {
        let report = self.core.snapshot(now_ms);

        if self.last_health != Some(report.health) {
            info!("ppm: link {}", report.health);
            self.last_health = Some(report.health);
        }

        self.sink
            .send(&report)
            .await
            .map_err(BridgeError::Output)?;
        Ok(report)
    }

    /// Health of the most recent snapshot.
    pub fn last_health(&self) -> Option<Health> {
        self.last_health
    }

    pub fn sink(&self) -> &O {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut O {
        &mut self.sink
    }

    pub fn into_sink(self) -> O {
        self.sink
    }
}

/// Error type for bridge operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeError {
    /// Error from the edge source.
    Input(InputError),
    /// Error from the report sink.
    Output(OutputError),
}

impl From<InputError> for BridgeError {
    fn from(err: InputError) -> Self {
        BridgeError::Input(err)
    }
}

impl From<OutputError> for BridgeError {
    fn from(err: OutputError) -> Self {
        BridgeError::Output(err)
    }
}
