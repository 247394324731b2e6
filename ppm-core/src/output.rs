//! Report sink trait and error types.

use core::future::Future;

use crate::snapshot::Report;

/// Error type for report output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// UART/communication I/O error.
    Io,
    /// Sink not ready (e.g., peer not attached).
    NotReady,
    /// Previous report still in flight.
    Busy,
    /// The report could not be encoded.
    Format,
}

/// Async trait for report consumers.
///
/// A sink receives every [`Report`] the reader produces, health-only ones
/// included, and decides how to encode it.
pub trait ReportSink {
    /// Send a report to the consumer.
    fn send(&mut self, report: &Report) -> impl Future<Output = Result<(), OutputError>>;

    /// Check if the sink can accept a report.
    fn is_ready(&self) -> bool;
}
