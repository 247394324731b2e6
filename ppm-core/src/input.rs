//! Edge source trait and error types.

use core::future::Future;

/// One captured falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Edge {
    /// Time since the previous edge, in the decoder's time unit.
    pub delta: u32,
    /// Wall-clock time of the edge in milliseconds.
    pub at_ms: u32,
}

/// Error type for edge capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// Capture peripheral error.
    Io,
    /// Edges were lost (capture FIFO or counter overflowed).
    Overflow,
    /// The input pin or receiver is gone.
    Disconnected,
}

/// Async trait for falling-edge sources.
///
/// Implementations wrap a GPIO interrupt, a timer capture channel or a PIO
/// state machine. They must not allocate.
pub trait EdgeSource {
    /// Wait for the next falling edge.
    fn next_edge(&mut self) -> impl Future<Output = Result<Edge, InputError>>;

    /// Check if the source is capturing.
    fn is_connected(&self) -> bool;
}
