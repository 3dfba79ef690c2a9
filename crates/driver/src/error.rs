//! Error taxonomy for the driver core.
//!
//! Every fallible operation surfaces one of these enums; nothing panics.
//! Transport failures are carried generically so the bus error type of the
//! platform's `embedded-hal` implementation flows through unchanged.

use crate::pins::PinFunction;

/// Errors raised by the pin/bus registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinsError {
    /// A binding for this function (and index, for GPIO pins) already exists.
    #[error("binding already registered for this function")]
    AlreadyBound,
    /// `set_*` was called for a function that was never added.
    #[error("no binding registered for this function")]
    NotBound,
    /// The registry's fixed capacity for this binding kind is exhausted.
    #[error("registry capacity exhausted")]
    Capacity,
}

/// Errors raised when mutating an [`crate::format::AudioFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    /// The requested bit depth is not one of 16/18/20/24/32.
    #[error("unsupported bit depth: {0}")]
    UnsupportedBits(u8),
    /// The requested channel count is not one of 2/4/8/16.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),
}

/// Errors raised by the clock-coefficient resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// No coefficient row matches the (mclk, rate) pair, even after the
    /// divider/multiplier search.
    #[error("no clock coefficients for mclk {mclk_hz} Hz at {rate_hz} Hz")]
    NoMatch {
        /// Master clock the search started from.
        mclk_hz: u32,
        /// Requested sample rate.
        rate_hz: u32,
    },
}

/// Errors raised by codec drivers and boards.
///
/// Generic over the transport error `E` so bus failures propagate without
/// being flattened into a unit variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError<E> {
    /// A bus transaction failed.
    #[error("transport error")]
    Transport(E),
    /// The codec does not implement the requested operation.
    #[error("operation not supported by this codec")]
    Unsupported,
    /// The operation is not valid in the driver's current lifecycle state.
    #[error("operation not valid in current driver state")]
    WrongState,
    /// A required pin binding is missing from the registry.
    #[error("required pin binding missing")]
    MissingPin(PinFunction),
    /// A named configuration step failed; the chip may be partially
    /// configured.
    #[error("configuration step failed: {0}")]
    ConfigStep(&'static str),
    /// Pin registry rejected an operation.
    #[error(transparent)]
    Pins(#[from] PinsError),
    /// The format mutation was rejected.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// Clock resolution failed.
    #[error(transparent)]
    Clock(#[from] ClockError),
}

impl<E> DriverError<E> {
    /// Wrap a raw transport error.
    pub fn transport(err: E) -> Self {
        Self::Transport(err)
    }
}
