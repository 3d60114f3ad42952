//! Error taxonomy for the bridge
//!
//! Three families, surfaced through [`BridgeError`]:
//!
//! - [`TransportError`]: the serial channel failed (I/O error, timeout, closed port).
//! - [`ProtocolError`]: a frame came back but does not match the request.
//! - [`ValidationError`]: the request was rejected before any I/O happened.

use thiserror_no_std::Error;

/// Failures reported by a [`crate::transport::Transport`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No complete line or byte count arrived before the configured timeout
    #[error("Serial read timed out")]
    Timeout,

    /// The port was closed or disconnected
    #[error("Serial port closed")]
    Closed,

    /// An incoming line did not fit into a frame buffer
    #[error("Incoming frame exceeds {capacity} bytes")]
    Overflow {
        /// Capacity of the receiving buffer
        capacity: usize,
    },

    /// Any other I/O failure reported by the underlying channel
    #[error("Serial I/O error")]
    Io,
}

/// A response frame was received but could not be accepted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Text response does not start with the expected header token
    #[error("Unexpected response header")]
    HeaderMismatch,

    /// Echoed direction flag differs from the request direction
    #[error("Direction flag mismatch (expected {expected:#04x}, found {found:#04x})")]
    DirectionMismatch { expected: u8, found: u8 },

    /// Binary response starts with the wrong tag byte
    #[error("Unexpected tag byte (expected {expected:#04x}, found {found:#04x})")]
    UnexpectedTag { expected: u8, found: u8 },

    /// Echoed length differs from the requested length
    #[error("Length mismatch (requested {requested}, echoed {echoed})")]
    LengthMismatch { requested: u8, echoed: u8 },

    /// A hex group could not be parsed
    #[error("Malformed hex digits in response")]
    MalformedHex,

    /// The frame ended before all fields were present
    #[error("Response frame truncated")]
    Truncated,

    /// Buffer clear was not acknowledged with `OK`
    #[error("Buffer clear not acknowledged")]
    MissingAcknowledge,
}

/// A request rejected before touching the transport.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Payload longer than the one-byte length field allows
    #[error("Payload of {len} bytes exceeds the 255 byte limit")]
    PayloadTooLong { len: usize },

    /// Read of zero bytes, or a zero-length buffer with default length
    #[error("Transfer length must be at least one byte")]
    EmptyTransfer,

    /// Explicit length larger than the supplied buffer
    #[error("Length {length} exceeds buffer capacity {capacity}")]
    LengthExceedsBuffer { length: u8, capacity: usize },

    /// Oversampling outside 0..=3
    #[error("Oversampling {0} out of range (0..=3)")]
    InvalidOversampling(u8),

    /// Transport timeout is zero or above the allowed maximum
    #[error("Transport timeout must be finite and non-zero")]
    InvalidTimeout,
}

/// Error returned by every [`crate::bridge::I2cBridge`] operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl embedded_hal::i2c::Error for BridgeError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            // The device did not confirm the transfer we asked for
            Self::Protocol(ProtocolError::LengthMismatch { .. }) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
            }
            Self::Transport(TransportError::Overflow { .. }) => ErrorKind::Overrun,
            _ => ErrorKind::Other,
        }
    }
}
