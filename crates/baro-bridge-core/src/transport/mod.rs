//! Serial transport seam
//!
//! The bridge needs a byte-duplex, line-delimited channel with a finite read
//! timeout. The host crate implements this on top of a real serial port;
//! tests use a scripted in-memory transport.

#[cfg(test)]
pub(crate) mod mock;

use core::time::Duration;

use crate::codec::FrameBuf;
use crate::error::TransportError;

/// Line terminator appended by [`Transport::write_line`] and stripped by
/// [`Transport::read_line`].
pub const LINE_ENDING: &[u8] = b"\r\n";

/// Byte-duplex serial channel used by [`crate::bridge::I2cBridge`].
///
/// Every read blocks until the requested data arrived or the configured
/// timeout elapsed, in which case [`TransportError::Timeout`] is returned.
/// Implementations must never block indefinitely.
pub trait Transport {
    /// Set the read/write timeout. Called once by the bridge at construction.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Write `line` followed by [`LINE_ENDING`].
    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError>;

    /// Read one line into `line`, without its terminator.
    ///
    /// `line` is cleared first.
    fn read_line(&mut self, line: &mut FrameBuf) -> Result<(), TransportError>;

    /// Write raw bytes without any framing.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Fill `buf` completely.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Drain everything currently pending on the input side without waiting.
    ///
    /// `buf` is cleared first. When more bytes are pending than `buf` holds,
    /// the oldest ones are discarded and the most recent ones kept.
    fn read_existing(&mut self, buf: &mut FrameBuf) -> Result<(), TransportError>;

    /// Write a single raw byte.
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.write_bytes(&[byte])
    }

    /// Read a single raw byte, waiting up to the timeout.
    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}

/// Append `bytes` to `buf`, keeping only the most recent bytes when full.
///
/// Shared by transports implementing [`Transport::read_existing`].
pub fn push_keep_latest(buf: &mut FrameBuf, bytes: &[u8]) {
    let capacity = buf.capacity();
    if bytes.len() >= capacity {
        buf.clear();
        let _ = buf.extend_from_slice(&bytes[bytes.len() - capacity..]);
        return;
    }

    let overflow = (buf.len() + bytes.len()).saturating_sub(capacity);
    if overflow > 0 {
        let kept = buf.len() - overflow;
        buf.copy_within(overflow.., 0);
        buf.truncate(kept);
    }
    let _ = buf.extend_from_slice(bytes);
}
