//! Remote I2C bridge
//!
//! [`I2cBridge`] exposes presence detection, buffer reset and bounded
//! reads/writes against the single device attached to the remote
//! microcontroller. Each operation is one blocking write-then-read round trip
//! over the [`Transport`]; there are no request IDs on the wire, so calls must
//! never overlap. The bridge holds no lock: share it behind one exclusive gate
//! if several callers need it.
//!
//! Nothing is retried here. Only the caller knows whether a failed round trip
//! is safe to repeat.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorType, I2c, Operation};
use log::{debug, warn};

use crate::codec::{Frame, FrameBuf, FrameCodec, Framing, Presence, WireCodec};
use crate::error::{BridgeError, ProtocolError, TransportError, ValidationError};
use crate::transport::Transport;

/// Upper bound accepted for the transport timeout
pub const MAX_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Byte sent [`CLEAR_BUFFER_REPEAT`] times to resynchronise the receiver
pub const CLEAR_BUFFER_BYTE: u8 = 0x00;
pub const CLEAR_BUFFER_REPEAT: usize = 3;

/// Reply expected once the bridge flushed its buffer
pub const CLEAR_ACKNOWLEDGE: &[u8] = b"OK";

/// Wait after a buffer clear or a presence query before reading the reply
pub const SETTLE_DELAY_MS: u32 = 100;

pub struct I2cBridge<T, D, C = WireCodec> {
    transport: T,
    delay: D,
    codec: C,
}

impl<T, D, C> I2cBridge<T, D, C>
where
    T: Transport,
    D: DelayNs,
    C: FrameCodec,
{
    /// Create a bridge over `transport`, framing requests with `codec`.
    ///
    /// `timeout` bounds every transport read; it must be non-zero and at most
    /// [`MAX_TRANSPORT_TIMEOUT`].
    pub fn new(mut transport: T, codec: C, delay: D, timeout: Duration) -> Result<Self, BridgeError> {
        if timeout.is_zero() || timeout > MAX_TRANSPORT_TIMEOUT {
            return Err(ValidationError::InvalidTimeout.into());
        }
        transport.set_timeout(timeout)?;

        Ok(Self {
            transport,
            delay,
            codec,
        })
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport and the delay provider.
    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// Wait for the bridge to report an attached device.
    ///
    /// Returns the device's 7-bit address, or `None` when the bridge reports
    /// no device. A report that cannot be decoded is also treated as `None`:
    /// the first frames after opening the port are often line noise.
    /// Transport failures are returned as errors.
    pub fn detect_device_presence(&mut self) -> Result<Option<u8>, BridgeError> {
        if let Some(query) = self.codec.presence_query() {
            self.send(&query)?;
            self.delay.delay_ms(SETTLE_DELAY_MS);
        }

        let framing = self.codec.presence_framing();
        let mut frame = FrameBuf::new();
        self.receive(framing, &mut frame)?;

        match self.codec.decode_presence(&frame) {
            Ok(Presence::Absent) => Ok(None),
            Ok(Presence::Present(address)) => Ok(Some(address)),
            Ok(Presence::AddressFollows) => {
                let address = self.transport.read_byte()?;
                debug!("R: [{address:02X}]");
                Ok(Some(address))
            }
            Err(e) => {
                warn!("Ignoring undecodable presence report: {e}");
                Ok(None)
            }
        }
    }

    /// Flush the bridge's receive buffer.
    ///
    /// Sends the reset byte [`CLEAR_BUFFER_REPEAT`] times, waits
    /// [`SETTLE_DELAY_MS`] and drains all pending input. Stale bytes queued
    /// before the acknowledgement are discarded with it. A missing
    /// acknowledgement is reported as [`ProtocolError::MissingAcknowledge`];
    /// callers may simply try again.
    pub fn clear_buffer(&mut self) -> Result<(), BridgeError> {
        for _ in 0..CLEAR_BUFFER_REPEAT {
            self.transport.write_byte(CLEAR_BUFFER_BYTE)?;
        }
        self.delay.delay_ms(SETTLE_DELAY_MS);

        let mut pending = FrameBuf::new();
        self.transport.read_existing(&mut pending)?;
        trace("R", &pending);

        if is_acknowledge(&pending) {
            Ok(())
        } else {
            warn!("Buffer clear not acknowledged ({} bytes pending)", pending.len());
            Err(ProtocolError::MissingAcknowledge.into())
        }
    }

    /// Read `length` bytes from the device at `address` into `buffer`.
    ///
    /// A `length` of zero reads the whole buffer. `buffer` is only written
    /// when the complete response was decoded.
    pub fn read_bytes(
        &mut self,
        address: u8,
        buffer: &mut [u8],
        length: u8,
    ) -> Result<(), BridgeError> {
        let length = transfer_length(buffer.len(), length)?;
        let request = self.codec.encode_read(address, length)?;
        self.send(&request)?;

        let framing = self.codec.read_response_framing(length);
        let mut frame = FrameBuf::new();
        self.receive(framing, &mut frame)?;
        if let Some(announced) = self.codec.read_payload_length(&frame)? {
            self.receive_appended(usize::from(announced), &mut frame)?;
        }

        self.codec
            .decode_read_response(&frame, length, &mut buffer[..usize::from(length)])?;
        Ok(())
    }

    /// Write the first `length` bytes of `buffer` to the device at `address`.
    ///
    /// A `length` of zero writes the whole buffer. Succeeds only when the
    /// bridge acknowledges exactly `length` bytes.
    pub fn write_bytes(&mut self, address: u8, buffer: &[u8], length: u8) -> Result<(), BridgeError> {
        let length = transfer_length(buffer.len(), length)?;
        let request = self
            .codec
            .encode_write(address, &buffer[..usize::from(length)])?;
        self.send(&request)?;

        let framing = self.codec.write_response_framing(length);
        let mut frame = FrameBuf::new();
        self.receive(framing, &mut frame)?;

        let echoed = self.codec.decode_write_response(&frame)?;
        if echoed != length {
            return Err(ProtocolError::LengthMismatch {
                requested: length,
                echoed,
            }
            .into());
        }
        Ok(())
    }

    fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        trace("W", frame.as_bytes());
        match frame {
            Frame::Line(line) => self.transport.write_line(line),
            Frame::Bytes(bytes) => self.transport.write_bytes(bytes),
        }
    }

    fn receive(&mut self, framing: Framing, frame: &mut FrameBuf) -> Result<(), TransportError> {
        match framing {
            Framing::Line => {
                self.transport.read_line(frame)?;
                trace("R", frame);
                Ok(())
            }
            Framing::Bytes(count) => {
                frame.clear();
                self.receive_appended(count, frame)
            }
        }
    }

    /// Read exactly `count` more raw bytes onto the end of `frame`.
    fn receive_appended(&mut self, count: usize, frame: &mut FrameBuf) -> Result<(), TransportError> {
        let start = frame.len();
        frame
            .resize_default(start + count)
            .map_err(|_| TransportError::Overflow {
                capacity: frame.capacity(),
            })?;
        self.transport.read_exact(&mut frame[start..])?;
        trace("R", &frame[start..]);
        Ok(())
    }
}

/// Resolve the effective transfer length for a buffer of `capacity` bytes.
fn transfer_length(capacity: usize, length: u8) -> Result<u8, ValidationError> {
    if length == 0 {
        return u8::try_from(capacity).map_err(|_| ValidationError::PayloadTooLong { len: capacity });
    }
    if usize::from(length) > capacity {
        return Err(ValidationError::LengthExceedsBuffer { length, capacity });
    }
    Ok(length)
}

fn trim_line_ending(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && matches!(bytes[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &bytes[..end]
}

/// The last line of `pending` is exactly [`CLEAR_ACKNOWLEDGE`].
///
/// Anything on earlier lines is stale output flushed along with it.
fn is_acknowledge(pending: &[u8]) -> bool {
    let reply = trim_line_ending(pending);
    let last_line = match reply.iter().rposition(|b| matches!(b, b'\r' | b'\n')) {
        Some(end) => &reply[end + 1..],
        None => reply,
    };
    last_line == CLEAR_ACKNOWLEDGE
}

/// Log one frame, as text when it is printable.
fn trace(direction: &str, bytes: &[u8]) {
    match core::str::from_utf8(bytes) {
        Ok(text) if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') => {
            debug!("{direction}: {text}");
        }
        _ => debug!("{direction}: {bytes:02X?}"),
    }
}

impl<T, D, C> ErrorType for I2cBridge<T, D, C> {
    type Error = BridgeError;
}

/// Each operation becomes one bridge round trip covering the whole buffer.
impl<T, D, C> I2c for I2cBridge<T, D, C>
where
    T: Transport,
    D: DelayNs,
    C: FrameCodec,
{
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations {
            match operation {
                Operation::Read(buffer) => self.read_bytes(address, buffer, 0)?,
                Operation::Write(bytes) => self.write_bytes(address, bytes, 0)?,
            }
        }
        Ok(())
    }
}
