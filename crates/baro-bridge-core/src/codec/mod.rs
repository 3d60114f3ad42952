//! Frame codecs
//!
//! A codec translates logical bridge operations into wire frames and decodes
//! the bridge's responses. Two encodings exist on the firmware side:
//!
//! | Encoding | Request                        | Response                   |
//! |----------|--------------------------------|----------------------------|
//! | Text     | `WV,0011,<dir><len><hex>.`     | `SHW,0013,<dir><len><hex>` |
//! | Binary   | `[tag][address][len][payload]` | `[tag][len][payload]`      |
//!
//! Both plug into [`crate::bridge::I2cBridge`] through [`FrameCodec`], so the
//! bridge and the sensor drivers are written once for either encoding.
//!
//! Codecs are pure: they never touch the transport.

mod binary;
mod hex;
mod text;

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::error::{ProtocolError, ValidationError};

pub use binary::BinaryCodec;
pub use text::TextCodec;

/// Largest payload a single request can carry (one length byte on the wire)
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Largest frame either encoding produces (a full text write request)
pub const MAX_FRAME_LEN: usize = text::MAX_TEXT_FRAME_LEN;

/// Fixed-capacity buffer holding one frame
pub type FrameBuf = heapless::Vec<u8, MAX_FRAME_LEN>;

/// An encoded request, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Sent with [`crate::transport::Transport::write_line`]
    Line(FrameBuf),
    /// Sent as raw bytes
    Bytes(FrameBuf),
}

impl Frame {
    /// The frame contents without any line terminator
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Line(buf) | Self::Bytes(buf) => buf,
        }
    }
}

/// How a response frame is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One CR/LF terminated line
    Line,
    /// Exactly this many raw bytes
    Bytes(usize),
}

/// Transfer direction flag carried by requests and echoed by responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Write = 0x00,
    Read = 0x01,
}

/// Decoded presence report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// No device attached to the bridge
    Absent,
    /// A device answered at this 7-bit address
    Present(u8),
    /// A device is attached; its address follows as one extra raw byte
    AddressFollows,
}

/// Encoding strategy for bridge frames.
pub trait FrameCodec {
    /// Encode a request writing `payload` to the device at `address`.
    ///
    /// Fails if `payload` is longer than [`MAX_PAYLOAD_LEN`].
    fn encode_write(&self, address: u8, payload: &[u8]) -> Result<Frame, ValidationError>;

    /// Encode a request reading `length` bytes from the device at `address`.
    ///
    /// Fails if `length` is zero.
    fn encode_read(&self, address: u8, length: u8) -> Result<Frame, ValidationError>;

    /// Framing of the acknowledgement to a write of `length` bytes.
    fn write_response_framing(&self, length: u8) -> Framing;

    /// Framing of the response to a read of `length` bytes.
    ///
    /// For encodings that announce the payload length in a header, this is
    /// the header only; see [`FrameCodec::read_payload_length`].
    fn read_response_framing(&self, length: u8) -> Framing;

    /// Number of raw payload bytes that follow a read response header.
    ///
    /// `None` when the framing returned by
    /// [`FrameCodec::read_response_framing`] already covers the whole
    /// response. The bridge always consumes the announced payload, even when
    /// it differs from the requested length, so the stream stays aligned.
    fn read_payload_length(&self, _header: &[u8]) -> Result<Option<u8>, ProtocolError> {
        Ok(None)
    }

    /// Decode a write acknowledgement, returning the echoed length.
    fn decode_write_response(&self, frame: &[u8]) -> Result<u8, ProtocolError>;

    /// Decode a read response into `payload[..expected]`.
    ///
    /// `payload` is left untouched unless every one of the `expected` bytes
    /// was recovered.
    fn decode_read_response(
        &self,
        frame: &[u8],
        expected: u8,
        payload: &mut [u8],
    ) -> Result<(), ProtocolError>;

    /// Query to send before waiting for a presence report, if the encoding
    /// needs one.
    fn presence_query(&self) -> Option<Frame>;

    /// Framing of the presence report.
    fn presence_framing(&self) -> Framing;

    /// Decode a presence report.
    fn decode_presence(&self, frame: &[u8]) -> Result<Presence, ProtocolError>;
}

/// Wire encoding selected at bridge construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// ASCII hex lines (current firmware)
    #[default]
    Text,
    /// Tagged raw bytes (legacy firmware)
    Binary,
}

impl Encoding {
    pub const fn codec(self) -> WireCodec {
        match self {
            Self::Text => WireCodec::Text(TextCodec),
            Self::Binary => WireCodec::Binary(BinaryCodec),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unknown encoding (expected \"text\" or \"binary\")")]
pub struct UnknownEncoding;

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("text") {
            Ok(Self::Text)
        } else if s.eq_ignore_ascii_case("binary") {
            Ok(Self::Binary)
        } else {
            Err(UnknownEncoding)
        }
    }
}

/// Either codec, chosen at runtime from an [`Encoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCodec {
    Text(TextCodec),
    Binary(BinaryCodec),
}

impl From<Encoding> for WireCodec {
    fn from(encoding: Encoding) -> Self {
        encoding.codec()
    }
}

impl FrameCodec for WireCodec {
    fn encode_write(&self, address: u8, payload: &[u8]) -> Result<Frame, ValidationError> {
        match self {
            Self::Text(codec) => codec.encode_write(address, payload),
            Self::Binary(codec) => codec.encode_write(address, payload),
        }
    }

    fn encode_read(&self, address: u8, length: u8) -> Result<Frame, ValidationError> {
        match self {
            Self::Text(codec) => codec.encode_read(address, length),
            Self::Binary(codec) => codec.encode_read(address, length),
        }
    }

    fn write_response_framing(&self, length: u8) -> Framing {
        match self {
            Self::Text(codec) => codec.write_response_framing(length),
            Self::Binary(codec) => codec.write_response_framing(length),
        }
    }

    fn read_response_framing(&self, length: u8) -> Framing {
        match self {
            Self::Text(codec) => codec.read_response_framing(length),
            Self::Binary(codec) => codec.read_response_framing(length),
        }
    }

    fn read_payload_length(&self, header: &[u8]) -> Result<Option<u8>, ProtocolError> {
        match self {
            Self::Text(codec) => codec.read_payload_length(header),
            Self::Binary(codec) => codec.read_payload_length(header),
        }
    }

    fn decode_write_response(&self, frame: &[u8]) -> Result<u8, ProtocolError> {
        match self {
            Self::Text(codec) => codec.decode_write_response(frame),
            Self::Binary(codec) => codec.decode_write_response(frame),
        }
    }

    fn decode_read_response(
        &self,
        frame: &[u8],
        expected: u8,
        payload: &mut [u8],
    ) -> Result<(), ProtocolError> {
        match self {
            Self::Text(codec) => codec.decode_read_response(frame, expected, payload),
            Self::Binary(codec) => codec.decode_read_response(frame, expected, payload),
        }
    }

    fn presence_query(&self) -> Option<Frame> {
        match self {
            Self::Text(codec) => codec.presence_query(),
            Self::Binary(codec) => codec.presence_query(),
        }
    }

    fn presence_framing(&self) -> Framing {
        match self {
            Self::Text(codec) => codec.presence_framing(),
            Self::Binary(codec) => codec.presence_framing(),
        }
    }

    fn decode_presence(&self, frame: &[u8]) -> Result<Presence, ProtocolError> {
        match self {
            Self::Text(codec) => codec.decode_presence(frame),
            Self::Binary(codec) => codec.decode_presence(frame),
        }
    }
}

/// Copy a fully decoded payload into the caller's buffer.
fn commit_payload(decoded: &[u8], payload: &mut [u8]) -> Result<(), ProtocolError> {
    let out = payload
        .get_mut(..decoded.len())
        .ok_or(ProtocolError::Truncated)?;
    out.copy_from_slice(decoded);
    Ok(())
}
