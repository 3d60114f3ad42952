//! ASCII hex line encoding
//!
//! ```text
//! host → bridge   WV,0011,00<len><hex payload>.   write request
//! bridge → host   SHW,0013,00<len>                write acknowledgement
//! host → bridge   WV,0011,01<len>.                read request
//! bridge → host   SHW,0013,01<len><hex payload>   read response
//! bridge → host   SHW,000E,<flag><addr>           presence announcement
//! ```
//!
//! The firmware serves a single attached device, so requests carry a fixed
//! channel tag instead of the device address.

use super::{
    Direction, Frame, FrameBuf, FrameCodec, Framing, MAX_PAYLOAD_LEN, Presence, commit_payload,
    hex,
};
use crate::error::{ProtocolError, ValidationError};

const REQUEST_HEADER: &[u8] = b"WV,0011,";
const RESPONSE_HEADER: &[u8] = b"SHW,0013,";
const PRESENCE_HEADER: &[u8] = b"SHW,000E,";
const REQUEST_TERMINATOR: u8 = b'.';

/// Header + direction + length + hex payload + terminator
pub(super) const MAX_TEXT_FRAME_LEN: usize = REQUEST_HEADER.len() + 2 + 2 + 2 * MAX_PAYLOAD_LEN + 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCodec;

impl TextCodec {
    fn request(direction: Direction, length: u8, payload: &[u8]) -> Result<Frame, ValidationError> {
        let overflow = ValidationError::PayloadTooLong { len: payload.len() };

        let mut line = FrameBuf::new();
        line.extend_from_slice(REQUEST_HEADER)
            .map_err(|_| overflow)?;
        hex::push_byte(&mut line, direction as u8, overflow)?;
        hex::push_byte(&mut line, length, overflow)?;
        for &byte in payload {
            hex::push_byte(&mut line, byte, overflow)?;
        }
        line.push(REQUEST_TERMINATOR).map_err(|_| overflow)?;

        Ok(Frame::Line(line))
    }

    /// Strip the response header and check the echoed direction, returning
    /// the hex groups that follow it (length first).
    fn response_body(frame: &[u8], direction: Direction) -> Result<&[u8], ProtocolError> {
        let body = trim_line(frame)
            .strip_prefix(RESPONSE_HEADER)
            .ok_or(ProtocolError::HeaderMismatch)?;

        let found = hex::byte_at(body, 0)?;
        if found != direction as u8 {
            return Err(ProtocolError::DirectionMismatch {
                expected: direction as u8,
                found,
            });
        }
        Ok(&body[2..])
    }
}

impl FrameCodec for TextCodec {
    fn encode_write(&self, _address: u8, payload: &[u8]) -> Result<Frame, ValidationError> {
        let length = u8::try_from(payload.len())
            .map_err(|_| ValidationError::PayloadTooLong { len: payload.len() })?;
        Self::request(Direction::Write, length, payload)
    }

    fn encode_read(&self, _address: u8, length: u8) -> Result<Frame, ValidationError> {
        if length == 0 {
            return Err(ValidationError::EmptyTransfer);
        }
        Self::request(Direction::Read, length, &[])
    }

    fn write_response_framing(&self, _length: u8) -> Framing {
        Framing::Line
    }

    fn read_response_framing(&self, _length: u8) -> Framing {
        Framing::Line
    }

    fn decode_write_response(&self, frame: &[u8]) -> Result<u8, ProtocolError> {
        let body = Self::response_body(frame, Direction::Write)?;
        hex::byte_at(body, 0)
    }

    fn decode_read_response(
        &self,
        frame: &[u8],
        expected: u8,
        payload: &mut [u8],
    ) -> Result<(), ProtocolError> {
        let body = Self::response_body(frame, Direction::Read)?;

        let echoed = hex::byte_at(body, 0)?;
        if echoed != expected {
            return Err(ProtocolError::LengthMismatch {
                requested: expected,
                echoed,
            });
        }

        let mut decoded = [0u8; MAX_PAYLOAD_LEN];
        let decoded = &mut decoded[..usize::from(expected)];
        for (index, slot) in decoded.iter_mut().enumerate() {
            *slot = hex::byte_at(body, index + 1)?;
        }

        commit_payload(decoded, payload)
    }

    fn presence_query(&self) -> Option<Frame> {
        None
    }

    fn presence_framing(&self) -> Framing {
        Framing::Line
    }

    fn decode_presence(&self, frame: &[u8]) -> Result<Presence, ProtocolError> {
        let body = trim_line(frame)
            .strip_prefix(PRESENCE_HEADER)
            .ok_or(ProtocolError::HeaderMismatch)?;

        if hex::byte_at(body, 0)? == 0 {
            return Ok(Presence::Absent);
        }
        Ok(Presence::Present(hex::byte_at(body, 1)?))
    }
}

fn trim_line(frame: &[u8]) -> &[u8] {
    let end = frame
        .iter()
        .rposition(|byte| !matches!(byte, b'\r' | b'\n'))
        .map_or(0, |index| index + 1);
    &frame[..end]
}
