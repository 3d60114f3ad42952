//! Legacy tagged-byte encoding
//!
//! Requests are `[tag][address][length][payload]`, responses echo
//! `[tag][length]` before the returned payload. Presence is queried with a
//! single `'I'` byte and answered with `[0x49][flag]`, followed by the device
//! address when the flag is set.

use super::{Frame, FrameBuf, FrameCodec, Framing, MAX_PAYLOAD_LEN, Presence, commit_payload};
use crate::error::{ProtocolError, ValidationError};

pub const TAG_READ: u8 = 0x52; // 'R'
pub const TAG_WRITE: u8 = 0x57; // 'W'
pub const TAG_PRESENCE: u8 = 0x49; // 'I'

/// Tag + length echo preceding every response payload
const RESPONSE_HEADER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryCodec;

impl BinaryCodec {
    fn check_tag(frame: &[u8], expected: u8) -> Result<u8, ProtocolError> {
        let (&found, rest) = frame.split_first().ok_or(ProtocolError::Truncated)?;
        if found != expected {
            return Err(ProtocolError::UnexpectedTag { expected, found });
        }
        rest.first().copied().ok_or(ProtocolError::Truncated)
    }
}

impl FrameCodec for BinaryCodec {
    fn encode_write(&self, address: u8, payload: &[u8]) -> Result<Frame, ValidationError> {
        let too_long = ValidationError::PayloadTooLong { len: payload.len() };
        let length = u8::try_from(payload.len()).map_err(|_| too_long)?;

        let mut bytes = FrameBuf::new();
        bytes
            .extend_from_slice(&[TAG_WRITE, address, length])
            .map_err(|_| too_long)?;
        bytes.extend_from_slice(payload).map_err(|_| too_long)?;
        Ok(Frame::Bytes(bytes))
    }

    fn encode_read(&self, address: u8, length: u8) -> Result<Frame, ValidationError> {
        if length == 0 {
            return Err(ValidationError::EmptyTransfer);
        }

        let mut bytes = FrameBuf::new();
        bytes
            .extend_from_slice(&[TAG_READ, address, length])
            .map_err(|_| ValidationError::PayloadTooLong { len: 0 })?;
        Ok(Frame::Bytes(bytes))
    }

    fn write_response_framing(&self, _length: u8) -> Framing {
        Framing::Bytes(RESPONSE_HEADER_LEN)
    }

    fn read_response_framing(&self, _length: u8) -> Framing {
        Framing::Bytes(RESPONSE_HEADER_LEN)
    }

    fn read_payload_length(&self, header: &[u8]) -> Result<Option<u8>, ProtocolError> {
        Self::check_tag(header, TAG_READ).map(Some)
    }

    fn decode_write_response(&self, frame: &[u8]) -> Result<u8, ProtocolError> {
        Self::check_tag(frame, TAG_WRITE)
    }

    fn decode_read_response(
        &self,
        frame: &[u8],
        expected: u8,
        payload: &mut [u8],
    ) -> Result<(), ProtocolError> {
        let echoed = Self::check_tag(frame, TAG_READ)?;
        if echoed != expected {
            return Err(ProtocolError::LengthMismatch {
                requested: expected,
                echoed,
            });
        }

        let end = RESPONSE_HEADER_LEN + usize::from(expected);
        let decoded = frame
            .get(RESPONSE_HEADER_LEN..end)
            .ok_or(ProtocolError::Truncated)?;
        debug_assert!(decoded.len() <= MAX_PAYLOAD_LEN);

        commit_payload(decoded, payload)
    }

    fn presence_query(&self) -> Option<Frame> {
        let mut bytes = FrameBuf::new();
        bytes.push(TAG_PRESENCE).ok()?;
        Some(Frame::Bytes(bytes))
    }

    fn presence_framing(&self) -> Framing {
        Framing::Bytes(2)
    }

    fn decode_presence(&self, frame: &[u8]) -> Result<Presence, ProtocolError> {
        match Self::check_tag(frame, TAG_PRESENCE)? {
            0 => Ok(Presence::Absent),
            _ => Ok(Presence::AddressFollows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_write() {
        let frame = BinaryCodec.encode_write(0x77, &[0xF4, 0x2E]).unwrap();
        assert_eq!(frame.as_bytes(), &[0x57, 0x77, 0x02, 0xF4, 0x2E]);
        assert!(matches!(frame, Frame::Bytes(_)));
    }

    #[test]
    fn test_encode_write_rejects_long_payload() {
        let payload = [0u8; 300];
        assert_eq!(
            BinaryCodec.encode_write(0x77, &payload),
            Err(ValidationError::PayloadTooLong { len: 300 })
        );
    }

    #[test]
    fn test_encode_read() {
        let frame = BinaryCodec.encode_read(0x77, 3).unwrap();
        assert_eq!(frame.as_bytes(), &[0x52, 0x77, 0x03]);
        assert_eq!(
            BinaryCodec.encode_read(0x77, 0),
            Err(ValidationError::EmptyTransfer)
        );
    }

    #[test]
    fn test_response_framing() {
        assert_eq!(BinaryCodec.write_response_framing(5), Framing::Bytes(2));
        assert_eq!(BinaryCodec.read_response_framing(3), Framing::Bytes(2));
    }

    #[test]
    fn test_read_payload_length_from_header() {
        assert_eq!(BinaryCodec.read_payload_length(&[0x52, 0x03]), Ok(Some(3)));
        assert_eq!(
            BinaryCodec.read_payload_length(&[0x57, 0x03]),
            Err(ProtocolError::UnexpectedTag {
                expected: 0x52,
                found: 0x57
            })
        );
    }

    #[test]
    fn test_decode_write_response() {
        assert_eq!(BinaryCodec.decode_write_response(&[0x57, 0x02]), Ok(2));
        assert_eq!(
            BinaryCodec.decode_write_response(&[0x52, 0x02]),
            Err(ProtocolError::UnexpectedTag {
                expected: 0x57,
                found: 0x52
            })
        );
        assert_eq!(
            BinaryCodec.decode_write_response(&[0x57]),
            Err(ProtocolError::Truncated)
        );
    }

    #[test]
    fn test_decode_read_response() {
        let mut payload = [0u8; 3];
        BinaryCodec
            .decode_read_response(&[0x52, 0x03, 0x5D, 0x23, 0x00], 3, &mut payload)
            .unwrap();
        assert_eq!(payload, [0x5D, 0x23, 0x00]);
    }

    #[test]
    fn test_decode_read_response_length_mismatch() {
        let mut payload = [0xEEu8; 3];
        assert_eq!(
            BinaryCodec.decode_read_response(&[0x52, 0x02, 0x5D, 0x23, 0x00], 3, &mut payload),
            Err(ProtocolError::LengthMismatch {
                requested: 3,
                echoed: 2
            })
        );
        assert_eq!(payload, [0xEE; 3]);
    }

    #[test]
    fn test_decode_read_response_truncated() {
        let mut payload = [0xEEu8; 3];
        assert_eq!(
            BinaryCodec.decode_read_response(&[0x52, 0x03, 0x5D], 3, &mut payload),
            Err(ProtocolError::Truncated)
        );
        assert_eq!(payload, [0xEE; 3]);
    }

    #[test]
    fn test_presence() {
        assert_eq!(
            BinaryCodec.presence_query().unwrap().as_bytes(),
            &[TAG_PRESENCE]
        );
        assert_eq!(
            BinaryCodec.decode_presence(&[0x49, 0x01]),
            Ok(Presence::AddressFollows)
        );
        assert_eq!(
            BinaryCodec.decode_presence(&[0x49, 0x00]),
            Ok(Presence::Absent)
        );
        assert_eq!(
            BinaryCodec.decode_presence(&[0x41, 0x01]),
            Err(ProtocolError::UnexpectedTag {
                expected: 0x49,
                found: 0x41
            })
        );
    }
}
