//! Two-digit hexadecimal groups used by the text encoding.

use crate::codec::FrameBuf;
use crate::error::{ProtocolError, ValidationError};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Append `byte` as two uppercase hex digits, failing with `overflow` when
/// `buf` is full.
pub(crate) fn push_byte(
    buf: &mut FrameBuf,
    byte: u8,
    overflow: ValidationError,
) -> Result<(), ValidationError> {
    let digits = [
        HEX_DIGITS[usize::from(byte >> 4)],
        HEX_DIGITS[usize::from(byte & 0x0F)],
    ];
    buf.extend_from_slice(&digits).map_err(|_| overflow)
}

/// Parse the `index`-th two-digit group of `digits`.
///
/// Lowercase digits are accepted.
pub(crate) fn byte_at(digits: &[u8], index: usize) -> Result<u8, ProtocolError> {
    let start = index * 2;
    let group = digits
        .get(start..start + 2)
        .ok_or(ProtocolError::Truncated)?;
    Ok((nibble(group[0])? << 4) | nibble(group[1])?)
}

fn nibble(digit: u8) -> Result<u8, ProtocolError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        _ => Err(ProtocolError::MalformedHex),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVERFLOW: ValidationError = ValidationError::PayloadTooLong { len: 300 };

    #[test]
    fn test_push_byte_uppercase() {
        let mut buf = FrameBuf::new();
        push_byte(&mut buf, 0x0A, OVERFLOW).unwrap();
        push_byte(&mut buf, 0xFF, OVERFLOW).unwrap();
        assert_eq!(buf.as_slice(), b"0AFF");
    }

    #[test]
    fn test_push_byte_reports_payload_length_when_full() {
        let mut buf = FrameBuf::new();
        buf.resize_default(buf.capacity() - 1).unwrap();

        assert_eq!(push_byte(&mut buf, 0x0A, OVERFLOW), Err(OVERFLOW));
        assert_eq!(buf.len(), buf.capacity() - 1);
    }

    #[test]
    fn test_byte_at() {
        assert_eq!(byte_at(b"01ff7e", 0), Ok(0x01));
        assert_eq!(byte_at(b"01ff7e", 1), Ok(0xFF));
        assert_eq!(byte_at(b"01ff7e", 2), Ok(0x7E));
        assert_eq!(byte_at(b"01ff7", 2), Err(ProtocolError::Truncated));
        assert_eq!(byte_at(b"0G", 0), Err(ProtocolError::MalformedHex));
    }
}
