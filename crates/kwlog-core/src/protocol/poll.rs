//! Poll response decoding
//!
//! The configured DDLI is read back with a fixed-shape 11-byte reply:
//! 4 bytes echoing the request frame, a length byte, the positive
//! response opcode, the identifier echo, the value bytes and a trailing
//! checksum. The two value bytes arrive swapped relative to a naive
//! big-endian read: offset 9 holds the high byte, offset 8 the low byte.

use byteorder::{ByteOrder, LittleEndian};

use super::tables::ParameterDescriptor;
use super::{ProtocolError, POSITIVE_RESPONSE, READ_DATA_BY_LOCAL_IDENTIFIER, RECORD_LOCAL_IDENTIFIER};

/// Fixed size of the readDataByLocalIdentifier reply
pub const POLL_RESPONSE_LEN: usize = 11;

/// Offset of the positive-response opcode within the reply
pub const OPCODE_OFFSET: usize = 5;

/// Offset of the identifier echo within the reply
pub const IDENTIFIER_OFFSET: usize = 6;

/// Offset of the low value byte within the reply
pub const DATA_OFFSET: usize = 8;

/// The unframed poll request: readDataByLocalIdentifier for the DDLI
pub fn poll_request() -> [u8; 2] {
    [READ_DATA_BY_LOCAL_IDENTIFIER, RECORD_LOCAL_IDENTIFIER]
}

/// Decode a poll reply into a scaled parameter value.
///
/// Opcode and identifier echo are validated; the reference accepts the
/// reply blindly, so treat a mismatch as recoverable and retry. The
/// reply's own checksum byte is not verified (see DESIGN notes).
pub fn decode_response(
    response: &[u8],
    parameter: &ParameterDescriptor,
) -> Result<u16, ProtocolError> {
    if response.len() != POLL_RESPONSE_LEN {
        return Err(ProtocolError::ShortResponse {
            expected: POLL_RESPONSE_LEN,
            actual: response.len(),
        });
    }
    if response[OPCODE_OFFSET] != POSITIVE_RESPONSE {
        return Err(ProtocolError::ResponseMismatch {
            offset: OPCODE_OFFSET,
            expected: POSITIVE_RESPONSE,
            actual: response[OPCODE_OFFSET],
        });
    }
    if response[IDENTIFIER_OFFSET] != RECORD_LOCAL_IDENTIFIER {
        return Err(ProtocolError::ResponseMismatch {
            offset: IDENTIFIER_OFFSET,
            expected: RECORD_LOCAL_IDENTIFIER,
            actual: response[IDENTIFIER_OFFSET],
        });
    }

    let raw = LittleEndian::read_u16(&response[DATA_OFFSET..DATA_OFFSET + 2]);
    Ok(raw / parameter.scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tables::ENGINE_RPM;
    use pretty_assertions::assert_eq;

    fn reply(low: u8, high: u8) -> [u8; POLL_RESPONSE_LEN] {
        [
            0x02, 0x21, 0xF0, 0x13, // request echo
            0x04, // length
            POSITIVE_RESPONSE,
            RECORD_LOCAL_IDENTIFIER,
            0x00, // unused
            low,
            high,
            0x00, // checksum, not verified
        ]
    }

    #[test]
    fn test_decode_law() {
        // raw = 0x01 * 256 + 0x34 = 308; scaled by 4 = 77 RPM
        let value = decode_response(&reply(0x34, 0x01), &ENGINE_RPM).unwrap();
        assert_eq!(value, 77);
    }

    #[test]
    fn test_decode_rejects_negative_response() {
        let mut r = reply(0x34, 0x01);
        r[OPCODE_OFFSET] = 0x7F;
        let err = decode_response(&r, &ENGINE_RPM).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ResponseMismatch { offset: OPCODE_OFFSET, .. }
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_identifier() {
        let mut r = reply(0x34, 0x01);
        r[IDENTIFIER_OFFSET] = 0xF1;
        assert!(decode_response(&r, &ENGINE_RPM).is_err());
    }

    #[test]
    fn test_decode_rejects_short_reply() {
        let err = decode_response(&[0x61; 5], &ENGINE_RPM).unwrap_err();
        assert!(matches!(err, ProtocolError::ShortResponse { .. }));
    }

    #[test]
    fn test_poll_request_bytes() {
        assert_eq!(poll_request(), [0x21, 0xF0]);
    }
}
