//! Packet framing
//!
//! Wraps a raw KWP2000 command payload with the length prefix and the
//! trailing checksum byte expected by the target ECU.
//!
//! Frame format:
//! - 1 length byte (odd payload) or `0x00` + 1 length byte (even payload)
//! - N bytes: payload
//! - 1 byte: checksum, sum of all preceding bytes mod 256
//!
//! The ECU rejects long packets with an even byte count after the length
//! marker, so even payloads get a leading `0x00` pad. The length byte
//! always holds the original payload length, not the padded length.

/// A framed protocol command ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Get the framed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the frame, returning the framed bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total transmitted size
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// A frame is never empty (it always carries length and checksum)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Frame a raw command payload for transmission.
///
/// Pure transformation; payloads here are small fixed tables, so a
/// length above 255 cannot occur and is not guarded against.
pub fn frame(payload: &[u8]) -> Frame {
    let length = payload.len() as u8;

    let mut bytes = Vec::with_capacity(payload.len() + 3);
    if payload.len() % 2 != 0 {
        bytes.push(length);
    } else {
        // Pad with 0x00 to force an odd byte count after the marker
        bytes.push(0x00);
        bytes.push(length);
    }
    bytes.extend_from_slice(payload);
    bytes.push(checksum(&bytes));

    Frame { bytes }
}

/// Unsigned 8-bit sum of the length-normalized packet, overflow truncated
fn checksum(packet: &[u8]) -> u8 {
    packet.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}
