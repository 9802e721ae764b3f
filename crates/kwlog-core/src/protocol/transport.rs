//! Transport abstraction
//!
//! The protocol engine drives the K-line through this trait rather than
//! a concrete serial handle, so the whole session can be exercised
//! against a scripted mock in tests. The production implementation is
//! [`serial::SerialKLine`](super::serial::SerialKLine).

use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};

use super::ProtocolError;

/// Byte-level access to a single-wire K-line interface.
///
/// The engine owns the transport exclusively for the lifetime of the
/// session; there is exactly one consumer and no sharing.
pub trait KLineTransport {
    /// Switch the line to a new baud rate
    fn set_baud(&mut self, baud: u32) -> Result<(), ProtocolError>;

    /// Apply byte framing (data bits, stop bits, parity)
    fn set_data_characteristics(
        &mut self,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<(), ProtocolError>;

    /// Assert the break condition (drive the line active/low)
    fn set_break(&mut self) -> Result<(), ProtocolError>;

    /// Release the break condition (line idle/high)
    fn clear_break(&mut self) -> Result<(), ProtocolError>;

    /// Write a sequence of bytes to the line
    fn write(&mut self, data: &[u8]) -> Result<(), ProtocolError>;

    /// Read a single byte, returning `None` if nothing arrived within
    /// the transport's short poll interval. Callers are responsible for
    /// an overall deadline.
    fn read_byte(&mut self) -> Result<Option<u8>, ProtocolError>;

    /// Read exactly `buf.len()` bytes, failing with
    /// [`ProtocolError::Timeout`] if the deadline expires first
    fn read_exact(&mut self, buf: &mut [u8], deadline: Duration) -> Result<(), ProtocolError>;
}
