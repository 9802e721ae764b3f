//! Test support: a scripted in-memory transport
//!
//! Used by the unit and integration tests to drive a whole session
//! without hardware. Reads are served from a flat byte queue in the
//! order the engine consumes them; break transitions and writes are
//! recorded for assertions.

use std::collections::VecDeque;
use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};

use super::{KLineTransport, ProtocolError};

/// Scripted [`KLineTransport`] for tests
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Break transitions in order; `true` = asserted
    pub break_states: Vec<bool>,
    /// Baud rates applied, in order
    pub baud_changes: Vec<u32>,
    /// Whether data characteristics were applied
    pub configured_8n1: bool,
    /// Each `write` call, in order
    pub writes: Vec<Vec<u8>>,
    /// Bytes still queued for reads
    pub responses: VecDeque<u8>,
    /// When set, every operation fails with a serial error
    pub fail: bool,
}

impl MockTransport {
    /// Empty transport: reads return nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose reads are served from `responses`
    pub fn with_responses(responses: Vec<u8>) -> Self {
        Self {
            responses: responses.into(),
            ..Self::default()
        }
    }

    /// Append bytes to the read queue
    pub fn queue_response(&mut self, bytes: &[u8]) {
        self.responses.extend(bytes.iter().copied());
    }

    fn check_fail(&self) -> Result<(), ProtocolError> {
        if self.fail {
            Err(ProtocolError::SerialError("mock failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KLineTransport for MockTransport {
    fn set_baud(&mut self, baud: u32) -> Result<(), ProtocolError> {
        self.check_fail()?;
        self.baud_changes.push(baud);
        Ok(())
    }

    fn set_data_characteristics(
        &mut self,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<(), ProtocolError> {
        self.check_fail()?;
        self.configured_8n1 = data_bits == DataBits::Eight
            && stop_bits == StopBits::One
            && parity == Parity::None;
        Ok(())
    }

    fn set_break(&mut self) -> Result<(), ProtocolError> {
        self.check_fail()?;
        self.break_states.push(true);
        Ok(())
    }

    fn clear_break(&mut self) -> Result<(), ProtocolError> {
        self.check_fail()?;
        self.break_states.push(false);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.check_fail()?;
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, ProtocolError> {
        self.check_fail()?;
        Ok(self.responses.pop_front())
    }

    fn read_exact(&mut self, buf: &mut [u8], _deadline: Duration) -> Result<(), ProtocolError> {
        self.check_fail()?;
        if self.responses.len() < buf.len() {
            // Report immediately rather than burning the deadline
            return Err(ProtocolError::Timeout(format!("{}-byte response", buf.len())));
        }
        for slot in buf.iter_mut() {
            *slot = self.responses.pop_front().unwrap();
        }
        Ok(())
    }
}
