//! Session management
//!
//! Drives the whole session lifecycle against an exclusively-owned
//! transport: slow-init handshake, diagnostic session setup, the two
//! table writes, then the poll loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity, StopBits};
use tracing::{debug, info};

use super::frame::frame;
use super::handshake::{slow_init, wait_for_byte, SlowInitTiming};
use super::poll::{decode_response, poll_request, POLL_RESPONSE_LEN};
use super::tables::{data_table_payload, ddli_table_payload, DdliEntry, ParameterDescriptor, ENGINE_RPM};
use super::{
    KLineTransport, ProtocolError, BAUD_CODE_10400, DEVELOPMENT_SESSION, DIAGNOSTIC_BAUD,
    DEFAULT_WAIT_TIMEOUT_MS, HOST_ACK, KWP2000_ADDRESS, START_DIAGNOSTIC_SESSION, SYNC_BYTE,
};

/// Expected response length for startDiagnosticSession
const START_SESSION_RESPONSE_LEN: usize = 10;

/// Expected response length for the DDLI table write
const DDLI_RESPONSE_LEN: usize = 21;

/// Expected response length for the data table write
const DATA_TABLE_RESPONSE_LEN: usize = 111;

/// Session state
///
/// Transitions are strictly forward; `Failed` is terminal and reachable
/// from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing sent yet
    Idle,
    /// Slow-init address banged out, waiting for synchronization
    AddressSent,
    /// Sync byte and address complement exchanged
    LineSynchronized,
    /// Diagnostic/development session running
    SessionEstablished,
    /// DDLI and data tables written
    TablesConfigured,
    /// Poll loop active
    Polling,
    /// Fatal fault; no recovery
    Failed,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Slow-init target address (0x11 for KWP2000, 0x33 for ISO 9141)
    pub address: u8,
    /// Slow-init bit timing
    pub timing: SlowInitTiming,
    /// Deadline for every bounded wait (sync bytes and responses)
    pub wait_timeout: Duration,
    /// Bounded retries when a poll reply fails validation
    pub poll_retries: u8,
    /// The parameter exposed through the DDLI indirection
    pub parameter: ParameterDescriptor,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: KWP2000_ADDRESS,
            timing: SlowInitTiming::default(),
            wait_timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_retries: 3,
            parameter: ENGINE_RPM,
        }
    }
}

/// A KWP2000 diagnostic session over an exclusively-owned K-line transport
pub struct Session<T: KLineTransport> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
}

impl<T: KLineTransport> Session<T> {
    /// Create a new session (nothing sent until [`connect`](Self::connect))
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Idle,
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Tear down the session, handing the transport back
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Bring the line from idle into a synchronized diagnostic session.
    ///
    /// Slow-init handshake, switch to 10400 baud 8N1, then the
    /// sync-byte / acknowledgment / address-complement exchange.
    pub fn connect(&mut self) -> Result<(), ProtocolError> {
        self.expect_state(SessionState::Idle)?;

        let result = self.connect_inner();
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }

    fn connect_inner(&mut self) -> Result<(), ProtocolError> {
        info!("slow init at address {:#04x}", self.config.address);
        slow_init(&mut self.transport, self.config.address, &self.config.timing)?;
        self.state = SessionState::AddressSent;

        self.transport.set_baud(DIAGNOSTIC_BAUD)?;
        self.transport
            .set_data_characteristics(DataBits::Eight, StopBits::One, Parity::None)?;

        wait_for_byte(&mut self.transport, SYNC_BYTE, self.config.wait_timeout)?;

        // Inter-byte gap before the host acknowledgment
        std::thread::sleep(self.config.timing.ack_delay);
        self.transport.write(&[HOST_ACK])?;

        wait_for_byte(
            &mut self.transport,
            0xFF - self.config.address,
            self.config.wait_timeout,
        )?;

        self.state = SessionState::LineSynchronized;
        info!("line synchronized");
        Ok(())
    }

    /// Start the development session and write both tables into ECU RAM.
    pub fn configure(&mut self) -> Result<(), ProtocolError> {
        self.expect_state(SessionState::LineSynchronized)?;

        let result = self.configure_inner();
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }

    fn configure_inner(&mut self) -> Result<(), ProtocolError> {
        let start = [START_DIAGNOSTIC_SESSION, DEVELOPMENT_SESSION, BAUD_CODE_10400];
        let response = self.exchange(&start, START_SESSION_RESPONSE_LEN)?;
        info!("session started, response {:02x?}", response);
        self.state = SessionState::SessionEstablished;

        let ddli = ddli_table_payload(&DdliEntry::for_parameters(1));
        let response = self.exchange(&ddli, DDLI_RESPONSE_LEN)?;
        info!("DDLI table written, response {:02x?}", response);

        let table = data_table_payload(&[self.config.parameter]);
        let response = self.exchange(&table, DATA_TABLE_RESPONSE_LEN)?;
        info!("data table written, response {:02x?}", response);

        self.state = SessionState::TablesConfigured;
        Ok(())
    }

    /// One poll iteration: request the configured value and decode it.
    ///
    /// A reply that fails opcode/identifier validation is retried up to
    /// the configured bound before the mismatch becomes fatal.
    pub fn read_value(&mut self) -> Result<u16, ProtocolError> {
        if self.state != SessionState::TablesConfigured && self.state != SessionState::Polling {
            return Err(ProtocolError::ProtocolError(format!(
                "cannot poll in state {:?}",
                self.state
            )));
        }
        self.state = SessionState::Polling;

        let mut attempts = 0;
        loop {
            let result = self
                .exchange(&poll_request(), POLL_RESPONSE_LEN)
                .and_then(|response| decode_response(&response, &self.config.parameter));

            match result {
                Ok(value) => return Ok(value),
                Err(e @ ProtocolError::ResponseMismatch { .. })
                    if attempts < self.config.poll_retries =>
                {
                    attempts += 1;
                    debug!("poll validation failed ({}), retry {}", e, attempts);
                }
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            }
        }
    }

    /// Poll the configured value until `running` is cleared.
    ///
    /// The reference loops forever; the cancellation flag lets a host
    /// process stop the loop cleanly instead of killing it.
    pub fn poll<F>(&mut self, running: &AtomicBool, mut on_value: F) -> Result<(), ProtocolError>
    where
        F: FnMut(u16),
    {
        while running.load(Ordering::SeqCst) {
            on_value(self.read_value()?);
        }
        info!("poll loop cancelled");
        Ok(())
    }

    /// Frame `payload`, transmit it and read back a fixed-size response.
    fn exchange(&mut self, payload: &[u8], response_len: usize) -> Result<Vec<u8>, ProtocolError> {
        let framed = frame(payload);
        debug!("TX frame {:02x?}", framed.as_bytes());
        self.transport.write(framed.as_bytes())?;

        let mut response = vec![0u8; response_len];
        self.transport
            .read_exact(&mut response, self.config.wait_timeout)?;
        debug!("RX {:02x?}", response);
        Ok(response)
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), ProtocolError> {
        if self.state != expected {
            return Err(ProtocolError::ProtocolError(format!(
                "expected state {:?}, currently {:?}",
                expected, self.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_starts_idle() {
        let session = Session::new(crate::protocol::testing::MockTransport::new(), SessionConfig::default());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_configure_requires_synchronized_line() {
        let mut session = Session::new(
            crate::protocol::testing::MockTransport::new(),
            SessionConfig::default(),
        );
        assert!(matches!(
            session.configure(),
            Err(ProtocolError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.address, KWP2000_ADDRESS);
        assert_eq!(config.parameter, ENGINE_RPM);
        assert_eq!(config.poll_retries, 3);
    }
}
