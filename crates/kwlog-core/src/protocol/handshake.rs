//! Slow-init handshake
//!
//! FTDI adapters cannot generate a real 5 baud waveform, so the address
//! is banged out by toggling the break condition: break asserted drives
//! the K-line active (logic 0), break released leaves it idle (logic 1).
//! Bit timing comes entirely from the caller-side sleeps.

use std::time::{Duration, Instant};

use tracing::debug;

use super::{KLineTransport, ProtocolError};

/// Slow-init bit timing.
///
/// The defaults add up to the ~2.1 s sequence the ECU requires; shorten
/// them only in tests against a mock transport, never on a real line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlowInitTiming {
    /// Minimum idle time before the start condition
    pub idle: Duration,
    /// Duration of the start condition and of each address bit
    pub bit: Duration,
    /// Inter-byte gap between the sync byte and the host acknowledgment
    pub ack_delay: Duration,
}

impl Default for SlowInitTiming {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(300),
            bit: Duration::from_millis(200),
            ack_delay: Duration::from_millis(25),
        }
    }
}

/// Bang out the target address at 5 bits per second.
///
/// Idle guarantee, start condition, then the 8 address bits least
/// significant first: a 1 bit releases the line, a 0 bit asserts it.
/// No stop bit is encoded; the ECU infers it from timing.
pub fn slow_init<T: KLineTransport>(
    transport: &mut T,
    address: u8,
    timing: &SlowInitTiming,
) -> Result<(), ProtocolError> {
    debug!("slow init: address {:#04x}", address);

    // The K-line must be idle for at least 300 ms first
    transport.clear_break()?;
    std::thread::sleep(timing.idle);

    // Start condition: line active for one bit time
    transport.set_break()?;
    std::thread::sleep(timing.bit);

    for i in 0..8 {
        if (address >> i) & 0x01 != 0 {
            transport.clear_break()?;
        } else {
            transport.set_break()?;
        }
        std::thread::sleep(timing.bit);
    }

    // End the sequence with the line idle
    transport.clear_break()?;
    Ok(())
}

/// Block until `expected` is observed, discarding anything else.
///
/// The reference implementation waits forever here; a line that never
/// produces the byte is surfaced as [`ProtocolError::Timeout`] instead.
pub fn wait_for_byte<T: KLineTransport>(
    transport: &mut T,
    expected: u8,
    deadline: Duration,
) -> Result<(), ProtocolError> {
    let start = Instant::now();
    loop {
        if start.elapsed() > deadline {
            return Err(ProtocolError::Timeout(format!("byte {:#04x}", expected)));
        }
        match transport.read_byte()? {
            Some(byte) if byte == expected => {
                debug!("{:#04x} received", expected);
                return Ok(());
            }
            Some(byte) => {
                debug!("want {:#04x}, received {:#04x} instead", expected, byte);
            }
            None => {}
        }
    }
}
