//! KWP2000 Serial Protocol Communication
//!
//! Implements the subset of the KWP2000 K-line protocol spoken by ME7
//! (M-box) ECUs: 5-baud slow init, diagnostic session setup, DDLI table
//! configuration and the read-by-local-identifier poll loop.

pub mod error;
pub mod frame;
pub mod handshake;
pub mod poll;
pub mod serial;
mod session;
pub mod tables;
pub mod testing;
pub mod transport;

pub use error::ProtocolError;
pub use handshake::SlowInitTiming;
pub use serial::{list_ports, open_first_port, open_port, PortInfo};
pub use session::{Session, SessionConfig, SessionState};
pub use transport::KLineTransport;

/// Slow-init target address for a KWP2000 session
pub const KWP2000_ADDRESS: u8 = 0x11;

/// Slow-init target address for an ISO 9141 session (not exercised here)
pub const ISO9141_ADDRESS: u8 = 0x33;

/// Synchronization byte sent by ME7 ECUs after slow init.
/// The generic spec calls for 0x55; the ME7 family answers 0x8F instead.
pub const SYNC_BYTE: u8 = 0x8F;

/// Fixed acknowledgment byte the host sends after the sync byte
pub const HOST_ACK: u8 = 0x70;

/// Baud rate for the diagnostic session after slow init
pub const DIAGNOSTIC_BAUD: u32 = 10_400;

/// startDiagnosticSession service id
pub const START_DIAGNOSTIC_SESSION: u8 = 0x10;

/// Development-session sub-function of startDiagnosticSession
pub const DEVELOPMENT_SESSION: u8 = 0x86;

/// Baud-rate code for 10400 baud in startDiagnosticSession
pub const BAUD_CODE_10400: u8 = 0x14;

/// writeMemoryByAddress service id
pub const WRITE_MEMORY_BY_ADDRESS: u8 = 0x3D;

/// readDataByLocalIdentifier service id
pub const READ_DATA_BY_LOCAL_IDENTIFIER: u8 = 0x21;

/// recordLocalIdentifier of the DDLI table
pub const RECORD_LOCAL_IDENTIFIER: u8 = 0xF0;

/// Positive response to readDataByLocalIdentifier (service id + 0x40)
pub const POSITIVE_RESPONSE: u8 = 0x61;

/// Default deadline for waits on a specific byte or response, in
/// milliseconds. The reference implementation blocks forever; bounding
/// the wait surfaces a desynchronized line as a timeout instead.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;
