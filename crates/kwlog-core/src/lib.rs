//! # kwlog Core Library
//!
//! Core functionality for kwlog, a KWP2000 K-line datalogger.

#![warn(missing_docs)]

//!
//! This library provides:
//! - 5-baud slow-init address handshake (bit-banged over the break signal)
//! - KWP2000 packet framing (length normalization + checksum)
//! - DDLI/data-table session configuration for ME7 (M-box) ECUs
//! - A cancellable poll loop decoding the configured parameter
//!
//! ## Supported targets
//!
//! - Audi/VW ME7 M-box ECUs over an FTDI-based K-line cable
//!
//! ## Example
//!
//! ```rust,ignore
//! use kwlog_core::protocol::{Session, SessionConfig, serial};
//!
//! let transport = serial::open_first_port()?;
//! let mut session = Session::new(transport, SessionConfig::default());
//! session.connect()?;
//! session.configure()?;
//! let rpm = session.read_value()?;
//! println!("RPM: {}", rpm);
//! ```

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        frame::{frame, Frame},
        ProtocolError, Session, SessionConfig, SessionState,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
