//! Serial port handling
//!
//! Provides low-level serial port access for K-line communication and
//! the [`KLineTransport`] implementation backed by the `serialport`
//! crate. Slow-init bit timing is controlled by the caller's sleeps;
//! this layer only asserts and releases the break condition.

use serialport::{DataBits, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{KLineTransport, ProtocolError};

/// USB vendor id of FTDI, the chipset used by most K-line cables
pub const FTDI_VID: u16 = 0x0403;

/// Per-read poll interval applied to the port. Short enough that the
/// sync-byte wait loops stay responsive to their overall deadline.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    /// Whether the port looks like an FTDI-based cable
    pub fn is_ftdi(&self) -> bool {
        self.vid == Some(FTDI_VID)
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, manufacturer, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.manufacturer,
                usb_info.product,
            ),
            _ => (None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            manufacturer,
            product,
        }
    }
}

/// Helper used to sort port names so that:
///  - ttyUSB* ports come first (FTDI cables land here; sorted numerically)
///  - then ttyACM* ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    // Collect from serialport API
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
    {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Linux-only: Add /dev/ttyUSB* and /dev/ttyACM* entries if present but not found by API
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo {
                        name: full,
                        vid: None,
                        pid: None,
                        manufacturer: None,
                        product: None,
                    });
                }
            }
        }
    }

    // Collect and sort deterministically, FTDI cables ahead of the rest
    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| (!p.is_ftdi(), port_sort_key(&p.name)));
    v
}

/// Open a named port as a K-line transport.
///
/// The port is opened at the adapter's native baud rate; the handshake
/// switches to the diagnostic rate once the address has been banged out.
pub fn open_port(name: &str) -> Result<SerialKLine, ProtocolError> {
    let port = serialport::new(name, super::DIAGNOSTIC_BAUD)
        .timeout(READ_POLL_INTERVAL)
        .open()
        .map_err(|e| match e.kind {
            serialport::ErrorKind::NoDevice => ProtocolError::PortNotFound(name.to_string()),
            _ => ProtocolError::SerialError(e.to_string()),
        })?;
    Ok(SerialKLine { port })
}

/// Open the first enumerated port, mirroring the reference behavior of
/// assuming device index 0. Fails with [`ProtocolError::NoDevice`] if
/// nothing is connected.
pub fn open_first_port() -> Result<SerialKLine, ProtocolError> {
    let ports = list_ports();
    let first = ports.first().ok_or(ProtocolError::NoDevice)?;
    debug!("opening first enumerated port {}", first.name);
    open_port(&first.name)
}

/// [`KLineTransport`] backed by a `serialport` handle
pub struct SerialKLine {
    port: Box<dyn SerialPort>,
}

impl KLineTransport for SerialKLine {
    fn set_baud(&mut self, baud: u32) -> Result<(), ProtocolError> {
        self.port
            .set_baud_rate(baud)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn set_data_characteristics(
        &mut self,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<(), ProtocolError> {
        self.port
            .set_data_bits(data_bits)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        self.port
            .set_stop_bits(stop_bits)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        self.port
            .set_parity(parity)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn set_break(&mut self) -> Result<(), ProtocolError> {
        self.port
            .set_break()
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn clear_break(&mut self) -> Result<(), ProtocolError> {
        self.port
            .clear_break()
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        debug!("TX {:02x?}", data);
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, ProtocolError> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) => Err(ProtocolError::SerialError(e.to_string())),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8], deadline: Duration) -> Result<(), ProtocolError> {
        let start = Instant::now();
        let mut offset = 0;

        while offset < buf.len() {
            if start.elapsed() > deadline {
                debug!(
                    "read_exact: timed out after reading {} of {} bytes",
                    offset,
                    buf.len()
                );
                return Err(ProtocolError::Timeout(format!(
                    "{}-byte response",
                    buf.len()
                )));
            }

            // Check how many bytes are available without blocking
            let available = self
                .port
                .bytes_to_read()
                .map_err(|e| ProtocolError::SerialError(e.to_string()))?
                as usize;

            if available == 0 {
                std::thread::sleep(Duration::from_millis(2));
                continue;
            }

            let to_read = std::cmp::min(available, buf.len() - offset);
            match self.port.read(&mut buf[offset..offset + to_read]) {
                Ok(0) => {
                    return Err(ProtocolError::SerialError("EOF on serial port".to_string()))
                }
                Ok(n) => offset += n,
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    continue;
                }
                Err(e) => return Err(ProtocolError::SerialError(e.to_string())),
            }
        }

        debug!("RX {:02x?}", &buf[..]);
        Ok(())
    }
}
