//! DDLI and data table layout
//!
//! The ME7 indirection mechanism: a DDLI (dynamically-defined local
//! identifier) table written into unused ECU RAM points at a data table
//! holding the memory addresses of the parameters to log. A single
//! readDataByLocalIdentifier then retrieves all configured values.
//!
//! Every address and size in this module is specific to the M-box
//! variant and was determined empirically; changing them corrupts ECU
//! RAM rather than failing loudly.

use byteorder::{ByteOrder, LittleEndian};
use rand::Rng;

use super::WRITE_MEMORY_BY_ADDRESS;

/// Filler bytes must stay inside this band; the ECU's memory-scan
/// heuristics treat other ranges specially. The exact values are
/// inconsequential.
pub const FILLER_BAND: std::ops::RangeInclusive<u8> = 176..=185;

/// A scratch RAM region in the ECU holding one of the tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Start address, high byte first as it appears on the wire
    pub address: [u8; 3],
    /// Region size in bytes (the writeMemoryByAddress size field)
    pub size: u8,
}

impl MemoryRegion {
    /// Pointer encoding used inside the DDLI entry: the region start
    /// address low byte first, padded to 4 bytes
    pub fn pointer_bytes(&self) -> [u8; 4] {
        [self.address[2], self.address[1], self.address[0], 0x00]
    }

    /// Start of a writeMemoryByAddress payload targeting this region
    pub fn write_command_header(&self) -> [u8; 5] {
        [
            WRITE_MEMORY_BY_ADDRESS,
            self.address[0],
            self.address[1],
            self.address[2],
            self.size,
        ]
    }
}

/// Unused M-box RAM holding the DDLI table (8 bytes at 0x380792)
pub const DDLI_REGION: MemoryRegion = MemoryRegion {
    address: [0x38, 0x07, 0x92],
    size: 0x08,
};

/// Unused M-box RAM holding the data table (97 bytes at 0x386DA4)
pub const DATA_REGION: MemoryRegion = MemoryRegion {
    address: [0x38, 0x6D, 0xA4],
    size: 0x61,
};

/// Total writeMemoryByAddress payload length for the data table write:
/// 4 command/address bytes + size byte + 97 region bytes
pub const DATA_TABLE_PAYLOAD_LEN: usize = 102;

/// One value to be logged: response width and absolute memory address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Number of response bytes the ECU returns for this parameter
    pub width: u8,
    /// Absolute memory address of the value
    pub address: u32,
    /// Divisor applied to the raw value when decoding
    pub scale: u16,
}

impl ParameterDescriptor {
    /// Encode as the ECU's 6-byte parameter record: width, a reserved
    /// byte fixed at 0x41, then the address low byte first
    pub fn to_bytes(&self) -> [u8; 6] {
        let mut bytes = [self.width, 0x41, 0, 0, 0, 0];
        LittleEndian::write_u32(&mut bytes[2..6], self.address);
        bytes
    }
}

/// Engine speed on the M-box: two bytes at 0x0000F878, raw value is
/// quarter-RPM
pub const ENGINE_RPM: ParameterDescriptor = ParameterDescriptor {
    width: 0x02,
    address: 0x0000_F878,
    scale: 4,
};

/// The DDLI table entry written into [`DDLI_REGION`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdliEntry {
    /// Valid-flag marker (normally 0x00 0x01 for a used entry; the
    /// M-box wants 0x41 0x52)
    pub valid: [u8; 2],
    /// Number of entries in the data table
    pub parameter_count: u8,
    /// Region the entry points at
    pub data_table: MemoryRegion,
}

impl DdliEntry {
    /// Entry covering `count` parameters in [`DATA_REGION`]
    pub fn for_parameters(count: u8) -> Self {
        Self {
            valid: [0x41, 0x52],
            parameter_count: count,
            data_table: DATA_REGION,
        }
    }

    /// Encode as the 8-byte record the ECU expects: valid flag, count,
    /// a reserved byte, then the data-table pointer low byte first
    pub fn to_bytes(&self) -> [u8; 8] {
        let p = self.data_table.pointer_bytes();
        [
            self.valid[0],
            self.valid[1],
            self.parameter_count,
            0x00,
            p[0],
            p[1],
            p[2],
            p[3],
        ]
    }
}

/// Build the writeMemoryByAddress payload for the DDLI table
pub fn ddli_table_payload(entry: &DdliEntry) -> Vec<u8> {
    let mut payload = Vec::with_capacity(13);
    payload.extend_from_slice(&DDLI_REGION.write_command_header());
    payload.extend_from_slice(&entry.to_bytes());
    payload
}

/// Build the writeMemoryByAddress payload for the data table.
///
/// Real descriptor bytes first, then pseudo-random filler from
/// [`FILLER_BAND`] up to the region's declared size.
pub fn data_table_payload(parameters: &[ParameterDescriptor]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(DATA_TABLE_PAYLOAD_LEN);
    payload.extend_from_slice(&DATA_REGION.write_command_header());
    for parameter in parameters {
        payload.extend_from_slice(&parameter.to_bytes());
    }

    let mut rng = rand::thread_rng();
    while payload.len() < DATA_TABLE_PAYLOAD_LEN {
        payload.push(rng.gen_range(FILLER_BAND));
    }
    payload
}
