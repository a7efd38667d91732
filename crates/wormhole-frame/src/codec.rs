use crate::error::{FrameError, Result};

/// Header size on the wire: 4 × u32 = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Required value of the header's `version` field.
pub const PROTOCOL_VERSION: u32 = 1;

/// Required value of the header's `command_id` field.
pub const COMMAND_ID: u32 = 1;

/// Required value of the header's `service_id` field.
pub const SERVICE_ID: u32 = 1;

/// Fixed-size frame header.
///
/// Wire format (all fields little-endian):
/// ```text
/// ┌─────────────┬──────────────┬──────────────┬─────────────┐
/// │ version     │ command_id   │ service_id   │ data_len    │
/// │ (4B LE) = 1 │ (4B LE) = 1  │ (4B LE) = 1  │ (4B LE) = N │
/// └─────────────┴──────────────┴──────────────┴─────────────┘
/// ```
/// followed by exactly N body bytes, sent as a second, separate write.
///
/// The three identity fields are constants; [`PacketHeader::decode`] treats
/// any mismatch as "not a header" rather than an error, because mid-frame
/// body bytes routinely fail validation and must be accounted as body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub version: u32,
    pub command_id: u32,
    pub service_id: u32,
    /// Declared body length in bytes.
    pub data_len: u32,
}

impl PacketHeader {
    /// Build the header for a payload of `len` bytes.
    pub fn for_payload(len: usize) -> Result<Self> {
        if len > u32::MAX as usize {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: u32::MAX as usize,
            });
        }
        Ok(Self {
            version: PROTOCOL_VERSION,
            command_id: COMMAND_ID,
            service_id: SERVICE_ID,
            data_len: len as u32,
        })
    }

    /// Encode into the 16-byte wire representation.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..8].copy_from_slice(&self.command_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.service_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.data_len.to_le_bytes());
        buf
    }

    /// Decode and validate a header.
    ///
    /// Returns `None` unless `bytes` is exactly [`HEADER_SIZE`] long and all
    /// three identity fields match their required constants. The length
    /// check is deliberate: a chunk is only ever a frame start when the
    /// header arrived as its own read.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HEADER_SIZE {
            return None;
        }
        let version = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let command_id = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let service_id = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let data_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap());

        if version != PROTOCOL_VERSION || command_id != COMMAND_ID || service_id != SERVICE_ID {
            return None;
        }

        Some(Self {
            version,
            command_id,
            service_id,
            data_len,
        })
    }

    /// Declared body length as a usize.
    pub fn body_len(&self) -> usize {
        self.data_len as usize
    }
}
