//! SensorLink wire protocol
//!
//! Shared protocol types and the packet codec for the host → device serial
//! link. The binary v2 format is the primary, size-optimized encoding; a
//! text encoding exists for debugging against a terminal, and a legacy JSON
//! encoding is kept for firmware that predates the binary protocol.
//!
//! Binary frame layout:
//!
//! ```text
//! [START][VERSION][COUNT] { [ID_HI][ID_LO][VALUE f32 LE] } x COUNT [CRC_LO][CRC_HI][END]
//! ```
//!
//! The CRC16 (Modbus variant) covers VERSION through the last data byte,
//! excluding the START and END markers. Sensor ids never contain the START
//! or END byte values in either position, so a receiver that lost sync can
//! scan for START/END without ever matching the middle of an id.

use serde::{Deserialize, Serialize};

pub mod codec;
pub mod crc;
pub mod decoder;

pub use codec::{encode_binary, encode_legacy_json, encode_text};
pub use crc::{crc16, crc16_update, xor_checksum};
pub use decoder::{DecodeState, FrameDecoder};

/// Frame start marker
pub const START_BYTE: u8 = 0xAA;

/// Frame end marker
pub const END_BYTE: u8 = 0x55;

/// Protocol version for the 16-bit-id scheme
pub const PROTOCOL_VERSION: u8 = 0x02;

/// Maximum sensors per frame (COUNT must fit one byte with margin)
pub const MAX_FRAME_SENSORS: usize = 250;

/// START + VERSION + COUNT
pub const HEADER_SIZE: usize = 3;

/// CRC16 + END
pub const FOOTER_SIZE: usize = 3;

/// ID(2) + VALUE(4)
pub const SENSOR_WIRE_SIZE: usize = 6;

/// True if either byte of `id` collides with a frame marker.
///
/// Such ids must never be assigned: a receiver re-synchronizing on the byte
/// stream would mistake them for frame boundaries.
pub fn is_reserved_id(id: u16) -> bool {
    let [hi, lo] = id.to_be_bytes();
    hi == START_BYTE || hi == END_BYTE || lo == START_BYTE || lo == END_BYTE
}

/// Wire encoding selected for the serial session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    /// Most efficient - 6 bytes per sensor
    #[default]
    Binary,
    /// Human readable - for debugging
    Text,
    /// Legacy - full JSON format, no CRC
    Json,
}

impl ProtocolMode {
    pub fn type_name(&self) -> &'static str {
        match self {
            ProtocolMode::Binary => "Binary",
            ProtocolMode::Text => "Text",
            ProtocolMode::Json => "Json",
        }
    }
}

/// One collected, validated sensor reading ready for the wire.
///
/// The binary and text encodings use only `id` and `value`; the legacy JSON
/// encoding also carries `name` and `unit`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub id: u16,
    pub value: f32,
    pub name: String,
    pub unit: String,
}

impl SensorSample {
    pub fn new(id: u16, value: f32) -> Self {
        Self {
            id,
            value,
            name: String::new(),
            unit: String::new(),
        }
    }

    pub fn with_meta(id: u16, value: f32, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id,
            value,
            name: name.into(),
            unit: unit.into(),
        }
    }
}

/// An ordered batch of samples for one transmit cycle.
///
/// Ephemeral: built per cycle, never persisted. Capped at
/// [`MAX_FRAME_SENSORS`]; constructing from a longer list keeps the first
/// 250 samples in the caller's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryFrame {
    pub sensors: Vec<SensorSample>,
}

impl TelemetryFrame {
    pub fn new(mut sensors: Vec<SensorSample>) -> Self {
        sensors.truncate(MAX_FRAME_SENSORS);
        Self { sensors }
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }
}
