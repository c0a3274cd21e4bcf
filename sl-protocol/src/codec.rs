//! Packet encoders
//!
//! All three encoders return `None` when there is nothing to send (empty
//! frame); the session treats that as a skipped tick rather than an error.
//! Frames longer than [`MAX_FRAME_SENSORS`] are truncated, never rejected.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::crc::{crc16, xor_checksum};
use crate::{
    TelemetryFrame, END_BYTE, FOOTER_SIZE, HEADER_SIZE, MAX_FRAME_SENSORS, PROTOCOL_VERSION,
    SENSOR_WIRE_SIZE, START_BYTE,
};

/// Encode a frame in the primary binary v2 format.
///
/// Layout: `[START][VERSION][COUNT]{[ID_HI][ID_LO][VALUE LE]}xCOUNT[CRC_LO][CRC_HI][END]`.
/// The CRC16 covers VERSION through the last data byte.
pub fn encode_binary(frame: &TelemetryFrame) -> Option<Vec<u8>> {
    let count = frame.sensors.len().min(MAX_FRAME_SENSORS);
    if count == 0 {
        return None;
    }
    let sensors = &frame.sensors[..count];

    let mut packet = Vec::with_capacity(HEADER_SIZE + count * SENSOR_WIRE_SIZE + FOOTER_SIZE);
    packet.push(START_BYTE);
    packet.push(PROTOCOL_VERSION);
    packet.push(count as u8);

    for sensor in sensors {
        packet.extend_from_slice(&sensor.id.to_be_bytes());
        packet.extend_from_slice(&sensor.value.to_le_bytes());
    }

    let crc = crc16(&packet[1..]);
    packet.extend_from_slice(&crc.to_le_bytes());
    packet.push(END_BYTE);

    debug_assert!(crate::decoder::FrameDecoder::decode(&packet).is_some());
    Some(packet)
}

/// Encode a frame in the human-readable text format.
///
/// `$S`, one `IIII:V.V` line per sensor (4 hex digits, one decimal), then
/// `$E:XX` where XX is the XOR of every preceding byte.
pub fn encode_text(frame: &TelemetryFrame) -> Option<String> {
    let count = frame.sensors.len().min(MAX_FRAME_SENSORS);
    if count == 0 {
        return None;
    }

    let mut out = String::from("$S\n");
    for sensor in &frame.sensors[..count] {
        // write! to a String cannot fail
        let _ = writeln!(out, "{:04X}:{:.1}", sensor.id, sensor.value);
    }

    let checksum = xor_checksum(out.as_bytes());
    let _ = writeln!(out, "$E:{:02X}", checksum);
    Some(out)
}

#[derive(Serialize)]
struct LegacyPacket {
    timestamp: String,
    sensors: Vec<LegacySensor>,
}

#[derive(Serialize)]
struct LegacySensor {
    id: String,
    name: String,
    value: f32,
    unit: String,
}

/// Encode a frame in the legacy JSON format.
///
/// Kept for firmware that predates the binary protocol. Not CRC protected;
/// the id is the compact id rendered as a hex string.
pub fn encode_legacy_json(frame: &TelemetryFrame, timestamp: DateTime<Utc>) -> Option<String> {
    let count = frame.sensors.len().min(MAX_FRAME_SENSORS);
    if count == 0 {
        return None;
    }

    let packet = LegacyPacket {
        timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        sensors: frame.sensors[..count]
            .iter()
            .map(|s| LegacySensor {
                id: format!("0x{:04X}", s.id),
                name: s.name.clone(),
                value: s.value,
                unit: s.unit.clone(),
            })
            .collect(),
    };

    serde_json::to_string(&packet).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SensorSample;
    use chrono::TimeZone;

    fn two_sensor_frame() -> TelemetryFrame {
        TelemetryFrame::new(vec![
            SensorSample::with_meta(0x0001, 65.5, "CPU Temp", "°C"),
            SensorSample::with_meta(0x0010, 70.0, "GPU Temp", "°C"),
        ])
    }

    #[test]
    fn binary_layout_for_two_sensors() {
        let packet = encode_binary(&two_sensor_frame()).unwrap();

        // START, VERSION, COUNT, then big-endian id + little-endian f32 per sensor
        let expected_prefix = [
            0xAA, 0x02, 0x02, // header
            0x00, 0x01, 0x00, 0x00, 0x83, 0x42, // 0x0001 = 65.5
            0x00, 0x10, 0x00, 0x00, 0x8C, 0x42, // 0x0010 = 70.0
        ];
        assert_eq!(&packet[..expected_prefix.len()], &expected_prefix);

        // two CRC bytes then the end marker
        assert_eq!(packet.len(), expected_prefix.len() + 3);
        assert_eq!(*packet.last().unwrap(), 0x55);

        let crc = crc16(&packet[1..packet.len() - 3]);
        assert_eq!(packet[packet.len() - 3], (crc & 0xFF) as u8);
        assert_eq!(packet[packet.len() - 2], (crc >> 8) as u8);
    }

    #[test]
    fn binary_rejects_empty_frame() {
        assert!(encode_binary(&TelemetryFrame::default()).is_none());
    }

    #[test]
    fn binary_truncates_oversized_input() {
        // Bypass the TelemetryFrame cap to exercise the codec's own guard.
        let frame = TelemetryFrame {
            sensors: (0..260)
                .map(|i| SensorSample::new(0x0100 + i as u16, 1.0))
                .collect(),
        };
        let packet = encode_binary(&frame).unwrap();
        assert_eq!(packet[2] as usize, MAX_FRAME_SENSORS);
        assert_eq!(
            packet.len(),
            HEADER_SIZE + MAX_FRAME_SENSORS * SENSOR_WIRE_SIZE + FOOTER_SIZE
        );
    }

    #[test]
    fn text_format_and_checksum() {
        let text = encode_text(&two_sensor_frame()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("$S"));
        assert_eq!(lines.next(), Some("0001:65.5"));
        assert_eq!(lines.next(), Some("0010:70.0"));

        let trailer = lines.next().unwrap();
        assert!(trailer.starts_with("$E:"));
        assert!(lines.next().is_none());

        // trailer checksum must equal the XOR of everything before "$E:"
        let body_len = text.find("$E:").unwrap();
        let expected = xor_checksum(text[..body_len].as_bytes());
        let parsed = u8::from_str_radix(&trailer[3..], 16).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn text_rejects_empty_frame() {
        assert!(encode_text(&TelemetryFrame::default()).is_none());
    }

    #[test]
    fn legacy_json_structure() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let json = encode_legacy_json(&two_sensor_frame(), ts).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["timestamp"], "2024-03-01T12:30:00Z");
        let sensors = value["sensors"].as_array().unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0]["id"], "0x0001");
        assert_eq!(sensors[0]["name"], "CPU Temp");
        assert_eq!(sensors[0]["unit"], "°C");
        assert!((sensors[0]["value"].as_f64().unwrap() - 65.5).abs() < 1e-6);
        assert_eq!(sensors[1]["id"], "0x0010");
    }

    #[test]
    fn legacy_json_rejects_empty_frame() {
        assert!(encode_legacy_json(&TelemetryFrame::default(), Utc::now()).is_none());
    }
}
