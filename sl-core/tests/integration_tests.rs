/*
 * Integration tests for the SensorLink pipeline
 *
 * These tests run the full collect -> encode -> decode path the way the
 * daemon does each transmit cycle, and verify that compact ids survive a
 * simulated process restart.
 */

use std::sync::Arc;

use sl_core::feed::{SensorKind, SensorReading};
use sl_core::{SensorCollector, SensorRegistry};
use sl_protocol::{encode_binary, FrameDecoder};
use tempfile::TempDir;

// Test utilities
fn reading(native_id: &str, kind: SensorKind, value: Option<f32>) -> SensorReading {
    SensorReading {
        native_id: native_id.to_string(),
        name: format!("Sensor {}", native_id),
        hardware: "AMD Ryzen 7 5800X".to_string(),
        kind,
        value,
        unit: kind.default_unit().to_string(),
    }
}

fn sample_snapshot() -> Vec<SensorReading> {
    vec![
        reading("cpu/0/temperature/0", SensorKind::Temperature, Some(65.52)),
        reading("cpu/0/load/0", SensorKind::Load, Some(34.2)),
        reading("cpu/0/clock/1", SensorKind::Clock, Some(4_650.0)),
        reading("cpu/0/power/0", SensorKind::Power, Some(88.9)),
        // these never survive collection
        reading("cpu/0/voltage/0", SensorKind::Voltage, None),
        reading("gpu/0/temperature/0", SensorKind::Temperature, Some(400.0)),
    ]
}

#[test]
fn collect_encode_decode_cycle() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(SensorRegistry::open(dir.path().join("sensor_map.json")));
    let collector = SensorCollector::new(registry.clone());

    let snapshot = sample_snapshot();
    let selected: Vec<String> = snapshot.iter().map(|r| r.native_id.clone()).collect();

    let frame = collector.collect(&snapshot, &selected);
    assert_eq!(frame.len(), 4, "absent and out-of-range readings must drop");

    let packet = encode_binary(&frame).unwrap();
    let decoded = FrameDecoder::decode(&packet).expect("own frames must decode");

    let expected: Vec<(u16, f32)> = frame.sensors.iter().map(|s| (s.id, s.value)).collect();
    assert_eq!(decoded, expected);

    // the first sensor went out rounded to one decimal
    let temp_id = registry.lookup("cpu/0/temperature/0").unwrap();
    assert_eq!(decoded[0], (temp_id, 65.5));
}

#[test]
fn ids_and_wire_bytes_stable_across_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sensor_map.json");
    let snapshot = sample_snapshot();
    let selected: Vec<String> = snapshot.iter().map(|r| r.native_id.clone()).collect();

    let first_packet = {
        let registry = Arc::new(SensorRegistry::open(&path));
        let collector = SensorCollector::new(registry.clone());
        let frame = collector.collect(&snapshot, &selected);
        registry.flush().unwrap();
        encode_binary(&frame).unwrap()
    };

    // a fresh process: reload the persisted map, collect the same snapshot
    let registry = Arc::new(SensorRegistry::open(&path));
    let collector = SensorCollector::new(registry);
    let frame = collector.collect(&snapshot, &selected);
    let second_packet = encode_binary(&frame).unwrap();

    assert_eq!(first_packet, second_packet);
}

#[test]
fn selection_order_defines_wire_order() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(SensorRegistry::open(dir.path().join("sensor_map.json")));
    let collector = SensorCollector::new(registry.clone());

    let snapshot = sample_snapshot();
    let forward: Vec<String> = vec!["cpu/0/temperature/0".into(), "cpu/0/load/0".into()];
    let reversed: Vec<String> = forward.iter().rev().cloned().collect();

    let forward_ids: Vec<u16> = collector
        .collect(&snapshot, &forward)
        .sensors
        .iter()
        .map(|s| s.id)
        .collect();
    let reversed_ids: Vec<u16> = collector
        .collect(&snapshot, &reversed)
        .sensors
        .iter()
        .map(|s| s.id)
        .collect();

    assert_eq!(forward_ids.len(), 2);
    assert_eq!(
        forward_ids,
        reversed_ids.iter().rev().copied().collect::<Vec<_>>()
    );
}
