//! Sensor collection
//!
//! Bridges one feed snapshot to the wire: resolves the operator's selected
//! native ids against the snapshot, drops anything without a usable value,
//! maps the survivors to their stable compact ids, and emits a bounded
//! [`TelemetryFrame`] in the caller-supplied order.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::feed::SensorReading;
use crate::registry::SensorRegistry;
use crate::validator;
use sl_protocol::{SensorSample, TelemetryFrame, MAX_FRAME_SENSORS};

pub struct SensorCollector {
    registry: Arc<SensorRegistry>,
}

impl SensorCollector {
    pub fn new(registry: Arc<SensorRegistry>) -> Self {
        Self { registry }
    }

    /// Build the frame for one transmit cycle from the latest snapshot.
    ///
    /// Per selected id: a missing reading, an absent value, or a value
    /// outside its kind's physical range skips that sensor without error.
    /// Repeated native ids keep only their first occurrence. Values are
    /// rounded to one decimal place before emission. At most
    /// [`MAX_FRAME_SENSORS`] entries survive, first come first kept.
    pub fn collect(&self, readings: &[SensorReading], selected: &[String]) -> TelemetryFrame {
        let mut sensors = Vec::new();
        let mut seen_ids = HashSet::new();

        for (position, native_id) in selected.iter().enumerate() {
            if sensors.len() == MAX_FRAME_SENSORS {
                debug!(
                    "Frame full, dropping {} trailing selections",
                    selected.len() - position
                );
                break;
            }

            let Some(reading) = readings.iter().find(|r| &r.native_id == native_id) else {
                continue;
            };
            let Some(value) = reading.value else {
                continue;
            };
            if !validator::is_valid(reading.kind, value) {
                continue;
            }

            let id = match self.registry.get_or_assign(reading) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Cannot map sensor {:?}: {}", native_id, e);
                    continue;
                }
            };
            if !seen_ids.insert(id) {
                continue;
            }

            let unit = if reading.unit.is_empty() {
                reading.kind.default_unit().to_string()
            } else {
                reading.unit.clone()
            };
            let rounded = (value * 10.0).round() / 10.0;
            sensors.push(SensorSample::with_meta(id, rounded, reading.name.clone(), unit));
        }

        TelemetryFrame::new(sensors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SensorKind;
    use tempfile::TempDir;

    fn reading(native_id: &str, value: Option<f32>) -> SensorReading {
        SensorReading {
            native_id: native_id.to_string(),
            name: format!("Sensor {}", native_id),
            hardware: "AMD Ryzen 7 5800X".to_string(),
            kind: SensorKind::Temperature,
            value,
            unit: "°C".to_string(),
        }
    }

    fn collector(dir: &TempDir) -> (SensorCollector, Arc<SensorRegistry>) {
        let registry = Arc::new(SensorRegistry::open(dir.path().join("sensor_map.json")));
        (SensorCollector::new(registry.clone()), registry)
    }

    #[test]
    fn preserves_selection_order() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = collector(&dir);

        let readings = vec![
            reading("a", Some(10.0)),
            reading("b", Some(20.0)),
            reading("c", Some(30.0)),
        ];
        let selected = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        let frame = collector.collect(&readings, &selected);

        let values: Vec<f32> = frame.sensors.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![30.0, 10.0, 20.0]);
    }

    #[test]
    fn skips_missing_absent_and_invalid() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = collector(&dir);

        let readings = vec![
            reading("ok", Some(42.0)),
            reading("no-value", None),
            reading("out-of-range", Some(900.0)),
            reading("nan", Some(f32::NAN)),
        ];
        let selected: Vec<String> = ["ok", "no-value", "out-of-range", "nan", "never-enumerated"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let frame = collector.collect(&readings, &selected);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.sensors[0].value, 42.0);
    }

    #[test]
    fn rounds_to_one_decimal() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = collector(&dir);

        let readings = vec![reading("a", Some(65.54))];
        let frame = collector.collect(&readings, &["a".to_string()]);
        assert_eq!(frame.sensors[0].value, 65.5);

        let readings = vec![reading("a", Some(65.56))];
        let frame = collector.collect(&readings, &["a".to_string()]);
        assert_eq!(frame.sensors[0].value, 65.6);
    }

    #[test]
    fn truncates_at_frame_capacity_keeping_first_250() {
        let dir = TempDir::new().unwrap();
        let (collector, registry) = collector(&dir);

        let readings: Vec<SensorReading> = (0..300)
            .map(|i| reading(&format!("s{}", i), Some(25.0)))
            .collect();
        let selected: Vec<String> = (0..300).map(|i| format!("s{}", i)).collect();

        let frame = collector.collect(&readings, &selected);
        assert_eq!(frame.len(), MAX_FRAME_SENSORS);

        // first 250 selections survive, in order
        let first_id = registry.lookup("s0").unwrap();
        assert_eq!(frame.sensors[0].id, first_id);
        let last_kept = registry.lookup("s249").unwrap();
        assert_eq!(frame.sensors[249].id, last_kept);
        // the 251st selection never got an id assigned during collection
        assert_eq!(registry.len(), MAX_FRAME_SENSORS);
    }

    #[test]
    fn deduplicates_repeated_selections() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = collector(&dir);

        let readings = vec![reading("a", Some(10.0)), reading("b", Some(20.0))];
        let selected: Vec<String> = ["a", "a", "b", "a"].iter().map(|s| s.to_string()).collect();

        let frame = collector.collect(&readings, &selected);
        assert_eq!(frame.len(), 2);
        assert_ne!(frame.sensors[0].id, frame.sensors[1].id);
    }

    #[test]
    fn compact_ids_stay_stable_across_cycles() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = collector(&dir);

        let readings = vec![reading("a", Some(10.0)), reading("b", Some(20.0))];
        let selected = vec!["a".to_string(), "b".to_string()];

        let first = collector.collect(&readings, &selected);
        let second = collector.collect(&readings, &selected);
        assert_eq!(
            first.sensors.iter().map(|s| s.id).collect::<Vec<_>>(),
            second.sensors.iter().map(|s| s.id).collect::<Vec<_>>()
        );
    }
}
