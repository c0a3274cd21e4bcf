//! hwmon feed adapter
//!
//! Thin `SensorFeed` implementation over the Linux hwmon sysfs tree, the
//! composition-root glue that satisfies the consumed collaborator
//! interface. Deliberately minimal: flat channel scan, no GPU probing, no
//! subdevice trees. Swap in any other `SensorFeed` to drive the pipeline
//! from a different monitoring source.
//!
//! Channel value scaling follows the hwmon ABI: temperatures and voltages
//! are reported in milli-units, power in micro-watts, fans in RPM.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use sl_core::feed::{SensorFeed, SensorKind, SensorReading};

pub struct HwmonFeed {
    base: PathBuf,
}

impl HwmonFeed {
    pub fn new() -> Self {
        Self {
            base: PathBuf::from("/sys/class/hwmon"),
        }
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn read_chip(&self, chip_dir: &Path, readings: &mut Vec<SensorReading>) {
        let chip = fs::read_to_string(chip_dir.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let hwmon = chip_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("hwmon?")
            .to_string();

        let Ok(entries) = fs::read_dir(chip_dir) else {
            return;
        };
        let mut files: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| name.ends_with("_input"))
            .collect();
        files.sort();

        for file in files {
            let channel = file.trim_end_matches("_input");
            let Some((kind, divisor)) = channel_kind(channel) else {
                continue;
            };

            let value = fs::read_to_string(chip_dir.join(&file))
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .map(|raw| (raw / divisor) as f32);

            let label = fs::read_to_string(chip_dir.join(format!("{}_label", channel)))
                .map(|s| s.trim().to_string())
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| channel.to_string());

            trace!(chip = %chip, channel = %channel, ?value, "hwmon reading");
            readings.push(SensorReading {
                native_id: format!("{}/{}/{}", chip, hwmon, channel),
                name: label,
                hardware: chip.clone(),
                kind,
                value,
                unit: kind.default_unit().to_string(),
            });
        }
    }
}

impl Default for HwmonFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorFeed for HwmonFeed {
    fn readings(&mut self) -> Vec<SensorReading> {
        let mut readings = Vec::new();
        let Ok(entries) = fs::read_dir(&self.base) else {
            debug!("No hwmon tree at {:?}", self.base);
            return readings;
        };

        let mut chip_dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        chip_dirs.sort();
        for chip_dir in chip_dirs {
            self.read_chip(&chip_dir, &mut readings);
        }
        readings
    }
}

/// Map a hwmon channel prefix to its sensor kind and raw-value divisor.
fn channel_kind(channel: &str) -> Option<(SensorKind, f64)> {
    let prefix: String = channel.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    match prefix.as_str() {
        "temp" => Some((SensorKind::Temperature, 1_000.0)),
        "fan" => Some((SensorKind::Fan, 1.0)),
        "in" => Some((SensorKind::Voltage, 1_000.0)),
        "power" => Some((SensorKind::Power, 1_000_000.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_chip(base: &Path, dir: &str, name: &str, files: &[(&str, &str)]) {
        let chip = base.join(dir);
        fs::create_dir_all(&chip).unwrap();
        fs::write(chip.join("name"), format!("{}\n", name)).unwrap();
        for (file, contents) in files {
            fs::write(chip.join(file), contents).unwrap();
        }
    }

    #[test]
    fn scans_channels_with_scaling_and_labels() {
        let dir = TempDir::new().unwrap();
        fake_chip(
            dir.path(),
            "hwmon0",
            "k10temp",
            &[
                ("temp1_input", "55500\n"),
                ("temp1_label", "Tctl\n"),
                ("fan1_input", "1450\n"),
            ],
        );

        let mut feed = HwmonFeed::with_base(dir.path());
        let readings = feed.readings();
        assert_eq!(readings.len(), 2);

        let fan = readings.iter().find(|r| r.kind == SensorKind::Fan).unwrap();
        assert_eq!(fan.value, Some(1450.0));
        assert_eq!(fan.unit, "RPM");

        let temp = readings
            .iter()
            .find(|r| r.kind == SensorKind::Temperature)
            .unwrap();
        assert_eq!(temp.value, Some(55.5));
        assert_eq!(temp.name, "Tctl");
        assert_eq!(temp.native_id, "k10temp/hwmon0/temp1");
    }

    #[test]
    fn unreadable_value_becomes_absent_not_error() {
        let dir = TempDir::new().unwrap();
        fake_chip(
            dir.path(),
            "hwmon0",
            "nct6775",
            &[("temp1_input", "not a number\n")],
        );

        let mut feed = HwmonFeed::with_base(dir.path());
        let readings = feed.readings();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, None);
    }

    #[test]
    fn missing_tree_yields_empty_feed() {
        let mut feed = HwmonFeed::with_base("/definitely/not/here");
        assert!(feed.readings().is_empty());
    }
}
