//! Sensor feed boundary
//!
//! Types describing what the external hardware-monitoring collaborator
//! hands us, and the trait it is consumed through. Enumeration itself is
//! out of scope here; anything that can produce a flat list of readings
//! can drive the pipeline.

use serde::{Deserialize, Serialize};

/// Semantic kind of a sensor reading.
///
/// Single source of truth for the physical validation range and the
/// default display unit of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Temperature,
    Load,
    Clock,
    Power,
    Voltage,
    Fan,
    Data,
    Throughput,
    Other,
}

impl SensorKind {
    /// Parse the feed's type string ("Temperature", "Load", ...).
    /// Unknown strings map to `Other`, which never validates.
    pub fn from_feed_type(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "temperature" => SensorKind::Temperature,
            "load" | "level" => SensorKind::Load,
            "clock" => SensorKind::Clock,
            "power" => SensorKind::Power,
            "voltage" => SensorKind::Voltage,
            "fan" => SensorKind::Fan,
            "data" => SensorKind::Data,
            "throughput" => SensorKind::Throughput,
            _ => SensorKind::Other,
        }
    }

    /// Closed range of physically plausible values, or `None` if readings
    /// of this kind are never considered valid.
    pub fn valid_range(self) -> Option<(f32, f32)> {
        match self {
            SensorKind::Temperature => Some((-40.0, 150.0)),
            SensorKind::Load => Some((0.0, 100.0)),
            SensorKind::Clock => Some((0.0, 10_000.0)),
            SensorKind::Power => Some((0.0, 1_000.0)),
            SensorKind::Voltage => Some((0.0, 15.0)),
            SensorKind::Fan => Some((0.0, 20_000.0)),
            SensorKind::Data => Some((0.0, 1_024.0)),
            SensorKind::Throughput => Some((0.0, f32::INFINITY)),
            SensorKind::Other => None,
        }
    }

    /// Unit shown when the feed does not supply one.
    pub fn default_unit(self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Load => "%",
            SensorKind::Clock => "MHz",
            SensorKind::Power => "W",
            SensorKind::Voltage => "V",
            SensorKind::Fan => "RPM",
            SensorKind::Data => "GB",
            SensorKind::Throughput => "KB/s",
            SensorKind::Other => "",
        }
    }
}

/// One reading from the external hardware feed.
///
/// `native_id` identifies the physical sensor for the lifetime of one
/// process run only; stable cross-restart identity is the registry's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub native_id: String,
    pub name: String,
    pub hardware: String,
    pub kind: SensorKind,
    /// Absent when the driver momentarily has no value
    pub value: Option<f32>,
    pub unit: String,
}

/// The consumed collaborator interface: enumerate the current readings of
/// every sensor the platform exposes.
pub trait SensorFeed: Send {
    fn readings(&mut self) -> Vec<SensorReading>;
}
