//! Application Settings
//!
//! Persistent settings stored as JSON in the platform config directory
//! (e.g. ~/.config/sensorlink/config.json).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{paths, timing};
use crate::error::{Result, SensorLinkError};
use sl_protocol::ProtocolMode;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Serial port device (e.g. /dev/ttyUSB0)
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Transmit interval in milliseconds
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    /// Hardware feed refresh interval in milliseconds
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Wire encoding for the session
    #[serde(default)]
    pub protocol_mode: ProtocolMode,

    /// Native ids of the sensors to stream, in transmit order
    #[serde(default)]
    pub selected_sensors: Vec<String>,

    /// Connect and start streaming immediately on launch
    #[serde(default)]
    pub auto_connect: bool,
}

fn default_baud_rate() -> u32 {
    timing::DEFAULT_BAUD_RATE
}

fn default_send_interval_ms() -> u64 {
    timing::DEFAULT_SEND_INTERVAL_MS
}

fn default_refresh_interval_ms() -> u64 {
    timing::DEFAULT_REFRESH_INTERVAL_MS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            send_interval_ms: default_send_interval_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            protocol_mode: ProtocolMode::default(),
            selected_sensors: Vec::new(),
            auto_connect: false,
        }
    }
}

impl AppConfig {
    /// Refresh interval with the supported bounds applied.
    pub fn clamped_refresh_interval_ms(&self) -> u64 {
        self.refresh_interval_ms
            .clamp(timing::MIN_REFRESH_INTERVAL_MS, timing::MAX_REFRESH_INTERVAL_MS)
    }
}

/// Get the path to the settings file
pub fn config_path() -> PathBuf {
    paths::config_path()
}

/// Load settings from the default location; any problem falls back to
/// defaults so a damaged settings file never blocks startup.
pub fn load_config() -> AppConfig {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("Settings file {:?} is unreadable, using defaults: {}", path, e);
                AppConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No settings at {:?}, using defaults", path);
            AppConfig::default()
        }
        Err(e) => {
            warn!("Failed to read settings {:?}, using defaults: {}", path, e);
            AppConfig::default()
        }
    }
}

/// Save settings to the default location
pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &config_path())
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SensorLinkError::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let json = serde_json::to_string_pretty(config)?;

    use std::io::Write;
    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| SensorLinkError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;
    file.write_all(json.as_bytes())
        .map_err(|e| SensorLinkError::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;
    file.sync_all().map_err(|e| SensorLinkError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| SensorLinkError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Saved settings to {:?}", path);
    Ok(())
}
