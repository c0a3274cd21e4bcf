//! Constants and configuration values for SensorLink
//!
//! Centralizes magic numbers, paths, and configuration defaults.

use std::time::Duration;

/// Application data paths
pub mod paths {
    use std::path::PathBuf;

    /// Directory name under the platform config dir
    pub const APP_DIR: &str = "sensorlink";

    /// Persisted sensor identity map
    pub const REGISTRY_FILE: &str = "sensor_map.json";

    /// Application settings
    pub const CONFIG_FILE: &str = "config.json";

    /// Resolve the application config directory
    /// (e.g. ~/.config/sensorlink on Linux)
    pub fn app_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Full path of the persisted registry file
    pub fn registry_path() -> PathBuf {
        app_config_dir().join(REGISTRY_FILE)
    }

    /// Full path of the settings file
    pub fn config_path() -> PathBuf {
        app_config_dir().join(CONFIG_FILE)
    }
}

/// Registry id allocation parameters
pub mod registry {
    /// Lowest assignable compact id (0x0000 is kept as an "unassigned" sentinel)
    pub const FIRST_ID: u16 = 0x0001;

    /// Highest assignable compact id
    pub const LAST_ID: u16 = 0xFFFF;

    /// Default age cutoff for `cleanup` (days)
    pub const DEFAULT_MAX_AGE_DAYS: u64 = 30;
}

/// Timing constants for the transmit and refresh activities
pub mod timing {
    use super::*;

    /// Default serial baud rate
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    /// Default transmit interval
    pub const DEFAULT_SEND_INTERVAL_MS: u64 = 500;

    /// Default hardware feed refresh interval
    pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 250;

    /// Refresh interval clamp bounds
    pub const MIN_REFRESH_INTERVAL_MS: u64 = 50;
    pub const MAX_REFRESH_INTERVAL_MS: u64 = 5_000;

    /// Serial write timeout
    pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1_000);

    /// Settle delay between disconnect and reconnect during a restart,
    /// giving the downstream device time to flush and re-sync
    pub const RESTART_SETTLE: Duration = Duration::from_millis(250);
}
