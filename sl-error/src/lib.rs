//! Unified error handling for SensorLink
//!
//! This crate provides a single error type used across all SensorLink
//! components. It uses thiserror for ergonomic error definitions with proper
//! Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using SensorLinkError
pub type Result<T> = std::result::Result<T, SensorLinkError>;

/// Unified error type for all SensorLink operations
#[derive(thiserror::Error, Debug)]
pub enum SensorLinkError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Registry Errors
    // ============================================================================
    #[error("Sensor id space exhausted (no assignable 16-bit id left)")]
    RegistryExhausted,

    #[error("No sensors matched the export selection")]
    ExportEmpty,

    // ============================================================================
    // Wire Protocol Errors
    // ============================================================================
    #[error("Cannot encode an empty telemetry frame")]
    EmptyFrame,

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("Failed to open serial port {port}: {reason}")]
    PortOpen {
        port: String,
        reason: String,
    },

    #[error("Serial link is not connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl SensorLinkError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error from a string
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a port-open error
    pub fn port_open(port: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::PortOpen {
            port: port.into(),
            reason: reason.to_string(),
        }
    }

    /// True for write failures that are expected to clear by the next tick
    /// (the session counts these instead of dropping the connection).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::TimedOut)
    }
}

// Allow converting from String to SensorLinkError
impl From<String> for SensorLinkError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to SensorLinkError
impl From<&str> for SensorLinkError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
