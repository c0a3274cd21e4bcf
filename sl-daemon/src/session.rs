//! Telemetry session
//!
//! Owns the serial link and the per-connection delivery statistics, and
//! turns frames into bytes according to the active protocol mode. Send
//! failures are counted rather than propagated: a transient serial hiccup
//! at sub-second cadence is not actionable per packet, so the polling loop
//! must never stop over one.

use std::io;
use tracing::{debug, info, warn};

use chrono::Utc;
use sl_core::constants::timing;
use sl_error::{Result, SensorLinkError};
use sl_protocol::{encode_binary, encode_legacy_json, encode_text, ProtocolMode, TelemetryFrame};

use crate::transport::SerialLink;

/// Connection state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Delivery counters for the current connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    pub packets_sent: u64,
    pub packets_failed: u64,
}

/// Transport + per-cycle encoder, generic over the serial link so tests can
/// substitute a recording mock.
pub struct TelemetrySession<L: SerialLink> {
    link: L,
    state: LinkState,
    stats: SessionStats,
    mode: ProtocolMode,
    port: String,
    baud: u32,
}

impl<L: SerialLink> TelemetrySession<L> {
    pub fn new(link: L, mode: ProtocolMode) -> Self {
        Self {
            link,
            state: LinkState::Disconnected,
            stats: SessionStats::default(),
            mode,
            port: String::new(),
            baud: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ProtocolMode) {
        self.mode = mode;
    }

    /// Open the link, drop stale buffered bytes, and zero the statistics.
    /// On failure the session stays `Disconnected`.
    pub fn connect(&mut self, port: &str, baud: u32) -> Result<()> {
        self.state = LinkState::Connecting;
        if let Err(e) = self.link.open(port, baud) {
            self.state = LinkState::Disconnected;
            return Err(e);
        }
        if let Err(e) = self.link.discard_buffers() {
            debug!("Could not discard stale buffers: {}", e);
        }
        self.stats = SessionStats::default();
        self.port = port.to_string();
        self.baud = baud;
        self.state = LinkState::Connected;
        info!("Connected to {} at {} baud [{}]", port, baud, self.mode.type_name());
        Ok(())
    }

    /// Encode and transmit one frame. Returns true only when the bytes hit
    /// the link.
    ///
    /// An empty frame is a skipped tick, counted as neither success nor
    /// failure. Encode and write failures bump `packets_failed`; a write
    /// error that means the device is gone also drops the connection.
    pub fn send(&mut self, frame: &TelemetryFrame) -> bool {
        if self.state != LinkState::Connected {
            debug!("Send skipped, not connected");
            return false;
        }
        if frame.is_empty() {
            debug!("Nothing to send this tick");
            return false;
        }

        let Some(bytes) = self.encode(frame) else {
            self.stats.packets_failed += 1;
            warn!("Encoding produced no packet for {} sensors", frame.len());
            return false;
        };

        match self.link.write_all(&bytes) {
            Ok(()) => {
                self.stats.packets_sent += 1;
                true
            }
            Err(e) => {
                self.stats.packets_failed += 1;
                if e.is_timeout() {
                    debug!("Serial write timed out");
                } else if is_fatal_write_error(&e) {
                    warn!("Serial link lost: {}", e);
                    self.link.close();
                    self.state = LinkState::Disconnected;
                } else {
                    warn!("Serial write failed: {}", e);
                }
                false
            }
        }
    }

    /// Best-effort teardown; the link may already be gone, so errors are
    /// swallowed.
    pub fn disconnect(&mut self) {
        if self.link.is_open() {
            if let Err(e) = self.link.discard_buffers() {
                debug!("Discard on disconnect failed: {}", e);
            }
            self.link.close();
        }
        if self.state != LinkState::Disconnected {
            info!("Disconnected from {}", self.port);
        }
        self.state = LinkState::Disconnected;
    }

    /// Disconnect and reconnect with the remembered port and baud, with a
    /// settle delay so the downstream device can re-sync cleanly.
    ///
    /// A no-op (with a warning) when not connected: restarting only makes
    /// sense while running.
    pub fn restart(&mut self) -> Result<()> {
        if self.state != LinkState::Connected {
            warn!("Restart requested while not connected, ignoring");
            return Ok(());
        }
        let port = self.port.clone();
        let baud = self.baud;
        info!("Restarting link to {}", port);
        self.disconnect();
        std::thread::sleep(timing::RESTART_SETTLE);
        self.connect(&port, baud)
    }

    /// Delivery success as a percentage; 0 before any attempt.
    pub fn success_rate(&self) -> f32 {
        let total = self.stats.packets_sent + self.stats.packets_failed;
        if total == 0 {
            0.0
        } else {
            100.0 * self.stats.packets_sent as f32 / total as f32
        }
    }

    fn encode(&self, frame: &TelemetryFrame) -> Option<Vec<u8>> {
        match self.mode {
            ProtocolMode::Binary => encode_binary(frame),
            ProtocolMode::Text => encode_text(frame).map(String::into_bytes),
            ProtocolMode::Json => encode_legacy_json(frame, Utc::now()).map(|mut s| {
                s.push('\n');
                s.into_bytes()
            }),
        }
    }
}

/// Write errors that mean the device side of the link is gone.
fn is_fatal_write_error(e: &SensorLinkError) -> bool {
    match e {
        SensorLinkError::NotConnected => true,
        SensorLinkError::Io(io_err) => matches!(
            io_err.kind(),
            io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}
