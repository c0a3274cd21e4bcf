//! Serial transport
//!
//! The byte-stream boundary the session writes frames to. `SerialLink` is
//! the narrow contract the session needs (open / write / discard / close);
//! `SerialPortLink` implements it over a real serial device, and tests
//! substitute their own.

use std::io::Write;
use std::time::Duration;

use sl_core::constants::timing;
use sl_error::{Result, SensorLinkError};

/// Byte-stream transport with explicit buffer control.
pub trait SerialLink: Send {
    /// Open `port` at `baud`, 8 data bits, no parity, 1 stop bit, no flow
    /// control, with a write timeout.
    fn open(&mut self, port: &str, baud: u32) -> Result<()>;

    /// Write the whole buffer, blocking up to the write timeout.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drop anything buffered in either direction.
    fn discard_buffers(&mut self) -> Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// `SerialLink` over a real serial device via the serialport crate.
pub struct SerialPortLink {
    port: Option<Box<dyn serialport::SerialPort>>,
    write_timeout: Duration,
}

impl SerialPortLink {
    pub fn new() -> Self {
        Self {
            port: None,
            write_timeout: timing::WRITE_TIMEOUT,
        }
    }
}

impl Default for SerialPortLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for SerialPortLink {
    fn open(&mut self, port: &str, baud: u32) -> Result<()> {
        self.close();
        let opened = serialport::new(port, baud)
            .timeout(self.write_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| SensorLinkError::port_open(port, e))?;
        self.port = Some(opened);
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(SensorLinkError::NotConnected)?;
        port.write_all(bytes)?;
        Ok(())
    }

    fn discard_buffers(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(SensorLinkError::NotConnected)?;
        port.clear(serialport::ClearBuffer::All)
            .map_err(|e| SensorLinkError::transport(e.to_string()))
    }

    fn close(&mut self) {
        // dropping the handle closes the device
        self.port = None;
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

/// Names of the serial ports present on this machine.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("Could not enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}
