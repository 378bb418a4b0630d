//! Real serial transport backed by the `serialport` crate
//!
//! The reset line maps to DTR: ESP32-style boards wire DTR/RTS to an
//! auto-reset circuit, so asserting DTR briefly reboots the microcontroller
//! into application mode. Both lines are deasserted on open to avoid
//! dropping the device into its bootloader.

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::link::transport::SerialTransport;
use serialport::{ClearBuffer, SerialPort};
use std::io::Read;

/// USB serial transport
#[derive(Default)]
pub struct UsbTransport {
    port: Option<Box<dyn SerialPort>>,
}

impl UsbTransport {
    /// Create a transport with no open handle
    pub fn new() -> Self {
        Self::default()
    }
}

impl SerialTransport for UsbTransport {
    fn open(&mut self, config: &LinkConfig) -> Result<()> {
        let mut port = serialport::new(config.port.as_str(), config.baud_rate)
            .timeout(config.read_timeout)
            .open()?;

        // Keep both control lines deasserted until the link drives the
        // reset pulse.
        port.write_request_to_send(false)?;
        port.write_data_terminal_ready(false)?;

        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_available(&mut self) -> Result<usize> {
        match &self.port {
            Some(port) => Ok(port.bytes_to_read()? as usize),
            None => Ok(0),
        }
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        let waiting = port.bytes_to_read()? as usize;
        let mut buf = vec![0u8; waiting];
        if waiting > 0 {
            port.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn set_reset_line(&mut self, asserted: bool) -> Result<()> {
        let port = self.port.as_mut().ok_or(LinkError::NotConnected)?;
        port.write_data_terminal_ready(asserted)?;
        Ok(())
    }

    fn discard_buffers(&mut self) -> Result<()> {
        if let Some(port) = &self.port {
            port.clear(ClearBuffer::All)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the boxed port releases the OS handle.
        self.port = None;
    }
}
