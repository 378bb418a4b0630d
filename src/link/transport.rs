//! SerialTransport trait for a unified transport interface
//!
//! This module provides a common trait over the physical serial transport,
//! enabling both real USB serial ports (via the `serialport` crate) and a
//! scripted mock for testing. [`SerialLink`](super::SerialLink) drives the
//! lifecycle and state machine; implementations only move bytes and toggle
//! control lines.

use crate::config::LinkConfig;
use crate::error::Result;

/// Unified interface to the physical serial transport
///
/// Implementations must be `Send` so a session can live on a worker thread.
pub trait SerialTransport: Send {
    /// Open the transport with the given port settings
    ///
    /// Implementations must leave the device reset line deasserted; the
    /// link drives the reset pulse itself after opening.
    fn open(&mut self, config: &LinkConfig) -> Result<()>;

    /// Whether a handle is currently open
    fn is_open(&self) -> bool;

    /// Non-blocking count of buffered-but-unread bytes
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read exactly the currently-available bytes without blocking past the
    /// configured timeout
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Assert or clear the device reset control line
    fn set_reset_line(&mut self, asserted: bool) -> Result<()>;

    /// Discard any buffered input and output
    fn discard_buffers(&mut self) -> Result<()>;

    /// Release the handle; must be safe to call when already closed
    fn close(&mut self);
}
