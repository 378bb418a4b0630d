//! Serial link lifecycle management
//!
//! [`SerialLink`] owns the physical connection and its state machine:
//!
//! ```text
//! DISCONNECTED --connect ok--> CONNECTED --read/connect failure--> ERROR
//!       ^                                                            |
//!       +------------- connect attempt (after interval) ------------+
//! ```
//!
//! `ERROR` and `DISCONNECTED` are both "not usable"; the distinction is
//! diagnostic only. Connection attempts are rate-limited by the configured
//! minimum interval — the sole backoff mechanism, with no exponential
//! growth and no jitter.
//!
//! Connecting also drives a device reset pulse on the reset control line so
//! a connected microcontroller reboots into application mode rather than
//! its bootloader, then waits out the boot chatter and discards it.
//!
//! # Components
//!
//! - [`SerialTransport`] - Trait seam over the physical transport
//! - [`UsbTransport`] - Real hardware via the `serialport` crate
//! - [`MockTransport`] - Scripted transport for tests (feature-gated)

pub mod transport;
pub mod usb;

#[cfg(any(test, feature = "mock-transport"))]
pub mod mock;

pub use transport::SerialTransport;
pub use usb::UsbTransport;

#[cfg(any(test, feature = "mock-transport"))]
pub use mock::{MockHandle, MockTransport};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::types::ConnectionState;
use std::time::Instant;

/// Diagnostic counters for link operations
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    /// Total connection attempts (skipped backoff no-ops not counted)
    pub connection_attempts: u32,
    /// Attempts that ended with a usable link
    pub successful_connects: u32,
    /// Reads or availability checks that failed on an open handle
    pub read_failures: u32,
    /// Total bytes read over the session
    pub bytes_read: u64,
}

/// Owns the serial connection and its lifecycle
pub struct SerialLink {
    config: LinkConfig,
    transport: Box<dyn SerialTransport>,
    state: ConnectionState,
    /// Attempts since the last successful connect, for diagnostics only;
    /// retries are gated purely by the interval check
    attempts_since_connect: u32,
    last_attempt: Option<Instant>,
    stats: LinkStats,
}

impl SerialLink {
    /// Create a link over real hardware
    pub fn new(config: LinkConfig) -> Self {
        Self::with_transport(config, Box::new(UsbTransport::new()))
    }

    /// Create a link over an explicit transport (used by tests)
    pub fn with_transport(config: LinkConfig, transport: Box<dyn SerialTransport>) -> Self {
        Self {
            config,
            transport,
            state: ConnectionState::Disconnected,
            attempts_since_connect: 0,
            last_attempt: None,
            stats: LinkStats::default(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a transport handle is currently open
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Whether the link can currently be read from
    pub fn is_usable(&self) -> bool {
        self.state.is_usable() && self.transport.is_open()
    }

    /// Diagnostic counters
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// The configuration this link was built with
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Attempt to (re)establish the connection
    ///
    /// A no-op if less than the configured minimum interval has elapsed
    /// since the last attempt. On success the link is `Connected` and the
    /// attempt counter resets; on failure it is `Error` and the counter is
    /// retained for diagnostics.
    pub fn connect(&mut self) {
        if let Some(last) = self.last_attempt {
            if last.elapsed() < self.config.reconnect_interval {
                tracing::debug!(
                    elapsed = ?last.elapsed(),
                    interval = ?self.config.reconnect_interval,
                    "too soon to retry connection, skipping attempt"
                );
                return;
            }
        }

        self.last_attempt = Some(Instant::now());
        self.attempts_since_connect += 1;
        self.stats.connection_attempts += 1;
        self.state = ConnectionState::Connecting;
        tracing::info!(
            port = %self.config.port,
            attempt = self.attempts_since_connect,
            "attempting serial connection"
        );

        match self.open_and_reset() {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.attempts_since_connect = 0;
                self.stats.successful_connects += 1;
                tracing::info!(port = %self.config.port, "serial link connected");
            }
            Err(e) => {
                self.state = ConnectionState::Error;
                self.transport.close();
                tracing::warn!(port = %self.config.port, error = %e, "serial connection failed");
            }
        }
    }

    fn open_and_reset(&mut self) -> Result<()> {
        let timing = self.config.timing;

        if self.transport.is_open() {
            tracing::debug!("closing stale serial handle before reconnecting");
            self.transport.close();
            std::thread::sleep(timing.port_release);
        }

        self.transport.open(&self.config)?;

        // Pulse the reset line so the device reboots into application mode.
        std::thread::sleep(timing.reset_pulse);
        self.transport.set_reset_line(true)?;
        std::thread::sleep(timing.reset_pulse);
        self.transport.set_reset_line(false)?;
        std::thread::sleep(timing.reset_pulse);

        // Let boot chatter settle, then drop whatever accumulated.
        std::thread::sleep(timing.boot_settle);
        self.transport.discard_buffers()?;

        Ok(())
    }

    /// Non-blocking count of waiting bytes; 0 when the link is not usable
    pub fn bytes_available(&mut self) -> usize {
        if !self.is_usable() {
            return 0;
        }
        match self.transport.bytes_available() {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "availability check failed, marking link broken");
                self.stats.read_failures += 1;
                self.state = ConnectionState::Error;
                0
            }
        }
    }

    /// Read exactly the currently-available bytes
    ///
    /// On an I/O failure the link transitions to `Error`; the caller should
    /// follow up with [`connect`](Self::connect).
    pub fn read_available(&mut self) -> Result<Vec<u8>> {
        if !self.is_usable() {
            return Err(LinkError::NotConnected);
        }
        match self.transport.read_available() {
            Ok(bytes) => {
                self.stats.bytes_read += bytes.len() as u64;
                Ok(bytes)
            }
            Err(e) => {
                self.stats.read_failures += 1;
                self.state = ConnectionState::Error;
                Err(e)
            }
        }
    }

    /// Close the link; idempotent
    ///
    /// On a genuinely open handle, pending buffers are discarded and a
    /// short pause lets in-flight OS work finish before release.
    pub fn close(&mut self) {
        if self.transport.is_open() {
            tracing::info!(port = %self.config.port, "closing serial link");
            if let Err(e) = self.transport.discard_buffers() {
                tracing::warn!(error = %e, "failed to flush buffers during close");
            }
            std::thread::sleep(self.config.timing.close_pause);
            self.transport.close();
        }
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkTiming;
    use std::time::Duration;

    fn test_config(reconnect_interval: Duration) -> LinkConfig {
        LinkConfig {
            reconnect_interval,
            timing: LinkTiming::immediate(),
            ..LinkConfig::new("mock0")
        }
    }

    fn mock_link(reconnect_interval: Duration) -> (SerialLink, MockHandle) {
        let handle = MockHandle::new();
        let link = SerialLink::with_transport(
            test_config(reconnect_interval),
            Box::new(handle.transport()),
        );
        (link, handle)
    }

    #[test]
    fn test_connect_success_drives_reset_pulse_and_discards() {
        let (mut link, handle) = mock_link(Duration::ZERO);
        link.connect();

        assert_eq!(link.state(), ConnectionState::Connected);
        assert!(link.is_usable());
        // Assert then clear, exactly once.
        assert_eq!(handle.reset_line_history(), vec![true, false]);
        // Boot chatter discarded after the settle window.
        assert_eq!(handle.discard_count(), 1);
        assert_eq!(link.stats().successful_connects, 1);
    }

    #[test]
    fn test_connect_failure_enters_error_state() {
        let (mut link, handle) = mock_link(Duration::ZERO);
        handle.fail_next_open();
        link.connect();

        assert_eq!(link.state(), ConnectionState::Error);
        assert!(!link.is_usable());
        assert_eq!(link.stats().connection_attempts, 1);
        assert_eq!(link.stats().successful_connects, 0);
    }

    #[test]
    fn test_backoff_suppresses_rapid_reconnects() {
        // Two connect() calls under the minimum interval: at most one
        // actual attempt.
        let (mut link, handle) = mock_link(Duration::from_secs(60));
        handle.fail_next_open();
        link.connect();
        assert_eq!(link.stats().connection_attempts, 1);

        link.connect();
        assert_eq!(link.stats().connection_attempts, 1);
        assert_eq!(handle.open_count(), 0);
    }

    #[test]
    fn test_attempt_counter_retained_across_failures() {
        let (mut link, handle) = mock_link(Duration::ZERO);
        handle.fail_next_open();
        link.connect();
        handle.fail_next_open();
        link.connect();

        assert_eq!(link.stats().connection_attempts, 2);

        link.connect();
        assert_eq!(link.state(), ConnectionState::Connected);
        assert_eq!(link.stats().successful_connects, 1);
    }

    #[test]
    fn test_read_failure_marks_link_broken() {
        let (mut link, handle) = mock_link(Duration::ZERO);
        link.connect();
        handle.push_chunk(b"DATA:1.0:2.0\n");
        handle.fail_next_read();

        let err = link.read_available().unwrap_err();
        assert!(matches!(err, LinkError::Io(_)));
        assert_eq!(link.state(), ConnectionState::Error);
        assert_eq!(link.stats().read_failures, 1);
    }

    #[test]
    fn test_read_available_returns_queued_bytes() {
        let (mut link, handle) = mock_link(Duration::ZERO);
        link.connect();
        handle.push_chunk(b"DATA:1.0:2.0\n");

        assert_eq!(link.bytes_available(), 13);
        let bytes = link.read_available().unwrap();
        assert_eq!(bytes, b"DATA:1.0:2.0\n");
        assert_eq!(link.stats().bytes_read, 13);
        assert_eq!(link.bytes_available(), 0);
    }

    #[test]
    fn test_bytes_available_zero_when_not_connected() {
        let (mut link, handle) = mock_link(Duration::ZERO);
        handle.push_chunk(b"DATA:1.0:2.0\n");
        assert_eq!(link.bytes_available(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut link, handle) = mock_link(Duration::ZERO);
        // Never opened: close is safe.
        link.close();
        assert_eq!(link.state(), ConnectionState::Disconnected);

        link.connect();
        link.close();
        assert!(!handle.is_open());
        assert_eq!(link.state(), ConnectionState::Disconnected);

        link.close();
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reconnect_closes_stale_handle_first() {
        let (mut link, handle) = mock_link(Duration::ZERO);
        link.connect();
        assert_eq!(handle.open_count(), 1);

        // Simulate a broken-but-open handle, then reconnect.
        handle.fail_next_read();
        let _ = link.read_available();
        link.connect();

        assert_eq!(handle.open_count(), 2);
        assert_eq!(link.state(), ConnectionState::Connected);
    }
}
