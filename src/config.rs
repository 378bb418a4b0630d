//! Configuration for the ingest session
//!
//! All configuration is immutable after construction. [`SessionConfig`] owns
//! everything a session needs; the embedded [`LinkConfig`] is handed to the
//! serial link at construction.
//!
//! Configs round-trip through TOML so a deployment can keep its port, schema
//! and window settings in a file:
//!
//! ```toml
//! schema = "extended"
//! window_size = 3000
//!
//! [link]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! ```

use crate::error::{LinkError, Result};
use crate::types::{HeaterStateMap, Schema};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default baud rate for the reference deployment
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read/write timeout on the serial port
pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default number of samples retained per channel (5 minutes at the
/// reference sample rate)
pub const DEFAULT_WINDOW_SIZE: usize = 3000;

/// Default minimum interval between connection attempts
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Serial link parameters, fixed per deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Port identifier (e.g. `/dev/ttyUSB0`, `COM4`)
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout applied to the port handle
    #[serde(default = "default_port_timeout")]
    pub read_timeout: Duration,

    /// Write timeout; retained for deployments that drive the device, the
    /// ingest path itself never writes
    #[serde(default = "default_port_timeout")]
    pub write_timeout: Duration,

    /// Minimum time that must elapse between connection attempts. This is
    /// the sole backoff mechanism: no exponential growth, no jitter.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: Duration,

    /// Fixed delays used while driving the device reset pulse and releasing
    /// the port. Different boards need different settle times.
    #[serde(default)]
    pub timing: LinkTiming,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_port_timeout() -> Duration {
    DEFAULT_PORT_TIMEOUT
}

fn default_reconnect_interval() -> Duration {
    DEFAULT_RECONNECT_INTERVAL
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_PORT_TIMEOUT,
            write_timeout: DEFAULT_PORT_TIMEOUT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            timing: LinkTiming::default(),
        }
    }
}

impl LinkConfig {
    /// Create a config for the given port with reference-deployment defaults
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }
}

/// Fixed pauses in the connect/close sequences
///
/// These match the timings the ESP32 auto-reset circuit needs: each phase of
/// the DTR pulse is held long enough for the device to latch it, and the
/// boot settle window covers the bootloader chatter printed on reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinkTiming {
    /// Pause after closing a stale handle so the OS releases the port
    pub port_release: Duration,
    /// Width of each phase of the reset pulse
    pub reset_pulse: Duration,
    /// Settle time for boot chatter after the reset pulse
    pub boot_settle: Duration,
    /// Pause between flushing buffers and releasing the handle on close
    pub close_pause: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            port_release: Duration::from_secs(1),
            reset_pulse: Duration::from_millis(500),
            boot_settle: Duration::from_secs(1),
            close_pause: Duration::from_millis(100),
        }
    }
}

impl LinkTiming {
    /// All-zero timing, for tests driving a mock transport
    pub fn immediate() -> Self {
        Self {
            port_release: Duration::ZERO,
            reset_pulse: Duration::ZERO,
            boot_settle: Duration::ZERO,
            close_pause: Duration::ZERO,
        }
    }
}

/// Complete session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Wire schema the device speaks
    #[serde(default)]
    pub schema: Schema,

    /// Samples retained per channel
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Wire-code-to-state mapping for the heater channel
    #[serde(default)]
    pub heater_map: HeaterStateMap,

    /// Serial link parameters; scalar fields stay above this so the TOML
    /// form keeps them out of the `[link]` table
    pub link: LinkConfig,
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            schema: Schema::default(),
            window_size: DEFAULT_WINDOW_SIZE,
            heater_map: HeaterStateMap::default(),
            link: LinkConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a config for the given port with reference-deployment defaults
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            link: LinkConfig::new(port),
            ..Default::default()
        }
    }

    /// Load a session config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LinkError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| LinkError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save this session config to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LinkError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| LinkError::Config(format!("Failed to write config file: {}", e)))
    }
}
