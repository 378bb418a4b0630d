//! Core data types for sensorlink
//!
//! This module contains the fundamental data structures shared across the
//! ingestion pipeline:
//!
//! - [`Schema`] - Which wire line format the device speaks (3 or 6 fields)
//! - [`Channel`] - One named numeric measurement stream
//! - [`Sample`] / [`Readings`] - A single decoded protocol line
//! - [`HeaterState`] / [`HeaterStateMap`] - Heater codes and their wire mapping
//! - [`ConnectionState`] - Lifecycle state of the serial link
//!
//! # Schemas
//!
//! Firmware variants in the field emit two line formats:
//!
//! ```text
//! DATA:<voltage>:<pressure>                                     (minimal)
//! DATA:<voltage>:<pressure>:<temperature>:<ph>:<heaterState>    (extended)
//! ```
//!
//! The schema is fixed per deployment and chosen once at session
//! construction; a line with any other arity is rejected as a protocol
//! error rather than partially interpreted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire line format variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// `DATA:<voltage>:<pressure>`
    Minimal,
    /// `DATA:<voltage>:<pressure>:<temperature>:<ph>:<heaterState>`
    #[default]
    Extended,
}

impl Schema {
    /// Number of `:`-separated parts a marker line must have, marker included
    pub fn field_count(&self) -> usize {
        match self {
            Schema::Minimal => 3,
            Schema::Extended => 6,
        }
    }

    /// The channels this schema populates
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            Schema::Minimal => &[Channel::Voltage, Channel::Pressure],
            Schema::Extended => &[
                Channel::Voltage,
                Channel::Pressure,
                Channel::Temperature,
                Channel::Ph,
                Channel::HeaterState,
            ],
        }
    }
}

/// One named numeric measurement stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Voltage,
    Pressure,
    Temperature,
    Ph,
    HeaterState,
}

impl Channel {
    /// Stable lowercase name, matching the config file spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Voltage => "voltage",
            Channel::Pressure => "pressure",
            Channel::Temperature => "temperature",
            Channel::Ph => "ph",
            Channel::HeaterState => "heater_state",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical heater controller state
///
/// The numeric wire codes vary between firmware variants; the mapping from
/// code to state lives in [`HeaterStateMap`] so it can be configured per
/// deployment, while the rest of the crate only ever sees this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaterState {
    Cooling = 0,
    Heating = 1,
    Stabilizing = 2,
}

impl HeaterState {
    /// Canonical numeric form, used when storing heater states in a
    /// [`ChannelWindow`](crate::aggregate::ChannelWindow)
    pub fn as_f64(self) -> f64 {
        self as u8 as f64
    }

    /// Human-readable label for display
    pub fn label(&self) -> &'static str {
        match self {
            HeaterState::Cooling => "COOLING",
            HeaterState::Heating => "HEATING",
            HeaterState::Stabilizing => "STABILIZING",
        }
    }
}

impl std::fmt::Display for HeaterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Mapping from wire heater codes {0, 1, 2} to canonical states
///
/// Index `i` holds the state that wire code `i` means. Codes outside the
/// mapping are rejected by the parser as protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaterStateMap([HeaterState; 3]);

impl Default for HeaterStateMap {
    fn default() -> Self {
        Self([
            HeaterState::Cooling,
            HeaterState::Heating,
            HeaterState::Stabilizing,
        ])
    }
}

impl HeaterStateMap {
    /// Create a mapping with an explicit code-to-state table
    pub fn new(states: [HeaterState; 3]) -> Self {
        Self(states)
    }

    /// Decode a wire code, or `None` if the code is outside the mapping
    pub fn decode(&self, code: i64) -> Option<HeaterState> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.0.get(i))
            .copied()
    }
}

/// One decoded protocol line
///
/// Samples are immutable once constructed; they are consumed by the
/// aggregator immediately and not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Wall-clock instant when the line was decoded
    pub timestamp: DateTime<Utc>,
    /// The decoded field values, tagged by schema
    pub readings: Readings,
}

/// Decoded field values, one variant per schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Readings {
    /// Minimal schema: voltage and pressure only
    Minimal { voltage: f64, pressure: f64 },
    /// Extended schema: all five channels
    Extended {
        voltage: f64,
        pressure: f64,
        temperature: f64,
        ph: f64,
        heater: HeaterState,
    },
}

impl Sample {
    /// Construct a minimal-schema sample
    pub fn minimal(timestamp: DateTime<Utc>, voltage: f64, pressure: f64) -> Self {
        Self {
            timestamp,
            readings: Readings::Minimal { voltage, pressure },
        }
    }

    /// Construct an extended-schema sample
    pub fn extended(
        timestamp: DateTime<Utc>,
        voltage: f64,
        pressure: f64,
        temperature: f64,
        ph: f64,
        heater: HeaterState,
    ) -> Self {
        Self {
            timestamp,
            readings: Readings::Extended {
                voltage,
                pressure,
                temperature,
                ph,
                heater,
            },
        }
    }

    /// The channels present in this sample with their numeric values, in
    /// wire order
    pub fn channel_values(&self) -> Vec<(Channel, f64)> {
        match self.readings {
            Readings::Minimal { voltage, pressure } => {
                vec![(Channel::Voltage, voltage), (Channel::Pressure, pressure)]
            }
            Readings::Extended {
                voltage,
                pressure,
                temperature,
                ph,
                heater,
            } => vec![
                (Channel::Voltage, voltage),
                (Channel::Pressure, pressure),
                (Channel::Temperature, temperature),
                (Channel::Ph, ph),
                (Channel::HeaterState, heater.as_f64()),
            ],
        }
    }

    /// The schema this sample was decoded under
    pub fn schema(&self) -> Schema {
        match self.readings {
            Readings::Minimal { .. } => Schema::Minimal,
            Readings::Extended { .. } => Schema::Extended,
        }
    }
}

/// Lifecycle state of the serial link
///
/// Owned by [`SerialLink`](crate::link::SerialLink) and mutated only by its
/// own operations. `Error` and `Disconnected` are both "not usable"; the
/// distinction is diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// Whether the link can currently be read from
    pub fn is_usable(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        write!(f, "{}", s)
    }
}
