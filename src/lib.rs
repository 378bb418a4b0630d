//! # sensorlink: serial sensor telemetry ingestion
//!
//! Acquires a continuous stream of sensor readings from a microcontroller
//! over a serial link, decodes its ASCII line protocol, and maintains a
//! bounded rolling history plus all-time extrema for each measured channel.
//!
//! ## Architecture
//!
//! - **Link**: connection lifecycle with device reset pulse and
//!   interval-gated reconnects, behind a transport trait
//! - **Parser**: tolerant line-protocol decoder with carry-over buffering
//!   across chunk boundaries
//! - **Aggregator**: fixed-capacity FIFO window per channel with monotonic
//!   running min/max
//! - **Session**: composes the three behind `poll()` / `snapshot()` /
//!   `cleanup()`
//!
//! Rendering, scheduling cadence and process bootstrap are deliberately
//! external: a host timer calls [`IngestSession::poll`] on its own cadence,
//! and a renderer reads owned [`Snapshot`]s through a [`SnapshotHandle`],
//! optionally watching the [`SessionEvent`] channel for push updates.
//!
//! ## Example
//!
//! ```ignore
//! use sensorlink::{IngestSession, SessionConfig};
//!
//! let mut session = IngestSession::new(SessionConfig::new("/dev/ttyUSB0"));
//! let reader = session.snapshot_handle();
//!
//! // Host scheduler, every 250 ms:
//! session.poll();
//!
//! // Renderer, on its own thread:
//! let snapshot = reader.snapshot();
//!
//! // Shutdown:
//! session.cleanup();
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod link;
pub mod parser;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use aggregate::{Aggregator, ChannelSnapshot, ChannelWindow, Snapshot};
pub use config::{LinkConfig, LinkTiming, SessionConfig};
pub use error::{LinkError, ProtocolError, Result};
pub use link::{LinkStats, SerialLink, SerialTransport, UsbTransport};
pub use parser::{LineParser, Parsed};
pub use session::{IngestSession, SessionEvent, SessionStats, SnapshotHandle};
pub use types::{
    Channel, ConnectionState, HeaterState, HeaterStateMap, Readings, Sample, Schema,
};
