//! Error handling for sensorlink
//!
//! Two families of failure exist in this crate and they recover differently:
//!
//! - [`LinkError`] covers the serial link itself (port unavailable, I/O
//!   failure on an open handle). These are recovered by backing off and
//!   reconnecting; they are never fatal to the host.
//! - [`ProtocolError`] covers a single wire line or chunk that could not be
//!   decoded. The offending line is discarded and ingestion continues; a
//!   protocol error never triggers a reconnect.

use thiserror::Error;

/// Errors raised by the serial link lifecycle and I/O paths
#[derive(Error, Debug)]
pub enum LinkError {
    /// Errors reported by the serial port driver (open, configure, query)
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O errors on an open handle; the link must be treated as broken
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation that needs an open link was called while disconnected
    #[error("Serial link is not connected")]
    NotConnected,
}

/// Result type alias for link operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Per-line decode failures, scoped to the line (or chunk) that caused them
///
/// These carry the raw text so a log reader can diagnose what the device
/// actually sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// The whole chunk contained non-ASCII bytes and was discarded
    #[error("received chunk is not valid ASCII")]
    NotAscii,

    /// A marker line had the wrong number of `:`-separated parts
    #[error("unexpected field count in line {line:?}: expected {expected}, found {found}")]
    FieldCount {
        expected: usize,
        found: usize,
        line: String,
    },

    /// A numeric field failed to parse
    #[error("malformed {field} field {value:?} in line {line:?}")]
    MalformedField {
        field: &'static str,
        value: String,
        line: String,
    },

    /// A heater state code outside the configured mapping
    #[error("unmapped heater state code {code} in line {line:?}")]
    HeaterCode { code: i64, line: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_display() {
        let err = LinkError::Config("missing port".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing port");
    }

    #[test]
    fn test_protocol_error_carries_line() {
        let err = ProtocolError::FieldCount {
            expected: 6,
            found: 4,
            line: "DATA:1.0:2.0:3.0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 6"));
        assert!(msg.contains("DATA:1.0:2.0:3.0"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device unplugged");
        let err: LinkError = io.into();
        assert!(matches!(err, LinkError::Io(_)));
    }
}
