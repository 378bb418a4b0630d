//! Line protocol decoder
//!
//! The device emits ASCII telemetry, one record per newline-terminated line:
//!
//! ```text
//! DATA:<voltage>:<pressure>                                     (minimal)
//! DATA:<voltage>:<pressure>:<temperature>:<ph>:<heaterState>    (extended)
//! ```
//!
//! [`LineParser`] turns raw byte chunks into [`Sample`]s. Decoding is
//! deliberately tolerant: lines without the `DATA:` marker are incidental
//! device output and silently ignored, and a malformed marker line produces
//! a [`ProtocolError`] that discards only that line, never its siblings.
//!
//! # Chunk boundaries
//!
//! A serial read may end mid-line. The parser keeps the trailing partial
//! line as residual text and completes it when the next chunk arrives, so
//! no record is lost to a chunk boundary.

use crate::error::ProtocolError;
use crate::types::{HeaterStateMap, Sample, Schema};
use chrono::Utc;

/// Marker token distinguishing telemetry from incidental device output
pub const MARKER: &str = "DATA:";

/// Result of feeding one chunk to the parser
#[derive(Debug, Default)]
pub struct Parsed {
    /// Samples decoded from the complete lines in the chunk
    pub samples: Vec<Sample>,
    /// Per-line failures; each one discarded exactly one line (or, for
    /// [`ProtocolError::NotAscii`], the whole chunk)
    pub errors: Vec<ProtocolError>,
}

/// Stateful decoder for the ASCII line protocol
///
/// Stateful only in the residual buffer carried across [`feed`](Self::feed)
/// calls; decoding itself is pure per line.
#[derive(Debug)]
pub struct LineParser {
    schema: Schema,
    heater_map: HeaterStateMap,
    residual: String,
}

impl LineParser {
    /// Create a parser for the given schema
    pub fn new(schema: Schema, heater_map: HeaterStateMap) -> Self {
        Self {
            schema,
            heater_map,
            residual: String::new(),
        }
    }

    /// The schema this parser decodes
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Decode a raw chunk into samples, carrying any trailing partial line
    /// into the next call
    pub fn feed(&mut self, chunk: &[u8]) -> Parsed {
        let mut out = Parsed::default();

        let text = match std::str::from_utf8(chunk) {
            Ok(text) if text.is_ascii() => text,
            _ => {
                out.errors.push(ProtocolError::NotAscii);
                return out;
            }
        };
        self.residual.push_str(text);

        while let Some(pos) = self.residual.find('\n') {
            let raw: String = self.residual.drain(..=pos).collect();
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if !line.starts_with(MARKER) {
                tracing::debug!(line, "ignoring non-data line");
                continue;
            }
            match self.decode_line(line) {
                Ok(sample) => out.samples.push(sample),
                Err(err) => out.errors.push(err),
            }
        }

        out
    }

    /// The residual partial line waiting for its newline, for diagnostics
    pub fn pending(&self) -> &str {
        &self.residual
    }

    /// Drop any residual partial line
    pub fn clear(&mut self) {
        self.residual.clear();
    }

    fn decode_line(&self, line: &str) -> Result<Sample, ProtocolError> {
        let parts: Vec<&str> = line.split(':').collect();
        let expected = self.schema.field_count();
        if parts.len() != expected {
            return Err(ProtocolError::FieldCount {
                expected,
                found: parts.len(),
                line: line.to_string(),
            });
        }

        let timestamp = Utc::now();
        let voltage = parse_field(parts[1], "voltage", line)?;
        let pressure = parse_field(parts[2], "pressure", line)?;

        match self.schema {
            Schema::Minimal => Ok(Sample::minimal(timestamp, voltage, pressure)),
            Schema::Extended => {
                let temperature = parse_field(parts[3], "temperature", line)?;
                let ph = parse_field(parts[4], "ph", line)?;
                let code_text = parts[5].trim();
                let code: i64 =
                    code_text
                        .parse()
                        .map_err(|_| ProtocolError::MalformedField {
                            field: "heater state",
                            value: code_text.to_string(),
                            line: line.to_string(),
                        })?;
                let heater = self
                    .heater_map
                    .decode(code)
                    .ok_or(ProtocolError::HeaterCode {
                        code,
                        line: line.to_string(),
                    })?;
                Ok(Sample::extended(
                    timestamp,
                    voltage,
                    pressure,
                    temperature,
                    ph,
                    heater,
                ))
            }
        }
    }
}

fn parse_field(text: &str, field: &'static str, line: &str) -> Result<f64, ProtocolError> {
    text.trim()
        .parse()
        .map_err(|_| ProtocolError::MalformedField {
            field,
            value: text.to_string(),
            line: line.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HeaterState, Readings};

    fn minimal_parser() -> LineParser {
        LineParser::new(Schema::Minimal, HeaterStateMap::default())
    }

    fn extended_parser() -> LineParser {
        LineParser::new(Schema::Extended, HeaterStateMap::default())
    }

    fn readings(parsed: &Parsed) -> Vec<Readings> {
        parsed.samples.iter().map(|s| s.readings).collect()
    }

    #[test]
    fn test_minimal_line() {
        let mut parser = minimal_parser();
        let parsed = parser.feed(b"DATA:1.0:2.0\n");
        assert!(parsed.errors.is_empty());
        assert_eq!(
            readings(&parsed),
            vec![Readings::Minimal {
                voltage: 1.0,
                pressure: 2.0
            }]
        );
    }

    #[test]
    fn test_extended_line() {
        let mut parser = extended_parser();
        let parsed = parser.feed(b"DATA:3.3:101.2:37.5:7.05:1\n");
        assert!(parsed.errors.is_empty());
        assert_eq!(
            readings(&parsed),
            vec![Readings::Extended {
                voltage: 3.3,
                pressure: 101.2,
                temperature: 37.5,
                ph: 7.05,
                heater: HeaterState::Heating
            }]
        );
    }

    #[test]
    fn test_noise_lines_are_ignored_without_error() {
        let mut parser = minimal_parser();
        let parsed = parser.feed(b"DATA:1.0:2.0\nNOISE\nDATA:3.0:4.0\n");
        assert!(parsed.errors.is_empty());
        assert_eq!(
            readings(&parsed),
            vec![
                Readings::Minimal {
                    voltage: 1.0,
                    pressure: 2.0
                },
                Readings::Minimal {
                    voltage: 3.0,
                    pressure: 4.0
                },
            ]
        );
    }

    #[test]
    fn test_field_count_mismatch_under_extended_schema() {
        let mut parser = extended_parser();
        let parsed = parser.feed(b"DATA:1.0:2.0:3.0\n");
        assert!(parsed.samples.is_empty());
        assert_eq!(
            parsed.errors,
            vec![ProtocolError::FieldCount {
                expected: 6,
                found: 4,
                line: "DATA:1.0:2.0:3.0".to_string(),
            }]
        );
    }

    #[test]
    fn test_malformed_field_discards_only_that_line() {
        let mut parser = minimal_parser();
        let parsed = parser.feed(b"DATA:1.0:2.0\nDATA:bogus:4.0\nDATA:5.0:6.0\n");
        assert_eq!(parsed.samples.len(), 2);
        assert_eq!(parsed.errors.len(), 1);
        assert!(matches!(
            parsed.errors[0],
            ProtocolError::MalformedField {
                field: "voltage",
                ..
            }
        ));
    }

    #[test]
    fn test_unmapped_heater_code() {
        let mut parser = extended_parser();
        let parsed = parser.feed(b"DATA:3.3:101.2:37.5:7.05:9\n");
        assert!(parsed.samples.is_empty());
        assert!(matches!(
            parsed.errors[0],
            ProtocolError::HeaterCode { code: 9, .. }
        ));
    }

    #[test]
    fn test_partial_line_carries_across_chunks() {
        let mut parser = minimal_parser();

        let first = parser.feed(b"DATA:1.0:2.0\nDATA:3.0");
        assert_eq!(first.samples.len(), 1);
        assert_eq!(parser.pending(), "DATA:3.0");

        let second = parser.feed(b":4.0\n");
        assert_eq!(
            readings(&second),
            vec![Readings::Minimal {
                voltage: 3.0,
                pressure: 4.0
            }]
        );
        assert!(parser.pending().is_empty());
    }

    #[test]
    fn test_non_ascii_chunk_is_discarded_but_residual_survives() {
        let mut parser = minimal_parser();
        parser.feed(b"DATA:1.0");

        let parsed = parser.feed(&[0xFF, 0xFE]);
        assert_eq!(parsed.errors, vec![ProtocolError::NotAscii]);
        assert!(parsed.samples.is_empty());

        // The partial line from before the bad chunk still completes.
        let parsed = parser.feed(b":2.0\n");
        assert_eq!(parsed.samples.len(), 1);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = minimal_parser();
        let parsed = parser.feed(b"DATA:1.0:2.0\r\nDATA:3.0:4.0\r\n");
        assert_eq!(parsed.samples.len(), 2);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_clear_drops_residual() {
        let mut parser = minimal_parser();
        parser.feed(b"DATA:1.0");
        parser.clear();
        let parsed = parser.feed(b":2.0\n");
        // ":2.0" alone is not a marker line, so nothing decodes.
        assert!(parsed.samples.is_empty());
        assert!(parsed.errors.is_empty());
    }
}
