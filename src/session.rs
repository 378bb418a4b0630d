//! Ingest session: the composition root of the pipeline
//!
//! [`IngestSession`] owns a [`SerialLink`], a [`LineParser`] and an
//! [`Aggregator`] and wires them into one read-and-parse cycle per
//! [`poll`](IngestSession::poll) call. The host scheduler decides the
//! cadence; the session makes no assumption beyond "poll is never invoked
//! concurrently with itself".
//!
//! `poll()` never propagates an error: connection failures back off and
//! retry, I/O failures tear the link down and force a reconnect, and
//! protocol errors discard one line each. The only externally visible
//! failure mode is stale data in the snapshot.
//!
//! # Reading from another thread
//!
//! A renderer on its own thread holds a [`SnapshotHandle`] and calls
//! [`snapshot`](SnapshotHandle::snapshot) concurrently with `poll()`. The
//! aggregator sits behind a mutex and `poll()` applies a whole chunk's
//! samples under one acquisition, so a reader never observes a window
//! mid-update. Hosts that want push-style updates can also drain the
//! [`SessionEvent`] channel.

use crate::aggregate::{Aggregator, Snapshot};
use crate::config::SessionConfig;
use crate::error::ProtocolError;
use crate::link::{SerialLink, SerialTransport};
use crate::parser::LineParser;
use crate::types::ConnectionState;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Capacity of the session event channel
///
/// Sends never block `poll()`; when a slow host lets the channel fill,
/// further events are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notifications emitted by the session for hosts that want push updates
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The link moved to a new lifecycle state
    StateChanged(ConnectionState),
    /// A line (or chunk) was discarded as undecodable
    ProtocolError(ProtocolError),
    /// One poll cycle applied this many samples
    SamplesApplied(usize),
}

/// Running counters for one session
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total `poll()` invocations
    pub polls: u64,
    /// Samples decoded and applied to the aggregator
    pub samples_applied: u64,
    /// Lines or chunks discarded as undecodable
    pub protocol_errors: u64,
    /// Read failures that forced a reconnect
    pub read_errors: u64,
}

/// Cheap cloneable handle for reading snapshots from another thread
#[derive(Clone)]
pub struct SnapshotHandle {
    aggregator: Arc<Mutex<Aggregator>>,
}

impl SnapshotHandle {
    /// Owned copy of the current state; safe to call at any time
    pub fn snapshot(&self) -> Snapshot {
        lock_aggregator(&self.aggregator).snapshot()
    }
}

/// A mutex poisoned by a panicking reader still holds consistent data;
/// keep serving it rather than propagating the panic.
fn lock_aggregator(aggregator: &Arc<Mutex<Aggregator>>) -> MutexGuard<'_, Aggregator> {
    aggregator
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Composes link, parser and aggregator into a polled ingest pipeline
pub struct IngestSession {
    link: SerialLink,
    parser: LineParser,
    aggregator: Arc<Mutex<Aggregator>>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    stats: SessionStats,
    last_state: ConnectionState,
}

impl IngestSession {
    /// Create a session over real hardware
    pub fn new(config: SessionConfig) -> Self {
        let link = SerialLink::new(config.link.clone());
        Self::from_parts(config, link)
    }

    /// Create a session over an explicit transport (used by tests)
    pub fn with_transport(config: SessionConfig, transport: Box<dyn SerialTransport>) -> Self {
        let link = SerialLink::with_transport(config.link.clone(), transport);
        Self::from_parts(config, link)
    }

    fn from_parts(config: SessionConfig, link: SerialLink) -> Self {
        let (events_tx, events_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        Self {
            link,
            parser: LineParser::new(config.schema, config.heater_map),
            aggregator: Arc::new(Mutex::new(Aggregator::new(config.schema, config.window_size))),
            events_tx,
            events_rx,
            stats: SessionStats::default(),
            last_state: ConnectionState::Disconnected,
        }
    }

    /// Perform one ingest cycle; absorbs all failures internally
    pub fn poll(&mut self) {
        self.stats.polls += 1;

        if !self.link.is_usable() {
            self.link.connect();
            self.note_state();
            return;
        }

        if self.link.bytes_available() == 0 {
            // Either genuinely nothing waiting, or the availability check
            // just broke the link; the next poll reconnects in that case.
            self.note_state();
            return;
        }

        let chunk = match self.link.read_available() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.read_errors += 1;
                tracing::warn!(error = %e, "serial read failed, forcing reconnect");
                self.link.connect();
                self.note_state();
                return;
            }
        };

        let parsed = self.parser.feed(&chunk);
        for error in &parsed.errors {
            self.stats.protocol_errors += 1;
            tracing::warn!(error = %error, "discarding undecodable telemetry");
            self.send_event(SessionEvent::ProtocolError(error.clone()));
        }

        if !parsed.samples.is_empty() {
            let count = parsed.samples.len();
            {
                let mut aggregator = lock_aggregator(&self.aggregator);
                for sample in &parsed.samples {
                    aggregator.apply(sample);
                }
            }
            self.stats.samples_applied += count as u64;
            self.send_event(SessionEvent::SamplesApplied(count));
        }

        self.note_state();
    }

    /// Owned copy of the current state; safe even while disconnected
    pub fn snapshot(&self) -> Snapshot {
        lock_aggregator(&self.aggregator).snapshot()
    }

    /// Handle for reading snapshots from another thread
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            aggregator: self.aggregator.clone(),
        }
    }

    /// Receiver for session events; each event is delivered to one receiver
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    /// Running counters
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Current link lifecycle state
    pub fn link_state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Idempotent teardown: close the link and drop any partial line
    pub fn cleanup(&mut self) {
        self.link.close();
        self.parser.clear();
        self.note_state();
    }

    fn note_state(&mut self) {
        let state = self.link.state();
        if state != self.last_state {
            tracing::info!(from = %self.last_state, to = %state, "link state changed");
            self.last_state = state;
            self.send_event(SessionEvent::StateChanged(state));
        }
    }

    fn send_event(&self, event: SessionEvent) {
        // Dropping on a full channel is deliberate: a stalled host must not
        // stall ingestion.
        let _ = self.events_tx.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinkConfig, LinkTiming};
    use crate::link::MockHandle;
    use crate::types::{Channel, Schema};
    use std::time::Duration;

    fn test_config(schema: Schema, window_size: usize) -> SessionConfig {
        SessionConfig {
            link: LinkConfig {
                reconnect_interval: Duration::ZERO,
                timing: LinkTiming::immediate(),
                ..LinkConfig::new("mock0")
            },
            schema,
            window_size,
            ..SessionConfig::default()
        }
    }

    fn mock_session(schema: Schema, window_size: usize) -> (IngestSession, MockHandle) {
        let handle = MockHandle::new();
        let session =
            IngestSession::with_transport(test_config(schema, window_size), Box::new(handle.transport()));
        (session, handle)
    }

    #[test]
    fn test_first_poll_connects_without_reading() {
        let (mut session, handle) = mock_session(Schema::Minimal, 8);
        session.poll();

        assert_eq!(session.link_state(), ConnectionState::Connected);
        assert!(handle.is_open());
        // No read happened this cycle.
        assert_eq!(session.stats().samples_applied, 0);
    }

    #[test]
    fn test_poll_applies_samples() {
        let (mut session, handle) = mock_session(Schema::Minimal, 8);
        session.poll(); // connect
        handle.push_chunk(b"DATA:1.0:2.0\nDATA:3.0:4.0\n");
        session.poll(); // read

        let snap = session.snapshot();
        assert_eq!(
            snap.channel(Channel::Pressure).unwrap().history,
            vec![2.0, 4.0]
        );
        assert_eq!(session.stats().samples_applied, 2);
    }

    #[test]
    fn test_poll_with_nothing_waiting_has_no_side_effects() {
        let (mut session, _handle) = mock_session(Schema::Minimal, 8);
        session.poll(); // connect
        let before = session.snapshot();
        session.poll(); // zero bytes available
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_malformed_line_isolation() {
        let (mut session, handle) = mock_session(Schema::Minimal, 8);
        session.poll();
        handle.push_chunk(b"DATA:1.0:2.0\nDATA:oops:4.0\nDATA:5.0:6.0\n");
        session.poll();

        assert_eq!(session.stats().samples_applied, 2);
        assert_eq!(session.stats().protocol_errors, 1);

        // Later chunks are unaffected.
        handle.push_chunk(b"DATA:7.0:8.0\n");
        session.poll();
        assert_eq!(session.stats().samples_applied, 3);
    }

    #[test]
    fn test_read_failure_breaks_link_and_retries() {
        let (mut session, handle) = mock_session(Schema::Minimal, 8);
        session.poll();
        handle.push_chunk(b"DATA:1.0:2.0\n");
        handle.fail_next_read();
        session.poll();

        assert_eq!(session.stats().read_errors, 1);
        // The immediate reconnect succeeded (interval is zero in tests).
        assert_eq!(session.link_state(), ConnectionState::Connected);

        // Snapshot is unchanged, just stale.
        assert!(session
            .snapshot()
            .channel(Channel::Voltage)
            .unwrap()
            .history
            .is_empty());
    }

    #[test]
    fn test_snapshot_while_disconnected_returns_last_state() {
        let (mut session, handle) = mock_session(Schema::Minimal, 8);
        session.poll();
        handle.push_chunk(b"DATA:1.0:2.0\n");
        session.poll();

        session.cleanup();
        let snap = session.snapshot();
        assert_eq!(snap.channel(Channel::Voltage).unwrap().history, vec![1.0]);
    }

    #[test]
    fn test_cleanup_is_idempotent_even_without_connect() {
        let config = test_config(Schema::Minimal, 8);
        let handle = MockHandle::new();
        let mut session = IngestSession::with_transport(config, Box::new(handle.transport()));

        session.cleanup();
        session.cleanup();
        assert_eq!(session.link_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_events_report_state_and_samples() {
        let (mut session, handle) = mock_session(Schema::Minimal, 8);
        let events = session.events();

        session.poll();
        handle.push_chunk(b"DATA:1.0:2.0\nJUNK:\n");
        session.poll();

        let received: Vec<SessionEvent> = events.try_iter().collect();
        assert!(received
            .iter()
            .any(|e| matches!(e, SessionEvent::StateChanged(ConnectionState::Connected))));
        assert!(received
            .iter()
            .any(|e| matches!(e, SessionEvent::SamplesApplied(1))));
    }

    #[test]
    fn test_snapshot_handle_reads_from_another_thread() {
        let (mut session, handle) = mock_session(Schema::Minimal, 8);
        let reader = session.snapshot_handle();

        session.poll();
        handle.push_chunk(b"DATA:1.0:2.0\n");
        session.poll();

        let worker = std::thread::spawn(move || reader.snapshot());
        let snap = worker.join().expect("reader thread");
        assert_eq!(snap.channel(Channel::Pressure).unwrap().history, vec![2.0]);
    }

    #[test]
    fn test_window_eviction_through_session() {
        let (mut session, handle) = mock_session(Schema::Minimal, 3);
        session.poll();
        handle.push_chunk(b"DATA:0:10\nDATA:0:20\nDATA:0:30\nDATA:0:40\n");
        session.poll();

        let pressure = session.snapshot();
        let pressure = pressure.channel(Channel::Pressure).unwrap();
        assert_eq!(pressure.history, vec![20.0, 30.0, 40.0]);
        assert_eq!(pressure.max, Some(40.0));
        assert_eq!(pressure.min, Some(10.0));
    }
}
