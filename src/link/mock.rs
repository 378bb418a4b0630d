//! Mock serial transport for testing
//!
//! Provides a scripted transport so the link state machine, parser and
//! session can be exercised without hardware. Tests hold a [`MockHandle`]
//! to queue incoming chunks and inject failures while the link owns the
//! [`MockTransport`] itself.
//!
//! # Enabling
//!
//! Available in unit tests and behind the `mock-transport` feature:
//!
//! ```bash
//! cargo test --features mock-transport
//! ```

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::link::transport::SerialTransport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    fail_next_open: bool,
    fail_next_read: bool,
    pending: VecDeque<Vec<u8>>,
    open_count: u32,
    reset_line: Vec<bool>,
    discard_count: u32,
}

/// Test-side handle to the shared mock state
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Create a fresh handle with empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the transport half that the link will own
    pub fn transport(&self) -> MockTransport {
        MockTransport {
            state: self.state.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock")
    }

    /// Queue a chunk; each queued chunk is returned by one read
    pub fn push_chunk(&self, bytes: &[u8]) {
        self.lock().pending.push_back(bytes.to_vec());
    }

    /// Make the next `open` fail with a port-unavailable error
    pub fn fail_next_open(&self) {
        self.lock().fail_next_open = true;
    }

    /// Make the next `read_available` fail with an I/O error
    pub fn fail_next_read(&self) {
        self.lock().fail_next_read = true;
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> u32 {
        self.lock().open_count
    }

    /// Whether the transport currently holds an open handle
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// History of reset-line writes (true = asserted)
    pub fn reset_line_history(&self) -> Vec<bool> {
        self.lock().reset_line.clone()
    }

    /// Number of buffer discards performed
    pub fn discard_count(&self) -> u32 {
        self.lock().discard_count
    }
}

/// Scripted transport half, owned by the link under test
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock")
    }
}

impl SerialTransport for MockTransport {
    fn open(&mut self, _config: &LinkConfig) -> Result<()> {
        let mut state = self.lock();
        if state.fail_next_open {
            state.fail_next_open = false;
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "mock port unavailable",
            )));
        }
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let state = self.lock();
        if !state.open {
            return Ok(0);
        }
        Ok(state.pending.front().map_or(0, Vec::len))
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut state = self.lock();
        if !state.open {
            return Err(LinkError::NotConnected);
        }
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock read failure",
            )));
        }
        Ok(state.pending.pop_front().unwrap_or_default())
    }

    fn set_reset_line(&mut self, asserted: bool) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(LinkError::NotConnected);
        }
        state.reset_line.push(asserted);
        Ok(())
    }

    fn discard_buffers(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.pending.clear();
        state.discard_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.lock().open = false;
    }
}
