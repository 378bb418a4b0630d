//! Rolling per-channel history with running extrema
//!
//! Each channel keeps two things:
//!
//! - a capacity-bounded FIFO window of the most recent values, and
//! - session-lifetime extrema (`min_ever`/`max_ever`) updated from every
//!   value ever accepted, independent of window eviction.
//!
//! [`Aggregator`] owns one [`ChannelWindow`] per channel of the configured
//! schema and applies decoded samples to them. [`Snapshot`] is the owned,
//! read-only view handed to consumers: it copies the current state so later
//! ingestion never retroactively changes a snapshot a renderer is holding.

use crate::types::{Channel, Sample, Schema};
use std::collections::{BTreeMap, VecDeque};

/// Bounded ordered history for one numeric channel
#[derive(Debug, Clone)]
pub struct ChannelWindow {
    values: VecDeque<f64>,
    capacity: usize,
    min_ever: Option<f64>,
    max_ever: Option<f64>,
}

impl ChannelWindow {
    /// Create a window retaining at most `capacity` values (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            min_ever: None,
            max_ever: None,
        }
    }

    /// Append a value, evicting the oldest entry if at capacity
    ///
    /// Extrema are updated from every pushed value and never move backwards,
    /// regardless of what eviction later removes from the window.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.min_ever = Some(self.min_ever.map_or(value, |m| m.min(value)));
        self.max_ever = Some(self.max_ever.map_or(value, |m| m.max(value)));
    }

    /// Number of values currently retained
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window has seen no values yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maximum number of retained values
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained values in arrival order, oldest first
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Smallest value ever accepted, `None` before the first push
    pub fn min_ever(&self) -> Option<f64> {
        self.min_ever
    }

    /// Largest value ever accepted, `None` before the first push
    pub fn max_ever(&self) -> Option<f64> {
        self.max_ever
    }

    /// Owned copy of the current state
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            history: self.values.iter().copied().collect(),
            min: self.min_ever,
            max: self.max_ever,
        }
    }
}

/// Read-only copy of one channel's state at snapshot time
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    /// Retained values in arrival order, oldest first
    pub history: Vec<f64>,
    /// Session-lifetime minimum, `None` before the first value
    pub min: Option<f64>,
    /// Session-lifetime maximum, `None` before the first value
    pub max: Option<f64>,
}

/// Read-only copy of every channel's state at snapshot time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    channels: BTreeMap<Channel, ChannelSnapshot>,
}

impl Snapshot {
    /// State of one channel, or `None` if the schema has no such channel
    pub fn channel(&self, channel: Channel) -> Option<&ChannelSnapshot> {
        self.channels.get(&channel)
    }

    /// Iterate over all channels in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &ChannelSnapshot)> {
        self.channels.iter().map(|(c, s)| (*c, s))
    }

    /// Number of channels in the snapshot
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the snapshot has no channels
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Owns one window per channel and applies decoded samples
#[derive(Debug)]
pub struct Aggregator {
    windows: BTreeMap<Channel, ChannelWindow>,
}

impl Aggregator {
    /// Create an aggregator with one window per channel of `schema`, each
    /// sized to `window_size`
    pub fn new(schema: Schema, window_size: usize) -> Self {
        let windows = schema
            .channels()
            .iter()
            .map(|&channel| (channel, ChannelWindow::new(window_size)))
            .collect();
        Self { windows }
    }

    /// Apply one decoded sample to every channel it carries
    ///
    /// Channels the sample carries but the schema does not (a mixed-firmware
    /// device) are dropped silently; the schema decided at construction is
    /// authoritative.
    pub fn apply(&mut self, sample: &Sample) {
        for (channel, value) in sample.channel_values() {
            if let Some(window) = self.windows.get_mut(&channel) {
                window.push(value);
            }
        }
    }

    /// Direct access to one channel's window
    pub fn window(&self, channel: Channel) -> Option<&ChannelWindow> {
        self.windows.get(&channel)
    }

    /// Owned copy of the full current state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            channels: self
                .windows
                .iter()
                .map(|(&channel, window)| (channel, window.snapshot()))
                .collect(),
        }
    }
}
