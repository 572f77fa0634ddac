//! Fixed-capacity history for plotted channels

use std::collections::VecDeque;

use crate::wire::protocol::Channel;

/// Samples kept per plotted channel
pub const ROLLING_CAPACITY: usize = 60;

/// Channels that keep a rolling history for live plots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotChannel {
    Temperature,
    MassFlow,
}

impl PlotChannel {
    pub const ALL: [PlotChannel; 2] = [PlotChannel::Temperature, PlotChannel::MassFlow];

    pub fn from_channel(channel: Channel) -> Option<PlotChannel> {
        match channel {
            Channel::Temperature => Some(PlotChannel::Temperature),
            Channel::MassFlow => Some(PlotChannel::MassFlow),
            _ => None,
        }
    }
}

/// FIFO of the most recent samples, pre-filled with zeroes so plots have a
/// full-width x axis from the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingBuffer {
    /// Create a zero-filled buffer; a zero capacity is bumped to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: std::iter::repeat(0.0).take(capacity).collect(),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest
    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Samples oldest first
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(ROLLING_CAPACITY)
    }
}
