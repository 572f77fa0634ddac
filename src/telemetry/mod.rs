//! # Telemetry Module
//!
//! Live telemetry state shared between the link reader and its consumers.
//!
//! This module handles:
//! - Latest value per channel ([`TelemetrySnapshot`])
//! - Rolling history for plotted channels ([`RollingBuffer`])
//! - The append-only data log ([`DataLog`]) and its export
//! - Counting lines that failed to decode
//!
//! The link reader is the only writer. Every write touches one field or
//! appends one row under its own short lock, so readers polling on their own
//! cadence see each field either before or after an update, never mid-write.

pub mod export;
pub mod log;
pub mod rolling;
pub mod snapshot;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{FixedOffset, Offset, Utc};
use tracing::{debug, trace};

use crate::error::DecodeError;
use crate::wire::decoder::decode;
use crate::wire::protocol::TelemetryEvent;

pub use log::{DataLog, LogRow};
pub use rolling::{PlotChannel, RollingBuffer, ROLLING_CAPACITY};
pub use snapshot::TelemetrySnapshot;

/// Shared live state: snapshot, plot histories, data log and counters
#[derive(Debug)]
pub struct TelemetryStore {
    snapshot: RwLock<TelemetrySnapshot>,
    temperature_history: RwLock<RollingBuffer>,
    mass_flow_history: RwLock<RollingBuffer>,
    log: DataLog,
    lines_seen: AtomicU64,
    decode_failures: AtomicU64,
    utc_offset: FixedOffset,
}

impl TelemetryStore {
    /// Create an empty store
    ///
    /// # Arguments
    ///
    /// * `history_len` - Capacity of each rolling buffer
    /// * `utc_offset` - Fixed zone used for log timestamps
    pub fn new(history_len: usize, utc_offset: FixedOffset) -> Self {
        Self {
            snapshot: RwLock::new(TelemetrySnapshot::default()),
            temperature_history: RwLock::new(RollingBuffer::new(history_len)),
            mass_flow_history: RwLock::new(RollingBuffer::new(history_len)),
            log: DataLog::new(),
            lines_seen: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            utc_offset,
        }
    }

    /// Decode one raw line and, on success, apply it
    ///
    /// A failed decode only bumps the failure counter: no snapshot, history
    /// or log mutation happens.
    pub fn ingest_line(&self, line: &str) -> Result<TelemetryEvent, DecodeError> {
        self.lines_seen.fetch_add(1, Ordering::Relaxed);

        match decode(line) {
            Ok(event) => {
                let index = self.apply(&event);
                trace!("Sample {}: {:?}", index, event);
                Ok(event)
            }
            Err(e) => {
                self.decode_failures.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping line: {}", e);
                Err(e)
            }
        }
    }

    /// Apply a decoded event: snapshot field, plot history, then log row
    ///
    /// # Returns
    ///
    /// * `u64` - Sample index of the appended log row
    pub fn apply(&self, event: &TelemetryEvent) -> u64 {
        self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(event);

        if let (Some(plot), Some(value)) = (PlotChannel::from_channel(event.channel()), event.numeric()) {
            self.history(plot)
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(value);
        }

        self.log.append(event, log::wall_clock_timestamp(&self.utc_offset))
    }

    fn history(&self, channel: PlotChannel) -> &RwLock<RollingBuffer> {
        match channel {
            PlotChannel::Temperature => &self.temperature_history,
            PlotChannel::MassFlow => &self.mass_flow_history,
        }
    }

    /// Copy of the latest value per channel
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Plot history for a channel, oldest first
    pub fn rolling_buffer(&self, channel: PlotChannel) -> Vec<f64> {
        self.history(channel)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
    }

    pub fn log(&self) -> &DataLog {
        &self.log
    }

    /// Lines pulled from the link, decoded or not
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen.load(Ordering::Relaxed)
    }

    /// Lines dropped because they did not decode
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(ROLLING_CAPACITY, Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_updates_snapshot_history_and_log() {
        let store = TelemetryStore::default();

        let event = store.ingest_line("TEMP:21.5").unwrap();
        assert_eq!(event, TelemetryEvent::Temperature(21.5));

        assert_eq!(store.snapshot().temperature, Some(21.5));
        assert_eq!(store.rolling_buffer(PlotChannel::Temperature).last(), Some(&21.5));
        assert_eq!(store.rolling_buffer(PlotChannel::MassFlow).last(), Some(&0.0));
        assert_eq!(store.log().len(), 1);
    }

    #[test]
    fn test_failed_decode_mutates_nothing() {
        let store = TelemetryStore::default();

        for line in ["GARBAGE", "", "HUMIDITY:3", "TEMP:hot"] {
            assert!(store.ingest_line(line).is_err());
        }

        assert_eq!(store.snapshot(), TelemetrySnapshot::default());
        assert!(store.rolling_buffer(PlotChannel::Temperature).iter().all(|&v| v == 0.0));
        assert!(store.log().is_empty());
        assert_eq!(store.decode_failures(), 4);
        assert_eq!(store.lines_seen(), 4);
    }

    #[test]
    fn test_mass_flow_alias_feeds_mass_flow_history() {
        let store = TelemetryStore::default();
        store.ingest_line("WEIGHT:3.5").unwrap();
        store.ingest_line("MASS:4.0").unwrap();

        let history = store.rolling_buffer(PlotChannel::MassFlow);
        assert_eq!(&history[history.len() - 2..], &[3.5, 4.0]);
        assert_eq!(store.snapshot().mass_flow, Some(4.0));
    }

    #[test]
    fn test_non_plotted_channels_skip_history() {
        let store = TelemetryStore::new(5, FixedOffset::east_opt(3600).unwrap());
        store.ingest_line("PUMP:40").unwrap();
        store.ingest_line("STATUS:ARMED").unwrap();

        assert_eq!(store.rolling_buffer(PlotChannel::Temperature), vec![0.0; 5]);
        assert_eq!(store.log().len(), 2);
    }

    #[test]
    fn test_sample_index_has_no_gaps_around_bad_lines() {
        let store = TelemetryStore::default();
        let lines = ["TEMP:1", "junk", "PUMP:2", "", "::", "ENGINE:3", "MASS:x", "STATUS:GO"];
        for line in lines {
            let _ = store.ingest_line(line);
        }

        let indices: Vec<u64> = store.log().rows().iter().map(|r| r.sample_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(store.decode_failures(), 4);
    }
}
