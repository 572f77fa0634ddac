//! # Data Log
//!
//! Append-only record of every decoded telemetry event.
//!
//! One [`LogRow`] per decoded line. Rows are sparse: only the field for the
//! event's channel is populated. `sample_index` counts appended rows, so
//! malformed lines never leave gaps.

use std::sync::{PoisonError, RwLock};

use chrono::{FixedOffset, Utc};
use serde::Serialize;

use crate::wire::protocol::TelemetryEvent;

/// Timestamp layout used in log rows
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Current wall-clock time in the given fixed zone, formatted for the log
pub fn wall_clock_timestamp(offset: &FixedOffset) -> String {
    Utc::now()
        .with_timezone(offset)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// One immutable log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRow {
    pub sample_index: u64,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass_flow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_speed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_speed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutoff_angle: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propane_angle: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl LogRow {
    /// Build a sparse row holding only the event's channel
    pub fn from_event(sample_index: u64, timestamp: String, event: &TelemetryEvent) -> Self {
        let mut row = LogRow {
            sample_index,
            timestamp,
            temperature: None,
            mass_flow: None,
            pump_speed: None,
            engine_speed: None,
            shutoff_angle: None,
            propane_angle: None,
            status: None,
        };

        match event {
            TelemetryEvent::Temperature(v) => row.temperature = Some(*v),
            TelemetryEvent::MassFlow(v) => row.mass_flow = Some(*v),
            TelemetryEvent::PumpSpeed(v) => row.pump_speed = Some(*v),
            TelemetryEvent::EngineSpeed(v) => row.engine_speed = Some(*v),
            TelemetryEvent::ShutoffAngle(v) => row.shutoff_angle = Some(*v),
            TelemetryEvent::PropaneAngle(v) => row.propane_angle = Some(*v),
            TelemetryEvent::Status(s) => row.status = Some(s.clone()),
        }

        row
    }
}

/// Append-only, single-writer row store.
///
/// Readers copy out a prefix bounded by the length at the time of the call,
/// so they never observe a row being appended.
#[derive(Debug, Default)]
pub struct DataLog {
    rows: RwLock<Vec<LogRow>>,
}

impl DataLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row for `event`, stamping the next sample index
    ///
    /// # Returns
    ///
    /// * `u64` - Index assigned to the new row
    pub fn append(&self, event: &TelemetryEvent, timestamp: String) -> u64 {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let index = rows.len() as u64;
        rows.push(LogRow::from_event(index, timestamp, event));
        index
    }

    /// Copy of every row appended so far
    pub fn rows(&self) -> Vec<LogRow> {
        self.rows_since(0)
    }

    /// Copy of rows with `sample_index >= start`
    pub fn rows_since(&self, start: u64) -> Vec<LogRow> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(rows.len());
        rows[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_from_event_is_sparse() {
        let row = LogRow::from_event(3, "t".into(), &TelemetryEvent::PumpSpeed(40));
        assert_eq!(row.sample_index, 3);
        assert_eq!(row.pump_speed, Some(40));
        assert_eq!(row.temperature, None);
        assert_eq!(row.status, None);
    }

    #[test]
    fn test_append_assigns_consecutive_indices() {
        let log = DataLog::new();
        assert!(log.is_empty());

        let events = [
            TelemetryEvent::Temperature(21.5),
            TelemetryEvent::PumpSpeed(40),
            TelemetryEvent::Status("OK".into()),
        ];
        for (expected, event) in events.iter().enumerate() {
            assert_eq!(log.append(event, "t".into()), expected as u64);
        }

        let indices: Vec<u64> = log.rows().iter().map(|r| r.sample_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_rows_since() {
        let log = DataLog::new();
        for i in 0..5 {
            log.append(&TelemetryEvent::EngineSpeed(i), "t".into());
        }

        let tail = log.rows_since(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sample_index, 3);
        assert!(log.rows_since(5).is_empty());
        assert!(log.rows_since(u64::MAX).is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_gapless_prefix() {
        use std::sync::Arc;

        let log = Arc::new(DataLog::new());
        let writer = {
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                for i in 0..2000 {
                    log.append(&TelemetryEvent::PumpSpeed(i % 100), "t".into());
                }
            })
        };

        for _ in 0..50 {
            let rows = log.rows();
            for (i, row) in rows.iter().enumerate() {
                assert_eq!(row.sample_index, i as u64);
            }
        }
        writer.join().unwrap();
        assert_eq!(log.len(), 2000);
    }

    #[test]
    fn test_json_omits_absent_fields() {
        let row = LogRow::from_event(0, "2026-01-01 00:00:00.000".into(), &TelemetryEvent::Temperature(21.5));
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"sample_index":0,"timestamp":"2026-01-01 00:00:00.000","temperature":21.5}"#
        );
    }

    #[test]
    fn test_timestamp_uses_fixed_zone() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let stamp = wall_clock_timestamp(&offset);
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok());
    }
}
