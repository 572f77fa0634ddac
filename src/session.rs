//! # Protocol Session
//!
//! Aggregate owning everything a ground-control session needs: the telemetry
//! store, the link reader, and the command sender. A presentation layer holds
//! one [`ProtocolCore`] and only ever:
//!
//! - reads the latest snapshot, plot histories and log rows,
//! - issues actuator commands,
//! - starts and stops the session.
//!
//! It never blocks on the reader; every read returns a copy.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use tracing::info;

use crate::command::{CommandSender, ServoPositions, StepDirection, DEFAULT_ANGLE_STEP_DEG};
use crate::config::Config;
use crate::error::{CommandError, Result};
use crate::link::{LinkReader, LinkState, LinkStatus, DEFAULT_IDLE_BACKOFF};
use crate::serial::port_trait::{LineSink, LineSource};
use crate::serial::ControllerSerial;
use crate::telemetry::export::{self, ExportFormat, LogColumn};
use crate::telemetry::{LogRow, PlotChannel, TelemetrySnapshot, TelemetryStore, ROLLING_CAPACITY};
use crate::wire::protocol::{LevelActuator, Servo};

/// Tunables for a core built from an explicit transport
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub history_len: usize,
    pub utc_offset: FixedOffset,
    pub idle_backoff: Duration,
    pub min_command_interval: Duration,
    pub angle_step: i32,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            history_len: ROLLING_CAPACITY,
            utc_offset: Utc.fix(),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            min_command_interval: Duration::ZERO,
            angle_step: DEFAULT_ANGLE_STEP_DEG,
        }
    }
}

impl From<&Config> for CoreSettings {
    fn from(config: &Config) -> Self {
        Self {
            history_len: config.link.history_len,
            utc_offset: config.utc_offset(),
            idle_backoff: config.idle_backoff(),
            min_command_interval: config.min_command_interval(),
            angle_step: config.commands.angle_step_deg,
        }
    }
}

/// One ground-control session over one controller link
#[derive(Debug)]
pub struct ProtocolCore {
    store: Arc<TelemetryStore>,
    reader: LinkReader,
    sender: CommandSender,
}

impl ProtocolCore {
    /// Build a core over an already-open transport
    pub fn new(source: Box<dyn LineSource>, sink: Box<dyn LineSink>, settings: &CoreSettings) -> Self {
        let store = Arc::new(TelemetryStore::new(settings.history_len, settings.utc_offset));
        let reader = LinkReader::new(source, Arc::clone(&store), settings.idle_backoff);
        let sender = CommandSender::with_settings(sink, settings.min_command_interval, settings.angle_step)
            .with_link_monitor(reader.monitor());

        Self {
            store,
            reader,
            sender,
        }
    }

    /// Open the configured serial port and build a core over it
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::GcuError::Connection`] if the port cannot be
    /// opened. There is no degraded mode without a link.
    pub fn connect(config: &Config) -> Result<Self> {
        let serial = ControllerSerial::open(
            &config.serial.port,
            config.serial.baud_rate,
            config.poll_timeout(),
        )?;
        info!("Controller link ready at {}", serial.device_path());

        let (source, sink) = serial.into_halves();
        Ok(Self::new(source, sink, &CoreSettings::from(config)))
    }

    // Lifecycle

    /// Start the link reader; no-op unless idle
    pub fn start(&self) -> bool {
        self.reader.start()
    }

    /// Request the link reader to stop; no-op unless running
    pub fn stop(&self) -> bool {
        self.reader.stop()
    }

    /// Wait for the link reader to finish, then release the write half
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::GcuError::LinkLost`] if the session ended
    /// because the transport failed.
    pub async fn wait(&self) -> Result<()> {
        let outcome = self.reader.wait().await;
        if self.reader.state() == LinkState::Stopped {
            self.sender.close().await;
        }
        outcome
    }

    /// Stop and wait in one call
    pub async fn shutdown(&self) -> Result<()> {
        self.stop();
        self.wait().await
    }

    pub fn link_status(&self) -> LinkStatus {
        self.reader.status()
    }

    /// Resolve once the link reader has stopped, for any reason
    pub async fn link_stopped(&self) {
        self.reader.stopped().await
    }

    // Telemetry reads

    pub fn current_snapshot(&self) -> TelemetrySnapshot {
        self.store.snapshot()
    }

    pub fn rolling_buffer(&self, channel: PlotChannel) -> Vec<f64> {
        self.store.rolling_buffer(channel)
    }

    pub fn log_rows(&self) -> Vec<LogRow> {
        self.store.log().rows()
    }

    /// Rows appended since the caller last saw `start` rows
    pub fn log_rows_since(&self, start: u64) -> Vec<LogRow> {
        self.store.log().rows_since(start)
    }

    pub fn log_len(&self) -> usize {
        self.store.log().len()
    }

    pub fn decode_failures(&self) -> u64 {
        self.store.decode_failures()
    }

    pub fn telemetry(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    // Commands

    pub async fn send_level(&self, kind: LevelActuator, percent: i32) -> std::result::Result<(), CommandError> {
        self.sender.send_level(kind, percent).await
    }

    pub async fn adjust_angle(&self, servo: Servo, delta: i32) -> std::result::Result<i32, CommandError> {
        self.sender.adjust_angle(servo, delta).await
    }

    pub async fn set_absolute_angle(&self, servo: Servo, angle: i32) -> std::result::Result<i32, CommandError> {
        self.sender.set_absolute_angle(servo, angle).await
    }

    pub async fn step_angle(&self, servo: Servo, direction: StepDirection) -> std::result::Result<i32, CommandError> {
        self.sender.step_angle(servo, direction).await
    }

    pub async fn propane_off(&self) -> std::result::Result<i32, CommandError> {
        self.sender.propane_off().await
    }

    pub fn servo_position(&self, servo: Servo) -> i32 {
        self.sender.servo_position(servo)
    }

    pub fn servo_positions(&self) -> ServoPositions {
        self.sender.positions()
    }

    // Export

    /// Write the log so far to `path`
    pub fn export_log<P: AsRef<Path>>(&self, path: P, format: ExportFormat, columns: &[LogColumn]) -> Result<()> {
        let rows = self.log_rows();
        export::export_to_file(path.as_ref(), &rows, format, columns)?;
        info!("Exported {} log rows to {}", rows.len(), path.as_ref().display());
        Ok(())
    }
}
