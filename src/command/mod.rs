//! # Command Module
//!
//! Validates operator commands and writes them to the controller link.
//!
//! This module handles:
//! - Range checks for speed (0-100 %) and servo (0-180 °) commands
//! - Tracking servo positions locally, since the controller does not echo
//!   absolute position reliably
//! - Relative nudges, absolute moves and named presets
//! - Optional pacing between consecutive writes
//!
//! Commands are fire-and-forget: nothing waits for a controller
//! acknowledgement. Failures are always returned to the caller. A failed
//! write also marks the link lost when the sender has a [`LinkMonitor`].

use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::CommandError;
use crate::link::LinkMonitor;
use crate::serial::port_trait::LineSink;
use crate::wire::encoder::encode;
use crate::wire::protocol::*;

/// Default servo increment for step controls
pub const DEFAULT_ANGLE_STEP_DEG: i32 = 10;

/// Direction of a step control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Increase,
    Decrease,
}

/// Locally tracked servo angles, always within the servo band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServoPositions {
    shutoff: i32,
    propane: i32,
}

impl ServoPositions {
    pub fn get(&self, servo: Servo) -> i32 {
        match servo {
            Servo::Shutoff => self.shutoff,
            Servo::Propane => self.propane,
        }
    }

    fn set(&mut self, servo: Servo, angle: i32) {
        let angle = angle.clamp(ANGLE_MIN, ANGLE_MAX);
        match servo {
            Servo::Shutoff => self.shutoff = angle,
            Servo::Propane => self.propane = angle,
        }
    }
}

/// Check a value against the actuator's band
fn validate(kind: ActuatorKind, value: i32) -> Result<(), CommandError> {
    let (min, max) = kind.band();
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CommandError::OutOfRange {
            kind,
            value,
            min,
            max,
        })
    }
}

struct SenderInner {
    sink: Box<dyn LineSink>,
    last_write: Option<Instant>,
}

/// Owner of the link's write half
pub struct CommandSender {
    inner: Mutex<SenderInner>,
    positions: StdMutex<ServoPositions>,
    min_interval: Duration,
    angle_step: i32,
    link: Option<LinkMonitor>,
}

impl std::fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSender")
            .field("positions", &self.positions())
            .field("min_interval", &self.min_interval)
            .field("angle_step", &self.angle_step)
            .finish_non_exhaustive()
    }
}

impl CommandSender {
    /// Create a sender with both servos tracked at 0°
    pub fn new(sink: Box<dyn LineSink>) -> Self {
        Self::with_settings(sink, Duration::ZERO, DEFAULT_ANGLE_STEP_DEG)
    }

    /// Create a sender with pacing and step size
    ///
    /// # Arguments
    ///
    /// * `sink` - Write half of the link
    /// * `min_interval` - Minimum spacing between writes; zero disables pacing
    /// * `angle_step` - Increment used by [`CommandSender::step_angle`]
    pub fn with_settings(sink: Box<dyn LineSink>, min_interval: Duration, angle_step: i32) -> Self {
        Self {
            inner: Mutex::new(SenderInner {
                sink,
                last_write: None,
            }),
            positions: StdMutex::new(ServoPositions::default()),
            min_interval,
            angle_step,
            link: None,
        }
    }

    /// Report write failures as link loss through `monitor`
    pub fn with_link_monitor(mut self, monitor: LinkMonitor) -> Self {
        self.link = Some(monitor);
        self
    }

    /// Set pump or engine speed
    ///
    /// # Errors
    ///
    /// * [`CommandError::OutOfRange`] if `percent` is outside 0-100; nothing is written
    /// * [`CommandError::TransportWrite`] if the link write fails
    pub async fn send_level(&self, kind: LevelActuator, percent: i32) -> Result<(), CommandError> {
        let command = ActuatorCommand::new(kind, percent);
        if let Err(e) = validate(command.kind, percent) {
            warn!("Rejected command: {}", e);
            return Err(e);
        }

        let mut inner = self.inner.lock().await;
        self.write(&mut inner, &command).await
    }

    /// Move a servo relative to its tracked position
    ///
    /// The target is clamped to 0-180°, so this never fails on range. The
    /// tracked position only changes if the write succeeds.
    ///
    /// # Returns
    ///
    /// * `Result<i32, CommandError>` - New tracked angle
    pub async fn adjust_angle(&self, servo: Servo, delta: i32) -> Result<i32, CommandError> {
        let mut inner = self.inner.lock().await;
        let target = self
            .servo_position(servo)
            .saturating_add(delta)
            .clamp(ANGLE_MIN, ANGLE_MAX);
        self.move_servo(&mut inner, servo, target).await
    }

    /// Move a servo to an absolute angle
    ///
    /// # Errors
    ///
    /// * [`CommandError::OutOfRange`] if `angle` is outside 0-180°. An explicit
    ///   absolute request is rejected, not clamped as in `adjust_angle`
    /// * [`CommandError::TransportWrite`] if the link write fails
    pub async fn set_absolute_angle(&self, servo: Servo, angle: i32) -> Result<i32, CommandError> {
        if let Err(e) = validate(servo.into(), angle) {
            warn!("Rejected command: {}", e);
            return Err(e);
        }

        let mut inner = self.inner.lock().await;
        self.move_servo(&mut inner, servo, angle).await
    }

    /// Nudge a servo by the configured step
    pub async fn step_angle(&self, servo: Servo, direction: StepDirection) -> Result<i32, CommandError> {
        let delta = match direction {
            StepDirection::Increase => self.angle_step,
            StepDirection::Decrease => -self.angle_step,
        };
        self.adjust_angle(servo, delta).await
    }

    /// Close the propane valve to its "OFF" preset
    pub async fn propane_off(&self) -> Result<i32, CommandError> {
        self.set_absolute_angle(Servo::Propane, PROPANE_OFF_DEG).await
    }

    /// Tracked angle of a servo
    pub fn servo_position(&self, servo: Servo) -> i32 {
        self.positions().get(servo)
    }

    pub fn positions(&self) -> ServoPositions {
        *self.positions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the write half
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Err(e) = inner.sink.close().await {
            warn!("Failed to close command link: {}", e);
        }
    }

    async fn move_servo(
        &self,
        inner: &mut SenderInner,
        servo: Servo,
        target: i32,
    ) -> Result<i32, CommandError> {
        self.write(inner, &ActuatorCommand::new(servo, target)).await?;
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(servo, target);
        Ok(target)
    }

    async fn write(&self, inner: &mut SenderInner, command: &ActuatorCommand) -> Result<(), CommandError> {
        if let Some(last) = inner.last_write {
            let ready = last + self.min_interval;
            if Instant::now() < ready {
                tokio::time::sleep_until(ready).await;
            }
        }

        let line = encode(command);
        let result = async {
            inner.sink.write_all(line.as_bytes()).await?;
            inner.sink.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                inner.last_write = Some(Instant::now());
                debug!("Sent command {}", line.trim_end());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send {}: {}", line.trim_end(), e);
                if let Some(link) = &self.link {
                    link.report_lost(format!("write failed: {}", e));
                }
                Err(CommandError::TransportWrite(e))
            }
        }
    }
}
