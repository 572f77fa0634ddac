//! # Wire Protocol Constants and Types
//!
//! Core definitions for the line-oriented text protocol spoken with the
//! test-stand controller. Every message is `<KEY>:<payload>` terminated by `\n`.

/// Message terminator on the wire
pub const LINE_TERMINATOR: char = '\n';

/// Separator between channel key and payload
pub const KEY_SEPARATOR: char = ':';

/// Speed command band (percent)
pub const PERCENT_MIN: i32 = 0;
pub const PERCENT_MAX: i32 = 100;

/// Servo command band (degrees)
pub const ANGLE_MIN: i32 = 0;
pub const ANGLE_MAX: i32 = 180;

/// Shutoff valve fully open preset
pub const SHUTOFF_OPEN_DEG: i32 = 0;

/// Shutoff valve half-way preset
pub const SHUTOFF_HALF_DEG: i32 = 90;

/// Propane valve "OFF" preset
pub const PROPANE_OFF_DEG: i32 = 75;

/// A named telemetry quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Temperature,
    MassFlow,
    PumpSpeed,
    EngineSpeed,
    ShutoffAngle,
    PropaneAngle,
    Status,
}

/// How a channel's payload is parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Integer,
    Text,
}

/// Inbound dispatch table: wire prefix to channel.
///
/// `MASS` is the canonical mass-flow key; `WEIGHT` is an alias sent by
/// older controller firmware. Adding a channel is one entry here plus its
/// [`ValueKind`].
pub const CHANNEL_KEYS: &[(&str, Channel)] = &[
    ("TEMP", Channel::Temperature),
    ("MASS", Channel::MassFlow),
    ("WEIGHT", Channel::MassFlow),
    ("PUMP", Channel::PumpSpeed),
    ("ENGINE", Channel::EngineSpeed),
    ("SHUTOFF", Channel::ShutoffAngle),
    ("PROPANE", Channel::PropaneAngle),
    ("STATUS", Channel::Status),
];

impl Channel {
    /// All channels in log column order
    pub const ALL: [Channel; 7] = [
        Channel::Temperature,
        Channel::MassFlow,
        Channel::PumpSpeed,
        Channel::EngineSpeed,
        Channel::ShutoffAngle,
        Channel::PropaneAngle,
        Channel::Status,
    ];

    /// Look up a channel by its exact (case-sensitive) wire prefix
    pub fn from_key(key: &str) -> Option<Channel> {
        CHANNEL_KEYS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, channel)| *channel)
    }

    /// Canonical wire key
    pub fn key(self) -> &'static str {
        match self {
            Channel::Temperature => "TEMP",
            Channel::MassFlow => "MASS",
            Channel::PumpSpeed => "PUMP",
            Channel::EngineSpeed => "ENGINE",
            Channel::ShutoffAngle => "SHUTOFF",
            Channel::PropaneAngle => "PROPANE",
            Channel::Status => "STATUS",
        }
    }

    pub fn value_kind(self) -> ValueKind {
        match self {
            Channel::Temperature | Channel::MassFlow => ValueKind::Float,
            Channel::PumpSpeed
            | Channel::EngineSpeed
            | Channel::ShutoffAngle
            | Channel::PropaneAngle => ValueKind::Integer,
            Channel::Status => ValueKind::Text,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One decoded observation for a single channel.
///
/// Numeric bands on the integer channels are advisory on the inbound path:
/// the controller is the source of truth, so out-of-band values are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// Degrees Celsius
    Temperature(f64),
    /// Grams per second
    MassFlow(f64),
    /// Percent (0-100)
    PumpSpeed(i32),
    /// Percent (0-100)
    EngineSpeed(i32),
    /// Degrees (0-180)
    ShutoffAngle(i32),
    /// Degrees (0-180)
    PropaneAngle(i32),
    /// Free-form status token
    Status(String),
}

impl TelemetryEvent {
    pub fn channel(&self) -> Channel {
        match self {
            TelemetryEvent::Temperature(_) => Channel::Temperature,
            TelemetryEvent::MassFlow(_) => Channel::MassFlow,
            TelemetryEvent::PumpSpeed(_) => Channel::PumpSpeed,
            TelemetryEvent::EngineSpeed(_) => Channel::EngineSpeed,
            TelemetryEvent::ShutoffAngle(_) => Channel::ShutoffAngle,
            TelemetryEvent::PropaneAngle(_) => Channel::PropaneAngle,
            TelemetryEvent::Status(_) => Channel::Status,
        }
    }

    /// Numeric value of the event, if the channel carries one
    pub fn numeric(&self) -> Option<f64> {
        match self {
            TelemetryEvent::Temperature(v) | TelemetryEvent::MassFlow(v) => Some(*v),
            TelemetryEvent::PumpSpeed(v)
            | TelemetryEvent::EngineSpeed(v)
            | TelemetryEvent::ShutoffAngle(v)
            | TelemetryEvent::PropaneAngle(v) => Some(f64::from(*v)),
            TelemetryEvent::Status(_) => None,
        }
    }

    /// The outbound command carrying the same key and value, for channels
    /// the ground side can also command
    pub fn as_command(&self) -> Option<ActuatorCommand> {
        let (kind, value) = match self {
            TelemetryEvent::PumpSpeed(v) => (ActuatorKind::Pump, *v),
            TelemetryEvent::EngineSpeed(v) => (ActuatorKind::Engine, *v),
            TelemetryEvent::ShutoffAngle(v) => (ActuatorKind::Shutoff, *v),
            TelemetryEvent::PropaneAngle(v) => (ActuatorKind::Propane, *v),
            _ => return None,
        };
        Some(ActuatorCommand { kind, value })
    }
}

/// Every actuator the ground side can command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorKind {
    Pump,
    Engine,
    Shutoff,
    Propane,
}

impl ActuatorKind {
    /// Uppercase wire key
    pub fn key(self) -> &'static str {
        match self {
            ActuatorKind::Pump => "PUMP",
            ActuatorKind::Engine => "ENGINE",
            ActuatorKind::Shutoff => "SHUTOFF",
            ActuatorKind::Propane => "PROPANE",
        }
    }

    /// Inclusive valid band for outgoing values
    pub fn band(self) -> (i32, i32) {
        match self {
            ActuatorKind::Pump | ActuatorKind::Engine => (PERCENT_MIN, PERCENT_MAX),
            ActuatorKind::Shutoff | ActuatorKind::Propane => (ANGLE_MIN, ANGLE_MAX),
        }
    }
}

impl std::fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Speed-controlled actuators, commanded in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelActuator {
    Pump,
    Engine,
}

impl From<LevelActuator> for ActuatorKind {
    fn from(level: LevelActuator) -> Self {
        match level {
            LevelActuator::Pump => ActuatorKind::Pump,
            LevelActuator::Engine => ActuatorKind::Engine,
        }
    }
}

/// Valve servos, commanded in absolute degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Servo {
    Shutoff,
    Propane,
}

impl From<Servo> for ActuatorKind {
    fn from(servo: Servo) -> Self {
        match servo {
            Servo::Shutoff => ActuatorKind::Shutoff,
            Servo::Propane => ActuatorKind::Propane,
        }
    }
}

/// A single outbound command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub kind: ActuatorKind,
    pub value: i32,
}

impl ActuatorCommand {
    pub fn new(kind: impl Into<ActuatorKind>, value: i32) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }
}
