//! # Error Types
//!
//! Error taxonomy for the ground-control core using `thiserror`.
//!
//! - [`DecodeError`]: malformed telemetry line, dropped by the link reader
//! - [`CommandError`]: rejected or undelivered actuator command
//! - [`GcuError`]: everything else (configuration, connection, link loss)

use thiserror::Error;

use crate::wire::protocol::{ActuatorKind, Channel};

/// Main error type for the ground-control core
#[derive(Debug, Error)]
pub enum GcuError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Initial link establishment failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transport failed after the session started
    #[error("Link lost: {0}")]
    LinkLost(String),

    /// Actuator command failed
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the ground-control core
pub type Result<T> = std::result::Result<T, GcuError>;

/// Failure to issue an actuator command
#[derive(Debug, Error)]
pub enum CommandError {
    /// Value outside the actuator's valid band; nothing was written
    #[error("{kind} value {value} out of range ({min}..={max})")]
    OutOfRange {
        kind: ActuatorKind,
        value: i32,
        min: i32,
        max: i32,
    },

    /// The link write failed; the command was not delivered
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] std::io::Error),
}

/// Why a telemetry line could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeReason {
    /// Nothing left after trimming
    Empty,
    /// No `:` between prefix and payload
    MissingSeparator,
    /// Prefix is not a known channel key
    UnknownChannel(String),
    /// Payload does not parse as the channel's value type
    InvalidPayload { channel: Channel, payload: String },
}

impl std::fmt::Display for DecodeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeReason::Empty => write!(f, "empty line"),
            DecodeReason::MissingSeparator => write!(f, "missing ':' separator"),
            DecodeReason::UnknownChannel(prefix) => write!(f, "unknown channel '{}'", prefix),
            DecodeReason::InvalidPayload { channel, payload } => {
                write!(f, "invalid {} payload '{}'", channel, payload)
            }
        }
    }
}

/// A telemetry line that could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode {raw_line:?}: {reason}")]
pub struct DecodeError {
    pub reason: DecodeReason,
    pub raw_line: String,
}

impl DecodeError {
    pub fn new(reason: DecodeReason, raw_line: &str) -> Self {
        Self {
            reason,
            raw_line: raw_line.to_string(),
        }
    }
}
