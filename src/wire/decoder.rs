//! # Telemetry Line Decoder
//!
//! Decodes inbound `KEY:value` lines into [`TelemetryEvent`]s.

use super::protocol::*;
use crate::error::{DecodeError, DecodeReason};

/// Decode one telemetry line
///
/// # Arguments
///
/// * `line` - Raw line as read from the link, with or without terminator
///
/// # Returns
///
/// * `Result<TelemetryEvent, DecodeError>` - Decoded event, or why it was rejected
///
/// # Errors
///
/// Returns error if:
/// - The line is empty after trimming
/// - There is no `:` separator
/// - The prefix is not a known channel key (matched case-sensitively)
/// - The payload does not parse as the channel's value type
///
/// Decode errors are recoverable: the link reader drops the line and moves on.
///
/// # Examples
///
/// ```
/// use endurance_gcu::wire::decoder::decode;
/// use endurance_gcu::wire::protocol::TelemetryEvent;
///
/// assert_eq!(decode("TEMP:21.5").unwrap(), TelemetryEvent::Temperature(21.5));
/// assert!(decode("GARBAGE").is_err());
/// ```
pub fn decode(line: &str) -> Result<TelemetryEvent, DecodeError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::new(DecodeReason::Empty, line));
    }

    let (prefix, payload) = trimmed
        .split_once(KEY_SEPARATOR)
        .ok_or_else(|| DecodeError::new(DecodeReason::MissingSeparator, line))?;

    let channel = Channel::from_key(prefix.trim()).ok_or_else(|| {
        DecodeError::new(DecodeReason::UnknownChannel(prefix.to_string()), line)
    })?;

    let payload = payload.trim();
    decode_payload(channel, payload).ok_or_else(|| {
        DecodeError::new(
            DecodeReason::InvalidPayload {
                channel,
                payload: payload.to_string(),
            },
            line,
        )
    })
}

/// Parse a payload according to the channel's value kind
fn decode_payload(channel: Channel, payload: &str) -> Option<TelemetryEvent> {
    if payload.is_empty() {
        return None;
    }

    match channel.value_kind() {
        ValueKind::Float => {
            let value: f64 = payload.parse().ok()?;
            if !value.is_finite() {
                return None;
            }
            match channel {
                Channel::Temperature => Some(TelemetryEvent::Temperature(value)),
                _ => Some(TelemetryEvent::MassFlow(value)),
            }
        }
        ValueKind::Integer => {
            let value: i32 = payload.parse().ok()?;
            match channel {
                Channel::PumpSpeed => Some(TelemetryEvent::PumpSpeed(value)),
                Channel::EngineSpeed => Some(TelemetryEvent::EngineSpeed(value)),
                Channel::ShutoffAngle => Some(TelemetryEvent::ShutoffAngle(value)),
                _ => Some(TelemetryEvent::PropaneAngle(value)),
            }
        }
        ValueKind::Text => Some(TelemetryEvent::Status(payload.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_every_channel() {
        assert_eq!(decode("TEMP:21.5").unwrap(), TelemetryEvent::Temperature(21.5));
        assert_eq!(decode("MASS:3.25").unwrap(), TelemetryEvent::MassFlow(3.25));
        assert_eq!(decode("WEIGHT:4").unwrap(), TelemetryEvent::MassFlow(4.0));
        assert_eq!(decode("PUMP:40").unwrap(), TelemetryEvent::PumpSpeed(40));
        assert_eq!(decode("ENGINE:100").unwrap(), TelemetryEvent::EngineSpeed(100));
        assert_eq!(decode("SHUTOFF:90").unwrap(), TelemetryEvent::ShutoffAngle(90));
        assert_eq!(decode("PROPANE:75").unwrap(), TelemetryEvent::PropaneAngle(75));
        assert_eq!(
            decode("STATUS:IGNITION").unwrap(),
            TelemetryEvent::Status("IGNITION".to_string())
        );
    }

    #[test]
    fn test_decode_trims_whitespace_and_terminators() {
        assert_eq!(decode("  TEMP:-3.5\r\n").unwrap(), TelemetryEvent::Temperature(-3.5));
        assert_eq!(decode("PUMP: 12 ").unwrap(), TelemetryEvent::PumpSpeed(12));
    }

    #[test]
    fn test_decode_keeps_out_of_band_values() {
        // Inbound ranges are advisory
        assert_eq!(decode("PUMP:150").unwrap(), TelemetryEvent::PumpSpeed(150));
        assert_eq!(decode("SHUTOFF:-10").unwrap(), TelemetryEvent::ShutoffAngle(-10));
    }

    #[test]
    fn test_decode_splits_on_first_separator_only() {
        assert_eq!(
            decode("STATUS:T-10:HOLD").unwrap(),
            TelemetryEvent::Status("T-10:HOLD".to_string())
        );
    }

    #[test]
    fn test_decode_empty_line() {
        for line in ["", "   ", "\r\n"] {
            let err = decode(line).unwrap_err();
            assert_eq!(err.reason, DecodeReason::Empty);
            assert_eq!(err.raw_line, line);
        }
    }

    #[test]
    fn test_decode_missing_separator() {
        let err = decode("GARBAGE").unwrap_err();
        assert_eq!(err.reason, DecodeReason::MissingSeparator);
        assert_eq!(err.raw_line, "GARBAGE");
    }

    #[test]
    fn test_decode_unknown_prefix() {
        for line in ["HUMIDITY:40", "temp:21.0", "MASS FLOW:3.0", ":5"] {
            let err = decode(line).unwrap_err();
            assert!(
                matches!(err.reason, DecodeReason::UnknownChannel(_)),
                "line {:?} gave {:?}",
                line,
                err.reason
            );
        }
    }

    #[test]
    fn test_decode_invalid_payloads() {
        for line in [
            "TEMP:",
            "TEMP:warm",
            "TEMP:NaN",
            "MASS:inf",
            "PUMP:40.5",
            "ENGINE:abc",
            "SHUTOFF:99999999999",
            "STATUS:   ",
        ] {
            let err = decode(line).unwrap_err();
            assert!(
                matches!(err.reason, DecodeReason::InvalidPayload { .. }),
                "line {:?} gave {:?}",
                line,
                err.reason
            );
        }
    }

    #[test]
    fn test_decode_partial_line_from_mid_stream_attach() {
        // Attaching to a running controller often yields a truncated first line
        assert!(decode("MP:21.5").is_err());
        assert!(decode("21.5").is_err());
    }

    #[test]
    fn test_decoded_value_matches_input_for_integer_channels() {
        for value in [0, 1, 50, 99, 100, 180] {
            for (key, channel) in [
                ("PUMP", Channel::PumpSpeed),
                ("ENGINE", Channel::EngineSpeed),
                ("SHUTOFF", Channel::ShutoffAngle),
                ("PROPANE", Channel::PropaneAngle),
            ] {
                let event = decode(&format!("{}:{}", key, value)).unwrap();
                assert_eq!(event.channel(), channel);
                assert_eq!(event.numeric(), Some(f64::from(value)));
            }
        }
    }
}
