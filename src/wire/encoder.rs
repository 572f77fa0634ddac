//! # Command Encoder
//!
//! Encodes actuator commands into wire lines.

use super::protocol::*;

/// Encode an actuator command into a complete wire line
///
/// Produces `"<KEY>:<value>\n"`. No range check is done here; callers
/// validate before encoding, so encoding is total.
///
/// # Examples
///
/// ```
/// use endurance_gcu::wire::encoder::encode;
/// use endurance_gcu::wire::protocol::{ActuatorCommand, LevelActuator};
///
/// let line = encode(&ActuatorCommand::new(LevelActuator::Pump, 40));
/// assert_eq!(line, "PUMP:40\n");
/// ```
pub fn encode(cmd: &ActuatorCommand) -> String {
    format!(
        "{}{}{}{}",
        cmd.kind.key(),
        KEY_SEPARATOR,
        cmd.value,
        LINE_TERMINATOR
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::decoder::decode;

    #[test]
    fn test_encode_each_kind() {
        assert_eq!(encode(&ActuatorCommand::new(LevelActuator::Pump, 0)), "PUMP:0\n");
        assert_eq!(encode(&ActuatorCommand::new(LevelActuator::Engine, 100)), "ENGINE:100\n");
        assert_eq!(encode(&ActuatorCommand::new(Servo::Shutoff, 90)), "SHUTOFF:90\n");
        assert_eq!(encode(&ActuatorCommand::new(Servo::Propane, 75)), "PROPANE:75\n");
    }

    #[test]
    fn test_encode_does_not_validate() {
        let cmd = ActuatorCommand::new(LevelActuator::Pump, -5);
        assert_eq!(encode(&cmd), "PUMP:-5\n");
    }

    #[test]
    fn test_decoded_commandable_lines_encode_back_to_same_line() {
        for line in ["PUMP:40", "ENGINE:0", "SHUTOFF:180", "PROPANE:75"] {
            let event = decode(line).unwrap();
            let cmd = event.as_command().unwrap();
            assert_eq!(encode(&cmd), format!("{}\n", line));
        }
    }

    #[test]
    fn test_whitespace_is_normalised_by_round_trip() {
        let event = decode("  ENGINE: 55 \r").unwrap();
        assert_eq!(encode(&event.as_command().unwrap()), "ENGINE:55\n");
    }
}
