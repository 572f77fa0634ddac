//! Latest known value per telemetry channel

use std::fmt;

use crate::wire::protocol::TelemetryEvent;

/// Most recently observed value of every channel.
///
/// `None` means the channel has not reported since the session started.
/// Mutated field by field by the link reader; readers take a clone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Grams per second
    pub mass_flow: Option<f64>,
    /// Percent
    pub pump_speed: Option<i32>,
    /// Percent
    pub engine_speed: Option<i32>,
    /// Degrees
    pub shutoff_angle: Option<i32>,
    /// Degrees
    pub propane_angle: Option<i32>,
    pub status: Option<String>,
}

impl TelemetrySnapshot {
    /// Overwrite the field matching the event's channel, leaving the rest alone
    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Temperature(v) => self.temperature = Some(*v),
            TelemetryEvent::MassFlow(v) => self.mass_flow = Some(*v),
            TelemetryEvent::PumpSpeed(v) => self.pump_speed = Some(*v),
            TelemetryEvent::EngineSpeed(v) => self.engine_speed = Some(*v),
            TelemetryEvent::ShutoffAngle(v) => self.shutoff_angle = Some(*v),
            TelemetryEvent::PropaneAngle(v) => self.propane_angle = Some(*v),
            TelemetryEvent::Status(s) => self.status = Some(s.clone()),
        }
    }
}

fn field<T: fmt::Display>(f: &mut fmt::Formatter<'_>, name: &str, value: &Option<T>) -> fmt::Result {
    match value {
        Some(v) => write!(f, "{}={}", name, v),
        None => write!(f, "{}=-", name),
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        field(f, "temp", &self.temperature)?;
        f.write_str(" ")?;
        field(f, "mass", &self.mass_flow)?;
        f.write_str(" ")?;
        field(f, "pump", &self.pump_speed)?;
        f.write_str(" ")?;
        field(f, "engine", &self.engine_speed)?;
        f.write_str(" ")?;
        field(f, "shutoff", &self.shutoff_angle)?;
        f.write_str(" ")?;
        field(f, "propane", &self.propane_angle)?;
        f.write_str(" ")?;
        field(f, "status", &self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_unknown() {
        let snapshot = TelemetrySnapshot::default();
        assert_eq!(snapshot.temperature, None);
        assert_eq!(snapshot.status, None);
    }

    #[test]
    fn test_apply_touches_only_matching_field() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.apply(&TelemetryEvent::Temperature(21.5));
        snapshot.apply(&TelemetryEvent::PumpSpeed(40));

        assert_eq!(snapshot.temperature, Some(21.5));
        assert_eq!(snapshot.pump_speed, Some(40));
        assert_eq!(snapshot.mass_flow, None);
        assert_eq!(snapshot.engine_speed, None);

        snapshot.apply(&TelemetryEvent::Temperature(22.0));
        assert_eq!(snapshot.temperature, Some(22.0));
        assert_eq!(snapshot.pump_speed, Some(40));
    }

    #[test]
    fn test_display_marks_unknown_fields() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.apply(&TelemetryEvent::Status("ARMED".into()));
        let text = snapshot.to_string();
        assert!(text.contains("temp=-"));
        assert!(text.contains("status=ARMED"));
    }
}
