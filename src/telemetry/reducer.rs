//! Vehicle state snapshot and the reducer that folds updates into it.
//!
//! A [`VehicleState`] is never edited in place. [`VehicleState::apply`] takes
//! the current snapshot plus one [`StateUpdate`] and returns the next snapshot,
//! which the owner then publishes as a whole.

use super::decoder::DecodedMessage;

/// Mode shown before any autonomous or status message arrived.
pub const DEFAULT_AUTONOMOUS_MODE: &str = "N/A";
/// Destination assumed when a status report carries none.
pub const DEFAULT_DESTINATION: Location = Location { x: 1000.0, y: 1000.0 };
/// Speed assumed when a status report carries none, in planar units per hour.
pub const DEFAULT_SPEED: f64 = 50.0;

/// Point in the simulation's planar coordinate system.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Location { x, y }
    }

    pub fn distance_to(&self, other: &Location) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    pub location: Location,
    pub autonomous_mode: String,
    pub passenger_in_vehicle: bool,
    pub eta_minutes: u32,
}

impl Default for VehicleState {
    fn default() -> Self {
        VehicleState {
            location: Location::default(),
            autonomous_mode: DEFAULT_AUTONOMOUS_MODE.to_string(),
            passenger_in_vehicle: false,
            eta_minutes: 0,
        }
    }
}

/// Delta produced by the dispatcher for a single message.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// Reroute: only the ETA changes
    Eta(u32),
    /// Autonomous confirmation: only the mode changes
    AutonomousMode(String),
    /// Status report: every field is replaced
    Replace(VehicleState),
}

impl VehicleState {
    /// Returns the snapshot that results from applying `update` to `self`.
    pub fn apply(&self, update: StateUpdate) -> VehicleState {
        match update {
            StateUpdate::Eta(eta_minutes) => VehicleState {
                eta_minutes,
                ..self.clone()
            },
            StateUpdate::AutonomousMode(autonomous_mode) => VehicleState {
                autonomous_mode,
                ..self.clone()
            },
            StateUpdate::Replace(next) => next,
        }
    }

    /// Builds a complete snapshot from a `vehicle_status` report.
    pub fn from_status_report(report: &DecodedMessage) -> VehicleState {
        let (x, y) = report.pair_or("current_location", (0.0, 0.0));
        let location = Location::new(x, y);
        let (dx, dy) = report.pair_or(
            "destination",
            (DEFAULT_DESTINATION.x, DEFAULT_DESTINATION.y),
        );
        let destination = Location::new(dx, dy);
        let speed = report.f64_or("current_speed", DEFAULT_SPEED);

        let autonomous_mode = if report.bool_or("autonomous_active", false) {
            "autonomous"
        } else {
            "manual"
        };

        VehicleState {
            location,
            autonomous_mode: autonomous_mode.to_string(),
            passenger_in_vehicle: report.bool_or("has_passenger", false),
            eta_minutes: eta_minutes(&location, &destination, speed),
        }
    }
}

/// Straight-line travel time in whole minutes, 0 when the speed is not positive.
pub fn eta_minutes(from: &Location, to: &Location, speed: f64) -> u32 {
    if speed.is_nan() || speed <= 0.0 {
        return 0;
    }
    // float-to-int `as` saturates and truncates towards zero
    (from.distance_to(to) / speed * 60.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::decoder::decode;

    #[test]
    fn partial_updates_keep_other_fields() {
        let state = VehicleState {
            location: Location::new(1.0, 2.0),
            autonomous_mode: "manual".into(),
            passenger_in_vehicle: true,
            eta_minutes: 30,
        };

        let next = state.apply(StateUpdate::Eta(12));
        assert_eq!(next.eta_minutes, 12);
        assert_eq!(next.location, state.location);
        assert_eq!(next.autonomous_mode, "manual");
        assert!(next.passenger_in_vehicle);

        let next = next.apply(StateUpdate::AutonomousMode("L4".into()));
        assert_eq!(next.autonomous_mode, "L4");
        assert_eq!(next.eta_minutes, 12);
        // the previous snapshot is untouched
        assert_eq!(state.eta_minutes, 30);
    }

    #[test]
    fn status_report_replaces_everything() {
        let report = decode(
            br#"{"message_type":"vehicle_status","current_location":[500,500],
                 "destination":[1000,1000],"current_speed":50,
                 "autonomous_active":true,"has_passenger":true}"#,
        )
        .unwrap();

        let before = VehicleState {
            autonomous_mode: "L4".into(),
            eta_minutes: 3,
            ..VehicleState::default()
        };
        let after = before.apply(StateUpdate::Replace(VehicleState::from_status_report(&report)));

        assert_eq!(after.location, Location::new(500.0, 500.0));
        assert_eq!(after.autonomous_mode, "autonomous");
        assert!(after.passenger_in_vehicle);
        assert_eq!(after.eta_minutes, 848);
    }

    #[test]
    fn status_report_defaults() {
        let report = decode(br#"{"message_type":"vehicle_status"}"#).unwrap();
        let state = VehicleState::from_status_report(&report);

        assert_eq!(state.location, Location::new(0.0, 0.0));
        assert_eq!(state.autonomous_mode, "manual");
        assert!(!state.passenger_in_vehicle);
        // sqrt(2) * 1000 / 50 * 60
        assert_eq!(state.eta_minutes, 1697);
    }

    #[test]
    fn non_positive_speed_means_no_eta() {
        let origin = Location::default();
        assert_eq!(eta_minutes(&origin, &DEFAULT_DESTINATION, 0.0), 0);
        assert_eq!(eta_minutes(&origin, &DEFAULT_DESTINATION, -10.0), 0);
        assert_eq!(eta_minutes(&origin, &DEFAULT_DESTINATION, f64::NAN), 0);
    }

    #[test]
    fn eta_truncates() {
        let from = Location::new(0.0, 0.0);
        let to = Location::new(0.0, 10.0);
        // 10 / 7 * 60 = 85.71...
        assert_eq!(eta_minutes(&from, &to, 7.0), 85);
    }
}
