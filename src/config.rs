//! Model constants shared by the world and the driver models.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};

/// The gains of a PID controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// The tunable constants of the simulation.
///
/// A single value of this type is owned by the [World](crate::World) and passed
/// explicitly to every model that needs it. Missing fields of a JSON document
/// take the defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// The desired time gap to the vehicle ahead, in s.
    pub safe_time_headway: f64,
    /// The minimum bumper-to-bumper gap between stopped vehicles, in m.
    pub min_bumper_gap: f64,
    /// The smallest gap the car following model will divide by, in m.
    pub min_idm_gap: f64,
    /// The width of every lane, in m.
    pub lane_width: f64,
    /// The maximum number of roads meeting at an intersection.
    pub max_roads_per_intersection: usize,
    /// How long each signal phase stays green, in s.
    pub green_duration: f64,
    /// The speed limit inside intersections, in m/s.
    pub connector_speed_limit: f64,
    /// The number of straight segments used to approximate a connector lane.
    pub connector_segments: usize,
    /// How far downstream to look for free space, in m.
    pub lookahead_distance: f64,
    /// The incentive a lane change must exceed, in m/s<sup>2</sup>.
    pub lane_change_threshold: f64,
    /// The incentive for driving in the outermost lane, in m/s<sup>2</sup>.
    pub keep_right_bias: f64,
    /// The incentive for leaving a lane that has no way through the intersection
    /// ahead, in m/s<sup>2</sup>.
    pub route_bias: f64,
    /// The gains of the steering controller.
    pub steering: PidGains,
    /// The maximum steering angle of a vehicle, in radians.
    pub max_steering_angle: f64,
    /// The smallest supported maximum acceleration, in m/s<sup>2</sup>.
    pub min_acceleration: f64,
    /// The largest supported braking deceleration, in m/s<sup>2</sup>.
    pub max_braking: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            safe_time_headway: 1.5,
            min_bumper_gap: 2.0,
            min_idm_gap: 0.1,
            lane_width: 3.5,
            max_roads_per_intersection: 4,
            green_duration: 10.0,
            connector_speed_limit: 6.0,
            connector_segments: 8,
            lookahead_distance: 250.0,
            lane_change_threshold: 0.1,
            keep_right_bias: 0.2,
            route_bias: 1.0,
            steering: PidGains {
                kp: 1.0,
                ki: 0.0,
                kd: 1.5,
            },
            max_steering_angle: 0.6,
            min_acceleration: 0.3,
            max_braking: 9.0,
        }
    }
}

impl SimConfig {
    /// Parses a configuration from a JSON document and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every constant is within its meaningful range.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("safe_time_headway", self.safe_time_headway),
            ("min_bumper_gap", self.min_bumper_gap),
            ("min_idm_gap", self.min_idm_gap),
            ("lane_width", self.lane_width),
            ("green_duration", self.green_duration),
            ("connector_speed_limit", self.connector_speed_limit),
            ("lookahead_distance", self.lookahead_distance),
            ("max_steering_angle", self.max_steering_angle),
            ("min_acceleration", self.min_acceleration),
            ("max_braking", self.max_braking),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, value)| !(*value > 0.0)) {
            return Err(SimError::InvalidConfig(format!(
                "`{name}` must be positive, got {value}"
            )));
        }
        if !(1..=4).contains(&self.max_roads_per_intersection) {
            return Err(SimError::InvalidConfig(format!(
                "`max_roads_per_intersection` must be between 1 and 4, got {}",
                self.max_roads_per_intersection
            )));
        }
        if self.connector_segments == 0 {
            return Err(SimError::InvalidSegmentCount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{
            "green_duration": 20.0,
            "steering": { "kp": 2.0, "ki": 0.1, "kd": 0.5 }
        }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!(config.green_duration, 20.0);
        assert_eq!(config.steering.kp, 2.0);
        assert_eq!(config.min_bumper_gap, SimConfig::default().min_bumper_gap);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            SimConfig::from_json(r#"{ "lane_width": -1.0 }"#),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            SimConfig::from_json(r#"{ "max_roads_per_intersection": 5 }"#),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            SimConfig::from_json("not json"),
            Err(SimError::Config(_))
        ));
    }
}
