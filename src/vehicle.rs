use self::acceleration::AccelerationModel;
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::lane::Lane;
use crate::math::{rot90, Point2d, Vector2d};
use crate::pid::PidController;
use crate::rigid_body::RigidBody;
use crate::VehicleId;
use cgmath::prelude::*;
pub use driving::DrivingState;
pub(crate) use driving::Decision;

mod acceleration;
mod driving;
mod mobil;

pub(crate) use mobil::optimal_lane;

/// Below this speed in m/s a vehicle keeps its current heading.
const MIN_HEADING_SPEED: f64 = 0.1;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    id: VehicleId,
    /// The physical state of the vehicle.
    body: RigidBody,
    /// Half the vehicle's width in m.
    half_wid: f64,
    /// Half the vehicle's length in m.
    half_len: f64,
    /// The vehicle's own speed cap in m/s.
    max_speed: f64,
    /// The longitudinal acceleration model.
    acc: AccelerationModel,
    /// How much the vehicle weighs the disadvantage of others when changing lanes.
    politeness: f64,
    /// A factor applied to speed limits to get the vehicle's desired speed.
    vel_adj: f64,
    /// The maximum lateral acceleration per unit speed, in 1/s.
    max_steer: f64,
    /// The lateral controller.
    steering: PidController,
    /// The driving behaviour the vehicle is currently following.
    state: DrivingState,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleParams {
    /// The vehicle width in m.
    pub width: f64,
    /// The vehicle length in m.
    pub length: f64,
    /// The vehicle mass in kg.
    pub mass: f64,
    /// The vehicle's maximum speed in m/s.
    pub max_speed: f64,
    /// The maximum acceleration of the vehicle, in m/s^2.
    pub max_acc: f64,
    /// The comfortable braking deceleration of the vehicle, a positive number in m/s^2.
    pub braking: f64,
    /// The MOBIL politeness factor, usually between 0 and 1.
    pub politeness: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            width: 1.8,
            length: 4.5,
            mass: 1200.0,
            max_speed: 30.0,
            max_acc: 1.5,
            braking: 3.0,
            politeness: 0.3,
        }
    }
}

impl VehicleParams {
    /// Checks the parameters against the supported envelope.
    pub fn validate(&self, config: &SimConfig) -> Result<()> {
        for (name, value) in [
            ("width", self.width),
            ("length", self.length),
            ("max_speed", self.max_speed),
        ] {
            if !(value > 0.0) {
                return Err(SimError::InvalidVehicleParameter { name, value });
            }
        }
        if !(self.politeness >= 0.0) {
            return Err(SimError::InvalidVehicleParameter {
                name: "politeness",
                value: self.politeness,
            });
        }
        if !(self.max_acc >= config.min_acceleration) {
            return Err(SimError::AccelerationOutOfRange {
                value: self.max_acc,
                min: config.min_acceleration,
            });
        }
        if !(self.braking > 0.0 && self.braking <= config.max_braking) {
            return Err(SimError::BrakingOutOfRange {
                value: self.braking,
                max: config.max_braking,
            });
        }
        Ok(())
    }

    /// The moment of inertia of a uniform rectangle with these dimensions.
    fn inertia(&self) -> f64 {
        self.mass * (self.length.powi(2) + self.width.powi(2)) / 12.0
    }
}

impl Vehicle {
    /// Creates a new stationary vehicle.
    pub(crate) fn new(
        id: VehicleId,
        params: &VehicleParams,
        position: Point2d,
        angle: f64,
        state: DrivingState,
        config: &SimConfig,
    ) -> Result<Self> {
        params.validate(config)?;
        Ok(Self {
            id,
            body: RigidBody::new(params.mass, params.inertia(), position, angle)?,
            half_wid: 0.5 * params.width,
            half_len: 0.5 * params.length,
            max_speed: params.max_speed,
            acc: AccelerationModel::new(params.max_acc, params.braking),
            politeness: params.politeness,
            vel_adj: 1.0,
            max_steer: config.max_steering_angle.tan(),
            steering: PidController::new(config.steering),
            state,
        })
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's width in m.
    pub fn width(&self) -> f64 {
        2.0 * self.half_wid
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        2.0 * self.half_len
    }

    pub fn half_length(&self) -> f64 {
        self.half_len
    }

    /// The rigid body carrying the vehicle's physical state.
    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    /// The coordinates in world space of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.body.position()
    }

    /// A unit vector in world space aligned with the vehicle's heading.
    pub fn direction(&self) -> Vector2d {
        self.body.heading()
    }

    pub fn velocity(&self) -> Vector2d {
        self.body.velocity()
    }

    /// The vehicle's speed in m/s.
    pub fn speed(&self) -> f64 {
        self.body.speed()
    }

    /// The component of the vehicle's velocity along `axis`, never negative.
    pub fn speed_along(&self, axis: Vector2d) -> f64 {
        f64::max(self.velocity().dot(axis), 0.0)
    }

    /// The vehicle's own speed cap in m/s.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// The speed the vehicle would like to travel at on the given lane.
    pub fn max_speed_on(&self, lane: &Lane) -> f64 {
        f64::min(self.max_speed, self.vel_adj * lane.speed_limit())
    }

    pub fn politeness(&self) -> f64 {
        self.politeness
    }

    pub(crate) fn acc(&self) -> &AccelerationModel {
        &self.acc
    }

    /// The maximum acceleration in m/s^2.
    pub fn max_acc(&self) -> f64 {
        self.acc.max_acc()
    }

    /// The comfortable braking deceleration, a positive number in m/s^2.
    pub fn braking(&self) -> f64 {
        self.acc.braking()
    }

    /// The largest lateral acceleration the vehicle can achieve at its current speed.
    pub fn max_lateral_acc(&self) -> f64 {
        self.max_steer * self.speed()
    }

    pub(crate) fn steering(&self) -> PidController {
        self.steering
    }

    /// The driving behaviour the vehicle is currently following.
    pub fn state(&self) -> DrivingState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DrivingState) {
        self.state = state;
    }

    /// Set the desired velocity adjustment factor for the vehicle, a scalar which is
    /// multiplied with the speed limit when working out the vehicle's desired speed.
    pub fn set_velocity_adjust(&mut self, factor: f64) {
        self.vel_adj = factor;
    }

    /// The corners of the vehicle's footprint, front left first and anti-clockwise.
    pub fn corners(&self) -> [Point2d; 4] {
        let dir = self.direction();
        let long = dir * self.half_len;
        let lat = rot90(dir) * self.half_wid;
        let c = self.position();
        [c + long + lat, c - long + lat, c - long - lat, c + long - lat]
    }

    /// The bumper-to-bumper distance to a vehicle ahead, measured along `axis`.
    /// Negative when the footprints overlap along the axis.
    pub fn bumper_gap(&self, leader: &Vehicle, axis: Vector2d) -> f64 {
        let origin = self.position();
        let along = |p: Point2d| (p - origin).dot(axis);
        let own_front = self
            .corners()
            .into_iter()
            .map(along)
            .fold(f64::NEG_INFINITY, f64::max);
        let their_rear = leader
            .corners()
            .into_iter()
            .map(along)
            .fold(f64::INFINITY, f64::min);
        their_rear - own_front
    }

    /// Applies the outcome of a driving decision to the vehicle.
    pub(crate) fn apply_decision(&mut self, decision: &Decision) {
        self.body.apply_force(decision.acceleration * self.body.mass());
        self.steering = decision.steering;
    }

    /// Integrates the vehicle's velocity and position, turning it to face
    /// the direction it is moving in.
    pub(crate) fn integrate(&mut self, dt: f64) {
        self.body.integrate(dt);
        let vel = self.body.velocity();
        if vel.magnitude() > MIN_HEADING_SPEED {
            self.body.set_angle(vel.y.atan2(vel.x));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn vehicle_at(x: f64, angle: f64) -> Vehicle {
        Vehicle::new(
            VehicleId::default(),
            &VehicleParams::default(),
            Point2d::new(x, 0.0),
            angle,
            DrivingState::keep_lane(Default::default()),
            &SimConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_parameters_outside_envelope() {
        let config = SimConfig::default();
        let slow = VehicleParams {
            max_acc: 0.1,
            ..Default::default()
        };
        assert!(matches!(
            slow.validate(&config),
            Err(SimError::AccelerationOutOfRange { .. })
        ));
        let harsh = VehicleParams {
            braking: 12.0,
            ..Default::default()
        };
        assert!(matches!(
            harsh.validate(&config),
            Err(SimError::BrakingOutOfRange { .. })
        ));
        let flat = VehicleParams {
            length: 0.0,
            ..Default::default()
        };
        assert!(flat.validate(&config).is_err());
        assert!(VehicleParams::default().validate(&config).is_ok());
    }

    #[test]
    fn bumper_gap_between_aligned_vehicles() {
        let follower = vehicle_at(0.0, 0.0);
        let leader = vehicle_at(10.0, 0.0);
        let axis = Vector2d::new(1.0, 0.0);
        assert_approx_eq!(follower.bumper_gap(&leader, axis), 10.0 - 4.5);
    }

    #[test]
    fn bumper_gap_uses_closest_corners() {
        let follower = vehicle_at(0.0, 0.0);
        // Rotated 90 degrees, so the leader's extent along the axis is its half width
        let leader = vehicle_at(10.0, std::f64::consts::FRAC_PI_2);
        let axis = Vector2d::new(1.0, 0.0);
        assert_approx_eq!(follower.bumper_gap(&leader, axis), 10.0 - 2.25 - 0.9);
    }

    #[test]
    fn heading_follows_velocity() {
        let mut v = vehicle_at(0.0, 0.0);
        v.body.apply_force(Vector2d::new(0.0, 1200.0 * 2.0));
        v.integrate(1.0);
        assert_approx_eq!(v.direction().y, 1.0);
        assert_approx_eq!(v.speed(), 2.0);
    }
}
