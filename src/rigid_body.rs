//! Point-mass-with-orientation physics.

use crate::error::{Result, SimError};
use crate::math::{heading_vector, Point2d, Vector2d};
use cgmath::prelude::*;

/// A rigid body moving in the plane.
///
/// Forces and torques accumulate between integration steps and are cleared
/// by [RigidBody::integrate].
#[derive(Clone, Debug)]
pub struct RigidBody {
    mass: f64,
    inertia: f64,
    position: Point2d,
    /// The heading in radians, anti-clockwise from the positive x-axis.
    angle: f64,
    velocity: Vector2d,
    angular_velocity: f64,
    force: Vector2d,
    torque: f64,
}

impl RigidBody {
    /// Creates a stationary body.
    pub fn new(mass: f64, inertia: f64, position: Point2d, angle: f64) -> Result<Self> {
        if !(mass > 0.0) {
            return Err(SimError::InvalidMass(mass));
        }
        if !(inertia > 0.0) {
            return Err(SimError::InvalidInertia(inertia));
        }
        Ok(Self {
            mass,
            inertia,
            position,
            angle,
            velocity: Vector2d::zero(),
            angular_velocity: 0.0,
            force: Vector2d::zero(),
            torque: 0.0,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn position(&self) -> Point2d {
        self.position
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// A unit vector aligned with the body's heading.
    pub fn heading(&self) -> Vector2d {
        heading_vector(self.angle)
    }

    pub fn velocity(&self) -> Vector2d {
        self.velocity
    }

    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    /// The speed in m/s.
    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }

    /// The force accumulated since the last integration step.
    pub fn force(&self) -> Vector2d {
        self.force
    }

    /// The torque accumulated since the last integration step.
    pub fn torque(&self) -> f64 {
        self.torque
    }

    pub fn apply_force(&mut self, force: Vector2d) {
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: f64) {
        self.torque += torque;
    }

    pub fn set_velocity(&mut self, velocity: Vector2d) {
        self.velocity = velocity;
    }

    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
    }

    /// Advances the body by `dt` seconds using semi-implicit Euler integration,
    /// then clears the force and torque accumulators.
    pub fn integrate(&mut self, dt: f64) {
        let acc = self.force / self.mass;
        self.velocity += acc * dt;
        self.position += self.velocity * dt;

        let ang_acc = self.torque / self.inertia;
        self.angular_velocity += ang_acc * dt;
        self.angle += self.angular_velocity * dt;

        self.force = Vector2d::zero();
        self.torque = 0.0;
    }
}
