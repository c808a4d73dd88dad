use crate::config::SimConfig;
use crate::lane::LeaderInfo;

/// The longitudinal acceleration model of a vehicle.
#[derive(Clone, Copy, Debug)]
pub struct AccelerationModel {
    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    max_acc: f64,
    /// The comfortable braking deceleration in m/s<sup>2</sup>, a positive number.
    braking: f64,
}

impl AccelerationModel {
    /// Creates a new acceleration model.
    pub fn new(max_acc: f64, braking: f64) -> Self {
        Self { max_acc, braking }
    }

    pub fn max_acc(&self) -> f64 {
        self.max_acc
    }

    pub fn braking(&self) -> f64 {
        self.braking
    }

    /// Computes an acceleration using the intelligent driver model.
    ///
    /// # Arguments
    /// * `speed` - The vehicle's speed along the lane (m/s).
    /// * `max_speed` - The speed the vehicle would like to travel at (m/s).
    /// * `leader` - The gap to, and closing rate on, whatever is ahead.
    /// * `config` - Supplies the minimum gap and time headway.
    pub fn idm(&self, speed: f64, max_speed: f64, leader: LeaderInfo, config: &SimConfig) -> f64 {
        let factor = 1. / (2. * (self.max_acc * self.braking).sqrt());
        let desired = config.min_bumper_gap
            + speed * config.safe_time_headway
            + speed * leader.closing_rate * factor;
        let desired = f64::max(desired, 0.0);
        let gap = f64::max(leader.distance, config.min_idm_gap);
        let free = (speed / max_speed).powi(4);
        let term = desired / gap;
        self.max_acc * (1. - free - term * term)
    }
}
