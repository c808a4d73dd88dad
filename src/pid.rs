//! A scalar feedback controller.

use crate::config::PidGains;

/// A proportional-integral-derivative controller.
///
/// There is no integral windup guard; callers clamp the output.
#[derive(Clone, Copy, Debug)]
pub struct PidController {
    gains: PidGains,
    error: f64,
    integral: f64,
    derivative: f64,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            error: 0.0,
            integral: 0.0,
            derivative: 0.0,
        }
    }

    /// Feeds a new error sample taken `dt` seconds after the previous one.
    pub fn update_error(&mut self, error: f64, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.integral += error * dt;
        self.derivative = (error - self.error) / dt;
        self.error = error;
    }

    /// The control output for the latest error sample.
    pub fn output(&self) -> f64 {
        self.gains.kp * self.error + self.gains.ki * self.integral + self.gains.kd * self.derivative
    }
}
