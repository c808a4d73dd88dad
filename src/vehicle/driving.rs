use super::{optimal_lane, Vehicle};
use crate::error::{Result, SimError};
use crate::lane::Network;
use crate::math::{rot90, Path, Vector2d};
use crate::pid::PidController;
use crate::{LaneId, LaneSet, VehicleId, VehicleSet};
use smallvec::{smallvec, SmallVec};

/// The driving behaviour a vehicle is following.
///
/// A vehicle is registered on every lane its state occupies; the registration
/// changes only through [DrivingState::on_enter] and [DrivingState::on_exit].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrivingState {
    /// Follow the lane, looking out for a better neighbouring lane.
    KeepLane { lane: LaneId },
    /// Move across from one lane to an adjacent one.
    ChangeLane { from: LaneId, to: LaneId },
}

/// What a vehicle decided to do during a step.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Decision {
    /// The combined tangential and normal acceleration in m/s^2.
    pub acceleration: Vector2d,
    /// The tangential (car following) part of the acceleration.
    #[cfg(test)]
    pub tangential: f64,
    /// The steering controller after this step's update.
    pub steering: PidController,
    /// The state to transition to, if any.
    pub next: Option<DrivingState>,
}

impl DrivingState {
    pub fn keep_lane(lane: LaneId) -> Self {
        Self::KeepLane { lane }
    }

    /// Creates a lane change state, which must be between two distinct lanes.
    pub fn change_lane(from: LaneId, to: LaneId) -> Result<Self> {
        if from == to {
            return Err(SimError::SameLaneChange(from));
        }
        Ok(Self::ChangeLane { from, to })
    }

    /// The lanes occupied while in this state.
    pub fn lanes(&self) -> SmallVec<[LaneId; 2]> {
        match *self {
            Self::KeepLane { lane } => smallvec![lane],
            Self::ChangeLane { from, to } => smallvec![from, to],
        }
    }

    /// The lane whose midline the vehicle is steering towards.
    pub fn target_lane(&self) -> LaneId {
        match *self {
            Self::KeepLane { lane } => lane,
            Self::ChangeLane { to, .. } => to,
        }
    }

    /// The speed the vehicle may travel at, limited by every lane it occupies.
    pub fn max_speed(&self, vehicle: &Vehicle, lanes: &LaneSet) -> f64 {
        self.lanes()
            .iter()
            .filter_map(|id| lanes.get(*id))
            .map(|lane| vehicle.max_speed_on(lane))
            .fold(vehicle.max_speed(), f64::min)
    }

    /// Registers the vehicle on the lanes of this state.
    pub(crate) fn on_enter(&self, id: VehicleId, lanes: &mut LaneSet, vehicles: &VehicleSet) {
        for lane_id in self.lanes() {
            if let Some(lane) = lanes.get_mut(lane_id) {
                lane.insert_vehicle(vehicles, id);
            }
        }
    }

    /// Unregisters the vehicle from the lanes of this state.
    pub(crate) fn on_exit(&self, id: VehicleId, lanes: &mut LaneSet, vehicles: &VehicleSet) {
        for lane_id in self.lanes() {
            if let Some(lane) = lanes.get_mut(lane_id) {
                lane.remove_vehicle(vehicles, id);
            }
        }
    }

    /// Decides the vehicle's acceleration for this step and whether to change state.
    pub(crate) fn update(&self, vehicle: &Vehicle, net: &Network, dt: f64) -> Decision {
        let max_speed = self.max_speed(vehicle, net.lanes);
        let target = &net.lanes[self.target_lane()];
        let tangent = target.path().tangent(vehicle.position());
        let speed = vehicle.speed_along(tangent);

        let (tangential, next) = match *self {
            Self::KeepLane { lane } => {
                let acc = car_following(vehicle, lane, max_speed, net);
                let next = if target.progress(vehicle) >= target.length() {
                    net.next_lane(lane).map(Self::keep_lane)
                } else {
                    let best = optimal_lane(vehicle, lane, net);
                    (best != lane).then(|| Self::ChangeLane {
                        from: lane,
                        to: best,
                    })
                };
                (acc, next)
            }
            Self::ChangeLane { from, to } => {
                let acc = f64::min(
                    leaving(vehicle, from, max_speed, net),
                    car_following(vehicle, to, max_speed, net),
                );
                let path = target.path();
                let done = path.signed_distance(vehicle.position()).abs() <= path.radius()
                    || target.progress(vehicle) >= target.length();
                (acc, done.then(|| Self::keep_lane(to)))
            }
        };

        // Braking never reverses the vehicle
        let tangential = if dt > 0.0 {
            f64::max(tangential, -speed / dt)
        } else {
            tangential
        };

        let (normal, steering) = steer(vehicle, target.path(), dt);

        Decision {
            acceleration: tangent * tangential + rot90(tangent) * normal,
            #[cfg(test)]
            tangential,
            steering,
            next,
        }
    }
}

/// The car following acceleration of a vehicle on one of the lanes it occupies.
fn car_following(vehicle: &Vehicle, lane_id: LaneId, max_speed: f64, net: &Network) -> f64 {
    let lane = &net.lanes[lane_id];
    let leader = lane.leader_info(vehicle.id()).unwrap_or_else(|| {
        let front = lane
            .vehicle_neighbours(vehicle)
            .front
            .map(|id| &net.vehicles[id]);
        net.leader_info(lane_id, vehicle, front)
    });
    let speed = vehicle.speed_along(lane.path().tangent(vehicle.position()));
    vehicle.acc().idm(speed, max_speed, leader, net.config)
}

/// The car following acceleration behind the vehicles ahead on a lane being left.
///
/// The end of that lane does not hold the vehicle back, since it is moving off it.
fn leaving(vehicle: &Vehicle, lane_id: LaneId, max_speed: f64, net: &Network) -> f64 {
    let lane = &net.lanes[lane_id];
    let Some(front) = lane.vehicle_neighbours(vehicle).front else {
        return f64::INFINITY;
    };
    let leader = net.leader_info(lane_id, vehicle, Some(&net.vehicles[front]));
    let speed = vehicle.speed_along(lane.path().tangent(vehicle.position()));
    vehicle.acc().idm(speed, max_speed, leader, net.config)
}

/// Computes the lateral acceleration that steers the vehicle onto the midline of `path`.
fn steer(vehicle: &Vehicle, path: &Path, dt: f64) -> (f64, PidController) {
    let mut pid = vehicle.steering();
    if vehicle.speed() == 0.0 {
        return (0.0, pid);
    }
    pid.update_error(-path.signed_distance(vehicle.position()), dt);
    let limit = vehicle.max_lateral_acc();
    (pid.output().clamp(-limit, limit), pid)
}
