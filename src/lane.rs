//! Lanes, the vehicles registered on them, and queries over the lane graph.

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::intersection::{FlowState, Turn};
use crate::math::Path;
use crate::vehicle::Vehicle;
use crate::{IntersectionId, IntersectionSet, LaneId, LaneSet, RoadId, VehicleId, VehicleSet};
use once_cell::unsync::OnceCell;
use smallvec::SmallVec;

/// A single lane of traffic.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane ID.
    id: LaneId,
    /// The midline of the lane.
    path: Path,
    /// Speed limit in m/s.
    speed_limit: f64,
    /// An incentive added when a vehicle considers changing into this lane, in m/s<sup>2</sup>.
    acc_bias: f64,
    /// Lanes a vehicle may change into. Fixed once the topology is built.
    neighbours: OnceCell<SmallVec<[LaneId; 2]>>,
    /// Where a vehicle goes after reaching the end of the lane.
    next: NextLane,
    /// What the lane belongs to.
    owner: LaneOwner,
    /// The vehicles on the lane, sorted by increasing progress.
    vehicles: Vec<LaneEntry>,
}

/// The attributes of a lane.
pub struct LaneAttributes {
    pub path: Path,
    pub speed_limit: f64,
    pub acc_bias: f64,
    pub next: NextLane,
    pub owner: LaneOwner,
}

/// How the successor of a lane is found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextLane {
    /// The lane is a dead end.
    None,
    /// The lane always continues onto the same lane.
    Fixed(LaneId),
    /// The lane ends at a signalised intersection, which decides where it leads.
    Intersection(IntersectionId),
}

/// The entity that owns a lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneOwner {
    /// A lane of a road, numbered outwards from the road's centre line.
    Road {
        road: RoadId,
        forward: bool,
        index: usize,
    },
    /// A connector lane inside an intersection.
    Connector {
        intersection: IntersectionId,
        flow: FlowState,
        turn: Turn,
    },
}

/// The gap to whatever is ahead of a vehicle, and how quickly it is closing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeaderInfo {
    /// The bumper-to-bumper distance in m.
    pub distance: f64,
    /// The rate at which the distance is shrinking in m/s.
    pub closing_rate: f64,
}

/// The vehicles immediately behind and ahead of a position on a lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VehicleNeighbours {
    pub back: Option<VehicleId>,
    pub front: Option<VehicleId>,
}

#[derive(Clone, Copy, Debug)]
struct LaneEntry {
    vehicle: VehicleId,
    progress: f64,
    leader: Option<LeaderInfo>,
}

impl Lane {
    /// Creates a new lane.
    pub(crate) fn new(id: LaneId, attribs: LaneAttributes) -> Self {
        Self {
            id,
            path: attribs.path,
            speed_limit: attribs.speed_limit,
            acc_bias: attribs.acc_bias,
            neighbours: OnceCell::new(),
            next: attribs.next,
            owner: attribs.owner,
            vehicles: vec![],
        }
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    /// The lane's midline.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The length of the lane in m.
    pub fn length(&self) -> f64 {
        self.path.length()
    }

    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    pub fn acc_bias(&self) -> f64 {
        self.acc_bias
    }

    pub fn owner(&self) -> LaneOwner {
        self.owner
    }

    pub fn next(&self) -> NextLane {
        self.next
    }

    /// The lanes a vehicle may change into from this one.
    pub fn neighbours(&self) -> &[LaneId] {
        self.neighbours.get().map(|n| n.as_slice()).unwrap_or(&[])
    }

    /// Sets the lanes adjacent to this one. This may only be done once.
    pub(crate) fn set_neighbours(&self, neighbours: &[LaneId]) -> Result<()> {
        self.neighbours
            .set(neighbours.iter().copied().collect())
            .map_err(|_| SimError::NeighboursAlreadySet(self.id))
    }

    /// Replaces the lane's geometry after a topology change.
    pub(crate) fn set_path(&mut self, path: Path) {
        self.path = path;
    }

    /// The IDs of the vehicles on the lane, from the start of the lane to its end.
    pub fn vehicles(&self) -> impl DoubleEndedIterator<Item = VehicleId> + '_ {
        self.vehicles.iter().map(|e| e.vehicle)
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn contains(&self, vehicle: VehicleId) -> bool {
        self.vehicles.iter().any(|e| e.vehicle == vehicle)
    }

    /// The distance of the vehicle's centre along the lane, in m.
    pub fn progress(&self, vehicle: &Vehicle) -> f64 {
        self.path.progress(vehicle.position())
    }

    /// Inserts the vehicle with the given ID into the lane.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId) {
        if self.contains(id) {
            return;
        }
        self.vehicles.push(LaneEntry {
            vehicle: id,
            progress: 0.0,
            leader: None,
        });
        self.sort_vehicles(vehicles);
    }

    /// Removes the vehicle with the given ID from the lane.
    pub(crate) fn remove_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId) {
        self.vehicles.retain(|e| e.vehicle != id);
        self.sort_vehicles(vehicles);
    }

    /// Recomputes the progress of every vehicle and restores the lane's ordering.
    pub(crate) fn sort_vehicles(&mut self, vehicles: &VehicleSet) {
        for entry in &mut self.vehicles {
            if let Some(vehicle) = vehicles.get(entry.vehicle) {
                entry.progress = self.path.progress(vehicle.position());
            }
        }
        self.vehicles.sort_by(|a, b| a.progress.total_cmp(&b.progress));
        debug_assert!(self.is_sorted());
    }

    /// Whether the vehicles are ordered by non-decreasing progress.
    pub fn is_sorted(&self) -> bool {
        self.vehicles
            .windows(2)
            .all(|w| w[0].progress <= w[1].progress)
    }

    /// The leader information computed for the vehicle during the current step.
    pub fn leader_info(&self, vehicle: VehicleId) -> Option<LeaderInfo> {
        self.vehicles
            .iter()
            .find(|e| e.vehicle == vehicle)
            .and_then(|e| e.leader)
    }

    /// Stores leader information, which must be in the same order as the vehicles.
    fn set_leader_infos(&mut self, infos: Vec<LeaderInfo>) {
        for (entry, info) in self.vehicles.iter_mut().zip(infos) {
            entry.leader = Some(info);
        }
    }

    /// Finds the vehicles immediately behind and ahead of `vehicle` on this lane.
    ///
    /// The vehicle itself is ignored if it is registered on the lane. Another vehicle
    /// at exactly the same progress is reported as both the back and front neighbour.
    pub fn vehicle_neighbours(&self, vehicle: &Vehicle) -> VehicleNeighbours {
        let id = vehicle.id();
        let pos = self.progress(vehicle);
        let lo = self.vehicles.partition_point(|e| e.progress < pos);
        let hi = self.vehicles.partition_point(|e| e.progress <= pos);

        if let Some(same) = self.vehicles[lo..hi].iter().find(|e| e.vehicle != id) {
            return VehicleNeighbours {
                back: Some(same.vehicle),
                front: Some(same.vehicle),
            };
        }

        VehicleNeighbours {
            back: self.vehicles[..lo]
                .iter()
                .rev()
                .find(|e| e.vehicle != id)
                .map(|e| e.vehicle),
            front: self.vehicles[hi..]
                .iter()
                .find(|e| e.vehicle != id)
                .map(|e| e.vehicle),
        }
    }

    /// The distance from the start of the lane to the rear bumper of the first vehicle,
    /// or `None` if the lane is empty.
    pub fn first_rear(&self, vehicles: &VehicleSet) -> Option<f64> {
        self.vehicles
            .first()
            .map(|e| e.progress - vehicles[e.vehicle].half_length())
    }

    /// The free space at the start of the lane.
    pub fn free_space(&self, vehicles: &VehicleSet) -> f64 {
        self.first_rear(vehicles).unwrap_or(self.length())
    }
}

/// A read-only view of the simulated network, used to answer queries
/// that follow the lane graph.
#[derive(Clone, Copy)]
pub(crate) struct Network<'a> {
    pub lanes: &'a LaneSet,
    pub vehicles: &'a VehicleSet,
    pub intersections: &'a IntersectionSet,
    pub config: &'a SimConfig,
}

impl<'a> Network<'a> {
    /// Resolves the lane a vehicle at the end of `lane_id` would continue onto.
    ///
    /// At an intersection this is the permitted connector with the most free space;
    /// there is none while the signal blocks the lane.
    pub fn next_lane(&self, lane_id: LaneId) -> Option<LaneId> {
        match self.lanes.get(lane_id)?.next {
            NextLane::None => None,
            NextLane::Fixed(id) => Some(id),
            NextLane::Intersection(int_id) => {
                let connectors = self
                    .intersections
                    .get(int_id)?
                    .permitted_connectors(lane_id);
                let mut best: Option<(LaneId, f64)> = None;
                for &id in connectors {
                    let space = self.free_space_ahead(id, self.config.lookahead_distance);
                    if best.map_or(true, |(_, best_space)| space > best_space) {
                        best = Some((id, space));
                    }
                }
                best.map(|(id, _)| id)
            }
        }
    }

    /// Whether a vehicle on the lane can ever continue past its end. A lane ending at
    /// an intersection without a connector for it is as much a dead end as one with
    /// no successor.
    pub fn has_route(&self, lane_id: LaneId) -> bool {
        match self.lanes.get(lane_id).map(|lane| lane.next) {
            Some(NextLane::Fixed(_)) => true,
            Some(NextLane::Intersection(id)) => self
                .intersections
                .get(id)
                .map_or(false, |int| int.has_route(lane_id)),
            _ => false,
        }
    }

    /// The free space from the start of the lane to the next obstruction,
    /// following the lane graph for up to `budget` metres.
    pub fn free_space_ahead(&self, lane_id: LaneId, budget: f64) -> f64 {
        let lane = &self.lanes[lane_id];
        if let Some(rear) = lane.first_rear(self.vehicles) {
            return rear;
        }
        let length = lane.length();
        if length >= budget {
            return length;
        }
        match self.next_lane(lane_id) {
            Some(next) => length + self.free_space_ahead(next, budget - length),
            None => length + self.config.min_bumper_gap,
        }
    }

    /// The leader information for a vehicle with nothing ahead of it on the lane.
    ///
    /// The gap extends to the end of the lane and into whatever follows it, and is
    /// treated as immovable.
    pub fn lane_end_info(&self, lane_id: LaneId, vehicle: &Vehicle) -> LeaderInfo {
        let lane = &self.lanes[lane_id];
        let remaining = lane.length() - (lane.progress(vehicle) + vehicle.half_length());
        let beyond = if remaining >= self.config.lookahead_distance {
            0.0
        } else {
            match self.next_lane(lane_id) {
                Some(next) => {
                    self.free_space_ahead(next, self.config.lookahead_distance - remaining)
                }
                None => self.config.min_bumper_gap,
            }
        };
        LeaderInfo {
            distance: remaining + beyond,
            closing_rate: vehicle.speed(),
        }
    }

    /// The leader information for `follower` travelling along `lane_id` behind `leader`,
    /// or behind the end of the lane if there is no leader.
    pub fn leader_info(
        &self,
        lane_id: LaneId,
        follower: &Vehicle,
        leader: Option<&Vehicle>,
    ) -> LeaderInfo {
        match leader {
            Some(leader) => {
                let axis = self.lanes[lane_id].path().tangent(follower.position());
                LeaderInfo {
                    distance: follower.bumper_gap(leader, axis),
                    closing_rate: follower.speed() - leader.speed(),
                }
            }
            None => self.lane_end_info(lane_id, follower),
        }
    }

    /// The car following acceleration of `follower` on `lane_id` behind `leader`.
    pub fn acceleration(
        &self,
        lane_id: LaneId,
        follower: &Vehicle,
        leader: Option<&Vehicle>,
    ) -> f64 {
        let lane = &self.lanes[lane_id];
        let info = self.leader_info(lane_id, follower, leader);
        let speed = follower.speed_along(lane.path().tangent(follower.position()));
        follower
            .acc()
            .idm(speed, follower.max_speed_on(lane), info, self.config)
    }

    /// Computes the leader information of every vehicle on the lane, in lane order.
    fn leader_infos(&self, lane_id: LaneId) -> Vec<LeaderInfo> {
        let lane = &self.lanes[lane_id];
        let ids = lane.vehicles().collect::<SmallVec<[_; 16]>>();
        ids.iter()
            .enumerate()
            .map(|(idx, id)| {
                let leader = ids.get(idx + 1).map(|id| &self.vehicles[*id]);
                self.leader_info(lane_id, &self.vehicles[*id], leader)
            })
            .collect()
    }
}

/// Restores the ordering of a lane and refreshes the leader information of its vehicles.
pub(crate) fn update_lane(
    lane_id: LaneId,
    lanes: &mut LaneSet,
    vehicles: &VehicleSet,
    intersections: &IntersectionSet,
    config: &SimConfig,
) {
    lanes[lane_id].sort_vehicles(vehicles);
    let infos = Network {
        lanes,
        vehicles,
        intersections,
        config,
    }
    .leader_infos(lane_id);
    lanes[lane_id].set_leader_infos(infos);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::math::Point2d;
    use crate::vehicle::{DrivingState, VehicleParams};

    /// A 200 m dead end road lane running along the x axis at height `y`.
    pub fn straight_lane(id: LaneId, y: f64) -> Lane {
        straight_lane_to(id, y, NextLane::None)
    }

    /// A 200 m road lane running along the x axis at height `y`, continuing onto `next`.
    pub fn straight_lane_to(id: LaneId, y: f64, next: NextLane) -> Lane {
        Lane::new(
            id,
            LaneAttributes {
                path: Path::straight(Point2d::new(0.0, y), Point2d::new(200.0, y), 1.75).unwrap(),
                speed_limit: 15.0,
                acc_bias: 0.0,
                next,
                owner: LaneOwner::Road {
                    road: RoadId::default(),
                    forward: true,
                    index: 0,
                },
            },
        )
    }

    /// Creates a stationary vehicle facing along the x axis, without registering it on a lane.
    pub fn spawn(vehicles: &mut VehicleSet, lane: LaneId, position: Point2d) -> VehicleId {
        let config = SimConfig::default();
        vehicles.insert_with_key(|id| {
            Vehicle::new(
                id,
                &VehicleParams::default(),
                position,
                0.0,
                DrivingState::keep_lane(lane),
                &config,
            )
            .unwrap()
        })
    }
}
