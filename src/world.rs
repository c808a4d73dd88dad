use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::intersection::{Intersection, Side};
use crate::lane::{update_lane, Lane, Network};
use crate::math::{check_unit, Point2d, Vector2d};
use crate::road::{Orientation, Road, RoadAttributes};
use crate::vehicle::{DrivingState, Vehicle, VehicleParams};
use crate::{
    IntersectionId, IntersectionSet, LaneId, LaneSet, RoadId, RoadSet, VehicleId, VehicleSet,
};
use cgmath::prelude::*;
use itertools::Itertools;
use log::{debug, info, trace, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// A traffic simulation of roads joined by signalised intersections.
pub struct World {
    config: SimConfig,
    intersections: IntersectionSet,
    roads: RoadSet,
    /// Every lane, both those of roads and the connectors inside intersections.
    lanes: LaneSet,
    vehicles: VehicleSet,
    /// The number of steps simulated.
    frame: usize,
    /// The simulated time in s.
    time: f64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl World {
    /// Creates an empty simulation.
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            intersections: IntersectionSet::with_key(),
            roads: RoadSet::with_key(),
            lanes: LaneSet::with_key(),
            vehicles: VehicleSet::with_key(),
            frame: 0,
            time: 0.0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Adds an intersection centred on `origin`.
    pub fn add_intersection(&mut self, origin: Point2d) -> IntersectionId {
        self.intersections
            .insert_with_key(|id| Intersection::new(id, origin, &self.config))
    }

    /// Adds a road between two intersections.
    ///
    /// The road must run east or north from its source along its orientation, and
    /// there must be room for it on both intersections. The geometry of every
    /// road and connector affected by the change is recomputed.
    pub fn add_road(&mut self, attribs: &RoadAttributes) -> Result<RoadId> {
        if attribs.forward_lanes + attribs.backward_lanes == 0 {
            return Err(SimError::NoLanes);
        }
        let source = self
            .intersections
            .get(attribs.source)
            .ok_or(SimError::UnknownIntersection(attribs.source))?;
        let target = self
            .intersections
            .get(attribs.target)
            .ok_or(SimError::UnknownIntersection(attribs.target))?;
        attribs.orientation.check(source.origin(), target.origin())?;

        let (source_side, target_side) = attribs.orientation.sides();
        source.check_attach(source_side, &self.config)?;
        target.check_attach(target_side, &self.config)?;

        let half_width = Road::half_width_of(
            attribs.forward_lanes,
            attribs.backward_lanes,
            self.config.lane_width,
        );
        let footprints = [
            (attribs.source, self.footprint_with(source, (source_side, half_width))),
            (attribs.target, self.footprint_with(target, (target_side, half_width))),
        ];
        self.check_clearance(
            &footprints,
            (attribs.source, attribs.target, attribs.orientation),
        )?;

        for (id, size) in footprints {
            self.intersections[id].set_footprint(size);
        }
        let road_id = self.roads.try_insert_with_key(|id| {
            Road::new(id, attribs, &mut self.lanes, &self.intersections, &self.config)
        })?;
        self.intersections[attribs.source].attach(source_side, road_id, &self.config)?;
        self.intersections[attribs.target].attach(target_side, road_id, &self.config)?;
        info!(
            "added road {:?} from {:?} to {:?} ({} + {} lanes)",
            road_id,
            attribs.source,
            attribs.target,
            attribs.forward_lanes,
            attribs.backward_lanes
        );

        self.refresh_topology(&[attribs.source, attribs.target])?;
        Ok(road_id)
    }

    /// Removes a road and its lanes, along with any vehicles on them.
    pub fn remove_road(&mut self, road_id: RoadId) -> Result<()> {
        let road = self
            .roads
            .remove(road_id)
            .ok_or(SimError::UnknownRoad(road_id))?;
        info!("removed road {:?}", road_id);
        for lane_id in road.lanes() {
            if let Some(lane) = self.lanes.remove(lane_id) {
                self.evict(&lane);
            }
        }
        for id in [road.source(), road.target()] {
            if let Some(intersection) = self.intersections.get_mut(id) {
                intersection.detach(road_id);
            }
        }
        self.refresh_topology(&[road.source(), road.target()])
    }

    /// Adds a vehicle to a lane, if there is room for it.
    ///
    /// The vehicle is placed with its centre at `offset`, a fraction of the lane's length,
    /// or with its rear bumper at the start of the lane if no offset is given. Returns
    /// `Ok(None)` if it would come within the minimum bumper gap of another vehicle.
    pub fn add_vehicle(
        &mut self,
        params: &VehicleParams,
        lane_id: LaneId,
        offset: Option<f64>,
    ) -> Result<Option<VehicleId>> {
        params.validate(&self.config)?;
        let lane = self
            .lanes
            .get(lane_id)
            .ok_or(SimError::UnknownLane(lane_id))?;
        let centre = match offset {
            Some(t) => check_unit("offset", t)? * lane.length(),
            None => 0.5 * params.length,
        };

        if !self.has_room(lane, centre, 0.5 * params.length) {
            debug!("no room for a vehicle on lane {:?}", lane_id);
            return Ok(None);
        }

        let path = lane.path();
        let position = path.point_at_distance(centre);
        let tangent = path.tangent_at_distance(centre);
        let state = DrivingState::keep_lane(lane_id);
        let vehicle_id = self.vehicles.try_insert_with_key(|id| {
            Vehicle::new(
                id,
                params,
                position,
                tangent.y.atan2(tangent.x),
                state,
                &self.config,
            )
        })?;
        state.on_enter(vehicle_id, &mut self.lanes, &self.vehicles);
        Ok(Some(vehicle_id))
    }

    /// Removes a vehicle from the simulation, unregistering it from its lanes.
    pub fn remove_vehicle(&mut self, vehicle_id: VehicleId) -> Option<Vehicle> {
        let state = self.vehicles.get(vehicle_id)?.state();
        state.on_exit(vehicle_id, &mut self.lanes, &self.vehicles);
        self.vehicles.remove(vehicle_id)
    }

    /// Tries to add a vehicle to each road lane in a random order, stopping at the
    /// first with room for it.
    pub fn try_spawn(
        &mut self,
        params: &VehicleParams,
        rng: &mut impl Rng,
    ) -> Result<Option<VehicleId>> {
        let mut candidates = self
            .roads
            .values()
            .flat_map(|road| road.lanes())
            .collect::<Vec<_>>();
        candidates.shuffle(rng);
        for lane_id in candidates {
            if let Some(id) = self.add_vehicle(params, lane_id, None)? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Randomly assigns a desired velocity adjustment factor to each vehicle,
    /// which is sampled from a normal distribution with a mean of 1 (no adjustment)
    /// and standard deviation of `stddev`.
    pub fn randomise_velocity_adjusts(&mut self, stddev: f64, rng: &mut impl Rng) -> Result<()> {
        let distr = Normal::new(1.0, stddev)
            .map_err(|err| SimError::InvalidConfig(format!("velocity adjustment: {err}")))?;
        for vehicle in self.vehicles.values_mut() {
            vehicle.set_velocity_adjust(distr.sample(rng).clamp(0.75, 1.25));
        }
        Ok(())
    }

    /// Advances the simulation by `dt` seconds. Does nothing unless `dt` is positive.
    pub fn update(&mut self, dt: f64) {
        if !(dt > 0.0) {
            return;
        }
        trace!("frame {} at t = {:.2}s", self.frame, self.time);
        self.update_signals(dt);
        self.update_lanes();
        self.update_vehicles(dt);
        self.integrate(dt);
        self.frame += 1;
        self.time += dt;
    }

    /// The number of steps simulated so far.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The simulated time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.intersections.get(id)
    }

    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(id)
    }

    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(id)
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Sets the desired velocity adjustment factor of a vehicle.
    pub fn set_velocity_adjust(&mut self, id: VehicleId, factor: f64) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.set_velocity_adjust(factor);
        }
    }

    /// Returns an iterator over all the intersections in the simulation.
    pub fn iter_intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.values()
    }

    /// Returns an iterator over all the roads in the simulation.
    pub fn iter_roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    /// Returns an iterator over all the lanes in the simulation, including connectors.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Runs the signal of every intersection.
    fn update_signals(&mut self, dt: f64) {
        for intersection in self.intersections.values_mut() {
            intersection.update(dt, &self.lanes);
        }
    }

    /// Sorts every lane and refreshes the leader information of its vehicles,
    /// road lanes first and then connectors.
    fn update_lanes(&mut self) {
        let road_lanes = self.roads.values().flat_map(|road| road.lanes());
        let connectors = self.intersections.values().flat_map(|int| int.connectors());
        for lane_id in road_lanes.chain(connectors) {
            update_lane(
                lane_id,
                &mut self.lanes,
                &self.vehicles,
                &self.intersections,
                &self.config,
            );
        }
    }

    /// Lets each vehicle in turn decide what to do and carry out any state transition,
    /// so that later vehicles see the lanes as earlier ones left them.
    fn update_vehicles(&mut self, dt: f64) {
        let ids = self.vehicles.keys().collect::<Vec<_>>();
        for id in ids {
            let net = Network {
                lanes: &self.lanes,
                vehicles: &self.vehicles,
                intersections: &self.intersections,
                config: &self.config,
            };
            let vehicle = &self.vehicles[id];
            let decision = vehicle.state().update(vehicle, &net, dt);

            let vehicle = &mut self.vehicles[id];
            vehicle.apply_decision(&decision);
            let Some(next) = decision.next else {
                continue;
            };
            let prev = vehicle.state();
            vehicle.set_state(next);
            debug!("vehicle {:?}: {:?} -> {:?}", id, prev, next);
            prev.on_exit(id, &mut self.lanes, &self.vehicles);
            next.on_enter(id, &mut self.lanes, &self.vehicles);

            // Followers on the affected lanes must see the change this step
            for lane_id in prev.lanes().into_iter().chain(next.lanes()) {
                if self.lanes.contains_key(lane_id) {
                    update_lane(
                        lane_id,
                        &mut self.lanes,
                        &self.vehicles,
                        &self.intersections,
                        &self.config,
                    );
                }
            }
        }
    }

    /// Integrates the positions and velocities of every vehicle.
    fn integrate(&mut self, dt: f64) {
        for vehicle in self.vehicles.values_mut() {
            vehicle.integrate(dt);
        }
    }

    /// Whether a vehicle of the given half length fits on the lane with its centre at `centre`.
    fn has_room(&self, lane: &Lane, centre: f64, half_length: f64) -> bool {
        let gap = self.config.min_bumper_gap;
        lane.vehicles().all(|id| {
            let other = &self.vehicles[id];
            let pos = lane.progress(other);
            let reach = half_length + other.half_length() + gap;
            (pos - centre).abs() >= reach
        })
    }

    /// The footprint an intersection would have with another road attached.
    fn footprint_with(&self, intersection: &Intersection, extra: (Side, f64)) -> Vector2d {
        Intersection::footprint(
            intersection
                .road_widths(&self.roads)
                .chain(std::iter::once(extra)),
            self.config.lane_width,
        )
    }

    /// Checks that every road touching an intersection whose footprint would change,
    /// and a proposed new road, would still have a positive length.
    fn check_clearance(
        &self,
        footprints: &[(IntersectionId, Vector2d)],
        proposed: (IntersectionId, IntersectionId, Orientation),
    ) -> Result<()> {
        let size = |id: IntersectionId| {
            footprints
                .iter()
                .find(|(changed, _)| *changed == id)
                .map_or_else(|| self.intersections[id].half_size(), |(_, size)| *size)
        };
        let touched = |id: IntersectionId| footprints.iter().any(|(changed, _)| *changed == id);
        let spans = self
            .roads
            .values()
            .filter(|road| touched(road.source()) || touched(road.target()))
            .map(|road| (road.source(), road.target(), road.orientation()))
            .chain(std::iter::once(proposed));

        for (source, target, orientation) in spans {
            let axis = orientation.axis();
            let delta = self.intersections[target].origin() - self.intersections[source].origin();
            let clear = delta.dot(axis) - size(source).dot(axis) - size(target).dot(axis);
            if clear <= 0.0 {
                return Err(SimError::DegenerateRoad);
            }
        }
        Ok(())
    }

    /// Recomputes the footprints of the given intersections, the geometry of the roads
    /// attached to them, and the connectors at both ends of those roads.
    fn refresh_topology(&mut self, changed: &[IntersectionId]) -> Result<()> {
        for &id in changed {
            let Some(intersection) = self.intersections.get(id) else {
                continue;
            };
            let size = Intersection::footprint(
                intersection.road_widths(&self.roads),
                self.config.lane_width,
            );
            self.intersections[id].set_footprint(size);
        }

        let roads = self
            .roads
            .values()
            .filter(|road| changed.contains(&road.source()) || changed.contains(&road.target()))
            .map(|road| road.id())
            .collect::<Vec<_>>();
        for &road_id in &roads {
            self.roads[road_id].update_geometry(&self.intersections, &mut self.lanes)?;
        }

        let intersections = roads
            .iter()
            .flat_map(|id| [self.roads[*id].source(), self.roads[*id].target()])
            .chain(changed.iter().copied())
            .unique()
            .collect::<Vec<_>>();
        for id in intersections {
            self.rebuild_connectors(id)?;
        }
        Ok(())
    }

    /// Replaces the connector lanes of an intersection, evicting any vehicles on them.
    fn rebuild_connectors(&mut self, id: IntersectionId) -> Result<()> {
        let Some(intersection) = self.intersections.get_mut(id) else {
            return Ok(());
        };
        for lane_id in intersection.take_connectors() {
            if let Some(lane) = self.lanes.remove(lane_id) {
                self.evict(&lane);
            }
        }
        self.intersections[id].build_connectors(&self.roads, &mut self.lanes, &self.config)
    }

    /// Removes every vehicle registered on a lane that has been destroyed.
    fn evict(&mut self, lane: &Lane) {
        for vehicle_id in lane.vehicles() {
            warn!(
                "removing vehicle {:?} from destroyed lane {:?}",
                vehicle_id,
                lane.id()
            );
            self.remove_vehicle(vehicle_id);
        }
    }
}
