//! Signalised four-way intersections and the connector lanes through them.

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::lane::{Lane, LaneAttributes, LaneOwner, NextLane};
use crate::light::{SignalState, TrafficLightFsm};
use crate::math::{signed_angle, CubicBezier2d, Path, Point2d, Vector2d};
use crate::road::{Orientation, Road};
use crate::util::Rect;
use crate::{IntersectionId, LaneId, LaneSet, RoadId, RoadSet};
use arrayvec::ArrayVec;
use cgmath::prelude::*;
use itertools::iproduct;
use log::debug;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::f64::consts::FRAC_PI_4;

/// A side of an intersection, where a road may be attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    /// Gets the side with the given index, counting clockwise from north.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(SimError::InvalidSide(index))
    }

    pub fn index(self) -> usize {
        self as usize
    }

    fn is_north_south(self) -> bool {
        matches!(self, Self::North | Self::South)
    }
}

/// The direction of a movement through an intersection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Turn {
    Front,
    Left,
    Right,
}

impl Turn {
    /// Classifies a movement by the angle between its arrival and departure directions.
    pub fn classify(arrival: Vector2d, departure: Vector2d) -> Self {
        let angle = signed_angle(arrival, departure);
        if angle.abs() < FRAC_PI_4 {
            Self::Front
        } else if angle > 0.0 {
            Self::Left
        } else {
            Self::Right
        }
    }
}

/// One of the four groups of movements that are given right of way together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowState {
    /// Through and right turning traffic arriving from the north or south.
    NsThrough,
    /// Left turning traffic arriving from the north or south.
    NsLeft,
    /// Through and right turning traffic arriving from the east or west.
    EwThrough,
    /// Left turning traffic arriving from the east or west.
    EwLeft,
}

impl FlowState {
    pub const ALL: [FlowState; 4] = [
        FlowState::NsThrough,
        FlowState::NsLeft,
        FlowState::EwThrough,
        FlowState::EwLeft,
    ];

    /// The flow for a movement arriving through `side`.
    pub fn of(side: Side, turn: Turn) -> Self {
        match (side.is_north_south(), turn) {
            (true, Turn::Left) => Self::NsLeft,
            (true, _) => Self::NsThrough,
            (false, Turn::Left) => Self::EwLeft,
            (false, _) => Self::EwThrough,
        }
    }

    /// The flow that is given right of way after this one.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % 4]
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A signalised intersection of up to four roads.
#[derive(Clone, Debug)]
pub struct Intersection {
    id: IntersectionId,
    /// The centre of the intersection.
    origin: Point2d,
    /// The attached roads and the sides they attach to.
    roads: ArrayVec<(Side, RoadId), 4>,
    /// Half the size of the footprint along each axis, in m.
    half_size: Vector2d,
    /// The flow that currently has right of way.
    active: FlowState,
    /// The signal of each flow.
    signals: [TrafficLightFsm; 4],
    /// The connectors each incoming lane may enter, per flow.
    routes: [HashMap<LaneId, SmallVec<[LaneId; 2]>>; 4],
}

impl Intersection {
    /// Creates an intersection with no roads attached.
    pub(crate) fn new(id: IntersectionId, origin: Point2d, config: &SimConfig) -> Self {
        let signal =
            |flow: FlowState| TrafficLightFsm::new(config.green_duration, flow.next(), vec![]);
        Self {
            id,
            origin,
            roads: ArrayVec::new(),
            half_size: Vector2d::new(config.lane_width, config.lane_width),
            active: FlowState::NsThrough,
            signals: FlowState::ALL.map(signal),
            routes: Default::default(),
        }
    }

    pub fn id(&self) -> IntersectionId {
        self.id
    }

    pub fn origin(&self) -> Point2d {
        self.origin
    }

    /// The attached roads and the sides they attach to.
    pub fn roads(&self) -> &[(Side, RoadId)] {
        &self.roads
    }

    /// The road attached to the given side, if any.
    pub fn road_at(&self, side: Side) -> Option<RoadId> {
        self.roads
            .iter()
            .find(|(s, _)| *s == side)
            .map(|(_, road)| *road)
    }

    /// Half the size of the footprint along each axis, in m.
    pub fn half_size(&self) -> Vector2d {
        self.half_size
    }

    /// How far the footprint extends from the origin along a road's axis, in m.
    pub fn extent(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.half_size.x,
            Orientation::Vertical => self.half_size.y,
        }
    }

    /// The rectangle covered by the intersection.
    pub fn bounds(&self) -> Rect {
        Rect::centred(self.origin, self.half_size.x, self.half_size.y)
    }

    /// The flow that currently has right of way.
    pub fn active_flow(&self) -> FlowState {
        self.active
    }

    /// The signal controlling a flow.
    pub fn signal(&self, flow: FlowState) -> &TrafficLightFsm {
        &self.signals[flow.index()]
    }

    /// The signal state shown to a flow; flows that are not active are held.
    pub fn signal_state(&self, flow: FlowState) -> SignalState {
        if flow == self.active {
            self.signal(flow).state()
        } else {
            SignalState::WaitForEmpty
        }
    }

    /// Iterates over every connector lane in the intersection.
    pub fn connectors(&self) -> impl Iterator<Item = LaneId> + '_ {
        self.signals.iter().flat_map(|s| s.lanes().iter().copied())
    }

    /// The connector lanes a vehicle at the end of `lane` may currently enter.
    ///
    /// This is empty unless the lane's movement has a green signal.
    pub fn permitted_connectors(&self, lane: LaneId) -> &[LaneId] {
        let idx = self.active.index();
        if !self.signals[idx].permits_entry() {
            return &[];
        }
        self.routes[idx]
            .get(&lane)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the lane has a connector in any flow, so that traffic on it
    /// will eventually be let through.
    pub fn has_route(&self, lane: LaneId) -> bool {
        self.routes.iter().any(|routes| routes.contains_key(&lane))
    }

    /// Checks that a road may be attached to the given side.
    pub(crate) fn check_attach(&self, side: Side, config: &SimConfig) -> Result<()> {
        if self.roads.len() >= config.max_roads_per_intersection {
            return Err(SimError::IntersectionFull(
                self.id,
                config.max_roads_per_intersection,
            ));
        }
        if self.road_at(side).is_some() {
            return Err(SimError::SideOccupied(self.id, side));
        }
        Ok(())
    }

    pub(crate) fn attach(&mut self, side: Side, road: RoadId, config: &SimConfig) -> Result<()> {
        self.check_attach(side, config)?;
        self.roads.push((side, road));
        Ok(())
    }

    pub(crate) fn detach(&mut self, road: RoadId) {
        self.roads.retain(|(_, r)| *r != road);
    }

    /// The half size of the footprint, given the half widths of the roads on each side.
    ///
    /// Roads to the north and south set the width, and roads to the east and west the
    /// height. The footprint is never smaller than one lane in either direction.
    pub(crate) fn footprint(
        roads: impl IntoIterator<Item = (Side, f64)>,
        lane_width: f64,
    ) -> Vector2d {
        roads
            .into_iter()
            .fold(Vector2d::new(lane_width, lane_width), |size, (side, half_width)| {
                if side.is_north_south() {
                    Vector2d::new(f64::max(size.x, half_width), size.y)
                } else {
                    Vector2d::new(size.x, f64::max(size.y, half_width))
                }
            })
    }

    /// The half widths of the attached roads, by side.
    pub(crate) fn road_widths<'a>(
        &'a self,
        roads: &'a RoadSet,
    ) -> impl Iterator<Item = (Side, f64)> + 'a {
        self.roads
            .iter()
            .filter_map(|(side, id)| roads.get(*id).map(|r| (*side, r.half_width())))
    }

    pub(crate) fn set_footprint(&mut self, half_size: Vector2d) {
        self.half_size = half_size;
    }

    /// Removes every connector lane from the intersection, returning their IDs.
    pub(crate) fn take_connectors(&mut self) -> Vec<LaneId> {
        let lanes = self.connectors().collect();
        self.routes = Default::default();
        lanes
    }

    /// Creates the connector lanes joining every incoming lane to the outgoing
    /// lanes of the other roads, and resets the signals to control them.
    pub(crate) fn build_connectors(
        &mut self,
        roads: &RoadSet,
        lanes: &mut LaneSet,
        config: &SimConfig,
    ) -> Result<()> {
        let mut flow_lanes: [Vec<LaneId>; 4] = Default::default();

        for (&(side_in, road_in), &(_, road_out)) in iproduct!(&self.roads, &self.roads) {
            if road_in == road_out {
                continue;
            }
            let (Some(road_in), Some(road_out)) = (roads.get(road_in), roads.get(road_out)) else {
                continue;
            };
            let incoming = road_in.lanes_into(self.id);
            let outgoing = road_out.lanes_from(self.id);
            let (Some(&first_in), Some(&first_out)) = (incoming.first(), outgoing.first()) else {
                continue;
            };

            let arrival = lanes[first_in].path().tangent_at_distance(lanes[first_in].length());
            let departure = lanes[first_out].path().tangent_at_distance(0.0);
            let turn = Turn::classify(arrival, departure);
            let flow = FlowState::of(side_in, turn);

            for (from, to) in movement_pairs(incoming, outgoing, turn) {
                let connector = self.connect(from, to, flow, turn, road_out, lanes, config)?;
                self.routes[flow.index()]
                    .entry(from)
                    .or_default()
                    .push(connector);
                flow_lanes[flow.index()].push(connector);
            }
        }

        for (flow, lanes) in FlowState::ALL.into_iter().zip(flow_lanes) {
            self.signals[flow.index()] =
                TrafficLightFsm::new(config.green_duration, flow.next(), lanes);
        }
        self.skip_empty_flows();
        Ok(())
    }

    /// Creates a connector lane from the end of one lane to the start of another.
    #[allow(clippy::too_many_arguments)]
    fn connect(
        &self,
        from: LaneId,
        to: LaneId,
        flow: FlowState,
        turn: Turn,
        road_out: &Road,
        lanes: &mut LaneSet,
        config: &SimConfig,
    ) -> Result<LaneId> {
        let (from, to) = (&lanes[from], &lanes[to]);
        let start = from.path().end();
        let end = to.path().start();
        let handle = 0.5 * start.distance(end);
        let curve = CubicBezier2d::new(&[
            start,
            start + from.path().tangent_at_distance(from.length()) * handle,
            end - to.path().tangent_at_distance(0.0) * handle,
            end,
        ]);
        let path = Path::from_curve(&curve, config.connector_segments, 0.5 * config.lane_width)?;
        let attribs = LaneAttributes {
            path,
            speed_limit: f64::min(road_out.speed_limit(), config.connector_speed_limit),
            acc_bias: 0.0,
            next: NextLane::Fixed(to.id()),
            owner: LaneOwner::Connector {
                intersection: self.id,
                flow,
                turn,
            },
        };
        Ok(lanes.insert_with_key(|id| Lane::new(id, attribs)))
    }

    /// Advances the signal of the active flow, handing over to the next flow
    /// once it has cleared.
    pub(crate) fn update(&mut self, dt: f64, lanes: &LaneSet) {
        if let Some(next) = self.signals[self.active.index()].update(dt, lanes) {
            debug!("intersection {:?}: {:?} -> {:?}", self.id, self.active, next);
            self.active = next;
            self.skip_empty_flows();
        }
    }

    /// Moves past flows with no connector lanes, which have nothing to wait for.
    fn skip_empty_flows(&mut self) {
        for _ in 0..FlowState::ALL.len() {
            if !self.signals[self.active.index()].lanes().is_empty() {
                break;
            }
            self.active = self.active.next();
        }
    }
}

/// The incoming and outgoing lanes joined by connectors for a movement.
///
/// Right turns join the outermost lanes and left turns the innermost. Through
/// movements join lanes pairwise, with any excess lanes on either side sharing
/// the outermost lane of the other.
fn movement_pairs(incoming: &[LaneId], outgoing: &[LaneId], turn: Turn) -> Vec<(LaneId, LaneId)> {
    let (n_in, n_out) = (incoming.len(), outgoing.len());
    if n_in == 0 || n_out == 0 {
        return vec![];
    }
    match turn {
        Turn::Right => vec![(incoming[n_in - 1], outgoing[n_out - 1])],
        Turn::Left => vec![(incoming[0], outgoing[0])],
        Turn::Front => (0..usize::max(n_in, n_out))
            .map(|i| (incoming[i.min(n_in - 1)], outgoing[i.min(n_out - 1)]))
            .collect(),
    }
}
