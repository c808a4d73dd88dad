use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::intersection::Side;
use crate::lane::{Lane, LaneAttributes, LaneOwner, NextLane};
use crate::math::{Path, Point2d, Vector2d};
use crate::util::Rect;
use crate::{IntersectionId, IntersectionSet, LaneId, LaneSet, RoadId};
use cgmath::prelude::*;
use smallvec::SmallVec;

/// The axis a road runs along.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    /// From west to east, along the positive x axis.
    Horizontal,
    /// From south to north, along the positive y axis.
    Vertical,
}

impl Orientation {
    /// A unit vector pointing from a road's source to its target.
    pub fn axis(self) -> Vector2d {
        match self {
            Self::Horizontal => Vector2d::new(1.0, 0.0),
            Self::Vertical => Vector2d::new(0.0, 1.0),
        }
    }

    /// Checks that a road from `source` to `target` runs along this axis.
    pub fn check(self, source: Point2d, target: Point2d) -> Result<()> {
        let delta = target - source;
        let aligned = match self {
            Self::Horizontal => delta.y == 0.0 && delta.x > 0.0,
            Self::Vertical => delta.x == 0.0 && delta.y > 0.0,
        };
        if aligned {
            Ok(())
        } else {
            Err(SimError::MisalignedRoad(self))
        }
    }

    /// The sides of the source and target intersections the road attaches to.
    pub fn sides(self) -> (Side, Side) {
        match self {
            Self::Horizontal => (Side::East, Side::West),
            Self::Vertical => (Side::North, Side::South),
        }
    }
}

/// The attributes of a road.
#[derive(Clone, Copy, Debug)]
pub struct RoadAttributes {
    /// The intersection the road starts at.
    pub source: IntersectionId,
    /// The intersection the road ends at.
    pub target: IntersectionId,
    /// The number of lanes travelling from source to target.
    pub forward_lanes: usize,
    /// The number of lanes travelling from target to source.
    pub backward_lanes: usize,
    pub orientation: Orientation,
    /// The speed limit in m/s.
    pub speed_limit: f64,
}

/// A straight road between two intersections.
///
/// Lanes are numbered outwards from the centre line, so lane 0 in each direction
/// is the innermost. Vehicles drive on the right.
#[derive(Clone, Debug)]
pub struct Road {
    id: RoadId,
    source: IntersectionId,
    target: IntersectionId,
    orientation: Orientation,
    speed_limit: f64,
    /// The width of each lane in m.
    lane_width: f64,
    /// The lanes travelling from source to target, innermost first.
    forward: SmallVec<[LaneId; 4]>,
    /// The lanes travelling from target to source, innermost first.
    backward: SmallVec<[LaneId; 4]>,
    /// Where the road leaves the source intersection's footprint.
    start: Point2d,
    /// Where the road enters the target intersection's footprint.
    end: Point2d,
}

impl Road {
    /// Creates a road and its lanes, which are added to `lanes`.
    ///
    /// The footprints of both intersections must already account for the road's width.
    pub(crate) fn new(
        id: RoadId,
        attribs: &RoadAttributes,
        lanes: &mut LaneSet,
        intersections: &IntersectionSet,
        config: &SimConfig,
    ) -> Result<Self> {
        let mut road = Self {
            id,
            source: attribs.source,
            target: attribs.target,
            orientation: attribs.orientation,
            speed_limit: attribs.speed_limit,
            lane_width: config.lane_width,
            forward: SmallVec::new(),
            backward: SmallVec::new(),
            start: Point2d::origin(),
            end: Point2d::origin(),
        };
        road.update_ends(intersections)?;

        for (forward, count) in [(true, attribs.forward_lanes), (false, attribs.backward_lanes)] {
            let next = NextLane::Intersection(if forward { road.target } else { road.source });
            for index in 0..count {
                let path = road.lane_path(forward, index)?;
                let acc_bias = if count > 1 && index == count - 1 {
                    config.keep_right_bias
                } else {
                    0.0
                };
                let lane_id = lanes.insert_with_key(|lane_id| {
                    Lane::new(
                        lane_id,
                        LaneAttributes {
                            path,
                            speed_limit: road.speed_limit,
                            acc_bias,
                            next,
                            owner: LaneOwner::Road { road: id, forward, index },
                        },
                    )
                });
                if forward {
                    road.forward.push(lane_id);
                } else {
                    road.backward.push(lane_id);
                }
            }
        }

        for group in [&road.forward, &road.backward] {
            for (idx, lane_id) in group.iter().enumerate() {
                let neighbours = [idx.checked_sub(1), Some(idx + 1)]
                    .into_iter()
                    .flatten()
                    .filter_map(|i| group.get(i).copied())
                    .collect::<SmallVec<[LaneId; 2]>>();
                lanes[*lane_id].set_neighbours(&neighbours)?;
            }
        }

        Ok(road)
    }

    pub fn id(&self) -> RoadId {
        self.id
    }

    pub fn source(&self) -> IntersectionId {
        self.source
    }

    pub fn target(&self) -> IntersectionId {
        self.target
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// The speed limit in m/s.
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    /// The lanes travelling from source to target, innermost first.
    pub fn forward_lanes(&self) -> &[LaneId] {
        &self.forward
    }

    /// The lanes travelling from target to source, innermost first.
    pub fn backward_lanes(&self) -> &[LaneId] {
        &self.backward
    }

    /// Iterates over every lane of the road.
    pub fn lanes(&self) -> impl Iterator<Item = LaneId> + '_ {
        self.forward.iter().chain(&self.backward).copied()
    }

    /// The lanes that end at the given intersection, innermost first.
    pub fn lanes_into(&self, intersection: IntersectionId) -> &[LaneId] {
        if intersection == self.target {
            &self.forward
        } else if intersection == self.source {
            &self.backward
        } else {
            &[]
        }
    }

    /// The lanes that start at the given intersection, innermost first.
    pub fn lanes_from(&self, intersection: IntersectionId) -> &[LaneId] {
        if intersection == self.source {
            &self.forward
        } else if intersection == self.target {
            &self.backward
        } else {
            &[]
        }
    }

    /// The length of the road between the intersection footprints, in m.
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// The distance from the centre line to the outer edge of the wider side, in m.
    pub fn half_width(&self) -> f64 {
        Self::half_width_of(self.forward.len(), self.backward.len(), self.lane_width)
    }

    pub(crate) fn half_width_of(forward: usize, backward: usize, lane_width: f64) -> f64 {
        usize::max(forward, backward) as f64 * lane_width
    }

    /// The rectangle covered by the road's lanes.
    pub fn bounds(&self) -> Rect {
        let right = self.right();
        let fwd = right * (self.forward.len() as f64 * self.lane_width);
        let bwd = -right * (self.backward.len() as f64 * self.lane_width);
        Rect::bounding([
            self.start + fwd,
            self.start + bwd,
            self.end + fwd,
            self.end + bwd,
        ])
        .unwrap_or_default()
    }

    /// Recomputes the road's end points and the paths of its lanes after
    /// the footprint of an intersection it connects has changed.
    pub(crate) fn update_geometry(
        &mut self,
        intersections: &IntersectionSet,
        lanes: &mut LaneSet,
    ) -> Result<()> {
        self.update_ends(intersections)?;
        for (forward, group) in [(true, &self.forward), (false, &self.backward)] {
            for (index, lane_id) in group.iter().enumerate() {
                let path = self.lane_path(forward, index)?;
                if let Some(lane) = lanes.get_mut(*lane_id) {
                    lane.set_path(path);
                }
            }
        }
        Ok(())
    }

    /// A unit vector pointing to the right of the forward direction.
    fn right(&self) -> Vector2d {
        let axis = self.orientation.axis();
        Vector2d::new(axis.y, -axis.x)
    }

    fn update_ends(&mut self, intersections: &IntersectionSet) -> Result<()> {
        let source = intersections
            .get(self.source)
            .ok_or(SimError::UnknownIntersection(self.source))?;
        let target = intersections
            .get(self.target)
            .ok_or(SimError::UnknownIntersection(self.target))?;
        let axis = self.orientation.axis();
        let start = source.origin() + axis * source.extent(self.orientation);
        let end = target.origin() - axis * target.extent(self.orientation);
        if (end - start).dot(axis) <= 0.0 {
            return Err(SimError::DegenerateRoad);
        }
        self.start = start;
        self.end = end;
        Ok(())
    }

    /// The midline of a lane, offset to the right of its direction of travel.
    fn lane_path(&self, forward: bool, index: usize) -> Result<Path> {
        let offset = self.right() * ((index as f64 + 0.5) * self.lane_width);
        let radius = 0.5 * self.lane_width;
        if forward {
            Path::straight(self.start + offset, self.end + offset, radius)
        } else {
            Path::straight(self.end - offset, self.start - offset, radius)
        }
    }
}
