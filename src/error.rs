//! The error type shared by every fallible operation in the crate.

use crate::{IntersectionId, LaneId, RoadId};
use thiserror::Error;

/// A convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// An error raised when constructing or querying part of the simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("mass must be positive, got {0}")]
    InvalidMass(f64),
    #[error("moment of inertia must be positive, got {0}")]
    InvalidInertia(f64),
    #[error("intersection {0:?} already has the maximum of {1} roads")]
    IntersectionFull(IntersectionId, usize),
    #[error("the {1:?} side of intersection {0:?} is already occupied")]
    SideOccupied(IntersectionId, crate::Side),
    #[error("side index {0} is outside 0..=3")]
    InvalidSide(usize),
    #[error("road endpoints do not match its {0:?} orientation")]
    MisalignedRoad(crate::Orientation),
    #[error("road endpoints are too close for the intersections they connect")]
    DegenerateRoad,
    #[error("a road must have at least one lane")]
    NoLanes,
    #[error("a lane change must be between two distinct lanes, got {0:?} twice")]
    SameLaneChange(LaneId),
    #[error("the neighbours of lane {0:?} have already been set")]
    NeighboursAlreadySet(LaneId),
    #[error("maximum acceleration {value} is below the supported minimum {min}")]
    AccelerationOutOfRange { value: f64, min: f64 },
    #[error("braking deceleration {value} is outside the supported range (0, {max}]")]
    BrakingOutOfRange { value: f64, max: f64 },
    #[error("vehicle parameter `{name}` must be positive, got {value}")]
    InvalidVehicleParameter { name: &'static str, value: f64 },
    #[error("parameter `{name}` must lie within [0, 1], got {value}")]
    ParameterOutOfRange { name: &'static str, value: f64 },
    #[error("a path needs at least one segment")]
    EmptyPath,
    #[error("path segment {0} does not start where the previous one ends")]
    DiscontiguousPath(usize),
    #[error("path radius must be positive, got {0}")]
    InvalidPathRadius(f64),
    #[error("a curve must be sampled into at least one segment")]
    InvalidSegmentCount,
    #[error("no intersection with ID {0:?}")]
    UnknownIntersection(IntersectionId),
    #[error("no road with ID {0:?}")]
    UnknownRoad(RoadId),
    #[error("no lane with ID {0:?}")]
    UnknownLane(LaneId),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("malformed configuration document")]
    Config(#[from] serde_json::Error),
}
