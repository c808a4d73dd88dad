pub use cgmath;
pub use config::{PidGains, SimConfig};
pub use error::{Result, SimError};
pub use intersection::{FlowState, Intersection, Side, Turn};
pub use lane::{Lane, LaneOwner, LeaderInfo, NextLane, VehicleNeighbours};
pub use light::{SignalState, TrafficLightFsm};
pub use pid::PidController;
pub use rigid_body::RigidBody;
pub use road::{Orientation, Road, RoadAttributes};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::{Interval, Rect};
pub use vehicle::{DrivingState, Vehicle, VehicleParams};
pub use world::World;

mod config;
mod error;
mod intersection;
mod lane;
mod light;
pub mod math;
mod pid;
mod rigid_body;
mod road;
mod util;
mod vehicle;
mod world;

new_key_type! {
    /// Unique ID of an [Intersection].
    pub struct IntersectionId;
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type IntersectionSet = SlotMap<IntersectionId, Intersection>;
type RoadSet = SlotMap<RoadId, Road>;
type LaneSet = SlotMap<LaneId, Lane>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
