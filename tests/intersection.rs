//! Tests of signalised intersections and the connector lanes through them.

use assert_approx_eq::assert_approx_eq;
use traffic_micro::math::Point2d;
use traffic_micro::{
    DrivingState, FlowState, IntersectionId, LaneOwner, NextLane, Orientation, RoadAttributes,
    RoadId, SignalState, SimConfig, SimError, Turn, VehicleParams, World,
};

fn road(source: IntersectionId, target: IntersectionId, orientation: Orientation) -> RoadAttributes {
    RoadAttributes {
        source,
        target,
        forward_lanes: 1,
        backward_lanes: 1,
        orientation,
        speed_limit: 14.0,
    }
}

/// A four-way intersection at the origin with a two-way road on every side.
struct Crossroads {
    world: World,
    centre: IntersectionId,
    west: RoadId,
    east: RoadId,
    south: RoadId,
    north: RoadId,
}

impl Crossroads {
    fn new() -> Self {
        let mut world = World::default();
        let centre = world.add_intersection(Point2d::new(0.0, 0.0));
        let w = world.add_intersection(Point2d::new(-200.0, 0.0));
        let e = world.add_intersection(Point2d::new(200.0, 0.0));
        let s = world.add_intersection(Point2d::new(0.0, -200.0));
        let n = world.add_intersection(Point2d::new(0.0, 200.0));
        let west = world.add_road(&road(w, centre, Orientation::Horizontal)).unwrap();
        let east = world.add_road(&road(centre, e, Orientation::Horizontal)).unwrap();
        let south = world.add_road(&road(s, centre, Orientation::Vertical)).unwrap();
        let north = world.add_road(&road(centre, n, Orientation::Vertical)).unwrap();
        Self {
            world,
            centre,
            west,
            east,
            south,
            north,
        }
    }
}

#[test]
fn every_movement_gets_a_connector() {
    let x = Crossroads::new();
    let centre = x.world.intersection(x.centre).unwrap();
    assert_eq!(centre.roads().len(), 4);
    assert_eq!(centre.connectors().count(), 12);
    assert_eq!(centre.signal(FlowState::NsThrough).lanes().len(), 4);
    assert_eq!(centre.signal(FlowState::NsLeft).lanes().len(), 2);
    assert_eq!(centre.signal(FlowState::EwThrough).lanes().len(), 4);
    assert_eq!(centre.signal(FlowState::EwLeft).lanes().len(), 2);

    // Northbound traffic from the south road may go straight on or turn right
    let northbound = x.world.road(x.south).unwrap().forward_lanes()[0];
    let permitted = centre.permitted_connectors(northbound);
    assert_eq!(permitted.len(), 2);
    let mut turns = vec![];
    for &id in permitted {
        let connector = x.world.lane(id).unwrap();
        let LaneOwner::Connector { flow, turn, .. } = connector.owner() else {
            panic!("not a connector");
        };
        assert_eq!(flow, FlowState::NsThrough);
        let NextLane::Fixed(next) = connector.next() else {
            panic!("connector has no fixed successor");
        };
        let next = x.world.lane(next).unwrap();
        let incoming = x.world.lane(northbound).unwrap();
        assert_approx_eq!(connector.path().start().x, incoming.path().end().x, 1e-9);
        assert_approx_eq!(connector.path().start().y, incoming.path().end().y, 1e-9);
        assert_approx_eq!(connector.path().end().x, next.path().start().x, 1e-9);
        assert_approx_eq!(connector.path().end().y, next.path().start().y, 1e-9);
        turns.push(turn);
        let expected = match turn {
            Turn::Front => x.world.road(x.north).unwrap().forward_lanes()[0],
            Turn::Right => x.world.road(x.east).unwrap().forward_lanes()[0],
            Turn::Left => panic!("left turns belong to another flow"),
        };
        assert_eq!(next.id(), expected);
    }
    assert!(turns.contains(&Turn::Front) && turns.contains(&Turn::Right));

    // Eastbound traffic is held while north-south traffic has right of way
    let eastbound = x.world.road(x.west).unwrap().forward_lanes()[0];
    assert!(centre.permitted_connectors(eastbound).is_empty());
}

#[test]
fn signal_cycles_through_flows() {
    let mut x = Crossroads::new();
    let flow = |world: &World| world.intersection(x.centre).unwrap().active_flow();
    assert_eq!(flow(&x.world), FlowState::NsThrough);

    for _ in 0..10 {
        x.world.update(1.0);
    }
    let centre = x.world.intersection(x.centre).unwrap();
    assert_eq!(centre.signal_state(FlowState::NsThrough), SignalState::WaitForEmpty);
    let northbound = x.world.road(x.south).unwrap().forward_lanes()[0];
    assert!(centre.permitted_connectors(northbound).is_empty());

    // The connectors are empty, so control passes on straight away
    x.world.update(1.0);
    assert_eq!(flow(&x.world), FlowState::NsLeft);
    for expected in [FlowState::EwThrough, FlowState::EwLeft, FlowState::NsThrough] {
        for _ in 0..11 {
            x.world.update(1.0);
        }
        assert_eq!(flow(&x.world), expected);
    }
}

#[test]
fn through_movement_funnels_excess_lanes() {
    let mut world = World::default();
    let w = world.add_intersection(Point2d::new(-200.0, 0.0));
    let centre = world.add_intersection(Point2d::new(0.0, 0.0));
    let e = world.add_intersection(Point2d::new(200.0, 0.0));
    let narrow = world
        .add_road(&RoadAttributes {
            forward_lanes: 1,
            backward_lanes: 0,
            ..road(w, centre, Orientation::Horizontal)
        })
        .unwrap();
    let wide = world
        .add_road(&RoadAttributes {
            forward_lanes: 2,
            backward_lanes: 0,
            ..road(centre, e, Orientation::Horizontal)
        })
        .unwrap();

    let incoming = world.road(narrow).unwrap().forward_lanes()[0];
    let intersection = world.intersection(centre).unwrap();
    // Only east-west traffic exists, so that flow is given right of way at once
    assert_eq!(intersection.active_flow(), FlowState::EwThrough);

    let connectors = intersection.permitted_connectors(incoming);
    assert_eq!(connectors.len(), 2);
    let reached = connectors
        .iter()
        .map(|id| world.lane(*id).unwrap().next())
        .collect::<Vec<_>>();
    // Both outgoing lanes are served by the single incoming lane
    for &lane in world.road(wide).unwrap().forward_lanes() {
        assert!(reached.contains(&NextLane::Fixed(lane)));
    }
}

#[test]
fn vehicle_crosses_the_intersection() {
    let mut world = World::default();
    let w = world.add_intersection(Point2d::new(-200.0, 0.0));
    let centre = world.add_intersection(Point2d::new(0.0, 0.0));
    let e = world.add_intersection(Point2d::new(200.0, 0.0));
    let one_way = |source, target| RoadAttributes {
        backward_lanes: 0,
        ..road(source, target, Orientation::Horizontal)
    };
    let west = world.add_road(&one_way(w, centre)).unwrap();
    let east = world.add_road(&one_way(centre, e)).unwrap();
    let start = world.road(west).unwrap().forward_lanes()[0];
    let goal = world.road(east).unwrap().forward_lanes()[0];

    let veh = world
        .add_vehicle(&VehicleParams::default(), start, None)
        .unwrap()
        .unwrap();
    let mut used_connector = false;
    for _ in 0..1200 {
        world.update(0.1);
        let state = world.vehicle(veh).unwrap().state();
        if let DrivingState::KeepLane { lane } = state {
            let owner = world.lane(lane).unwrap().owner();
            used_connector |= matches!(owner, LaneOwner::Connector { .. });
        }
        if state == DrivingState::keep_lane(goal) {
            break;
        }
    }
    assert!(used_connector);
    assert_eq!(world.vehicle(veh).unwrap().state(), DrivingState::keep_lane(goal));
    assert!(world.lane(goal).unwrap().contains(veh));
    assert!(!world.lane(start).unwrap().contains(veh));
}

#[test]
fn rejects_roads_beyond_capacity() {
    let config = SimConfig {
        max_roads_per_intersection: 2,
        ..Default::default()
    };
    let mut world = World::new(config);
    let centre = world.add_intersection(Point2d::new(0.0, 0.0));
    let w = world.add_intersection(Point2d::new(-100.0, 0.0));
    let e = world.add_intersection(Point2d::new(100.0, 0.0));
    let n = world.add_intersection(Point2d::new(0.0, 100.0));
    let w2 = world.add_intersection(Point2d::new(-300.0, 0.0));

    world.add_road(&road(w, centre, Orientation::Horizontal)).unwrap();
    assert!(matches!(
        world.add_road(&road(w2, centre, Orientation::Horizontal)),
        Err(SimError::SideOccupied(id, _)) if id == centre
    ));
    world.add_road(&road(centre, e, Orientation::Horizontal)).unwrap();
    assert!(matches!(
        world.add_road(&road(centre, n, Orientation::Vertical)),
        Err(SimError::IntersectionFull(id, 2)) if id == centre
    ));
    assert_eq!(world.iter_roads().count(), 2);
    assert_eq!(world.intersection(centre).unwrap().roads().len(), 2);
}

#[test]
fn footprint_follows_attached_roads() {
    let mut world = World::default();
    let centre = world.add_intersection(Point2d::new(0.0, 0.0));
    let s = world.add_intersection(Point2d::new(0.0, -100.0));
    let w = world.add_intersection(Point2d::new(-100.0, 0.0));
    let west = world.add_road(&road(w, centre, Orientation::Horizontal)).unwrap();
    let before = world.road(west).unwrap().length();

    // A wide road to the south widens the intersection, shortening the road to the west
    let south = world
        .add_road(&RoadAttributes {
            forward_lanes: 3,
            backward_lanes: 2,
            ..road(s, centre, Orientation::Vertical)
        })
        .unwrap();
    let bounds = world.intersection(centre).unwrap().bounds();
    assert_approx_eq!(bounds.x.length(), 2.0 * 3.0 * 3.5);
    let after = world.road(west).unwrap().length();
    assert_approx_eq!(before - after, 2.0 * 3.5);

    let lane = world.road(west).unwrap().forward_lanes()[0];
    assert_approx_eq!(world.lane(lane).unwrap().length(), after);

    world.remove_road(south).unwrap();
    assert_approx_eq!(world.road(west).unwrap().length(), before);
    assert!(world.road(south).is_none());
    assert!(matches!(world.remove_road(south), Err(SimError::UnknownRoad(_))));
}

#[test]
fn removing_a_road_evicts_its_vehicles() {
    let mut x = Crossroads::new();
    let lane = x.world.road(x.north).unwrap().forward_lanes()[0];
    x.world
        .add_vehicle(&VehicleParams::default(), lane, Some(0.5))
        .unwrap()
        .unwrap();
    assert_eq!(x.world.vehicle_count(), 1);

    x.world.remove_road(x.north).unwrap();
    assert_eq!(x.world.vehicle_count(), 0);
    assert!(x.world.lane(lane).is_none());
    let centre = x.world.intersection(x.centre).unwrap();
    assert_eq!(centre.roads().len(), 3);
    // Three roads give six movements
    assert_eq!(centre.connectors().count(), 6);
    x.world.update(0.1);
}
