//! Tests that involve the simulation of a single lane.

use assert_approx_eq::assert_approx_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use traffic_micro::math::{Point2d, Vector2d};
use traffic_micro::{
    DrivingState, LaneId, Orientation, RoadAttributes, SimError, VehicleId, VehicleParams, World,
};

/// A one lane road running east from x = 0 to x = 200, ending in a dead end.
fn single_lane_world() -> (World, LaneId) {
    let mut world = World::default();
    let west = world.add_intersection(Point2d::new(0.0, 0.0));
    let east = world.add_intersection(Point2d::new(200.0, 0.0));
    let road = world
        .add_road(&RoadAttributes {
            source: west,
            target: east,
            forward_lanes: 1,
            backward_lanes: 0,
            orientation: Orientation::Horizontal,
            speed_limit: 15.0,
        })
        .unwrap();
    let lane = world.road(road).unwrap().forward_lanes()[0];
    (world, lane)
}

/// A one way road with `lanes` lanes, each 1000 m long, running east to a dead end.
fn one_way_road(lanes: usize) -> (World, Vec<LaneId>) {
    let mut world = World::default();
    let west = world.add_intersection(Point2d::new(0.0, 0.0));
    let east = world.add_intersection(Point2d::new(1007.0, 0.0));
    let road = world
        .add_road(&RoadAttributes {
            source: west,
            target: east,
            forward_lanes: lanes,
            backward_lanes: 0,
            orientation: Orientation::Horizontal,
            speed_limit: 15.0,
        })
        .unwrap();
    let lanes = world.road(road).unwrap().forward_lanes().to_vec();
    (world, lanes)
}

/// The bumper-to-bumper gap between two vehicles travelling east.
fn gap(world: &World, follower: VehicleId, leader: VehicleId) -> f64 {
    let follower = world.vehicle(follower).unwrap();
    let leader = world.vehicle(leader).unwrap();
    follower.bumper_gap(leader, Vector2d::new(1.0, 0.0))
}

/// Test that a vehicle's position increases monotonically.
#[test]
fn vehicle_drives_forward() {
    let (mut world, lane) = single_lane_world();
    let veh = world
        .add_vehicle(&VehicleParams::default(), lane, None)
        .unwrap()
        .unwrap();
    let midline = world.lane(lane).unwrap().path().start().y;

    let mut pos = world.vehicle(veh).unwrap().position();
    for _ in 0..100 {
        world.update(0.1);
        let next_pos = world.vehicle(veh).unwrap().position();
        assert!(next_pos.x > pos.x);
        assert!((next_pos.y - midline).abs() < 0.1);
        pos = next_pos;
    }
    assert_eq!(world.frame(), 100);
    assert_approx_eq!(world.time(), 10.0, 1e-9);
}

#[test]
fn non_positive_time_step_does_nothing() {
    let (mut world, lane) = single_lane_world();
    let veh = world
        .add_vehicle(&VehicleParams::default(), lane, Some(0.5))
        .unwrap()
        .unwrap();
    let pos = world.vehicle(veh).unwrap().position();
    world.update(0.0);
    world.update(-1.0);
    assert_eq!(world.frame(), 0);
    assert_eq!(world.vehicle(veh).unwrap().position(), pos);
}

#[test]
fn stops_at_a_dead_end() {
    let (mut world, lane) = single_lane_world();
    let veh = world
        .add_vehicle(&VehicleParams::default(), lane, None)
        .unwrap()
        .unwrap();
    let lane_end = world.lane(lane).unwrap().path().end().x;

    for _ in 0..900 {
        world.update(0.1);
        let vehicle = world.vehicle(veh).unwrap();
        assert!(vehicle.position().x + vehicle.half_length() < lane_end + 0.5);
    }
    let vehicle = world.vehicle(veh).unwrap();
    assert!(vehicle.speed() < 0.5);
    assert!(vehicle.position().x > 150.0);
    assert_eq!(vehicle.state(), DrivingState::keep_lane(lane));
}

#[test]
fn follower_keeps_its_distance() {
    let (mut world, lane) = single_lane_world();
    let params = VehicleParams::default();
    let leader = world.add_vehicle(&params, lane, Some(0.3)).unwrap().unwrap();
    let follower = world.add_vehicle(&params, lane, None).unwrap().unwrap();

    let order = world.lane(lane).unwrap().vehicles().collect::<Vec<_>>();
    assert_eq!(order, vec![follower, leader]);

    for _ in 0..900 {
        world.update(0.1);
        assert!(gap(&world, follower, leader) > 0.0);
    }
    // Both queue up behind the dead end
    assert!(world.vehicle(follower).unwrap().speed() < 0.5);
    assert!(gap(&world, follower, leader) < 10.0);
}

#[test]
fn spawning_needs_room() {
    let (mut world, lane) = single_lane_world();
    let params = VehicleParams::default();
    assert!(world.add_vehicle(&params, lane, None).unwrap().is_some());
    assert!(world.add_vehicle(&params, lane, None).unwrap().is_none());
    assert!(world.add_vehicle(&params, lane, Some(0.5)).unwrap().is_some());
    assert_eq!(world.vehicle_count(), 2);

    let mut rng = StdRng::seed_from_u64(3);
    assert!(world.try_spawn(&params, &mut rng).unwrap().is_none());

    assert!(matches!(
        world.add_vehicle(&params, lane, Some(1.5)),
        Err(SimError::ParameterOutOfRange { .. })
    ));
    let sluggish = VehicleParams {
        max_acc: 0.1,
        ..params
    };
    assert!(matches!(
        world.add_vehicle(&sluggish, lane, Some(0.8)),
        Err(SimError::AccelerationOutOfRange { .. })
    ));
}

#[test]
fn removed_vehicles_leave_their_lane() {
    let (mut world, lane) = single_lane_world();
    let veh = world
        .add_vehicle(&VehicleParams::default(), lane, None)
        .unwrap()
        .unwrap();
    world.update(0.1);
    assert!(world.lane(lane).unwrap().contains(veh));
    assert!(world.remove_vehicle(veh).is_some());
    assert!(world.lane(lane).unwrap().is_empty());
    assert!(world.remove_vehicle(veh).is_none());
    world.update(0.1);
}

#[test]
fn rejects_misaligned_roads() {
    let mut world = World::default();
    let a = world.add_intersection(Point2d::new(0.0, 0.0));
    let b = world.add_intersection(Point2d::new(100.0, 50.0));
    let c = world.add_intersection(Point2d::new(0.0, 100.0));
    let attribs = |source, target, orientation| RoadAttributes {
        source,
        target,
        forward_lanes: 1,
        backward_lanes: 1,
        orientation,
        speed_limit: 15.0,
    };

    assert!(matches!(
        world.add_road(&attribs(a, b, Orientation::Horizontal)),
        Err(SimError::MisalignedRoad(Orientation::Horizontal))
    ));
    assert!(matches!(
        world.add_road(&attribs(c, a, Orientation::Vertical)),
        Err(SimError::MisalignedRoad(Orientation::Vertical))
    ));
    assert!(matches!(
        world.add_road(&attribs(a, c, Orientation::Horizontal)),
        Err(SimError::MisalignedRoad(Orientation::Horizontal))
    ));
    assert!(world.add_road(&attribs(a, c, Orientation::Vertical)).is_ok());
    assert_eq!(world.iter_roads().count(), 1);
}

#[test]
fn velocity_adjusts_are_clamped() {
    let (mut world, lane) = single_lane_world();
    let params = VehicleParams::default();
    for offset in [0.2, 0.5, 0.8] {
        world.add_vehicle(&params, lane, Some(offset)).unwrap().unwrap();
    }
    let mut rng = StdRng::seed_from_u64(11);
    world.randomise_velocity_adjusts(5.0, &mut rng).unwrap();
    let lane = world.lane(lane).unwrap();
    for vehicle in world.iter_vehicles() {
        let speed = vehicle.max_speed_on(lane);
        assert!((0.75 * 15.0..=1.25 * 15.0).contains(&speed));
    }
    assert!(world.randomise_velocity_adjusts(-1.0, &mut rng).is_err());
}

#[test]
fn lane_change_moves_vehicle_between_lanes() {
    let (mut world, lanes) = one_way_road(2);
    let (inner, outer) = (lanes[0], lanes[1]);
    assert_approx_eq!(world.lane(inner).unwrap().length(), 1000.0, 1e-9);
    let params = VehicleParams::default();
    let veh = world.add_vehicle(&params, outer, Some(0.3)).unwrap().unwrap();
    world.add_vehicle(&params, outer, Some(0.307)).unwrap().unwrap();

    // Stuck close behind another vehicle, with an empty lane alongside
    world.update(0.1);
    assert_eq!(
        world.vehicle(veh).unwrap().state(),
        DrivingState::ChangeLane {
            from: outer,
            to: inner
        }
    );
    assert!(world.lane(outer).unwrap().contains(veh));
    assert!(world.lane(inner).unwrap().contains(veh));

    for _ in 0..300 {
        world.update(0.1);
        if world.vehicle(veh).unwrap().state() == DrivingState::keep_lane(inner) {
            break;
        }
    }
    assert_eq!(world.vehicle(veh).unwrap().state(), DrivingState::keep_lane(inner));
    assert!(world.lane(inner).unwrap().contains(veh));
    assert!(!world.lane(outer).unwrap().contains(veh));
}

#[test]
fn one_gap_takes_one_vehicle_per_step() {
    let (mut world, lanes) = one_way_road(3);
    let params = VehicleParams::default();
    let mut add = |lane, offset| world.add_vehicle(&params, lane, Some(offset)).unwrap().unwrap();
    let a = add(lanes[0], 0.3);
    let b = add(lanes[2], 0.3);
    add(lanes[0], 0.307);
    add(lanes[2], 0.307);

    // Both vehicles want the empty middle lane, level with each other
    world.update(0.1);
    let merging = [a, b]
        .into_iter()
        .filter(|id| {
            matches!(
                world.vehicle(*id).unwrap().state(),
                DrivingState::ChangeLane { to, .. } if to == lanes[1]
            )
        })
        .count();
    assert_eq!(merging, 1);
    assert_eq!(world.lane(lanes[1]).unwrap().vehicle_count(), 1);
}
