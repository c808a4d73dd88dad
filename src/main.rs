use std::time::Instant;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use traffic_micro::math::Point2d;
use traffic_micro::{Orientation, RoadAttributes, SimConfig, VehicleParams, World};

const GRID_SPACING: f64 = 300.0;
const NUM_VEHICLES: usize = 60;
const NUM_FRAMES: u32 = 1000;
const DT: f64 = 0.05;

fn main() -> traffic_micro::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|err| traffic_micro::SimError::InvalidConfig(format!("{path}: {err}")))?;
            SimConfig::from_json(&json)?
        }
        None => SimConfig::default(),
    };
    let mut world = World::new(config);

    // A 2x2 grid of intersections joined into a ring
    let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
        .map(|(x, y)| world.add_intersection(Point2d::new(x * GRID_SPACING, y * GRID_SPACING)));
    for (source, target, orientation) in [
        (0, 1, Orientation::Horizontal),
        (2, 3, Orientation::Horizontal),
        (0, 2, Orientation::Vertical),
        (1, 3, Orientation::Vertical),
    ] {
        world.add_road(&RoadAttributes {
            source: corners[source],
            target: corners[target],
            forward_lanes: 2,
            backward_lanes: 2,
            orientation,
            speed_limit: 14.0,
        })?;
    }

    let mut rng = StdRng::seed_from_u64(7);
    let params = VehicleParams::default();
    for _ in 0..NUM_VEHICLES {
        if world.try_spawn(&params, &mut rng)?.is_none() {
            break;
        }
    }
    world.randomise_velocity_adjusts(0.1, &mut rng)?;
    info!("spawned {} vehicles", world.vehicle_count());

    println!("Simulating...");
    for _ in 0..5 {
        let start = Instant::now();
        for _ in 0..NUM_FRAMES {
            world.update(DT);
        }
        let frame = start.elapsed() / NUM_FRAMES;
        println!(
            "Avg. frame: {:?} --> {:.0}x real time ({} vehs, t = {:.0}s)",
            frame,
            DT / frame.as_secs_f64(),
            world.vehicle_count(),
            world.time(),
        );
    }
    Ok(())
}
