use super::Vehicle;
use crate::lane::Network;
use crate::LaneId;

/// The outcome of considering a move into one lane.
struct Candidate {
    lane: LaneId,
    incentive: f64,
}

/// Picks the lane the vehicle should be in using the MOBIL lane change model.
///
/// Every neighbour of `current` is evaluated. A lane is only considered if the vehicle
/// that would end up behind it can still brake comfortably, and is only chosen if its
/// incentive beats staying put by more than `lane_change_threshold`, rather than by
/// any positive amount. The incentive weighs the gains of the old and new followers
/// once each.
///
/// Lanes with no way past their end are never entered from a lane that has one, and
/// leaving such a lane for one that has a way through earns `route_bias`.
pub(crate) fn optimal_lane(vehicle: &Vehicle, current: LaneId, net: &Network) -> LaneId {
    let lane = &net.lanes[current];
    if lane.neighbours().is_empty() {
        return current;
    }
    let routed = net.has_route(current);

    let here = lane.vehicle_neighbours(vehicle);
    let front = here.front.map(|id| &net.vehicles[id]);
    let acc_here = net.acceleration(current, vehicle, front);

    // The follower left behind gains from the gap opening up
    let old_follower_gain = here.back.map_or(0.0, |id| {
        let back = &net.vehicles[id];
        net.acceleration(current, back, front) - net.acceleration(current, back, Some(vehicle))
    });

    lane.neighbours()
        .iter()
        .filter_map(|&candidate| {
            let route_bias = match (routed, net.has_route(candidate)) {
                (true, false) => return None,
                (false, true) => net.config.route_bias,
                _ => 0.0,
            };
            let there = net.lanes[candidate].vehicle_neighbours(vehicle);
            let front = there.front.map(|id| &net.vehicles[id]);

            let new_follower_gain = match there.back {
                Some(id) => {
                    let back = &net.vehicles[id];
                    let after = net.acceleration(candidate, back, Some(vehicle));
                    if after + back.braking() <= 0.0 {
                        return None;
                    }
                    after - net.acceleration(candidate, back, front)
                }
                None => 0.0,
            };

            let own_gain = net.acceleration(candidate, vehicle, front) - acc_here;
            let bias = net.lanes[candidate].acc_bias() - lane.acc_bias() + route_bias;
            Some(Candidate {
                lane: candidate,
                incentive: own_gain
                    + vehicle.politeness() * (new_follower_gain + old_follower_gain)
                    + bias,
            })
        })
        .filter(|c| c.incentive > net.config.lane_change_threshold)
        .fold(None, |best: Option<Candidate>, c| match best {
            Some(b) if b.incentive >= c.incentive => Some(b),
            _ => Some(c),
        })
        .map_or(current, |c| c.lane)
}
