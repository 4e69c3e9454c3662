//! Movement system: advances every moving ride along its current path.
//!
//! Each tick converts the simulated time covered into distance at the
//! configured vehicle speed and walks the path cursor forward, chaining several
//! segments when the distance allows. Segment length is the great-circle
//! distance between its endpoints. The cursor never runs past the last node:
//! a finished leg parks on the final segment with fraction 1.

use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{info, warn};

use crate::clock::SimulationClock;
use crate::config::DispatchConfig;
use crate::ecs::{Ride, RidePaths, RideProgress, RideStatus, RideTiming};
use crate::matching::DriverMatcher;
use crate::routing::PathDetails;

/// Move `progress` forward by `distance_km` along `path`. Returns `true` once
/// the end of the path is reached.
pub fn advance_along_path(path: &PathDetails, progress: &mut RideProgress, distance_km: f64) -> bool {
    let nodes = &path.nodes;
    if nodes.len() < 2 {
        progress.fraction = 1.0;
        return true;
    }

    let last_segment = nodes.len() - 2;
    progress.segment = progress.segment.min(last_segment);
    let mut remaining = distance_km.max(0.0);
    loop {
        let from = nodes[progress.segment].coordinate();
        let to = nodes[progress.segment + 1].coordinate();
        let segment_km = from.distance_km(&to);
        let left_km = segment_km * (1.0 - progress.fraction);

        if segment_km <= 0.0 || remaining >= left_km {
            remaining -= left_km;
            progress.leg_traveled_km += left_km;
            if progress.segment == last_segment {
                progress.fraction = 1.0;
                return true;
            }
            progress.segment += 1;
            progress.fraction = 0.0;
            continue;
        }

        progress.fraction += remaining / segment_km;
        progress.leg_traveled_km += remaining;
        return false;
    }
}

pub fn ride_movement_system(
    clock: Res<SimulationClock>,
    config: Res<DispatchConfig>,
    mut matcher: ResMut<DriverMatcher>,
    mut rides: Query<(&mut Ride, &RidePaths, &mut RideProgress, &mut RideTiming)>,
) {
    let distance_km = config.vehicle_speed_kmh / 3600.0 * clock.delta_secs();

    for (mut ride, paths, mut progress, mut timing) in rides.iter_mut() {
        if !matches!(ride.status, RideStatus::DriverEnRoute | RideStatus::InProgress) {
            continue;
        }

        let leg = paths.leg(progress.leg);
        if advance_along_path(leg, &mut progress, distance_km) {
            let next = match ride.status {
                RideStatus::DriverEnRoute => RideStatus::Arrived,
                _ => RideStatus::Completed,
            };
            match ride.transition(next) {
                Ok(_) if next == RideStatus::Arrived => {
                    timing.arrived_at_ms = Some(clock.wall_ms());
                    timing.arrived_sim_ms = Some(clock.now());
                    info!(ride = %ride.id, driver = %ride.driver, "driver arrived at pickup");
                }
                Ok(_) => {
                    timing.completed_at_ms = Some(clock.wall_ms());
                    info!(ride = %ride.id, driver = %ride.driver, "ride completed");
                }
                Err(err) => warn!(ride = %ride.id, %err, "ride transition rejected"),
            }
        }

        if let Some(position) = progress.position(paths) {
            if let Err(err) = matcher.update_driver_location(ride.driver, position) {
                warn!(ride = %ride.id, driver = %ride.driver, %err, "could not move driver");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{find_path, Algorithm, CostType};
    use crate::test_helpers::{grid_graph, line_graph};

    fn segment_lengths(path: &PathDetails) -> Vec<f64> {
        path.nodes
            .windows(2)
            .map(|pair| pair[0].coordinate().distance_km(&pair[1].coordinate()))
            .collect()
    }

    #[test]
    fn partial_step_stays_on_segment() {
        let graph = line_graph();
        let path = find_path(&graph, "A", "C", Algorithm::AStar, CostType::Time).expect("path");
        let first = segment_lengths(&path)[0];
        let mut progress = RideProgress::start(crate::ecs::Leg::ToPickup);

        assert!(!advance_along_path(&path, &mut progress, first / 4.0));
        assert_eq!(progress.segment, 0);
        assert!((progress.fraction - 0.25).abs() < 1e-9);
        assert!(!advance_along_path(&path, &mut progress, first / 4.0));
        assert!((progress.fraction - 0.5).abs() < 1e-9);
    }

    #[test]
    fn long_step_chains_segments_without_overshoot() {
        let graph = grid_graph(1, 6);
        let path = find_path(&graph, "0_0", "0_5", Algorithm::Dijkstra, CostType::Distance)
            .expect("path");
        let lengths = segment_lengths(&path);
        assert_eq!(lengths.len(), 5);
        let mut progress = RideProgress::start(crate::ecs::Leg::ToPickup);

        // Two and a half segments in one step.
        let step = lengths[0] + lengths[1] + lengths[2] / 2.0;
        assert!(!advance_along_path(&path, &mut progress, step));
        assert_eq!(progress.segment, 2);
        assert!((progress.fraction - 0.5).abs() < 1e-9);
        assert!((progress.leg_traveled_km - step).abs() < 1e-9);

        // Far more than what is left.
        let total: f64 = lengths.iter().sum();
        assert!(advance_along_path(&path, &mut progress, total * 10.0));
        assert_eq!(progress.segment, 4);
        assert_eq!(progress.fraction, 1.0);
        assert!((progress.leg_traveled_km - total).abs() < 1e-9);
    }

    #[test]
    fn traveled_distance_matches_cursor() {
        let graph = grid_graph(1, 4);
        let path = find_path(&graph, "0_0", "0_3", Algorithm::Dijkstra, CostType::Distance)
            .expect("path");
        let lengths = segment_lengths(&path);
        let mut progress = RideProgress::start(crate::ecs::Leg::ToDropoff);
        let step = lengths[0] / 3.0;
        for _ in 0..5 {
            let before = (progress.segment, progress.fraction);
            advance_along_path(&path, &mut progress, step);
            if progress.segment == before.0 {
                assert!(progress.fraction >= before.1);
            } else {
                assert_eq!(progress.segment, before.0 + 1);
            }
            let expected: f64 = lengths[..progress.segment].iter().sum::<f64>()
                + lengths[progress.segment] * progress.fraction;
            assert!((progress.leg_traveled_km - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn single_node_path_is_already_finished() {
        let graph = line_graph();
        let path = find_path(&graph, "B", "B", Algorithm::AStar, CostType::Time).expect("path");
        let mut progress = RideProgress::start(crate::ecs::Leg::ToPickup);
        assert!(advance_along_path(&path, &mut progress, 0.0));
        assert_eq!(progress.segment, 0);
    }
}
